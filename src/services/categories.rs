use crate::{
    entities::{category, product, Category, CategoryModel, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Input for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    pub slug: String,
    pub parent_id: Option<Uuid>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// Input for updating a category; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub image_url: Option<String>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

/// Category navigation and administration.
#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Active top-level categories in display order, for primary navigation.
    #[instrument(skip(self))]
    pub async fn list_roots(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Category::find()
            .filter(category::Column::ParentId.is_null())
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::DisplayOrder)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    /// Active subcategories of a parent, fetched on demand.
    #[instrument(skip(self))]
    pub async fn list_children(&self, parent_id: Uuid) -> Result<Vec<CategoryModel>, ServiceError> {
        Category::find()
            .filter(category::Column::ParentId.eq(parent_id))
            .filter(category::Column::IsActive.eq(true))
            .order_by_asc(category::Column::DisplayOrder)
            .all(&*self.db)
            .await
            .map_err(Into::into)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<CategoryModel, ServiceError> {
        Category::find()
            .filter(category::Column::Slug.eq(slug))
            .filter(category::Column::IsActive.eq(true))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", slug)))
    }

    /// Creates a category (admin).
    #[instrument(skip(self))]
    pub async fn create(&self, input: CreateCategoryInput) -> Result<CategoryModel, ServiceError> {
        if input.name.trim().is_empty() || input.slug.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Name and slug are required".to_string(),
            ));
        }
        self.ensure_unique_slug(&input.slug, None).await?;
        if let Some(parent_id) = input.parent_id {
            self.get(parent_id).await?;
        }

        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            parent_id: Set(input.parent_id),
            image_url: Set(input.image_url),
            display_order: Set(input.display_order),
            is_active: Set(input.is_active),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;

        self.event_sender
            .send_or_log(Event::CategoryCreated(model.id))
            .await;
        info!("Created category {} ({})", model.slug, model.id);
        Ok(model)
    }

    /// Updates a category (admin).
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        category_id: Uuid,
        input: UpdateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        let model = self.get(category_id).await?;

        if let Some(ref slug) = input.slug {
            self.ensure_unique_slug(slug, Some(category_id)).await?;
        }

        let mut active: category::ActiveModel = model.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(slug) = input.slug {
            active.slug = Set(slug);
        }
        if let Some(image_url) = input.image_url {
            active.image_url = Set(Some(image_url));
        }
        if let Some(display_order) = input.display_order {
            active.display_order = Set(display_order);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }

        let model = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::CategoryUpdated(category_id))
            .await;
        Ok(model)
    }

    /// Deletes a category (admin). Categories still holding products or
    /// subcategories are a conflict; disable them instead.
    #[instrument(skip(self))]
    pub async fn delete(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let model = self.get(category_id).await?;

        let product_count = Product::find()
            .filter(product::Column::CategoryId.eq(category_id))
            .count(&*self.db)
            .await?;
        if product_count > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category {} still has {} products; disable it instead",
                model.slug, product_count
            )));
        }

        let child_count = Category::find()
            .filter(category::Column::ParentId.eq(category_id))
            .count(&*self.db)
            .await?;
        if child_count > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category {} still has {} subcategories",
                model.slug, child_count
            )));
        }

        model.delete(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::CategoryDeleted(category_id))
            .await;
        info!("Deleted category {}", category_id);
        Ok(())
    }

    pub async fn get(&self, category_id: Uuid) -> Result<CategoryModel, ServiceError> {
        Category::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }

    async fn ensure_unique_slug(
        &self,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        let mut query = Category::find().filter(category::Column::Slug.eq(slug));
        if let Some(id) = exclude {
            query = query.filter(category::Column::Id.ne(id));
        }
        if query.one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Slug {} is already in use",
                slug
            )));
        }
        Ok(())
    }
}
