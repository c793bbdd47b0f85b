//! Tests for the order status lifecycle:
//! pending -> confirmed -> shipped -> delivered, cancellation from pending
//! or confirmed only, terminal states rejecting everything.

use storefront_api::entities::OrderStatus::{self, *};

const ALL: [OrderStatus; 5] = [Pending, Confirmed, Shipped, Delivered, Cancelled];

#[test]
fn the_full_transition_matrix() {
    let allowed = [
        (Pending, Confirmed),
        (Pending, Cancelled),
        (Confirmed, Shipped),
        (Confirmed, Cancelled),
        (Shipped, Delivered),
    ];
    for from in ALL {
        for to in ALL {
            let expected = allowed.contains(&(from, to));
            assert_eq!(
                from.can_transition_to(to),
                expected,
                "transition {:?} -> {:?}",
                from,
                to
            );
        }
    }
}

#[test]
fn terminal_states_are_dead_ends() {
    for terminal in [Delivered, Cancelled] {
        assert!(terminal.is_terminal());
        for to in ALL {
            assert!(!terminal.can_transition_to(to));
        }
    }
}

#[test]
fn no_forward_skips() {
    assert!(!Pending.can_transition_to(Shipped));
    assert!(!Pending.can_transition_to(Delivered));
    assert!(!Confirmed.can_transition_to(Delivered));
}

#[test]
fn cancellation_window_closes_at_shipping() {
    assert!(Pending.can_transition_to(Cancelled));
    assert!(Confirmed.can_transition_to(Cancelled));
    assert!(!Shipped.can_transition_to(Cancelled));
}

#[test]
fn tracking_progress_is_monotonic_along_the_happy_path() {
    let path = [Pending, Confirmed, Shipped, Delivered];
    let mut previous_rank = None;
    for status in path {
        let rank = status.progress_rank().expect("on the forward path");
        if let Some(prev) = previous_rank {
            assert!(rank > prev);
        }
        previous_rank = Some(rank);
    }
    assert_eq!(Cancelled.progress_rank(), None);
}
