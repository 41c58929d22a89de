use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

pub const DEFAULT_SEATS_PER_LEG: i32 = 30;

/// Draws a seat uniformly from the unoccupied seats in `1..=seats_per_leg`.
/// Returns `None` when the leg is full.
pub fn pick_seat(occupied: &HashSet<i32>, seats_per_leg: i32) -> Option<i32> {
    pick_seat_with(&mut rand::thread_rng(), occupied, seats_per_leg)
}

pub fn pick_seat_with<R: Rng + ?Sized>(
    rng: &mut R,
    occupied: &HashSet<i32>,
    seats_per_leg: i32,
) -> Option<i32> {
    let free: Vec<i32> = (1..=seats_per_leg)
        .filter(|seat| !occupied.contains(seat))
        .collect();
    free.choose(rng).copied()
}
