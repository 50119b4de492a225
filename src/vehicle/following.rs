//! The car-following rule: how far a vehicle may travel this tick given the gap ahead.

/// The velocity gained in one tick: half the headroom to `max_velocity`, rounded up.
pub fn acceleration(velocity: usize, max_velocity: usize) -> usize {
    max_velocity.saturating_sub(velocity).div_ceil(2)
}

/// The velocity a moving vehicle drops to when an obstacle is `gap` free cells ahead.
/// Halves the gap, rounding up; a zero gap stops the vehicle.
pub fn braking_velocity(gap: usize) -> usize {
    gap.div_ceil(2)
}

/// Computes the next velocity of a vehicle.
///
/// # Arguments
/// * `velocity` - The current velocity in cells per tick.
/// * `max_velocity` - The vehicle's current top speed.
/// * `gap` - Free cells before the nearest obstacle in the lookahead window, if any.
pub fn next_velocity(velocity: usize, max_velocity: usize, gap: Option<usize>) -> usize {
    match gap {
        Some(gap) if velocity > 0 && gap <= velocity => braking_velocity(gap),
        _ if velocity < max_velocity => {
            let accelerated = velocity + acceleration(velocity, max_velocity);
            gap.map_or(accelerated, |gap| accelerated.min(gap))
                .min(max_velocity)
        }
        _ => velocity.min(max_velocity),
    }
}
