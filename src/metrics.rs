//! Aggregate measures of the traffic in the simulation.

use crate::Vehicle;

/// A snapshot of the simulation's aggregate metrics at the end of a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metrics {
    /// The tick the snapshot was taken at.
    pub tick: usize,
    /// The number of vehicles on the grid.
    pub vehicles: usize,
    /// `100 - 100 * mean congestion ratio`: zero when traffic flows freely.
    /// Only vehicles that have taken at least one step are averaged, since a vehicle
    /// spawned this tick has no ratio yet.
    pub average_congestion: f64,
    /// The percentage of vehicles that are currently hasty.
    pub haste_percent: f64,
}

impl Metrics {
    /// Computes the metrics over a set of vehicles.
    pub fn collect<'a>(tick: usize, vehicles: impl IntoIterator<Item = &'a Vehicle>) -> Self {
        let mut count = 0;
        let mut moved = 0;
        let mut congestion = 0.0;
        let mut hasty = 0;
        for vehicle in vehicles {
            count += 1;
            if vehicle.steps_taken() > 0 {
                moved += 1;
                congestion += vehicle.congestion();
            }
            if vehicle.is_hasty() {
                hasty += 1;
            }
        }
        Self {
            tick,
            vehicles: count,
            average_congestion: if moved == 0 {
                0.0
            } else {
                100.0 - 100.0 * congestion / moved as f64
            },
            haste_percent: if count == 0 {
                0.0
            } else {
                100.0 * hasty as f64 / count as f64
            },
        }
    }
}
