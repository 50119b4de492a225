use self::following::next_velocity;
use crate::{Cell, GridError, Occupant, SignalSet, SpatialGrid, VehicleId};
use rand::Rng;

mod following;

/// The fraction of the baseline top speed a hasty vehicle gains.
const HASTE_BOOST: f64 = 0.25;

/// The number of steps a vehicle must take before it can become hasty.
const HASTE_WARMUP_STEPS: usize = 10;

/// A simulated vehicle following a fixed path through the grid.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The vehicle's ID.
    id: VehicleId,
    /// The cells the vehicle will traverse, from its entry cell to its exit cell.
    path: Vec<Cell>,
    /// The index of the vehicle's current cell in `path`.
    path_index: usize,
    /// The velocity in cells per tick.
    velocity: usize,
    /// The current top speed, including any haste boost.
    max_velocity: usize,
    /// The configured top speed.
    base_max_velocity: usize,
    /// The congestion ratio below which the vehicle may become hasty.
    tolerance: f64,
    /// The sum of the vehicle's velocity over all steps.
    velocity_sum: usize,
    /// The sum of the vehicle's top speed over all steps.
    max_velocity_sum: usize,
    /// The number of steps taken.
    steps_taken: usize,
    /// `velocity_sum / max_velocity_sum`: the fraction of free-flow speed achieved so far.
    congestion: f64,
    /// Whether the vehicle's top speed is currently boosted.
    haste: bool,
}

/// The attributes of a simulated vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleAttributes {
    /// The top speed in cells per tick.
    pub max_velocity: usize,
    /// The congestion ratio below which the vehicle may become hasty.
    /// The check is strict, so `0.0` disables haste; the default `1.0` still lets any
    /// vehicle that has fallen short of free-flow speed become hasty.
    pub tolerance: f64,
    /// The velocity the vehicle enters the grid with.
    pub initial_velocity: usize,
}

/// The outcome of a vehicle's step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    /// The vehicle did not move.
    Stopped,
    /// The vehicle moved along its path.
    Moved,
    /// The vehicle ran off the end of its path and must be removed.
    Exited,
}

impl Default for VehicleAttributes {
    fn default() -> Self {
        Self {
            max_velocity: 5,
            tolerance: 1.0,
            initial_velocity: 1,
        }
    }
}

impl Vehicle {
    /// Creates a new vehicle at the start of `path`, which must not be empty.
    pub(crate) fn new(id: VehicleId, path: Vec<Cell>, attributes: &VehicleAttributes) -> Self {
        debug_assert!(!path.is_empty(), "vehicle path must not be empty");
        Self {
            id,
            path,
            path_index: 0,
            velocity: attributes.initial_velocity.min(attributes.max_velocity),
            max_velocity: attributes.max_velocity,
            base_max_velocity: attributes.max_velocity,
            tolerance: attributes.tolerance,
            velocity_sum: 0,
            max_velocity_sum: 0,
            steps_taken: 0,
            congestion: 0.0,
            haste: false,
        }
    }

    /// Gets the vehicle's ID.
    pub fn id(&self) -> VehicleId {
        self.id
    }

    /// The vehicle's full path, including cells already travelled.
    pub fn path(&self) -> &[Cell] {
        &self.path
    }

    /// The index of the vehicle's current cell in its path.
    pub fn path_index(&self) -> usize {
        self.path_index
    }

    /// The vehicle's current cell.
    pub fn position(&self) -> Cell {
        self.path[self.path_index]
    }

    /// The vehicle's velocity in cells per tick.
    pub fn velocity(&self) -> usize {
        self.velocity
    }

    /// The current top speed, including any haste boost.
    pub fn max_velocity(&self) -> usize {
        self.max_velocity
    }

    /// The configured top speed.
    pub fn base_max_velocity(&self) -> usize {
        self.base_max_velocity
    }

    /// The congestion ratio below which the vehicle may become hasty.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The fraction of free-flow speed achieved so far, in [0, 1].
    pub fn congestion(&self) -> f64 {
        self.congestion
    }

    /// Whether the vehicle's top speed is currently boosted.
    pub fn is_hasty(&self) -> bool {
        self.haste
    }

    /// The number of steps taken.
    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    #[cfg(test)]
    pub(crate) fn set_stats_for_test(&mut self, congestion: f64, steps_taken: usize, haste: bool) {
        self.congestion = congestion;
        self.steps_taken = steps_taken;
        self.haste = haste;
    }

    /// Advances the vehicle by one tick.
    ///
    /// The vehicle records its speed, reconsiders its haste, then stops if it stands on a
    /// signal that is not green. Otherwise it applies the car-following rule against the
    /// nearest obstacle on its path and moves. A vehicle that would run off the end of
    /// its path reports [Progress::Exited] and is left for the caller to remove.
    pub(crate) fn step<R: Rng + ?Sized>(
        &mut self,
        grid: &mut SpatialGrid,
        signals: &SignalSet,
        rng: &mut R,
    ) -> Result<Progress, GridError> {
        self.record_speed();
        self.update_haste(rng);

        if self.held_by_signal(grid, signals) {
            self.velocity = 0;
            return Ok(Progress::Stopped);
        }

        let gap = self.obstacle_gap(grid, signals);
        self.velocity = next_velocity(self.velocity, self.max_velocity, gap);
        self.advance(grid)
    }

    /// Accumulates the congestion statistics.
    fn record_speed(&mut self) {
        self.velocity_sum += self.velocity;
        self.max_velocity_sum += self.max_velocity;
        self.steps_taken += 1;
        if self.max_velocity_sum > 0 {
            self.congestion = self.velocity_sum as f64 / self.max_velocity_sum as f64;
        }
    }

    /// The mean velocity so far as a fraction of the current top speed.
    fn haste_probability(&self) -> f64 {
        if self.steps_taken == 0 || self.max_velocity == 0 {
            return 0.0;
        }
        let mean = self.velocity_sum as f64 / self.steps_taken as f64;
        (mean / self.max_velocity as f64).clamp(0.0, 1.0)
    }

    /// Draws whether the vehicle is hasty this tick, boosting or restoring its top speed.
    fn update_haste<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let eligible = self.steps_taken > HASTE_WARMUP_STEPS && self.congestion < self.tolerance;
        let hasty = eligible && rng.gen::<f64>() < self.haste_probability();

        if hasty && !self.haste {
            let boost = (self.base_max_velocity as f64 * HASTE_BOOST).ceil() as usize;
            self.haste = true;
            self.max_velocity = self.base_max_velocity + boost;
        } else if !hasty && self.haste {
            self.haste = false;
            self.max_velocity = self.base_max_velocity;
            self.velocity = self.velocity.min(self.max_velocity);
        }
    }

    /// Whether the vehicle stands on a signal that is not green.
    fn held_by_signal(&self, grid: &SpatialGrid, signals: &SignalSet) -> bool {
        grid.signals_at(self.position())
            .any(|id| signals.get(id).map_or(false, |s| !s.is_green()))
    }

    /// The number of free cells before the nearest obstacle in the lookahead window.
    ///
    /// Another vehicle blocks its own cell. A signal that is not green blocks the cells
    /// beyond it, so the vehicle may pull up onto the stop cell unless another vehicle
    /// is already waiting there.
    fn obstacle_gap(&self, grid: &SpatialGrid, signals: &SignalSet) -> Option<usize> {
        let start = self.path_index + 1;
        let end = usize::min(start + self.max_velocity, self.path.len());
        let window = self.path.get(start..end).unwrap_or_default();

        for (idx, occupants) in grid.window(window) {
            let vehicle = occupants
                .iter()
                .any(|o| matches!(o, Occupant::Vehicle(id) if *id != self.id));
            if vehicle {
                return Some(idx);
            }
            let red = occupants.iter().any(|o| match o {
                Occupant::Signal(id) => signals.get(*id).map_or(false, |s| !s.is_green()),
                _ => false,
            });
            if red {
                return Some(idx + 1);
            }
        }
        None
    }

    /// Moves the vehicle `velocity` cells along its path.
    fn advance(&mut self, grid: &mut SpatialGrid) -> Result<Progress, GridError> {
        let target = self.path_index + self.velocity;
        if target >= self.path.len() {
            return Ok(Progress::Exited);
        }
        if self.velocity == 0 {
            return Ok(Progress::Stopped);
        }
        grid.move_to(Occupant::Vehicle(self.id), self.path[target])?;
        self.path_index = target;
        Ok(Progress::Moved)
    }
}
