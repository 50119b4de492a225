use crate::layout::Approach;
use crate::{Cell, IntersectionId, IntersectionSet, SignalId, SpatialGrid};

/// The default duration of the yellow phase in ticks.
pub const DEFAULT_YELLOW_TICKS: usize = 2;

/// The state of a traffic signal. States cycle Green → Yellow → Red → Green.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LightState {
    Green,
    Yellow,
    #[default]
    Red,
}

/// How the signals of an intersection decide when to turn green.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignalDiscipline {
    /// Red signals with a waiting vehicle queue for green, granted one at a time.
    #[default]
    DemandQueued,
    /// The two phase pairs alternate on a fixed round-robin schedule.
    FixedCycle,
}

/// Phase durations of a signal, in ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SignalTiming {
    /// Ticks a signal stays green once granted.
    pub green_duration: usize,
    /// Ticks a signal stays yellow before turning red.
    pub yellow_duration: usize,
}

/// A single three-state traffic signal standing on the stop cell of one approach.
#[derive(Clone, Debug)]
pub struct TrafficSignal {
    /// The signal's ID.
    id: SignalId,
    /// The intersection controlling this signal.
    intersection: IntersectionId,
    /// The stop cell the signal stands on.
    position: Cell,
    /// The lane cell before the stop cell.
    upstream: Cell,
    /// The current state.
    state: LightState,
    /// Ticks left in the current state, when it is timed.
    timer: usize,
    /// The phase durations.
    timing: SignalTiming,
    /// Whether the signal requests green or is driven by its controller's schedule.
    discipline: SignalDiscipline,
}

impl Default for SignalTiming {
    fn default() -> Self {
        Self {
            green_duration: 5,
            yellow_duration: DEFAULT_YELLOW_TICKS,
        }
    }
}

impl LightState {
    /// The state that follows this one.
    pub fn next(self) -> Self {
        match self {
            LightState::Green => LightState::Yellow,
            LightState::Yellow => LightState::Red,
            LightState::Red => LightState::Green,
        }
    }

    /// A lowercase name for the state.
    pub fn as_str(self) -> &'static str {
        match self {
            LightState::Green => "green",
            LightState::Yellow => "yellow",
            LightState::Red => "red",
        }
    }
}

impl TrafficSignal {
    /// Creates a red signal on an approach.
    pub(crate) fn new(
        id: SignalId,
        approach: &Approach,
        timing: SignalTiming,
        discipline: SignalDiscipline,
    ) -> Self {
        Self {
            id,
            intersection: IntersectionId::default(),
            position: approach.stop,
            upstream: approach.upstream,
            state: LightState::Red,
            timer: 0,
            timing,
            discipline,
        }
    }

    /// Gets the signal's ID.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// The ID of the controlling intersection.
    pub fn intersection(&self) -> IntersectionId {
        self.intersection
    }

    /// The stop cell the signal stands on.
    pub fn position(&self) -> Cell {
        self.position
    }

    /// The lane cell before the stop cell.
    pub fn upstream(&self) -> Cell {
        self.upstream
    }

    /// The current state.
    pub fn state(&self) -> LightState {
        self.state
    }

    /// Ticks left in the current state.
    pub fn timer(&self) -> usize {
        self.timer
    }

    /// Whether vehicles may pass.
    pub fn is_green(&self) -> bool {
        self.state == LightState::Green
    }

    pub(crate) fn set_intersection(&mut self, intersection: IntersectionId) {
        self.intersection = intersection;
    }

    /// Advances the signal by one tick.
    ///
    /// Under [SignalDiscipline::DemandQueued] green and yellow count down on their own,
    /// and a red signal with a vehicle on or just before its stop cell asks its
    /// controller for green. Under [SignalDiscipline::FixedCycle] the controller sets
    /// the state and this does nothing.
    pub(crate) fn step(&mut self, grid: &SpatialGrid, intersections: &mut IntersectionSet) {
        if self.discipline == SignalDiscipline::FixedCycle {
            return;
        }
        match self.state {
            LightState::Green | LightState::Yellow => self.count_down(),
            LightState::Red => {
                if self.has_demand(grid) {
                    if let Some(controller) = intersections.get_mut(self.intersection) {
                        controller.request(self.id);
                    }
                }
            }
        }
    }

    /// Turns the signal green for the configured green duration.
    pub(crate) fn grant(&mut self) {
        log::trace!("signal {:?} at {} granted green", self.id, self.position);
        self.state = LightState::Green;
        self.timer = self.timing.green_duration;
    }

    /// Sets the state directly, as part of a controller-driven schedule.
    pub(crate) fn set_state(&mut self, state: LightState, timer: usize) {
        if state != self.state {
            log::trace!("signal {:?} at {} -> {}", self.id, self.position, state.as_str());
        }
        self.state = state;
        self.timer = timer;
    }

    /// Whether a vehicle is waiting on or just before the stop cell.
    fn has_demand(&self, grid: &SpatialGrid) -> bool {
        grid.has_vehicle(self.position) || grid.has_vehicle(self.upstream)
    }

    fn count_down(&mut self) {
        self.timer = self.timer.saturating_sub(1);
        if self.timer == 0 {
            let next = self.state.next();
            let timer = match next {
                LightState::Yellow => self.timing.yellow_duration,
                _ => 0,
            };
            self.set_state(next, timer);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{IntersectionController, Occupant, VehicleId};
    use slotmap::SlotMap;

    struct Fixture {
        grid: SpatialGrid,
        signal: TrafficSignal,
        intersections: IntersectionSet,
        intersection: IntersectionId,
    }

    fn fixture() -> Fixture {
        let mut signals = SlotMap::<SignalId, ()>::with_key();
        let ids: Vec<SignalId> = (0..4).map(|_| signals.insert(())).collect();
        let approach = Approach {
            stop: Cell::new(5, 0),
            upstream: Cell::new(4, 0),
        };
        let mut signal = TrafficSignal::new(
            ids[0],
            &approach,
            SignalTiming::default(),
            SignalDiscipline::DemandQueued,
        );
        let mut intersections = IntersectionSet::with_key();
        let intersection = intersections.insert_with_key(|key| {
            IntersectionController::new(
                key,
                Cell::new(6, 0),
                [[ids[0], ids[1]], [ids[2], ids[3]]],
                SignalTiming::default(),
                SignalDiscipline::DemandQueued,
            )
        });
        signal.set_intersection(intersection);
        Fixture {
            grid: SpatialGrid::new(10, 1),
            signal,
            intersections,
            intersection,
        }
    }

    fn vehicle() -> Occupant {
        let mut ids = SlotMap::<VehicleId, ()>::with_key();
        Occupant::Vehicle(ids.insert(()))
    }

    #[test]
    fn states_cycle_in_order() {
        assert_eq!(LightState::Green.next(), LightState::Yellow);
        assert_eq!(LightState::Yellow.next(), LightState::Red);
        assert_eq!(LightState::Red.next(), LightState::Green);
    }

    #[test]
    fn red_without_demand_stays_quiet() {
        let mut f = fixture();
        f.signal.step(&f.grid, &mut f.intersections);
        assert_eq!(f.signal.state(), LightState::Red);
        assert_eq!(f.intersections[f.intersection].pending().count(), 0);
    }

    #[test]
    fn waiting_vehicle_requests_green_once() {
        let mut f = fixture();
        f.grid.place(vehicle(), Cell::new(4, 0)).unwrap();
        f.signal.step(&f.grid, &mut f.intersections);
        f.signal.step(&f.grid, &mut f.intersections);
        let pending: Vec<_> = f.intersections[f.intersection].pending().collect();
        assert_eq!(pending, vec![f.signal.id()]);
    }

    #[test]
    fn granted_signal_counts_down_to_red() {
        let mut f = fixture();
        f.signal.grant();
        let mut states = vec![];
        for _ in 0..8 {
            states.push(f.signal.state());
            f.signal.step(&f.grid, &mut f.intersections);
        }
        use LightState::*;
        assert_eq!(
            states,
            vec![Green, Green, Green, Green, Green, Yellow, Yellow, Red]
        );
    }

    #[test]
    fn fixed_cycle_signals_ignore_demand() {
        let mut f = fixture();
        f.signal.discipline = SignalDiscipline::FixedCycle;
        f.grid.place(vehicle(), Cell::new(5, 0)).unwrap();
        f.signal.step(&f.grid, &mut f.intersections);
        assert_eq!(f.intersections[f.intersection].pending().count(), 0);
    }
}
