use crate::{
    Cell, IntersectionId, LightState, SignalDiscipline, SignalId, SignalSet, SignalTiming,
};
use std::collections::VecDeque;

/// A set of four coordinated traffic signals, grouped into two opposing phase pairs.
///
/// At most one pair is ever non-red. Under [SignalDiscipline::FixedCycle] the pairs take
/// turns: green for `green_duration` ticks, yellow for `yellow_duration` ticks, then red
/// while the opposing pair runs the same sequence. Under [SignalDiscipline::DemandQueued]
/// signals request green and the controller grants the oldest request whenever all four
/// signals are red.
#[derive(Clone, Debug)]
pub struct IntersectionController {
    /// The intersection's ID.
    id: IntersectionId,
    /// The lower-left cell of the intersection block.
    position: Cell,
    /// The signals of each phase pair.
    pairs: [[SignalId; 2]; 2],
    /// The phase durations.
    timing: SignalTiming,
    /// How the signals decide when to turn green.
    discipline: SignalDiscipline,
    /// Ticks elapsed in the fixed cycle, or green grants issued on demand.
    phase_counter: usize,
    /// Signals waiting for green, oldest first.
    pending: VecDeque<SignalId>,
}

impl IntersectionController {
    /// Creates a new intersection controller.
    pub(crate) fn new(
        id: IntersectionId,
        position: Cell,
        pairs: [[SignalId; 2]; 2],
        timing: SignalTiming,
        discipline: SignalDiscipline,
    ) -> Self {
        Self {
            id,
            position,
            pairs,
            timing,
            discipline,
            phase_counter: 0,
            pending: VecDeque::new(),
        }
    }

    /// Gets the intersection's ID.
    pub fn id(&self) -> IntersectionId {
        self.id
    }

    /// The lower-left cell of the intersection block.
    pub fn position(&self) -> Cell {
        self.position
    }

    /// The signals of each phase pair.
    pub fn pairs(&self) -> [[SignalId; 2]; 2] {
        self.pairs
    }

    /// Ticks elapsed in the fixed cycle, or green grants issued on demand.
    pub fn phase_counter(&self) -> usize {
        self.phase_counter
    }

    /// The signals waiting for green, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = SignalId> + '_ {
        self.pending.iter().copied()
    }

    /// Queues a signal for green. Returns `false` if it was already waiting.
    pub(crate) fn request(&mut self, signal: SignalId) -> bool {
        if self.pending.contains(&signal) {
            false
        } else {
            self.pending.push_back(signal);
            true
        }
    }

    /// Puts the signals into their starting states.
    pub(crate) fn initialise(&mut self, signals: &mut SignalSet) {
        self.phase_counter = 0;
        match self.discipline {
            SignalDiscipline::FixedCycle => self.apply_phase(signals),
            SignalDiscipline::DemandQueued => {
                for id in self.signal_ids() {
                    signals[id].set_state(LightState::Red, 0);
                }
            }
        }
    }

    /// Advances the controller by one tick.
    pub(crate) fn step(&mut self, signals: &mut SignalSet) {
        match self.discipline {
            SignalDiscipline::FixedCycle => {
                self.phase_counter += 1;
                self.apply_phase(signals);
            }
            SignalDiscipline::DemandQueued => {
                let all_red = self
                    .signal_ids()
                    .all(|id| signals[id].state() == LightState::Red);
                if all_red {
                    if let Some(id) = self.pending.pop_front() {
                        signals[id].grant();
                        self.phase_counter += 1;
                    }
                }
            }
        }
        let active = self.active_pairs(signals);
        assert!(
            active <= 1,
            "intersection at {} has {} phase pairs out of red",
            self.position,
            active
        );
    }

    /// The number of phase pairs with at least one signal that is not red.
    pub fn active_pairs(&self, signals: &SignalSet) -> usize {
        self.pairs
            .iter()
            .filter(|pair| {
                pair.iter()
                    .any(|id| signals.get(*id).map_or(false, |s| s.state() != LightState::Red))
            })
            .count()
    }

    fn signal_ids(&self) -> impl Iterator<Item = SignalId> {
        self.pairs.into_iter().flatten()
    }

    /// Sets every signal from the position of `phase_counter` in the fixed cycle.
    fn apply_phase(&self, signals: &mut SignalSet) {
        let green = self.timing.green_duration;
        let yellow = self.timing.yellow_duration;
        let half = green + yellow;
        let t = self.phase_counter % (2 * half).max(1);
        let (active, offset) = if t < half { (0, t) } else { (1, t - half) };
        let (state, remaining) = if offset < green {
            (LightState::Green, green - offset)
        } else {
            (LightState::Yellow, half - offset)
        };
        for (idx, pair) in self.pairs.iter().enumerate() {
            for id in pair {
                if idx == active {
                    signals[*id].set_state(state, remaining);
                } else {
                    signals[*id].set_state(LightState::Red, 0);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::Approach;
    use crate::{IntersectionSet, TrafficSignal};

    fn setup(timing: SignalTiming, discipline: SignalDiscipline) -> (SignalSet, IntersectionSet, IntersectionId) {
        let mut signals = SignalSet::with_key();
        let ids: Vec<SignalId> = (0..4)
            .map(|i| {
                let approach = Approach {
                    stop: Cell::new(i, 0),
                    upstream: Cell::new(i, 1),
                };
                signals.insert_with_key(|id| TrafficSignal::new(id, &approach, timing, discipline))
            })
            .collect();
        let mut intersections = IntersectionSet::with_key();
        let key = intersections.insert_with_key(|key| {
            IntersectionController::new(
                key,
                Cell::new(10, 10),
                [[ids[0], ids[1]], [ids[2], ids[3]]],
                timing,
                discipline,
            )
        });
        for id in &ids {
            signals[*id].set_intersection(key);
        }
        intersections[key].initialise(&mut signals);
        (signals, intersections, key)
    }

    fn pair_state(signals: &SignalSet, pair: [SignalId; 2]) -> LightState {
        let [a, b] = pair.map(|id| signals[id].state());
        assert_eq!(a, b, "phase pair out of step");
        a
    }

    #[test]
    fn fixed_cycle_alternates_pairs() {
        let timing = SignalTiming {
            green_duration: 5,
            yellow_duration: 2,
        };
        let (mut signals, mut intersections, key) = setup(timing, SignalDiscipline::FixedCycle);
        let [a, b] = intersections[key].pairs();

        use LightState::*;
        for tick in 0..28 {
            let expected_a = match tick % 14 {
                0..=4 => Green,
                5..=6 => Yellow,
                _ => Red,
            };
            let expected_b = match tick % 14 {
                7..=11 => Green,
                12..=13 => Yellow,
                _ => Red,
            };
            assert_eq!(pair_state(&signals, a), expected_a, "pair A at tick {}", tick);
            assert_eq!(pair_state(&signals, b), expected_b, "pair B at tick {}", tick);
            assert_eq!(intersections[key].active_pairs(&signals), 1);
            intersections[key].step(&mut signals);
        }
    }

    #[test]
    fn fixed_cycle_timers_count_remaining_ticks() {
        let (mut signals, mut intersections, key) =
            setup(SignalTiming::default(), SignalDiscipline::FixedCycle);
        let a = intersections[key].pairs()[0][0];
        assert_eq!(signals[a].timer(), 5);
        intersections[key].step(&mut signals);
        assert_eq!(signals[a].timer(), 4);
    }

    #[test]
    fn demand_grants_oldest_request_when_all_red() {
        let (mut signals, mut intersections, key) =
            setup(SignalTiming::default(), SignalDiscipline::DemandQueued);
        let [[a, _], [c, _]] = intersections[key].pairs();
        assert!(intersections[key].request(c));
        assert!(intersections[key].request(a));
        assert!(!intersections[key].request(c));

        intersections[key].step(&mut signals);
        assert_eq!(signals[c].state(), LightState::Green);
        assert_eq!(signals[a].state(), LightState::Red);
        assert_eq!(intersections[key].pending().collect::<Vec<_>>(), vec![a]);
        assert_eq!(intersections[key].phase_counter(), 1);
    }

    #[test]
    fn demand_waits_while_a_signal_is_out_of_red() {
        let (mut signals, mut intersections, key) =
            setup(SignalTiming::default(), SignalDiscipline::DemandQueued);
        let [[a, _], [c, _]] = intersections[key].pairs();
        intersections[key].request(c);
        intersections[key].request(a);
        intersections[key].step(&mut signals);

        // Green for five ticks, yellow for two, then `a` may go
        let grid = crate::SpatialGrid::new(1, 1);
        let mut granted_at = None;
        for tick in 1..=10 {
            for id in [a, c] {
                signals[id].step(&grid, &mut intersections);
            }
            intersections[key].step(&mut signals);
            assert!(intersections[key].active_pairs(&signals) <= 1);
            if granted_at.is_none() && signals[a].is_green() {
                granted_at = Some(tick);
            }
        }
        assert_eq!(granted_at, Some(7));
    }
}
