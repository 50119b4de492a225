use crate::layout::ROAD_WIDTH;
use crate::{
    Cell, CityLayout, IntersectionController, IntersectionId, IntersectionSet, Metrics, Occupant,
    Progress, RoadNetwork, SignalDiscipline, SignalId, SignalSet, SignalTiming, SimError,
    SimResult, SpatialGrid, TrafficSignal, Vehicle, VehicleAttributes, VehicleId, VehicleSet,
};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// The parameters of a simulation run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// The shape of the city.
    pub layout: CityLayout,
    /// No vehicles are spawned while this many are on the grid.
    pub max_car_agents: usize,
    /// The most vehicles spawned in one tick.
    pub cars_per_second: usize,
    /// The attributes given to spawned vehicles.
    pub vehicle: VehicleAttributes,
    /// The standard deviation of spawned vehicles' tolerance around `vehicle.tolerance`.
    /// Zero gives every vehicle the same tolerance.
    pub tolerance_stddev: f64,
    /// The signal phase durations.
    pub timing: SignalTiming,
    /// How signals decide when to turn green.
    pub discipline: SignalDiscipline,
    /// The number of random picks allowed when choosing a free entry or a distant exit.
    pub spawn_retry_limit: usize,
    /// The seed of the simulation's random number generator.
    pub seed: u64,
}

/// A handle to anything that is stepped once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentId {
    Vehicle(VehicleId),
    Signal(SignalId),
    Intersection(IntersectionId),
}

/// A traffic simulation on a grid city.
pub struct Simulation {
    /// The parameters the simulation was created with.
    config: SimulationConfig,
    /// The occupancy of every cell.
    grid: SpatialGrid,
    /// The legal moves between road cells.
    network: RoadNetwork,
    /// The vehicles being simulated.
    vehicles: VehicleSet,
    /// The traffic signals.
    signals: SignalSet,
    /// The intersection controllers.
    intersections: IntersectionSet,
    /// Every agent, in the order they are stepped.
    agents: Vec<AgentId>,
    /// The cells where vehicles may be spawned.
    entry_points: Vec<Cell>,
    /// The cells vehicles may be routed to.
    exit_points: Vec<Cell>,
    /// The source of all randomness in the simulation.
    rng: SmallRng,
    /// The number of ticks simulated.
    tick: usize,
    /// The metrics recorded at the end of each tick.
    history: Vec<Metrics>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            layout: CityLayout::default(),
            max_car_agents: 100,
            cars_per_second: 5,
            vehicle: VehicleAttributes::default(),
            tolerance_stddev: 0.0,
            timing: SignalTiming::default(),
            discipline: SignalDiscipline::default(),
            spawn_retry_limit: 64,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Checks that the parameters describe a runnable simulation.
    pub fn validate(&self) -> SimResult<()> {
        self.layout.validate()?;
        if self.vehicle.max_velocity == 0 {
            return Err(SimError::Config("max_velocity must be at least 1".into()));
        }
        if self.timing.green_duration == 0 || self.timing.yellow_duration == 0 {
            return Err(SimError::Config(
                "green and yellow durations must be at least 1 tick".into(),
            ));
        }
        if self.spawn_retry_limit == 0 {
            return Err(SimError::Config("spawn_retry_limit must be at least 1".into()));
        }
        if !self.tolerance_stddev.is_finite() || self.tolerance_stddev < 0.0 {
            return Err(SimError::Config(format!(
                "invalid tolerance spread {}",
                self.tolerance_stddev
            )));
        }
        Ok(())
    }
}

impl Simulation {
    /// Creates a new simulation: lays out the city, checks that every entry point can
    /// reach every exit point, and puts a signal on each approach of each intersection.
    pub fn new(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        let layout = config.layout;

        let mut grid = layout.build_grid();
        let network = RoadNetwork::new(grid.road_cells());
        let entry_points = layout.entry_points();
        let exit_points = layout.exit_points();
        network.check_connected(&entry_points, &exit_points)?;

        let mut signals = SignalSet::with_key();
        let mut intersections = IntersectionSet::with_key();
        let mut agents = vec![];

        for site in layout.intersections() {
            let mut pairs = [[SignalId::default(); 2]; 2];
            for (pair, approaches) in pairs.iter_mut().zip(&site.approaches) {
                for (slot, approach) in pair.iter_mut().zip(approaches) {
                    let id = signals.insert_with_key(|id| {
                        TrafficSignal::new(id, approach, config.timing, config.discipline)
                    });
                    grid.place(Occupant::Signal(id), approach.stop)?;
                    agents.push(AgentId::Signal(id));
                    *slot = id;
                }
            }
            let key = intersections.insert_with_key(|key| {
                IntersectionController::new(
                    key,
                    site.position,
                    pairs,
                    config.timing,
                    config.discipline,
                )
            });
            for id in pairs.into_iter().flatten() {
                signals[id].set_intersection(key);
            }
            intersections[key].initialise(&mut signals);
            agents.push(AgentId::Intersection(key));
        }

        log::info!(
            "created {}x{} city: {} road cells, {} intersections, {:?} signals",
            grid.width(),
            grid.height(),
            network.node_count(),
            intersections.len(),
            config.discipline
        );

        Ok(Self {
            rng: SmallRng::seed_from_u64(config.seed),
            config,
            grid,
            network,
            vehicles: VehicleSet::with_key(),
            signals,
            intersections,
            agents,
            entry_points,
            exit_points,
            tick: 0,
            history: vec![],
        })
    }

    /// Advances the simulation by one tick.
    ///
    /// Every agent is stepped once in registration order, so a vehicle sees the peers
    /// ahead of it in the order at their new positions. Vehicles that run off their
    /// path are removed. New vehicles are then spawned up to the configured limits,
    /// and the tick's metrics are recorded.
    pub fn step(&mut self) -> SimResult<()> {
        let agents = self.agents.clone();
        for agent in agents {
            match agent {
                AgentId::Vehicle(id) => self.step_vehicle(id)?,
                AgentId::Signal(id) => {
                    if let Some(signal) = self.signals.get_mut(id) {
                        signal.step(&self.grid, &mut self.intersections);
                    }
                }
                AgentId::Intersection(id) => {
                    if let Some(controller) = self.intersections.get_mut(id) {
                        controller.step(&mut self.signals);
                    }
                }
            }
        }
        self.tick += 1;
        self.spawn_vehicles()?;
        self.history.push(self.metrics());
        Ok(())
    }

    /// Advances the simulation by `ticks` ticks.
    pub fn run(&mut self, ticks: usize) -> SimResult<()> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Gets the number of ticks simulated.
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// Gets the parameters the simulation was created with.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Gets the number of vehicles on the grid.
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// `100 - 100 * mean congestion ratio` over vehicles that have moved, or 0 if none have.
    pub fn average_congestion(&self) -> f64 {
        self.metrics().average_congestion
    }

    /// The percentage of vehicles that are hasty, or 0 if there are none.
    pub fn haste_percent(&self) -> f64 {
        self.metrics().haste_percent
    }

    /// Computes the metrics of the current state.
    pub fn metrics(&self) -> Metrics {
        Metrics::collect(self.tick, self.vehicles.values())
    }

    /// The metrics recorded at the end of every tick so far.
    pub fn history(&self) -> &[Metrics] {
        &self.history
    }

    /// Returns an iterator over all the vehicles in the simulation.
    pub fn iter_vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    /// Returns an iterator over all the traffic signals in the simulation.
    pub fn iter_signals(&self) -> impl Iterator<Item = &TrafficSignal> {
        self.signals.values()
    }

    /// Returns an iterator over all the intersections in the simulation.
    pub fn iter_intersections(&self) -> impl Iterator<Item = &IntersectionController> {
        self.intersections.values()
    }

    /// Gets a reference to the vehicle with the given ID, if it is still on the grid.
    pub fn get_vehicle(&self, vehicle_id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(vehicle_id)
    }

    /// Gets a reference to the signal with the given ID.
    pub fn get_signal(&self, signal_id: SignalId) -> Option<&TrafficSignal> {
        self.signals.get(signal_id)
    }

    /// The number of phase pairs of an intersection that are not red.
    pub fn active_pairs(&self, intersection_id: IntersectionId) -> usize {
        self.intersections
            .get(intersection_id)
            .map_or(0, |controller| controller.active_pairs(&self.signals))
    }

    /// Gets the occupancy grid.
    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    /// Gets the road network.
    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// The cells where vehicles may be spawned.
    pub fn entry_points(&self) -> &[Cell] {
        &self.entry_points
    }

    /// The cells vehicles may be routed to.
    pub fn exit_points(&self) -> &[Cell] {
        &self.exit_points
    }

    /// Every agent, in the order they are stepped.
    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    /// Adds a vehicle at the start of `path`. It is stepped from the next tick on.
    pub fn add_vehicle(
        &mut self,
        path: Vec<Cell>,
        attributes: &VehicleAttributes,
    ) -> SimResult<VehicleId> {
        let start = match path.first() {
            Some(start) if path.iter().all(|cell| self.grid.in_bounds(*cell)) => *start,
            _ => return Err(SimError::InvalidPath),
        };
        let vehicle_id = self
            .vehicles
            .insert_with_key(|id| Vehicle::new(id, path, attributes));
        if let Err(err) = self.grid.place(Occupant::Vehicle(vehicle_id), start) {
            self.vehicles.remove(vehicle_id);
            return Err(err.into());
        }
        self.agents.push(AgentId::Vehicle(vehicle_id));
        Ok(vehicle_id)
    }

    /// Removes a vehicle from the simulation.
    pub fn remove_vehicle(&mut self, vehicle_id: VehicleId) -> Option<Vehicle> {
        let vehicle = self.vehicles.remove(vehicle_id)?;
        self.grid.remove(Occupant::Vehicle(vehicle_id));
        self.agents.retain(|agent| *agent != AgentId::Vehicle(vehicle_id));
        Some(vehicle)
    }

    /// Spawns a vehicle at a random free entry point, routed along a random shortest
    /// path to a random exit point.
    pub fn spawn_vehicle(&mut self) -> SimResult<VehicleId> {
        let start = self.pick_entry()?;
        let end = self.pick_exit(start)?;
        let path = self.network.shortest_path(start, end, &mut self.rng)?;
        let attributes = VehicleAttributes {
            tolerance: self.sample_tolerance()?,
            ..self.config.vehicle
        };
        let len = path.len();
        let vehicle_id = self.add_vehicle(path, &attributes)?;
        log::debug!(
            "spawned vehicle {:?} at {} bound for {} ({} cells)",
            vehicle_id,
            start,
            end,
            len
        );
        Ok(vehicle_id)
    }

    /// Gets the debugging information for the current tick as JSON.
    #[cfg(feature = "debug")]
    pub fn debug(&self) -> serde_json::Value {
        crate::debug::frame(self)
    }

    fn step_vehicle(&mut self, vehicle_id: VehicleId) -> SimResult<()> {
        let Some(vehicle) = self.vehicles.get_mut(vehicle_id) else {
            return Ok(());
        };
        let progress = vehicle.step(&mut self.grid, &self.signals, &mut self.rng)?;
        if progress == Progress::Exited {
            if let Some(vehicle) = self.remove_vehicle(vehicle_id) {
                log::debug!(
                    "vehicle {:?} exited at {} after {} steps",
                    vehicle_id,
                    vehicle.position(),
                    vehicle.steps_taken()
                );
            }
        }
        Ok(())
    }

    /// Spawns up to `cars_per_second` vehicles without exceeding `max_car_agents`.
    fn spawn_vehicles(&mut self) -> SimResult<()> {
        let room = self
            .config
            .max_car_agents
            .saturating_sub(self.vehicles.len());
        for _ in 0..self.config.cars_per_second.min(room) {
            self.spawn_vehicle()?;
        }
        Ok(())
    }

    /// Picks a random unoccupied entry point.
    fn pick_entry(&mut self) -> SimResult<Cell> {
        let attempts = self.config.spawn_retry_limit;
        for _ in 0..attempts {
            match self.entry_points.choose(&mut self.rng) {
                Some(cell) if self.grid.is_empty(*cell) => return Ok(*cell),
                Some(_) => continue,
                None => break,
            }
        }
        log::warn!("no free entry point after {} attempts", attempts);
        Err(SimError::GridSaturated { attempts })
    }

    /// Picks a random exit point at least one road width away from `start`.
    fn pick_exit(&mut self, start: Cell) -> SimResult<Cell> {
        let attempts = self.config.spawn_retry_limit;
        for _ in 0..attempts {
            match self.exit_points.choose(&mut self.rng) {
                Some(cell) if start.distance(*cell) >= ROAD_WIDTH as f64 => return Ok(*cell),
                Some(_) => continue,
                None => break,
            }
        }
        log::warn!("no exit far enough from {} after {} attempts", start, attempts);
        Err(SimError::NoDistantExit { start, attempts })
    }

    /// The tolerance of a new vehicle.
    fn sample_tolerance(&mut self) -> SimResult<f64> {
        let tolerance = self.config.vehicle.tolerance;
        let stddev = self.config.tolerance_stddev;
        if stddev <= 0.0 {
            return Ok(tolerance);
        }
        let distr = Normal::new(tolerance, stddev).map_err(|err| SimError::Config(err.to_string()))?;
        Ok(distr.sample(&mut self.rng).clamp(0.0, 1.0))
    }
}
