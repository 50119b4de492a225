pub use error::{GridError, NetworkError, SimError, SimResult};
pub use grid::{Cell, Direction, Occupant, SpatialGrid};
pub use intersection::IntersectionController;
pub use layout::{Approach, CityLayout, IntersectionSite, ROAD_WIDTH};
pub use light::{LightState, SignalDiscipline, SignalTiming, TrafficSignal};
pub use metrics::Metrics;
pub use network::RoadNetwork;
pub use simulation::{AgentId, Simulation, SimulationConfig};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use vehicle::{Progress, Vehicle, VehicleAttributes};

#[cfg(feature = "debug")]
mod debug;
mod error;
mod grid;
mod intersection;
mod layout;
mod light;
mod metrics;
mod network;
mod simulation;
mod vehicle;

new_key_type! {
    /// Unique ID of a [Vehicle].
    pub struct VehicleId;
    /// Unique ID of a [TrafficSignal].
    pub struct SignalId;
    /// Unique ID of an [IntersectionController].
    pub struct IntersectionId;
}

type VehicleSet = SlotMap<VehicleId, Vehicle>;
type SignalSet = SlotMap<SignalId, TrafficSignal>;
type IntersectionSet = SlotMap<IntersectionId, IntersectionController>;
