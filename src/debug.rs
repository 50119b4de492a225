use crate::Simulation;
use serde_json::{json, Value};

/// A JSON snapshot of the current tick for visualisers.
pub fn frame(sim: &Simulation) -> Value {
    let vehicles: Vec<Value> = sim
        .iter_vehicles()
        .map(|vehicle| {
            let cell = vehicle.position();
            json!({
                "type": "vehicle",
                "pos": [cell.x, cell.y],
                "velocity": vehicle.velocity(),
                "haste": vehicle.is_hasty(),
            })
        })
        .collect();
    let signals: Vec<Value> = sim
        .iter_signals()
        .map(|signal| {
            let cell = signal.position();
            json!({
                "type": "signal",
                "pos": [cell.x, cell.y],
                "state": signal.state().as_str(),
            })
        })
        .collect();
    json!({
        "tick": sim.tick(),
        "vehicles": vehicles,
        "signals": signals,
    })
}
