use std::error::Error;
use std::time::Instant;

use traffic_grid::{Simulation, SimulationConfig};

const REPORT_EVERY: usize = 100;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let ticks: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 1000,
    };
    let mut sim = Simulation::new(SimulationConfig::default())?;

    println!("Simulating {} ticks...", ticks);
    let start = Instant::now();
    for _ in 0..ticks {
        sim.step()?;
        if sim.tick() % REPORT_EVERY == 0 {
            let metrics = sim.metrics();
            println!(
                "tick {:>6}: {:>3} vehicles, congestion {:>6.2}, haste {:>6.2}%",
                metrics.tick, metrics.vehicles, metrics.average_congestion, metrics.haste_percent
            );
        }
    }
    println!(
        "Avg. tick: {:?}",
        start.elapsed() / (ticks.max(1) as u32)
    );
    Ok(())
}
