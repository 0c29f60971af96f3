use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod report;
mod simulation;

use shared_config::AppConfig;
use simulation::Simulation;

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!("Starting OPD simulation with seed {:?}", config.simulation_seed);

    println!("\n=== OPD TOKEN ALLOCATION ENGINE - FULL DAY SIMULATION ===");

    let mut simulation = Simulation::new(&config);
    simulation.run()?;

    report::print_schedule(simulation.engine());
    report::print_statistics(simulation.engine(), simulation.stats());

    println!("\n=== SIMULATION COMPLETED ===\n");
    Ok(())
}
