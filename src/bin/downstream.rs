use poem::listener::TcpListener;

use faultguard::app::simulator_routes;
use faultguard::config::{Config, SimulatorSettings};
use faultguard::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::from_env();
    let settings = SimulatorSettings::default();
    let addr = format!("0.0.0.0:{}", config.simulator_port);

    tracing::info!(
        failure_rate = settings.failure_rate,
        slow_delay_ms = settings.slow_delay.as_millis() as u64,
        "Starting simulated downstream on {}",
        addr
    );

    let app = simulator_routes(settings, &format!("http://localhost:{}", config.simulator_port));
    poem::Server::new(TcpListener::bind(&addr)).run(app).await?;

    Ok(())
}
