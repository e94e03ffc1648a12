use anyhow::Context;
use poem::listener::TcpListener;

use faultguard::app::Gateway;
use faultguard::config::{Config, ResilienceSettings};
use faultguard::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let config = Config::from_env();
    let settings = ResilienceSettings::default();
    let gateway = Gateway::new(&config, settings).context("Failed to create downstream client")?;

    // Expired rate limit windows are dropped once per window
    let limiter = gateway.limiter();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.config().window);
        loop {
            interval.tick().await;
            limiter.purge_expired();
        }
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let app = gateway.routes(&format!("http://localhost:{}", config.port));

    tracing::info!(
        downstream = %config.downstream_url,
        "Starting faultguard gateway on {}",
        addr
    );

    poem::Server::new(TcpListener::bind(&addr)).run(app).await?;

    Ok(())
}
