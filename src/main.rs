use anyhow::Result;
use tracing::{info, warn};
use well_flow_allocator::{config, telemetry, transport};
use config::Config;
use telemetry::init_tracing;
use transport::{Session, SnapshotClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;
    let allocator = cfg.build_allocator()?;

    info!(
        url = %cfg.client.url,
        pit_capacity = cfg.pit.capacity,
        strategy = allocator.strategy_name(),
        chunk_divisor = cfg.engine.chunk_divisor,
        threshold = %cfg.engine.threshold,
        "starting well flow allocator"
    );

    let mut client = SnapshotClient::new(cfg.client.clone(), Session::new(allocator));

    tokio::select! {
        res = client.run() => res?,
        _ = telemetry::shutdown_signal() => {}
    }

    let session = client.session();
    if session.snapshots_rejected() > 0 {
        warn!(rejected = session.snapshots_rejected(), "some snapshots got no decision");
    }
    info!(
        snapshots = session.snapshots_handled(),
        results = session.results().len(),
        pit_volume = session.pit().volume(),
        "shutdown complete"
    );
    Ok(())
}
