//! The `stableIDs` queue consumer: assigns the external accession id once
//! verification has completed (§4.2, §4.7).

use clap::Parser;
use ingest_db::DbGateway;
use ingest_dispatch::{consume, wrap, Broker};
use ingest_pipeline::{finalize, wiring};

#[derive(Parser)]
#[command(about = "Consumes the stableIDs queue and assigns accession ids")]
struct Args {
    #[arg(long, env = "INGEST_CONFIG", default_value = "/etc/ega/conf.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = wiring::load_config(&args.config)?;
    ingest_core::logging::init(&config.log_filter);

    let db = DbGateway::connect(
        &config.database.connection,
        config.database.try_attempts,
        config.database.try_interval_secs,
    )
    .await?;

    let broker = Broker::connect(&config.broker.connection, &config.broker.exchange).await?;
    broker.declare_queue(&config.broker.stable_ids_queue.queue).await?;

    tracing::info!(queue = %config.broker.stable_ids_queue.queue, "finalize worker starting");

    consume(
        &broker,
        &config.broker.stable_ids_queue.queue,
        &config.broker.stable_ids_queue.publish_routing_key,
        |payload| async { wrap(&db, || finalize::handle(&db, payload)).await },
    )
    .await?;

    Ok(())
}
