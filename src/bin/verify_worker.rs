//! The `archived` queue consumer: deconstructs the stored header, decrypts
//! the archived body, and publishes to the completed queue (§4.2, §4.6).

use clap::Parser;
use ingest_core::envelope::UnimplementedEnvelopeCodec;
use ingest_db::DbGateway;
use ingest_dispatch::{consume, wrap, Broker};
use ingest_pipeline::{verify, wiring};

#[derive(Parser)]
#[command(about = "Consumes the archived queue and verifies decrypted objects")]
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

    let archive = wiring::build_storage(&config.archive);
    let key_provider = wiring::build_key_provider(&config.keys)?;
    let envelope_codec = UnimplementedEnvelopeCodec;

    let broker = Broker::connect(&config.broker.connection, &config.broker.exchange).await?;
    broker.declare_queue(&config.broker.archived_queue.queue).await?;

    tracing::info!(queue = %config.broker.archived_queue.queue, "verify worker starting");

    consume(
        &broker,
        &config.broker.archived_queue.queue,
        &config.broker.archived_queue.publish_routing_key,
        |payload| async {
            wrap(&db, || {
                verify::handle(&db, &*archive, &*key_provider, &envelope_codec, &envelope_codec, payload)
            })
            .await
        },
    )
    .await?;

    Ok(())
}
