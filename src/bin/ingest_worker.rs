//! The `files` queue consumer: reads inbox objects, archives them, and
//! publishes to the archived queue (§4.2, §4.5).

use clap::Parser;
use ingest_core::envelope::UnimplementedEnvelopeCodec;
use ingest_db::DbGateway;
use ingest_dispatch::{consume, wrap, Broker};
use ingest_pipeline::{ingest, wiring};

#[derive(Parser)]
#[command(about = "Consumes the files queue and archives submitted objects")]
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

    let inbox = wiring::build_storage(&config.inbox);
    let archive = wiring::build_storage(&config.archive);
    let header_splitter = UnimplementedEnvelopeCodec;

    let broker = Broker::connect(&config.broker.connection, &config.broker.exchange).await?;
    broker.declare_queue(&config.broker.files_queue.queue).await?;

    tracing::info!(queue = %config.broker.files_queue.queue, "ingest worker starting");

    consume(
        &broker,
        &config.broker.files_queue.queue,
        &config.broker.files_queue.publish_routing_key,
        |payload| async {
            wrap(&db, || async {
                let (message, result) = ingest::handle(&db, &*inbox, &*archive, &header_splitter, payload).await;
                let reply = result.map(|()| Some(message.clone().into_value()));
                (message, reply)
            })
            .await
        },
    )
    .await?;

    Ok(())
}
