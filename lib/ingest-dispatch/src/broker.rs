//! Broker connection bootstrap: one connection and one channel per worker
//! process, wired to the local exchange named in configuration. No AMQP
//! connection module survives in the retained original source to ground
//! this on; it follows §4.3's dispatch contract directly.

use crate::error::{ChannelSnafu, ConnectSnafu, DeclareSnafu, DispatchError};
use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use snafu::ResultExt;

pub struct Broker {
    pub channel: Channel,
    pub exchange: String,
}

impl Broker {
    pub async fn connect(connection_str: &str, exchange: &str) -> Result<Self, DispatchError> {
        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);
        let connection = Connection::connect(connection_str, options)
            .await
            .context(ConnectSnafu)?;
        let channel = connection.create_channel().await.context(ChannelSnafu)?;
        tracing::info!(exchange, "connected to broker");
        Ok(Self {
            channel,
            exchange: exchange.to_string(),
        })
    }

    /// Declares `queue` durable, matching the original deployment's
    /// hand-provisioned topology — idempotent if already declared.
    pub async fn declare_queue(&self, queue: &str) -> Result<(), DispatchError> {
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context(DeclareSnafu { queue: queue.to_string() })?;
        Ok(())
    }
}
