//! The single dispatch primitive described in the external interfaces
//! section: `consume(handler, in_queue, out_routing_key)`.

use crate::broker::Broker;
use crate::error::{AcknowledgeSnafu, ConsumeSnafu, PayloadSnafu, PublishSnafu};
use crate::error::DispatchError;
use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicRejectOptions};
use lapin::types::FieldTable;
use lapin::BasicProperties;
use serde_json::Value;
use snafu::ResultExt;
use std::future::Future;

/// Handler contract: given the parsed payload, return `(reply, error_flag)`.
/// `reply` is published only when `error_flag` is false and it is `Some`.
pub async fn consume<F, Fut>(
    broker: &Broker,
    in_queue: &str,
    out_routing_key: &str,
    handler: F,
) -> Result<(), DispatchError>
where
    F: Fn(Value) -> Fut,
    Fut: Future<Output = (Option<Value>, bool)>,
{
    let mut consumer = broker
        .channel
        .basic_consume(
            in_queue,
            "ingest-pipeline",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context(ConsumeSnafu)?;

    tracing::info!(queue = in_queue, "consuming");

    while let Some(delivery) = consumer.next().await {
        let delivery = delivery.context(ConsumeSnafu)?;
        let payload: Value = match serde_json::from_slice(&delivery.data) {
            Ok(v) => v,
            Err(source) => {
                tracing::error!(error = %source, "malformed payload, rejecting without requeue");
                delivery
                    .reject(BasicRejectOptions { requeue: false })
                    .await
                    .context(AcknowledgeSnafu)?;
                continue;
            }
        };

        let (reply, error_flag) = handler(payload).await;

        if error_flag {
            delivery
                .reject(BasicRejectOptions { requeue: false })
                .await
                .context(AcknowledgeSnafu)?;
            continue;
        }

        if !out_routing_key.is_empty() {
            if let Some(reply) = reply {
                let body = serde_json::to_vec(&reply).context(PayloadSnafu)?;
                broker
                    .channel
                    .basic_publish(
                        &broker.exchange,
                        out_routing_key,
                        BasicPublishOptions::default(),
                        &body,
                        BasicProperties::default(),
                    )
                    .await
                    .context(PublishSnafu {
                        routing_key: out_routing_key.to_string(),
                    })?;
            }
        }

        delivery
            .ack(BasicAckOptions::default())
            .await
            .context(AcknowledgeSnafu)?;
    }

    Ok(())
}
