use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum DispatchError {
    #[snafu(display("failed to connect to the broker: {source}"))]
    Connect { source: lapin::Error },

    #[snafu(display("failed to open a channel: {source}"))]
    Channel { source: lapin::Error },

    #[snafu(display("failed to declare queue {queue}: {source}"))]
    Declare { queue: String, source: lapin::Error },

    #[snafu(display("consumer error: {source}"))]
    Consume { source: lapin::Error },

    #[snafu(display("failed to publish to routing key {routing_key}: {source}"))]
    Publish {
        routing_key: String,
        source: lapin::Error,
    },

    #[snafu(display("failed to ack/reject delivery: {source}"))]
    Acknowledge { source: lapin::Error },

    #[snafu(display("message payload was not a JSON object: {source}"))]
    Payload { source: serde_json::Error },
}
