use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum KeyError {
    #[snafu(display("failed to read key file {path}: {source}"))]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to unlock private key: {reason}"))]
    Unlock { reason: String },

    #[snafu(display("the {backend} key backend is not implemented"))]
    NotImplemented { backend: &'static str },
}
