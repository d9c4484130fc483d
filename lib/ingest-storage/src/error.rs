use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum StorageError {
    #[snafu(display("object not found: {path}"))]
    NotFound { path: String },

    #[snafu(display("seek before start of object"))]
    SeekBeforeStart,

    #[snafu(display("I/O error on {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("object store error on {path}: {message}"))]
    Backend { path: String, message: String },

    #[snafu(display("exceeded {attempts} retry attempts fetching {path}"))]
    RetriesExhausted { path: String, attempts: u32 },
}
