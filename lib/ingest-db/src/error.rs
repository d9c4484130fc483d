use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum DbError {
    #[snafu(display("failed to connect to the database after {attempts} attempts"))]
    ConnectFailed { attempts: u32 },

    #[snafu(display("invalid database configuration, not retrying: {source}"))]
    InvalidConfiguration { source: sqlx::Error },

    #[snafu(display("query failed: {source}"))]
    Query { source: sqlx::Error },

    #[snafu(display("database issue: insert_file returned no id for {filepath}"))]
    NoIdReturned { filepath: String },

    #[snafu(display("no row found for file id {file_id}"))]
    NotFound { file_id: i64 },
}

impl From<sqlx::Error> for DbError {
    fn from(source: sqlx::Error) -> Self {
        DbError::Query { source }
    }
}
