//! Connection bootstrap, grounded on `lega/utils/db.py`'s `DBConnection.connect`:
//! up to `try_attempts` attempts, sleeping between them with the same
//! doubling-every-ten-attempts backoff (`(2 ** (count // 10)) * interval`).
//! Per-query reconnection is left to `sqlx::PgPool`, which already recycles
//! broken connections from its pool instead of `ping`-then-reconnect.

use crate::error::{ConnectFailedSnafu, DbError, InvalidConfigurationSnafu};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error, info};

pub struct DbGateway {
    pub(crate) pool: PgPool,
}

impl DbGateway {
    pub async fn connect(connection: &str, try_attempts: u32, try_interval_secs: u64) -> Result<Self, DbError> {
        let attempts = try_attempts.max(1);
        info!(attempts, "initializing a database connection");

        for count in 0..attempts {
            debug!(attempt = count, "connection attempt");
            match PgPoolOptions::new().max_connections(5).connect(connection).await {
                Ok(pool) => return Ok(Self { pool }),
                Err(e @ sqlx::Error::Configuration(_)) => {
                    // matches the original's `except psycopg2.InterfaceError: break` —
                    // a malformed DSN or parameter can't be fixed by retrying.
                    error!(error = %e, "invalid database configuration, not retrying");
                    return InvalidConfigurationSnafu { source: e }.fail();
                }
                Err(e) => debug!(error = %e, "database connection error"),
            }
            let backoff = backoff_secs(count, try_interval_secs);
            tokio::time::sleep(Duration::from_secs(backoff)).await;
        }

        error!("failed to connect to the database");
        ConnectFailedSnafu { attempts }.fail()
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// `(2 ** (count // 10)) * interval`, matching `DBConnection.connect`'s
/// doubling-every-ten-attempts backoff.
fn backoff_secs(count: u32, interval: u64) -> u64 {
    2u64.pow(count / 10) * interval.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_holds_steady_within_a_block_of_ten_attempts() {
        assert_eq!(backoff_secs(0, 1), 1);
        assert_eq!(backoff_secs(9, 1), 1);
    }

    #[test]
    fn backoff_doubles_every_ten_attempts() {
        assert_eq!(backoff_secs(10, 1), 2);
        assert_eq!(backoff_secs(20, 1), 4);
    }

    #[test]
    fn backoff_interval_is_floored_at_one_second() {
        assert_eq!(backoff_secs(0, 0), 1);
    }
}
