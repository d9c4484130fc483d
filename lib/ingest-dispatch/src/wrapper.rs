//! The cross-cutting error wrapper described in §4.4.
//!
//! Handlers are passed the raw payload and hand back `(Message, Result<Option<Value>, WorkerError>)`
//! — the `Message` is whatever payload they had in hand when they stopped
//! (augmented with `file_id` the moment it became known, the way
//! `lega/ingest.py`'s `work` keeps writing into the same `data` dict so a
//! later exception still finds it there). `wrap` reads `file_id` back out
//! of it to record the failure, then returns the dispatch sentinel.

use ingest_core::{Message, WorkerError};
use ingest_db::Database;
use serde_json::Value;
use std::future::Future;

pub async fn wrap<F, Fut>(db: &dyn Database, body: F) -> (Option<Value>, bool)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = (Message, Result<Option<Value>, WorkerError>)>,
{
    let (message, result) = body().await;
    match result {
        Ok(reply) => (reply, false),
        Err(err) => {
            tracing::error!(error = %err, from_user = err.from_user(), "handler failed");
            if let Some(file_id) = message.get("file_id").and_then(Value::as_i64) {
                if let Err(db_err) = db
                    .set_error(file_id, &err.class_name(), &err.to_string(), err.from_user())
                    .await
                {
                    tracing::error!(error = %db_err, file_id, "failed to record error in database");
                }
            } else {
                tracing::warn!("handler failed before a file_id was known; error not recorded in database");
            }
            (None, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_core::UserError;
    use ingest_db::fake::FakeDatabase;
    use ingest_db::fake::FakeRow;
    use ingest_core::model::Status;

    #[tokio::test]
    async fn ok_result_passes_the_reply_through_untouched() {
        let db = FakeDatabase::new();
        let (reply, rejected) = wrap(&db, || async {
            (Message::default(), Ok(Some(Value::String("done".to_string()))))
        })
        .await;
        assert_eq!(reply, Some(Value::String("done".to_string())));
        assert!(!rejected);
    }

    #[tokio::test]
    async fn error_with_a_known_file_id_records_it_in_the_database() {
        let db = FakeDatabase::new();
        db.seed(FakeRow::new(3, "u", "f", Status::InIngestion));
        let mut message = Message::default();
        message.insert("file_id", 3);

        let (reply, rejected) = wrap(&db, || async {
            (
                message,
                Err(WorkerError::from(UserError::NotFoundInInbox {
                    filepath: "f".to_string(),
                })),
            )
        })
        .await;

        assert!(reply.is_none());
        assert!(rejected);
        assert_eq!(db.row(3).unwrap().status, Status::Error);
    }

    #[tokio::test]
    async fn error_without_a_file_id_is_rejected_without_touching_the_database() {
        let db = FakeDatabase::new();
        let (reply, rejected) = wrap(&db, || async {
            (Message::default(), Err(WorkerError::system("boom")))
        })
        .await;
        assert!(reply.is_none());
        assert!(rejected);
    }
}
