use api_types::{
    ErrorBody,
    import::{FailedRowView, PartialCommitDetails},
};
use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod balance;
mod documents;
mod import;
mod server;
mod tags;
mod transactions;
mod views;

pub mod types {
    pub mod transaction {
        pub use api_types::transaction::{
            SplitRequest, SplitResponse, TagAssign, TagLinkOutcome, TagLinkResponse,
            TransactionDeleted, TransactionListQuery, TransactionListResponse, TransactionNew,
            TransactionUpdate, TransactionView,
        };
    }

    pub mod tag {
        pub use api_types::tag::{
            TagGroupListResponse, TagGroupNew, TagGroupUpdate, TagGroupView, TagListResponse,
            TagNew, TagUpdate, TagView,
        };
    }

    pub mod document {
        pub use api_types::document::{DocumentContent, DocumentNew, DocumentView};
    }

    pub mod balance {
        pub use api_types::balance::{BalanceResponse, InitialBalanceSet, InitialBalanceView};
    }

    pub mod import {
        pub use api_types::import::{ImportCommitted, ImportPreview, ImportRequest};
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Generic(String),
    /// A spawned operation panicked or was aborted.
    Internal(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) | EngineError::ImmutableField(_) => StatusCode::CONFLICT,
        EngineError::InvalidAmount(_)
        | EngineError::Validation(_)
        | EngineError::EmptyImport(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::PendingDependency(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::PartialCommit { .. } | EngineError::Storage(_) | EngineError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn body_for_engine_error(err: EngineError) -> ErrorBody {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            ErrorBody {
                error: "internal server error".to_string(),
                details: None,
            }
        }
        EngineError::Storage(reason) => {
            tracing::error!("document storage error: {reason}");
            ErrorBody {
                error: EngineError::Storage(reason).to_string(),
                details: None,
            }
        }
        EngineError::PartialCommit { committed, failed } => {
            tracing::warn!(
                committed = committed.len(),
                failed = failed.len(),
                "import partially committed"
            );
            let error = format!(
                "import partially committed: {} written, {} failed",
                committed.len(),
                failed.len()
            );
            ErrorBody {
                error,
                details: Some(PartialCommitDetails {
                    committed,
                    failed: failed
                        .into_iter()
                        .map(|row| FailedRowView {
                            line: row.line,
                            reason: row.reason,
                        })
                        .collect(),
                }),
            }
        }
        other => ErrorBody {
            error: other.to_string(),
            details: None,
        },
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), body_for_engine_error(err)),
            ServerError::Generic(error) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error,
                    details: None,
                },
            ),
            ServerError::Internal(reason) => {
                tracing::error!("operation aborted: {reason}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal server error".to_string(),
                        details: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
