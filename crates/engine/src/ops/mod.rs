use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;

use crate::{
    AmountInput, DocumentStore, EngineError, EventBus, MemoryDocumentStore, Money, ResultEngine,
};

mod balances;
mod documents;
mod import;
mod split;
mod tags;
mod transactions;

pub use import::ImportReport;
pub use split::{MAX_SPLIT_PARTS, SplitOutcome};
pub use transactions::TagLink;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// The engine write gate is held for the whole block, so mutations never
/// interleave.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let _write_guard = $self.write_gate.lock().await;
        let $tx = $self.database.begin().await?;
        let result: $crate::ResultEngine<_> = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    documents: Arc<dyn DocumentStore + Send + Sync>,
    events: EventBus,
    write_gate: Mutex<()>,
    amount_limit: Money,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Invalidation signals published after every committed mutation.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Magnitude bound applied to every parsed amount.
    pub fn amount_limit(&self) -> Money {
        self.amount_limit
    }

    fn parse_amount(&self, input: &AmountInput) -> ResultEngine<Money> {
        Money::from_input(input, self.amount_limit)
    }

    fn ensure_within_limit(&self, amount: Money) -> ResultEngine<()> {
        if amount.abs() > self.amount_limit {
            return Err(EngineError::InvalidAmount(format!(
                "amount exceeds the limit of {}",
                self.amount_limit
            )));
        }
        Ok(())
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    documents: Option<Arc<dyn DocumentStore + Send + Sync>>,
    amount_limit: Option<Money>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Where document bytes are kept. Defaults to memory.
    pub fn document_store(mut self, store: Arc<dyn DocumentStore + Send + Sync>) -> EngineBuilder {
        self.documents = Some(store);
        self
    }

    /// Override [`Money::DEFAULT_LIMIT`].
    pub fn amount_limit(mut self, limit: Money) -> EngineBuilder {
        self.amount_limit = Some(limit);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        let amount_limit = self.amount_limit.unwrap_or(Money::DEFAULT_LIMIT);
        if !amount_limit.is_positive() {
            return Err(EngineError::Validation(
                "amount limit must be > 0".to_string(),
            ));
        }
        let documents: Arc<dyn DocumentStore + Send + Sync> = match self.documents {
            Some(store) => store,
            None => Arc::new(MemoryDocumentStore::default()),
        };
        Ok(Engine {
            database: self.database,
            documents,
            events: EventBus::default(),
            write_gate: Mutex::new(()),
            amount_limit,
        })
    }
}
