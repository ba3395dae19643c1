//! Ledger core: money, transactions, tags, split, running balance and CSV
//! import, persisted through sea-orm.

pub use balance::{
    DateGroupBalance, LineItem, LineKind, RunningBalance, children_totals, line_items,
    running_balance,
};
pub use commands::{NewTransaction, TagPatch, TransactionFilter, TransactionPatch};
pub use currency::{Currency, Locale};
pub use documents::Document;
pub use error::{EngineError, FailedRow};
pub use events::{EventBus, Invalidation, Topic};
pub use import::{
    Candidate, ColumnMapping, DuplicateIndex, ImportRow, ImportSummary, MappedImport, RawRecord,
    ReviewedImport, RowRange, RowStatus, UploadedImport,
};
pub use loadable::Loadable;
pub use money::{AmountInput, Money};
pub use ops::{Engine, EngineBuilder, ImportReport, MAX_SPLIT_PARTS, SplitOutcome, TagLink};
pub use storage::{DocumentStore, FsDocumentStore, MemoryDocumentStore};
pub use tag_groups::TagGroup;
pub use tags::Tag;
pub use transactions::{Transaction, TransactionView};

mod balance;
mod commands;
mod currency;
mod documents;
mod error;
mod events;
mod import;
mod loadable;
mod money;
mod ops;
mod settings;
mod storage;
mod tag_groups;
mod tags;
mod transaction_tags;
mod transactions;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
