use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Amount as typed by a client: a decimal number or a formatted string
/// such as `"R$ 1.234,56"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

/// An amount as returned by the server: exact centavos plus the string
/// formatted for the configured locale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyView {
    pub minor: i64,
    pub formatted: String,
}

pub mod transaction {
    use super::*;
    use crate::{document::DocumentView, tag::TagView};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        /// `YYYY-MM-DD` or `DD/MM/YYYY`.
        pub date: String,
        pub amount: Amount,
        pub description: String,
        #[serde(default)]
        pub note: Option<String>,
    }

    /// Partial update; absent fields are left untouched and an empty
    /// `note` clears it.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionUpdate {
        #[serde(default)]
        pub date: Option<String>,
        #[serde(default)]
        pub amount: Option<Amount>,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub note: Option<String>,
    }

    /// Query string of `GET /transactions`. Date bounds are inclusive.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionListQuery {
        pub from: Option<NaiveDate>,
        pub to: Option<NaiveDate>,
        pub tag_id: Option<Uuid>,
        pub parent_id: Option<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub date: NaiveDate,
        pub amount: MoneyView,
        /// Amount minus the children total; equals `amount` without children.
        pub effective_amount: MoneyView,
        pub description: String,
        pub note: Option<String>,
        pub parent_id: Option<Uuid>,
        pub has_children: bool,
        pub children: Vec<Uuid>,
        pub tags: Vec<TagView>,
        pub documents: Vec<DocumentView>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionDeleted {
        /// The transaction and, for a split parent, its children.
        pub deleted: Vec<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagAssign {
        pub tag_id: Uuid,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TagLinkOutcome {
        Added,
        AlreadyAssociated,
        Removed,
        AlreadyAbsent,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagLinkResponse {
        pub outcome: TagLinkOutcome,
        pub changed: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitRequest {
        pub parts: usize,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SplitResponse {
        pub parent: TransactionView,
        pub children: Vec<TransactionView>,
    }
}

pub mod tag {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagGroupNew {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagGroupUpdate {
        pub name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagGroupView {
        pub id: Uuid,
        pub name: String,
        pub position: u32,
        pub tags: Vec<TagView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagGroupListResponse {
        pub groups: Vec<TagGroupView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagNew {
        pub tag_group_id: Uuid,
        pub name: String,
        /// `#rgb` or `#rrggbb`.
        pub color: String,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TagUpdate {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default)]
        pub color: Option<String>,
        /// Moves the tag to the end of this group.
        #[serde(default)]
        pub tag_group_id: Option<Uuid>,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct TagView {
        pub id: Uuid,
        pub tag_group_id: Uuid,
        pub name: String,
        pub color: String,
        pub position: u32,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TagListResponse {
        pub tags: Vec<TagView>,
    }
}

pub mod document {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DocumentNew {
        pub filename: String,
        /// Standard base64 of the file bytes.
        pub content_base64: String,
    }

    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct DocumentView {
        pub id: Uuid,
        pub transaction_id: Uuid,
        pub filename: String,
        pub size_bytes: u64,
        pub position: u32,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DocumentContent {
        pub document: DocumentView,
        pub content_base64: String,
    }
}

pub mod balance {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InitialBalanceSet {
        pub amount: Amount,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct InitialBalanceView {
        pub amount: MoneyView,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum LineKind {
        Standalone,
        /// What is left of a split parent after its children.
        Residual,
        Child,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LineView {
        pub transaction_id: Uuid,
        pub amount: MoneyView,
        pub kind: LineKind,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct DateGroupView {
        pub date: NaiveDate,
        pub net: MoneyView,
        /// Balance after every line of this date.
        pub balance: MoneyView,
        pub lines: Vec<LineView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceResponse {
        pub initial: MoneyView,
        pub final_balance: MoneyView,
        pub groups: Vec<DateGroupView>,
    }
}

pub mod import {
    use super::*;

    /// 1-based, inclusive range over data rows.
    #[derive(Clone, Copy, Debug, Serialize, Deserialize)]
    pub struct RowRange {
        pub start: usize,
        #[serde(default)]
        pub end: Option<usize>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ColumnMapping {
        /// Header name, spreadsheet letters (`A`, `AB`) or 1-based index.
        pub date_column: String,
        pub description_column: String,
        pub amount_column: String,
        /// e.g. `DD/MM/YYYY`.
        pub date_format: String,
        #[serde(default)]
        pub rows: Option<RowRange>,
        #[serde(default)]
        pub has_header: Option<bool>,
    }

    /// Body of both `POST /import/preview` and `POST /import`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportRequest {
        pub csv: String,
        pub mapping: ColumnMapping,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum RowStatus {
        Ready,
        Excluded,
        Invalid,
        Duplicate,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct CandidateView {
        pub date: NaiveDate,
        pub amount: MoneyView,
        pub description: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportRowView {
        /// Line in the uploaded file.
        pub line: usize,
        pub row: usize,
        pub cells: Vec<String>,
        pub status: RowStatus,
        pub error: Option<String>,
        pub candidate: Option<CandidateView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportSummaryView {
        pub import_total: MoneyView,
        /// `None` while the current balance cannot be computed.
        pub projected_balance: Option<MoneyView>,
        pub difference: MoneyView,
        pub ready: usize,
        pub duplicates: usize,
        pub invalid: usize,
        pub excluded: usize,
        pub can_commit: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportPreview {
        pub rows: Vec<ImportRowView>,
        pub summary: ImportSummaryView,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ImportCommitted {
        pub committed: Vec<Uuid>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct FailedRowView {
        pub line: usize,
        pub reason: String,
    }

    /// `details` of the error body when only part of an import was written.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PartialCommitDetails {
        pub committed: Vec<Uuid>,
        pub failed: Vec<FailedRowView>,
    }
}

pub mod versions {
    use super::*;

    /// Invalidation counters per topic; a changed value means the matching
    /// views are stale.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct VersionsResponse {
        pub versions: std::collections::BTreeMap<String, u64>,
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<import::PartialCommitDetails>,
}
