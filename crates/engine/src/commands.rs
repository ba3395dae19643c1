//! Command structs for engine operations.
//!
//! These types group parameters for write operations and list filters,
//! keeping call sites readable and avoiding long argument lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AmountInput;

/// Create a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// `YYYY-MM-DD` or `DD/MM/YYYY`.
    pub date: String,
    pub amount: AmountInput,
    pub description: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewTransaction {
    #[must_use]
    pub fn new(
        date: impl Into<String>,
        amount: impl Into<AmountInput>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            amount: amount.into(),
            description: description.into(),
            note: None,
        }
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Partial update of a transaction. `None` leaves a field untouched; an
/// empty `note` clears it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountInput>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl TransactionPatch {
    #[must_use]
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: impl Into<AmountInput>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Filters for listing transactions. Both bounds are inclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Only transactions carrying this tag.
    pub tag_id: Option<Uuid>,
    /// Only children of this transaction.
    pub parent_id: Option<Uuid>,
}

/// Partial update of a tag. Moving to another group appends the tag at the
/// end of that group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub tag_group_id: Option<Uuid>,
}
