//! Ledger entries.
//!
//! A `Transaction` is a dated, signed amount. A transaction with a
//! `parent_id` is a split child of that parent; split depth is one level.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Document, EngineError, Money, Tag, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub date: NaiveDate,
    pub amount: Money,
    pub description: String,
    pub note: Option<String>,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        amount: Money,
        description: String,
        note: Option<String>,
        parent_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            date,
            amount,
            description,
            note,
            parent_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// A transaction together with everything attached to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(flatten)]
    pub transaction: Transaction,
    /// True iff at least one transaction references this one as parent.
    pub has_children: bool,
    /// Amount counted by the running balance: `amount - Σ children` for a
    /// split parent, `amount` otherwise.
    pub effective_amount: Money,
    pub children: Vec<Uuid>,
    pub tags: Vec<Tag>,
    pub documents: Vec<Document>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub date: Date,
    pub amount_minor: i64,
    pub description: String,
    pub note: Option<String>,
    pub parent_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction_tags::Entity")]
    TransactionTags,
    #[sea_orm(has_many = "super::documents::Entity")]
    Documents,
}

impl Related<super::transaction_tags::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionTags.def()
    }
}

impl Related<super::documents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            date: ActiveValue::Set(tx.date),
            amount_minor: ActiveValue::Set(tx.amount.minor()),
            description: ActiveValue::Set(tx.description.clone()),
            note: ActiveValue::Set(tx.note.clone()),
            parent_id: ActiveValue::Set(tx.parent_id.map(|id| id.to_string())),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            date: model.date,
            amount: Money::new(model.amount_minor),
            description: model.description,
            note: model.note,
            parent_id: model
                .parent_id
                .as_deref()
                .map(|id| parse_uuid(id, "parent transaction"))
                .transpose()?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
