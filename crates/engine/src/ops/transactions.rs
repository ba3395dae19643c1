use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
    prelude::*,
    sea_query::{Expr, Query},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Document, EngineError, Money, NewTransaction, ResultEngine, Tag, Topic, Transaction,
    TransactionFilter, TransactionPatch, TransactionView, documents, tags, transaction_tags,
    transactions,
    util::{normalize_optional_text, parse_date, parse_uuid},
};

use super::{Engine, with_tx};

/// Outcome of an idempotent tag association change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagLink {
    Added,
    AlreadyAssociated,
    Removed,
    AlreadyAbsent,
}

impl TagLink {
    /// Whether the association set changed.
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, TagLink::Added | TagLink::Removed)
    }
}

fn required_description(value: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(
            "description must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

pub(super) fn not_found(id: Uuid) -> EngineError {
    EngineError::KeyNotFound(format!("transaction {id}"))
}

/// Moves `updated_at` of a transaction to now.
pub(super) async fn touch_transaction(db_tx: &DatabaseTransaction, id: &str) -> ResultEngine<()> {
    transactions::Entity::update_many()
        .col_expr(transactions::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(transactions::Column::Id.eq(id))
        .exec(db_tx)
        .await?;
    Ok(())
}

impl Engine {
    /// Records a new transaction.
    ///
    /// The date is `YYYY-MM-DD` (or `DD/MM/YYYY`), the amount goes through
    /// [`Money`] parsing and the description must not be blank.
    pub async fn create_transaction(&self, cmd: NewTransaction) -> ResultEngine<Transaction> {
        let date = parse_date(&cmd.date)?;
        let amount = self.parse_amount(&cmd.amount)?;
        let created = self
            .create_entry(date, amount, &cmd.description, cmd.note.as_deref())
            .await?;
        self.events.publish(&[Topic::Transactions, Topic::Balance]);
        Ok(created)
    }

    /// Inserts one standalone transaction in its own DB transaction.
    pub(super) async fn create_entry(
        &self,
        date: NaiveDate,
        amount: Money,
        description: &str,
        note: Option<&str>,
    ) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            self.insert_transaction(&db_tx, date, amount, description, note, None)
                .await
        })
    }

    pub(super) async fn insert_transaction(
        &self,
        db_tx: &DatabaseTransaction,
        date: NaiveDate,
        amount: Money,
        description: &str,
        note: Option<&str>,
        parent_id: Option<Uuid>,
    ) -> ResultEngine<Transaction> {
        self.ensure_within_limit(amount)?;
        let transaction = Transaction::new(
            date,
            amount,
            required_description(description)?,
            normalize_optional_text(note),
            parent_id,
        );
        transactions::ActiveModel::from(&transaction)
            .insert(db_tx)
            .await?;
        Ok(transaction)
    }

    /// Applies a partial update.
    ///
    /// - split parents: `amount`, `date` and `description` are locked
    /// - split children: `date` and `description` are inherited and locked
    ///
    /// A patched field equal to the stored value is not a change.
    pub async fn update_transaction(
        &self,
        id: Uuid,
        patch: TransactionPatch,
    ) -> ResultEngine<Transaction> {
        let date = patch.date.as_deref().map(parse_date).transpose()?;
        let amount = patch
            .amount
            .as_ref()
            .map(|amount| self.parse_amount(amount))
            .transpose()?;
        let description = patch
            .description
            .as_deref()
            .map(required_description)
            .transpose()?;

        let updated = with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| not_found(id))?;
            let current = Transaction::try_from(model.clone())?;
            let has_children = transactions::Entity::find()
                .filter(transactions::Column::ParentId.eq(id.to_string()))
                .count(&db_tx)
                .await?
                > 0;

            let date_changed = date.is_some_and(|date| date != current.date);
            let amount_changed = amount.is_some_and(|amount| amount != current.amount);
            let description_changed = description
                .as_ref()
                .is_some_and(|description| *description != current.description);

            if has_children {
                if let Some(field) = [
                    (amount_changed, "amount"),
                    (date_changed, "date"),
                    (description_changed, "description"),
                ]
                .into_iter()
                .find_map(|(changed, field)| changed.then_some(field))
                {
                    return Err(EngineError::ImmutableField(format!(
                        "{field} of split transaction {id} cannot change"
                    )));
                }
            }
            if current.is_child() {
                if let Some(field) = [(date_changed, "date"), (description_changed, "description")]
                    .into_iter()
                    .find_map(|(changed, field)| changed.then_some(field))
                {
                    return Err(EngineError::ImmutableField(format!(
                        "{field} of split child {id} is inherited from its parent"
                    )));
                }
            }

            let mut active: transactions::ActiveModel = model.into();
            if let Some(date) = date {
                active.date = ActiveValue::Set(date);
            }
            if let Some(amount) = amount {
                active.amount_minor = ActiveValue::Set(amount.minor());
            }
            if let Some(description) = description {
                active.description = ActiveValue::Set(description);
            }
            if let Some(note) = patch.note.as_deref() {
                active.note = ActiveValue::Set(normalize_optional_text(Some(note)));
            }
            active.updated_at = ActiveValue::Set(Utc::now());
            let model = active.update(&db_tx).await?;
            Transaction::try_from(model)
        })?;

        self.events.publish(&[Topic::Transactions, Topic::Balance]);
        Ok(updated)
    }

    /// Deletes a transaction.
    ///
    /// Deleting a split parent also deletes its children. Tag associations
    /// and documents of every deleted transaction go with it. Returns the
    /// deleted ids.
    pub async fn delete_transaction(&self, id: Uuid) -> ResultEngine<Vec<Uuid>> {
        let (deleted, storage_keys) = with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| not_found(id))?;

            let mut ids: Vec<String> = transactions::Entity::find()
                .filter(transactions::Column::ParentId.eq(model.id.clone()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|child| child.id)
                .collect();
            ids.push(model.id);

            let storage_keys: Vec<String> = documents::Entity::find()
                .filter(documents::Column::TransactionId.is_in(ids.clone()))
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|doc| doc.storage_key)
                .collect();

            transaction_tags::Entity::delete_many()
                .filter(transaction_tags::Column::TransactionId.is_in(ids.clone()))
                .exec(&db_tx)
                .await?;
            documents::Entity::delete_many()
                .filter(documents::Column::TransactionId.is_in(ids.clone()))
                .exec(&db_tx)
                .await?;
            transactions::Entity::delete_many()
                .filter(transactions::Column::Id.is_in(ids.clone()))
                .exec(&db_tx)
                .await?;

            let deleted = ids
                .iter()
                .map(|id| parse_uuid(id, "transaction"))
                .collect::<ResultEngine<Vec<_>>>()?;
            Ok((deleted, storage_keys))
        })?;

        self.events.publish(&[
            Topic::Transactions,
            Topic::TransactionTags,
            Topic::Documents,
            Topic::Balance,
        ]);
        self.release_storage(storage_keys).await;
        Ok(deleted)
    }

    /// Return one transaction with its tags, documents and children.
    pub async fn transaction(&self, id: Uuid) -> ResultEngine<TransactionView> {
        let model = transactions::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| not_found(id))?;
        let mut views = build_views(&self.database, vec![model]).await?;
        views.pop().ok_or_else(|| not_found(id))
    }

    /// Lists transactions ordered by date, then creation time.
    pub async fn transactions(
        &self,
        filter: TransactionFilter,
    ) -> ResultEngine<Vec<TransactionView>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to)
            && from > to
        {
            return Err(EngineError::Validation(
                "invalid range: from must be <= to".to_string(),
            ));
        }

        let mut query = transactions::Entity::find();
        if let Some(from) = filter.from {
            query = query.filter(transactions::Column::Date.gte(from));
        }
        if let Some(to) = filter.to {
            query = query.filter(transactions::Column::Date.lte(to));
        }
        if let Some(parent_id) = filter.parent_id {
            query = query.filter(transactions::Column::ParentId.eq(parent_id.to_string()));
        }
        if let Some(tag_id) = filter.tag_id {
            query = query.filter(
                transactions::Column::Id.in_subquery(
                    Query::select()
                        .column(transaction_tags::Column::TransactionId)
                        .from(transaction_tags::Entity)
                        .and_where(transaction_tags::Column::TagId.eq(tag_id.to_string()))
                        .to_owned(),
                ),
            );
        }

        let models = query
            .order_by_asc(transactions::Column::Date)
            .order_by_asc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::Id)
            .all(&self.database)
            .await?;
        build_views(&self.database, models).await
    }

    /// Every stored transaction, unordered.
    pub(super) async fn all_transactions(&self) -> ResultEngine<Vec<Transaction>> {
        transactions::Entity::find()
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    /// Associates a tag. Re-adding an associated tag is not an error.
    pub async fn add_tag(&self, transaction_id: Uuid, tag_id: Uuid) -> ResultEngine<TagLink> {
        let link = with_tx!(self, |db_tx| {
            transactions::Entity::find_by_id(transaction_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| not_found(transaction_id))?;
            tags::Entity::find_by_id(tag_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound(format!("tag {tag_id}")))?;

            let existing =
                transaction_tags::Entity::find_by_id((transaction_id.to_string(), tag_id.to_string()))
                    .one(&db_tx)
                    .await?;
            if existing.is_some() {
                return Ok(TagLink::AlreadyAssociated);
            }

            transaction_tags::ActiveModel {
                transaction_id: ActiveValue::Set(transaction_id.to_string()),
                tag_id: ActiveValue::Set(tag_id.to_string()),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            Ok(TagLink::Added)
        })?;

        if link.changed() {
            self.events.publish(&[Topic::TransactionTags]);
        }
        Ok(link)
    }

    /// Removes a tag association. Removing an absent one is not an error.
    pub async fn remove_tag(&self, transaction_id: Uuid, tag_id: Uuid) -> ResultEngine<TagLink> {
        let link = with_tx!(self, |db_tx| {
            transactions::Entity::find_by_id(transaction_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| not_found(transaction_id))?;

            let result = transaction_tags::Entity::delete_many()
                .filter(transaction_tags::Column::TransactionId.eq(transaction_id.to_string()))
                .filter(transaction_tags::Column::TagId.eq(tag_id.to_string()))
                .exec(&db_tx)
                .await?;
            Ok(if result.rows_affected > 0 {
                TagLink::Removed
            } else {
                TagLink::AlreadyAbsent
            })
        })?;

        if link.changed() {
            self.events.publish(&[Topic::TransactionTags]);
        }
        Ok(link)
    }
}

/// Ids bound per `IN (...)` query, well below SQLite's variable limit.
const ID_CHUNK: usize = 500;

/// Loads children, tags and documents for `models` in bulk.
async fn build_views<C: ConnectionTrait>(
    conn: &C,
    models: Vec<transactions::Model>,
) -> ResultEngine<Vec<TransactionView>> {
    let ids: Vec<String> = models.iter().map(|model| model.id.clone()).collect();

    let mut children: HashMap<String, Vec<transactions::Model>> = HashMap::new();
    let mut links = Vec::new();
    let mut documents_by_tx: HashMap<String, Vec<Document>> = HashMap::new();
    for chunk in ids.chunks(ID_CHUNK) {
        for child in transactions::Entity::find()
            .filter(transactions::Column::ParentId.is_in(chunk.to_vec()))
            .order_by_asc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::Id)
            .all(conn)
            .await?
        {
            if let Some(parent_id) = child.parent_id.clone() {
                children.entry(parent_id).or_default().push(child);
            }
        }

        links.extend(
            transaction_tags::Entity::find()
                .filter(transaction_tags::Column::TransactionId.is_in(chunk.to_vec()))
                .all(conn)
                .await?,
        );

        for model in documents::Entity::find()
            .filter(documents::Column::TransactionId.is_in(chunk.to_vec()))
            .order_by_asc(documents::Column::Position)
            .all(conn)
            .await?
        {
            documents_by_tx
                .entry(model.transaction_id.clone())
                .or_default()
                .push(Document::try_from(model)?);
        }
    }

    let mut tag_ids: Vec<String> = links.iter().map(|link| link.tag_id.clone()).collect();
    tag_ids.sort_unstable();
    tag_ids.dedup();
    let mut tags_by_id: HashMap<String, Tag> = HashMap::new();
    for chunk in tag_ids.chunks(ID_CHUNK) {
        for model in tags::Entity::find()
            .filter(tags::Column::Id.is_in(chunk.to_vec()))
            .all(conn)
            .await?
        {
            tags_by_id.insert(model.id.clone(), Tag::try_from(model)?);
        }
    }
    let mut tags_by_tx: HashMap<String, Vec<Tag>> = HashMap::new();
    for link in links {
        if let Some(tag) = tags_by_id.get(&link.tag_id) {
            tags_by_tx
                .entry(link.transaction_id)
                .or_default()
                .push(tag.clone());
        }
    }

    models
        .into_iter()
        .map(|model| {
            let kids = children.remove(&model.id).unwrap_or_default();
            let mut tags = tags_by_tx.remove(&model.id).unwrap_or_default();
            tags.sort_by(|a, b| (a.position, &a.name).cmp(&(b.position, &b.name)));
            let documents = documents_by_tx.remove(&model.id).unwrap_or_default();
            let transaction = Transaction::try_from(model)?;

            let children_total: Money = kids.iter().map(|kid| Money::new(kid.amount_minor)).sum();
            let effective_amount = if kids.is_empty() {
                transaction.amount
            } else {
                transaction.amount - children_total
            };
            let children = kids
                .iter()
                .map(|kid| parse_uuid(&kid.id, "transaction"))
                .collect::<ResultEngine<Vec<_>>>()?;

            Ok(TransactionView {
                has_children: !children.is_empty(),
                effective_amount,
                children,
                tags,
                documents,
                transaction,
            })
        })
        .collect()
}
