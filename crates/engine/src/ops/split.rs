use chrono::Utc;
use sea_orm::{ActiveValue, PaginatorTrait, QueryFilter, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, Topic, Transaction, transactions};

use super::{Engine, transactions::not_found, with_tx};

/// Upper bound on the number of parts of a split.
pub const MAX_SPLIT_PARTS: usize = 100;

/// The parent after the split and its new children, in creation order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub parent: Transaction,
    pub children: Vec<Transaction>,
}

impl Engine {
    /// Splits a transaction into `parts` children whose amounts sum exactly
    /// to the parent amount.
    ///
    /// Children inherit date and description and start without note, tags
    /// or documents. The parent keeps its stored amount; its residual
    /// becomes zero. Either every child is created or none is.
    pub async fn split_transaction(&self, id: Uuid, parts: usize) -> ResultEngine<SplitOutcome> {
        if parts < 2 {
            return Err(EngineError::Validation(format!(
                "a split needs at least 2 parts, got {parts}"
            )));
        }
        if parts > MAX_SPLIT_PARTS {
            return Err(EngineError::Validation(format!(
                "a split allows at most {MAX_SPLIT_PARTS} parts, got {parts}"
            )));
        }

        let outcome = with_tx!(self, |db_tx| {
            let model = transactions::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| not_found(id))?;
            let parent = Transaction::try_from(model.clone())?;
            if parent.is_child() {
                return Err(EngineError::Validation(format!(
                    "transaction {id} is already part of a split"
                )));
            }
            let existing = transactions::Entity::find()
                .filter(transactions::Column::ParentId.eq(id.to_string()))
                .count(&db_tx)
                .await?;
            if existing > 0 {
                return Err(EngineError::Validation(format!(
                    "transaction {id} is already split; delete its children first"
                )));
            }

            let mut children = Vec::with_capacity(parts);
            for amount in parent.amount.split_even(parts) {
                let child = self
                    .insert_transaction(
                        &db_tx,
                        parent.date,
                        amount,
                        &parent.description,
                        None,
                        Some(parent.id),
                    )
                    .await?;
                children.push(child);
            }

            let mut active: transactions::ActiveModel = model.into();
            active.updated_at = ActiveValue::Set(Utc::now());
            let parent = Transaction::try_from(active.update(&db_tx).await?)?;
            Ok(SplitOutcome { parent, children })
        })?;

        self.events.publish(&[Topic::Transactions, Topic::Balance]);
        Ok(outcome)
    }
}
