use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveValue, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use tokio::task;
use uuid::Uuid;

use crate::{Document, EngineError, ResultEngine, Topic, documents, transactions};

use super::{
    Engine,
    transactions::{not_found, touch_transaction},
    with_tx,
};

fn document_not_found(id: Uuid) -> EngineError {
    EngineError::KeyNotFound(format!("document {id}"))
}

/// Keeps only the last path component of an uploaded file name.
fn clean_filename(filename: &str) -> ResultEngine<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(EngineError::Validation(format!(
            "invalid document filename '{filename}'"
        )));
    }
    Ok(name.to_string())
}

impl Engine {
    /// Stores `bytes` and attaches them to a transaction, after the existing
    /// documents. The transaction's `updated_at` moves forward.
    pub async fn attach_document(
        &self,
        transaction_id: Uuid,
        bytes: &[u8],
        filename: &str,
    ) -> ResultEngine<Document> {
        let filename = clean_filename(filename)?;
        if bytes.is_empty() {
            return Err(EngineError::Validation(
                "document must not be empty".to_string(),
            ));
        }

        let storage_key = Uuid::new_v4().to_string();
        self.put_bytes(storage_key.clone(), bytes.to_vec()).await?;
        let size_bytes = i64::try_from(bytes.len()).unwrap_or(i64::MAX);

        let attached: ResultEngine<Document> = async {
            with_tx!(self, |db_tx| {
                transactions::Entity::find_by_id(transaction_id.to_string())
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| not_found(transaction_id))?;
                let position = documents::Entity::find()
                    .filter(documents::Column::TransactionId.eq(transaction_id.to_string()))
                    .order_by_desc(documents::Column::Position)
                    .one(&db_tx)
                    .await?
                    .map_or(0, |last| last.position + 1);

                let model = documents::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4().to_string()),
                    transaction_id: ActiveValue::Set(transaction_id.to_string()),
                    filename: ActiveValue::Set(filename.clone()),
                    storage_key: ActiveValue::Set(storage_key.clone()),
                    size_bytes: ActiveValue::Set(size_bytes),
                    position: ActiveValue::Set(position),
                    created_at: ActiveValue::Set(Utc::now()),
                }
                .insert(&db_tx)
                .await?;
                touch_transaction(&db_tx, &model.transaction_id).await?;
                Document::try_from(model)
            })
        }
        .await;

        match attached {
            Ok(document) => {
                self.events.publish(&[Topic::Documents, Topic::Transactions]);
                Ok(document)
            }
            Err(err) => {
                self.release_storage(vec![storage_key]).await;
                Err(err)
            }
        }
    }

    /// Removes a document; its bytes are released once nothing references
    /// them. The owning transaction's `updated_at` moves forward.
    pub async fn detach_document(&self, id: Uuid) -> ResultEngine<Document> {
        let (document, storage_key) = with_tx!(self, |db_tx| {
            let model = documents::Entity::find_by_id(id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| document_not_found(id))?;
            documents::Entity::delete_by_id(model.id.clone())
                .exec(&db_tx)
                .await?;
            touch_transaction(&db_tx, &model.transaction_id).await?;
            let storage_key = model.storage_key.clone();
            Ok((Document::try_from(model)?, storage_key))
        })?;

        self.events.publish(&[Topic::Documents, Topic::Transactions]);
        self.release_storage(vec![storage_key]).await;
        Ok(document)
    }

    /// Metadata and bytes of a document.
    pub async fn document_content(&self, id: Uuid) -> ResultEngine<(Document, Vec<u8>)> {
        let model = documents::Entity::find_by_id(id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| document_not_found(id))?;
        let bytes = self.get_bytes(model.storage_key.clone()).await?;
        Ok((Document::try_from(model)?, bytes))
    }

    /// Documents of a transaction in attachment order.
    pub async fn documents(&self, transaction_id: Uuid) -> ResultEngine<Vec<Document>> {
        transactions::Entity::find_by_id(transaction_id.to_string())
            .one(&self.database)
            .await?
            .ok_or_else(|| not_found(transaction_id))?;
        documents::Entity::find()
            .filter(documents::Column::TransactionId.eq(transaction_id.to_string()))
            .order_by_asc(documents::Column::Position)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Document::try_from)
            .collect()
    }

    /// Deletes stored bytes no document row references any more.
    ///
    /// Runs after the owning change is committed, so failures only leave
    /// orphaned bytes behind and are logged instead of returned.
    pub(super) async fn release_storage(&self, storage_keys: Vec<String>) {
        for key in storage_keys {
            let references = documents::Entity::find()
                .filter(documents::Column::StorageKey.eq(key.clone()))
                .count(&self.database)
                .await;
            let released = match references {
                Ok(0) => self.delete_bytes(key.clone()).await,
                Ok(_) => Ok(()),
                Err(err) => Err(err.into()),
            };
            if let Err(err) = released {
                tracing::warn!(storage_key = %key, error = %err, "document bytes not released");
            }
        }
    }

    async fn put_bytes(&self, key: String, bytes: Vec<u8>) -> ResultEngine<()> {
        let store = Arc::clone(&self.documents);
        task::spawn_blocking(move || store.put(&key, &bytes))
            .await
            .map_err(store_task_failed)?
    }

    async fn get_bytes(&self, key: String) -> ResultEngine<Vec<u8>> {
        let store = Arc::clone(&self.documents);
        task::spawn_blocking(move || store.get(&key))
            .await
            .map_err(store_task_failed)?
    }

    async fn delete_bytes(&self, key: String) -> ResultEngine<()> {
        let store = Arc::clone(&self.documents);
        task::spawn_blocking(move || store.delete(&key))
            .await
            .map_err(store_task_failed)?
    }
}

fn store_task_failed(err: task::JoinError) -> EngineError {
    EngineError::Storage(format!("document store task failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_keep_last_component() {
        assert_eq!(clean_filename("C:\\scans\\receipt.pdf").unwrap(), "receipt.pdf");
        assert_eq!(clean_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(clean_filename(" nota fiscal.png ").unwrap(), "nota fiscal.png");
        assert!(clean_filename("uploads/").is_err());
        assert!(clean_filename("..").is_err());
    }
}
