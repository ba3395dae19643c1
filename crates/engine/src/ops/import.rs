use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ColumnMapping, DuplicateIndex, EngineError, FailedRow, MappedImport, ResultEngine,
    ReviewedImport, Topic, UploadedImport,
};

use super::Engine;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Created transaction ids in file order.
    pub committed: Vec<Uuid>,
}

impl Engine {
    /// UPLOADED → MAPPED using the engine amount limit.
    pub fn map_import(
        &self,
        upload: &UploadedImport,
        mapping: &ColumnMapping,
    ) -> ResultEngine<MappedImport> {
        upload.map(mapping, self.amount_limit)
    }

    /// MAPPED → REVIEWED against the current ledger and final balance.
    pub async fn review_import(&self, mapped: MappedImport) -> ResultEngine<ReviewedImport> {
        let existing = DuplicateIndex::from_transactions(&self.all_transactions().await?);
        let balance = self.current_final_balance().await?;
        mapped.review(&existing, &balance)
    }

    /// Writes the commit set, one transaction per row, in file order.
    ///
    /// An empty commit set (nothing parsed, or only duplicates) is
    /// [`EngineError::EmptyImport`].
    ///
    /// Rows are independent: a failing row does not stop the others. When
    /// any row fails the result is [`EngineError::PartialCommit`] listing
    /// what was written and what was not. Rows that became duplicates since
    /// the review are reported as failed.
    pub async fn commit_import(&self, reviewed: &ReviewedImport) -> ResultEngine<ImportReport> {
        let commit_set: Vec<_> = reviewed.commit_set().collect();
        if commit_set.is_empty() {
            let reason = if reviewed.rows().iter().all(|row| row.candidate.is_none()) {
                "no row could be parsed with this mapping"
            } else {
                "no rows ready to import"
            };
            return Err(EngineError::EmptyImport(reason.to_string()));
        }
        reviewed
            .summary()
            .projected_balance
            .clone()
            .require("projected balance")?;

        let existing = DuplicateIndex::from_transactions(&self.all_transactions().await?);
        let mut committed = Vec::with_capacity(commit_set.len());
        let mut failed = Vec::new();
        for (line, candidate) in commit_set {
            if existing.contains(candidate) {
                failed.push(FailedRow {
                    line,
                    reason: "already in the ledger".to_string(),
                });
                continue;
            }
            match self
                .create_entry(candidate.date, candidate.amount, &candidate.description, None)
                .await
            {
                Ok(created) => committed.push(created.id),
                Err(err) => failed.push(FailedRow {
                    line,
                    reason: err.to_string(),
                }),
            }
        }

        if !committed.is_empty() {
            self.events.publish(&[Topic::Transactions, Topic::Balance]);
        }
        if !failed.is_empty() {
            return Err(EngineError::PartialCommit { committed, failed });
        }
        Ok(ImportReport { committed })
    }
}
