//! CSV import pipeline.
//!
//! The pipeline is a small state machine, one type per stage:
//!
//! - [`UploadedImport`]: the raw file, split into rows of string cells.
//! - [`MappedImport`]: every row transformed into a candidate transaction
//!   according to a [`ColumnMapping`].
//! - [`ReviewedImport`]: candidates checked for duplicates against the ledger,
//!   with the projected balance.
//!
//! Moving backwards keeps the file; cancelling drops it. Committing a
//! reviewed import is done by the engine.

use std::{collections::HashSet, io::Read};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Loadable, Money, ResultEngine, Transaction};

/// One non-blank CSV record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RawRecord {
    /// 1-based line number in the file.
    pub line: usize,
    pub cells: Vec<String>,
}

/// Stage 1: file accepted and parsed into cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedImport {
    records: Vec<RawRecord>,
}

/// 1-based, inclusive range over data rows (the header is not counted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl RowRange {
    fn validate(self) -> ResultEngine<()> {
        if self.start == 0 {
            return Err(EngineError::Validation(
                "row range starts at 1".to_string(),
            ));
        }
        if self.end.is_some_and(|end| end < self.start) {
            return Err(EngineError::Validation(
                "row range end must not precede its start".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(self, row: usize) -> bool {
        row >= self.start && self.end.is_none_or(|end| row <= end)
    }
}

/// How to read candidate transactions out of the uploaded rows.
///
/// Column references are resolved in this order: exact header name,
/// spreadsheet letters (`A`, `AB`), 1-based index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date_column: String,
    pub description_column: String,
    pub amount_column: String,
    /// `DD/MM/YYYY` style tokens or a chrono `%` pattern.
    pub date_format: String,
    #[serde(default)]
    pub rows: Option<RowRange>,
    #[serde(default = "default_has_header")]
    pub has_header: bool,
}

fn default_has_header() -> bool {
    true
}

/// Transaction-shaped record produced from one row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub date: NaiveDate,
    pub amount: Money,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum RowStatus {
    Ready,
    /// Outside the configured row range; shown but not transformed.
    Excluded,
    Invalid(String),
    /// Matches an existing ledger transaction; not committed.
    Duplicate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportRow {
    pub line: usize,
    /// 1-based position among data rows.
    pub row: usize,
    pub cells: Vec<String>,
    pub status: RowStatus,
    pub candidate: Option<Candidate>,
}

impl ImportRow {
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            RowStatus::Invalid(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Stage 2: preview of the mapped rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappedImport {
    upload: UploadedImport,
    mapping: ColumnMapping,
    rows: Vec<ImportRow>,
}

/// Existing ledger entries keyed by `(date, amount, description)`.
#[derive(Clone, Debug, Default)]
pub struct DuplicateIndex {
    keys: HashSet<(NaiveDate, Money, String)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Sum over the commit set.
    pub import_total: Money,
    /// Current final balance plus `import_total`.
    pub projected_balance: Loadable<Money>,
    pub difference: Money,
    pub ready: usize,
    pub duplicates: usize,
    pub invalid: usize,
    pub excluded: usize,
}

impl ImportSummary {
    #[must_use]
    pub fn can_commit(&self) -> bool {
        self.ready > 0 && self.projected_balance.is_ready()
    }
}

/// Stage 3: final confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewedImport {
    mapped: MappedImport,
    rows: Vec<ImportRow>,
    summary: ImportSummary,
}

impl UploadedImport {
    pub fn from_csv(text: &str) -> ResultEngine<Self> {
        Self::from_reader(text.as_bytes())
    }

    /// Reads comma-separated records. Rows may have different widths; blank
    /// rows are skipped.
    pub fn from_reader<R: Read>(reader: R) -> ResultEngine<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        for result in reader.records() {
            let record =
                result.map_err(|err| EngineError::Validation(format!("invalid CSV: {err}")))?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record
                .position()
                .map_or(records.len() + 1, |pos| pos.line() as usize);
            records.push(RawRecord {
                line,
                cells: record.iter().map(ToString::to_string).collect(),
            });
        }

        if records.is_empty() {
            return Err(EngineError::EmptyImport("the file has no rows".to_string()));
        }
        Ok(Self { records })
    }

    /// First record, which is the header when the file has one.
    #[must_use]
    pub fn header(&self) -> Option<&[String]> {
        self.records.first().map(|record| record.cells.as_slice())
    }

    #[must_use]
    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// Transforms every data row according to `mapping`.
    ///
    /// A bad mapping (unknown column, bad range) fails the whole step; a bad
    /// row only marks that row invalid.
    pub fn map(&self, mapping: &ColumnMapping, limit: Money) -> ResultEngine<MappedImport> {
        let (header, data) = if mapping.has_header {
            (self.header(), self.records.get(1..).unwrap_or_default())
        } else {
            (None, self.records.as_slice())
        };
        if data.is_empty() {
            return Err(EngineError::EmptyImport(
                "the file has no data rows".to_string(),
            ));
        }
        if let Some(range) = mapping.rows {
            range.validate()?;
        }

        let date_idx = resolve_column(&mapping.date_column, header)?;
        let description_idx = resolve_column(&mapping.description_column, header)?;
        let amount_idx = resolve_column(&mapping.amount_column, header)?;
        let date_format = chrono_format(&mapping.date_format)?;

        let rows = data
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let row = i + 1;
                let (status, candidate) = if mapping.rows.is_some_and(|range| !range.contains(row))
                {
                    (RowStatus::Excluded, None)
                } else {
                    match parse_candidate(
                        &record.cells,
                        date_idx,
                        description_idx,
                        amount_idx,
                        &date_format,
                        limit,
                    ) {
                        Ok(candidate) => (RowStatus::Ready, Some(candidate)),
                        Err(reason) => (RowStatus::Invalid(reason), None),
                    }
                };
                ImportRow {
                    line: record.line,
                    row,
                    cells: record.cells.clone(),
                    status,
                    candidate,
                }
            })
            .collect();

        Ok(MappedImport {
            upload: self.clone(),
            mapping: mapping.clone(),
            rows,
        })
    }

    /// Drops the file.
    pub fn cancel(self) {}
}

impl MappedImport {
    #[must_use]
    pub fn rows(&self) -> &[ImportRow] {
        &self.rows
    }

    #[must_use]
    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Back to the upload stage, keeping the file.
    #[must_use]
    pub fn back(self) -> UploadedImport {
        self.upload
    }

    pub fn cancel(self) {}

    /// Flags duplicates and projects the balance.
    ///
    /// Rows that could not be parsed keep their reasons; with none ready the
    /// summary reports that nothing can be committed.
    pub fn review(
        self,
        existing: &DuplicateIndex,
        current_final_balance: &Loadable<Money>,
    ) -> ResultEngine<ReviewedImport> {
        let rows: Vec<ImportRow> = self
            .rows
            .iter()
            .cloned()
            .map(|mut row| {
                if row.status == RowStatus::Ready
                    && row
                        .candidate
                        .as_ref()
                        .is_some_and(|candidate| existing.contains(candidate))
                {
                    row.status = RowStatus::Duplicate;
                }
                row
            })
            .collect();

        let summary = summarize(&rows, current_final_balance);
        Ok(ReviewedImport {
            mapped: self,
            rows,
            summary,
        })
    }
}

impl ReviewedImport {
    #[must_use]
    pub fn rows(&self) -> &[ImportRow] {
        &self.rows
    }

    #[must_use]
    pub fn summary(&self) -> &ImportSummary {
        &self.summary
    }

    /// Candidates to write, in file order, with their line numbers.
    pub fn commit_set(&self) -> impl Iterator<Item = (usize, &Candidate)> {
        self.rows.iter().filter_map(|row| match (&row.status, &row.candidate) {
            (RowStatus::Ready, Some(candidate)) => Some((row.line, candidate)),
            _ => None,
        })
    }

    /// Back to the mapping preview.
    #[must_use]
    pub fn back(self) -> MappedImport {
        self.mapped
    }

    pub fn cancel(self) {}
}

impl DuplicateIndex {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut index = Self::default();
        for tx in transactions {
            index.insert(tx.date, tx.amount, &tx.description);
        }
        index
    }

    pub fn insert(&mut self, date: NaiveDate, amount: Money, description: &str) {
        self.keys.insert((date, amount, description.to_string()));
    }

    /// Exact match on all three fields; the description is case-sensitive.
    #[must_use]
    pub fn contains(&self, candidate: &Candidate) -> bool {
        self.keys.contains(&(
            candidate.date,
            candidate.amount,
            candidate.description.clone(),
        ))
    }
}

fn summarize(rows: &[ImportRow], current_final_balance: &Loadable<Money>) -> ImportSummary {
    let mut summary = ImportSummary {
        import_total: Money::ZERO,
        projected_balance: Loadable::Pending,
        difference: Money::ZERO,
        ready: 0,
        duplicates: 0,
        invalid: 0,
        excluded: 0,
    };
    for row in rows {
        match (&row.status, &row.candidate) {
            (RowStatus::Ready, Some(candidate)) => {
                summary.ready += 1;
                summary.import_total += candidate.amount;
            }
            (RowStatus::Ready, None) | (RowStatus::Invalid(_), _) => summary.invalid += 1,
            (RowStatus::Duplicate, _) => summary.duplicates += 1,
            (RowStatus::Excluded, _) => summary.excluded += 1,
        }
    }
    let total = summary.import_total;
    summary.difference = total;
    summary.projected_balance = current_final_balance.clone().map(|balance| balance + total);
    summary
}

fn parse_candidate(
    cells: &[String],
    date_idx: usize,
    description_idx: usize,
    amount_idx: usize,
    date_format: &str,
    limit: Money,
) -> Result<Candidate, String> {
    let cell = |idx: usize, label: &str| {
        cells
            .get(idx)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| format!("missing {label}"))
    };

    let raw_date = cell(date_idx, "date")?;
    let date = NaiveDate::parse_from_str(raw_date, date_format)
        .map_err(|_| format!("date '{raw_date}' does not match the format"))?;
    let description = cell(description_idx, "description")?.to_string();
    let raw_amount = cell(amount_idx, "amount")?;
    let amount = Money::parse_with_limit(raw_amount, limit).map_err(|err| err.to_string())?;

    Ok(Candidate {
        date,
        amount,
        description,
    })
}

/// Resolves a column reference to a 0-based index.
fn resolve_column(reference: &str, header: Option<&[String]>) -> ResultEngine<usize> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(EngineError::Validation(
            "column reference must not be empty".to_string(),
        ));
    }
    if let Some(idx) = header.and_then(|cells| cells.iter().position(|cell| cell == reference)) {
        return Ok(idx);
    }
    if reference.chars().all(|c| c.is_ascii_alphabetic()) && reference.len() <= 3 {
        let idx = reference
            .chars()
            .map(|c| (c.to_ascii_uppercase() as usize) - ('A' as usize) + 1)
            .fold(0, |acc, digit| acc * 26 + digit);
        return Ok(idx - 1);
    }
    match reference.parse::<usize>() {
        Ok(idx) if idx >= 1 => Ok(idx - 1),
        _ => Err(EngineError::Validation(format!(
            "unknown column '{reference}'"
        ))),
    }
}

/// Converts a `DD/MM/YYYY` style pattern into a chrono format string.
fn chrono_format(pattern: &str) -> ResultEngine<String> {
    let pattern = pattern.trim();
    if pattern.contains('%') {
        return Ok(pattern.to_string());
    }

    let mut out = String::with_capacity(pattern.len());
    let (mut year, mut month, mut day) = (false, false, false);
    let mut rest = pattern;
    while !rest.is_empty() {
        let upper = rest.to_ascii_uppercase();
        let (token, width) = if upper.starts_with("YYYY") {
            year = true;
            ("%Y", 4)
        } else if upper.starts_with("YY") {
            year = true;
            ("%y", 2)
        } else if upper.starts_with("MM") {
            month = true;
            ("%m", 2)
        } else if upper.starts_with("DD") {
            day = true;
            ("%d", 2)
        } else {
            let len = rest.chars().next().map_or(1, char::len_utf8);
            out.push_str(&rest[..len]);
            rest = &rest[len..];
            continue;
        };
        out.push_str(token);
        rest = &rest[width..];
    }

    if !(year && month && day) {
        return Err(EngineError::Validation(format!(
            "date format '{pattern}' must contain year, month and day"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = "Date,Description,Amount\n\
        01/12/2023,Consulting Income,1500.00\n\
        02/12/2023,Software Subscription,-29.99\n";

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            date_column: "A".to_string(),
            description_column: "B".to_string(),
            amount_column: "C".to_string(),
            date_format: "DD/MM/YYYY".to_string(),
            rows: None,
            has_header: true,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn maps_statement_rows_into_candidates() {
        let upload = UploadedImport::from_csv(STATEMENT).unwrap();
        assert_eq!(
            upload.header().unwrap(),
            &["Date", "Description", "Amount"]
        );

        let mapped = upload.map(&mapping(), Money::DEFAULT_LIMIT).unwrap();
        let candidates: Vec<_> = mapped
            .rows()
            .iter()
            .map(|row| row.candidate.clone().unwrap())
            .collect();
        assert_eq!(candidates[0].date, date(2023, 12, 1));
        assert_eq!(candidates[0].amount, Money::new(150_000));
        assert_eq!(candidates[1].date, date(2023, 12, 2));
        assert_eq!(candidates[1].description, "Software Subscription");
        assert_eq!(mapped.rows()[1].line, 3);
    }

    #[test]
    fn empty_files_are_rejected() {
        assert!(matches!(
            UploadedImport::from_csv(""),
            Err(EngineError::EmptyImport(_))
        ));
        assert!(matches!(
            UploadedImport::from_csv("\n,,\n"),
            Err(EngineError::EmptyImport(_))
        ));
        let header_only = UploadedImport::from_csv("Date,Description,Amount\n").unwrap();
        assert!(matches!(
            header_only.map(&mapping(), Money::DEFAULT_LIMIT),
            Err(EngineError::EmptyImport(_))
        ));
    }

    #[test]
    fn bad_rows_are_marked_invalid_not_fatal() {
        let csv = "Date,Description,Amount\n\
            31/02/2023,Bad date,10\n\
            01/03/2023,,10\n\
            02/03/2023,Bad amount,1.2.3\n\
            03/03/2023,Short row\n\
            04/03/2023,Fine,\"1.234,56\"\n";
        let mapped = UploadedImport::from_csv(csv)
            .unwrap()
            .map(&mapping(), Money::DEFAULT_LIMIT)
            .unwrap();

        let statuses: Vec<_> = mapped.rows().iter().map(|row| row.error().is_some()).collect();
        assert_eq!(statuses, vec![true, true, true, true, false]);
        assert_eq!(mapped.rows()[1].error(), Some("missing description"));
        assert_eq!(
            mapped.rows()[4].candidate.as_ref().unwrap().amount,
            Money::new(123_456)
        );
    }

    #[test]
    fn row_range_excludes_but_keeps_rows() {
        let mut mapping = mapping();
        mapping.rows = Some(RowRange {
            start: 2,
            end: None,
        });
        let mapped = UploadedImport::from_csv(STATEMENT)
            .unwrap()
            .map(&mapping, Money::DEFAULT_LIMIT)
            .unwrap();

        assert_eq!(mapped.rows().len(), 2);
        assert_eq!(mapped.rows()[0].status, RowStatus::Excluded);
        assert!(mapped.rows()[0].candidate.is_none());
        assert_eq!(mapped.rows()[1].status, RowStatus::Ready);

        mapping.rows = Some(RowRange {
            start: 3,
            end: Some(2),
        });
        assert!(
            UploadedImport::from_csv(STATEMENT)
                .unwrap()
                .map(&mapping, Money::DEFAULT_LIMIT)
                .is_err()
        );
    }

    #[test]
    fn columns_resolve_by_header_letter_or_index() {
        let header = vec!["Data".to_string(), "Valor".to_string()];
        assert_eq!(resolve_column("Valor", Some(&header)).unwrap(), 1);
        assert_eq!(resolve_column("c", Some(&header)).unwrap(), 2);
        assert_eq!(resolve_column("AB", None).unwrap(), 27);
        assert_eq!(resolve_column("2", None).unwrap(), 1);
        assert!(resolve_column("0", None).is_err());
        assert!(resolve_column("Amount!", None).is_err());
    }

    #[test]
    fn date_tokens_translate_to_chrono() {
        assert_eq!(chrono_format("DD/MM/YYYY").unwrap(), "%d/%m/%Y");
        assert_eq!(chrono_format("yyyy-mm-dd").unwrap(), "%Y-%m-%d");
        assert_eq!(chrono_format("DD.MM.YY").unwrap(), "%d.%m.%y");
        assert_eq!(chrono_format("%d %b %Y").unwrap(), "%d %b %Y");
        assert!(chrono_format("MM/YYYY").is_err());
    }

    #[test]
    fn review_flags_exact_duplicates_only() {
        let mapped = UploadedImport::from_csv(STATEMENT)
            .unwrap()
            .map(&mapping(), Money::DEFAULT_LIMIT)
            .unwrap();

        let mut index = DuplicateIndex::default();
        index.insert(date(2023, 12, 1), Money::new(150_000), "Consulting Income");
        index.insert(date(2023, 12, 2), Money::new(-2999), "software subscription");

        let reviewed = mapped
            .review(&index, &Loadable::Ready(Money::new(10_000)))
            .unwrap();
        assert_eq!(reviewed.rows()[0].status, RowStatus::Duplicate);
        assert_eq!(reviewed.rows()[1].status, RowStatus::Ready);

        let summary = reviewed.summary();
        assert_eq!(summary.ready, 1);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.import_total, Money::new(-2999));
        assert_eq!(summary.difference, Money::new(-2999));
        assert_eq!(summary.projected_balance, Loadable::Ready(Money::new(7001)));
        assert!(summary.can_commit());
        assert_eq!(reviewed.commit_set().count(), 1);
    }

    #[test]
    fn pending_balance_blocks_commit() {
        let reviewed = UploadedImport::from_csv(STATEMENT)
            .unwrap()
            .map(&mapping(), Money::DEFAULT_LIMIT)
            .unwrap()
            .review(&DuplicateIndex::default(), &Loadable::Pending)
            .unwrap();

        assert_eq!(reviewed.summary().projected_balance, Loadable::Pending);
        assert_eq!(reviewed.summary().import_total, Money::new(147_001));
        assert!(!reviewed.summary().can_commit());
    }

    #[test]
    fn review_without_parsable_rows_keeps_row_errors() {
        let mut mapping = mapping();
        mapping.date_format = "YYYY-MM-DD".to_string();
        let reviewed = UploadedImport::from_csv(STATEMENT)
            .unwrap()
            .map(&mapping, Money::DEFAULT_LIMIT)
            .unwrap()
            .review(&DuplicateIndex::default(), &Loadable::Ready(Money::ZERO))
            .unwrap();

        assert_eq!(reviewed.rows().len(), 2);
        assert_eq!(
            reviewed.rows()[0].error(),
            Some("date '01/12/2023' does not match the format")
        );
        let summary = reviewed.summary();
        assert_eq!(summary.invalid, 2);
        assert_eq!(summary.ready, 0);
        assert_eq!(summary.import_total, Money::ZERO);
        assert!(!summary.can_commit());
        assert_eq!(reviewed.commit_set().count(), 0);
    }

    #[test]
    fn back_keeps_the_file() {
        let upload = UploadedImport::from_csv(STATEMENT).unwrap();
        let reviewed = upload
            .map(&mapping(), Money::DEFAULT_LIMIT)
            .unwrap()
            .review(&DuplicateIndex::default(), &Loadable::Ready(Money::ZERO))
            .unwrap();
        let restored = reviewed.back().back();
        assert_eq!(restored, upload);
    }
}
