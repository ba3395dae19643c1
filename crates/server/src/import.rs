//! CSV import endpoints.
//!
//! The server keeps no import session: both endpoints receive the file and
//! the mapping, and `POST /import` reviews again right before committing.

use api_types::import::{
    CandidateView, ImportCommitted, ImportPreview, ImportRequest, ImportRowView,
    ImportSummaryView, RowStatus,
};
use axum::{Json, extract::State, http::StatusCode};
use engine::{ColumnMapping, Engine, Locale, ResultEngine, ReviewedImport, RowRange, UploadedImport};

use crate::{ServerError, server::ServerState, views};

fn column_mapping(mapping: api_types::import::ColumnMapping) -> ColumnMapping {
    ColumnMapping {
        date_column: mapping.date_column,
        description_column: mapping.description_column,
        amount_column: mapping.amount_column,
        date_format: mapping.date_format,
        rows: mapping.rows.map(|range| RowRange {
            start: range.start,
            end: range.end,
        }),
        has_header: mapping.has_header.unwrap_or(true),
    }
}

async fn reviewed(engine: &Engine, request: ImportRequest) -> ResultEngine<ReviewedImport> {
    let upload = UploadedImport::from_csv(&request.csv)?;
    let mapped = engine.map_import(&upload, &column_mapping(request.mapping))?;
    engine.review_import(mapped).await
}

fn preview_view(reviewed: &ReviewedImport, locale: Locale) -> ImportPreview {
    let rows = reviewed
        .rows()
        .iter()
        .map(|row| ImportRowView {
            line: row.line,
            row: row.row,
            cells: row.cells.clone(),
            status: match row.status {
                engine::RowStatus::Ready => RowStatus::Ready,
                engine::RowStatus::Excluded => RowStatus::Excluded,
                engine::RowStatus::Invalid(_) => RowStatus::Invalid,
                engine::RowStatus::Duplicate => RowStatus::Duplicate,
            },
            error: row.error().map(str::to_string),
            candidate: row.candidate.as_ref().map(|candidate| CandidateView {
                date: candidate.date,
                amount: views::money(candidate.amount, locale),
                description: candidate.description.clone(),
            }),
        })
        .collect();

    let summary = reviewed.summary();
    ImportPreview {
        rows,
        summary: ImportSummaryView {
            import_total: views::money(summary.import_total, locale),
            projected_balance: summary
                .projected_balance
                .as_ref()
                .ready()
                .map(|amount| views::money(*amount, locale)),
            difference: views::money(summary.difference, locale),
            ready: summary.ready,
            duplicates: summary.duplicates,
            invalid: summary.invalid,
            excluded: summary.excluded,
            can_commit: summary.can_commit(),
        },
    }
}

pub async fn preview(
    State(state): State<ServerState>,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<ImportPreview>, ServerError> {
    let reviewed = reviewed(&state.engine, payload).await?;
    Ok(Json(preview_view(&reviewed, state.locale)))
}

pub async fn commit(
    State(state): State<ServerState>,
    Json(payload): Json<ImportRequest>,
) -> Result<(StatusCode, Json<ImportCommitted>), ServerError> {
    let report = state
        .mutate(move |engine| async move {
            let reviewed = reviewed(&engine, payload).await?;
            engine.commit_import(&reviewed).await
        })
        .await?;
    tracing::info!(committed = report.committed.len(), "import committed");

    Ok((
        StatusCode::CREATED,
        Json(ImportCommitted {
            committed: report.committed,
        }),
    ))
}
