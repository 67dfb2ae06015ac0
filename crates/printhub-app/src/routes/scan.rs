// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// POST /api/scan            run one scan
// GET  /api/scan/status     scan metadata
// GET  /api/scan/preview    cached JPEG thumbnail
// POST /api/scan/download   one file, merged PDF or ZIP of several pages

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use printhub_core::error::PrinthubError;
use printhub_core::types::{ScanFormat, ScanId, ScanSettings};

use super::error::ApiError;
use crate::services::app_services::AppServices;

const SCAN_NOT_FOUND: &str = "Scan job not found";

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
}

impl ScanQuery {
    /// The requested job; ids that are not UUIDs are rejected outright.
    fn scan_id(&self) -> Result<ScanId, ApiError> {
        let raw = self
            .job_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::bad_request("Job ID is required"))?;
        ScanId::parse(raw).map_err(|e| ApiError::from_backend(e, "Invalid job ID"))
    }
}

/// Backend error for a single named job: any "not found" gets the fixed
/// message, everything else is a 500.
fn job_error(err: PrinthubError, summary: &str) -> ApiError {
    match err {
        PrinthubError::NotFound(_) => ApiError::not_found(SCAN_NOT_FOUND),
        other => ApiError::from_backend(other, summary),
    }
}

/// Scan one page with the requested settings.
pub async fn start_scan(
    State(svc): State<AppServices>,
    payload: Result<Json<ScanSettings>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(settings) = payload?;
    let format = settings.format;

    let record = svc
        .scanner()
        .scan(settings)
        .await
        .map_err(|e| ApiError::from_backend(e, "Failed to scan document"))?;

    info!(job_id = %record.job_id, bytes = record.file_size, "scan request completed");
    Ok(Json(json!({
        "success": true,
        "jobId": record.job_id,
        "format": format,
        "fileSize": record.file_size,
        "message": "Scan completed successfully",
    })))
}

/// Metadata of a finished scan.
pub async fn scan_status(
    State(svc): State<AppServices>,
    query: Result<Query<ScanQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let id = query.scan_id()?;

    let record = svc
        .scanner()
        .store()
        .load_record(id)
        .await
        .map_err(|e| job_error(e, "Failed to get job status"))?;

    Ok(Json(json!({
        "jobId": record.job_id,
        "status": "completed",
        "timestamp": record.timestamp,
        "settings": record.settings,
        "fileSize": record.file_size,
        "previewUrl": format!("/api/scan/preview?jobId={}", record.job_id),
    })))
}

/// JPEG preview of a scan's first page.
pub async fn preview(
    State(svc): State<AppServices>,
    query: Result<Query<ScanQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let id = query.scan_id()?;

    let bytes = svc
        .previews()
        .preview(id)
        .await
        .map_err(|e| job_error(e, "Failed to get preview"))?;

    debug!(job_id = %id, bytes = bytes.len(), "serving preview");
    Ok((
        [
            (CONTENT_TYPE, "image/jpeg"),
            (CACHE_CONTROL, "public, max-age=86400"),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(default)]
    pub page_ids: Option<Vec<String>>,
    #[serde(default)]
    pub format: Option<ScanFormat>,
}

/// Bundle one or more scanned pages into a single download.
pub async fn download(
    State(svc): State<AppServices>,
    payload: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let raw_ids = request
        .page_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::bad_request("Valid page IDs are required"))?;
    let ids = raw_ids
        .iter()
        .map(|raw| ScanId::parse(raw))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::from_backend(e, "Invalid page ID"))?;

    let download = svc
        .bundler()
        .bundle(&ids, request.format)
        .await
        .map_err(|e| ApiError::from_backend(e, "Failed to download file"))?;

    info!(
        pages = ids.len(),
        filename = %download.filename,
        bytes = download.bytes.len(),
        "download prepared"
    );
    let disposition = format!("attachment; filename=\"{}\"", download.filename);
    Ok((
        [
            (CONTENT_TYPE, download.content_type.to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}
