// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// POST /api/print          multipart upload, submitted with `lp`
// GET  /api/print/status   job lookup via `lpstat`

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use printhub_core::types::PrintSettings;

use super::error::ApiError;
use crate::services::app_services::AppServices;

/// Name used when the upload carries no file name.
const UNNAMED_UPLOAD: &str = "document";

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Submit an uploaded document to the CUPS queue.
pub async fn submit(
    State(svc): State<AppServices>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload = None;
    let mut settings = PrintSettings::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or(UNNAMED_UPLOAD).to_string();
                let bytes = field.bytes().await?.to_vec();
                upload = Some(Upload { file_name, bytes });
            }
            Some("settings") => {
                let text = field.text().await?;
                settings = serde_json::from_str(&text).map_err(|e| {
                    ApiError::bad_request(format!("Invalid print settings: {e}"))
                })?;
            }
            _ => {}
        }
    }

    let Some(upload) = upload else {
        error!("no file provided in the request");
        return Err(ApiError::bad_request("No file provided"));
    };

    let job_id = svc
        .cups()
        .print_upload(&upload.file_name, &upload.bytes, &settings)
        .await
        .map_err(|e| {
            error!(error = %e, "print job failed");
            ApiError::internal("Failed to process print job", e)
        })?;

    info!(job_id = %job_id, "print request accepted");
    Ok(Json(json!({
        "success": true,
        "jobId": job_id,
        "message": "Print job submitted successfully",
    })))
}

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    #[serde(rename = "jobId")]
    pub job_id: Option<String>,
}

/// Status of one job, or the printer overview when no job is named.
pub async fn job_status(
    State(svc): State<AppServices>,
    query: Result<Query<JobQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let summary = "Failed to get print job status";

    match query.job_id.filter(|id| !id.is_empty()) {
        None => {
            let overview = svc
                .cups()
                .printer_overview()
                .await
                .map_err(|e| ApiError::from_backend(e, summary))?;
            Ok(Json(json!({ "printerStatus": overview, "status": "idle" })))
        }
        Some(job_id) => {
            let report = svc
                .cups()
                .job_status(&job_id)
                .await
                .map_err(|e| ApiError::from_backend(e, summary))?;
            Ok(Json(json!(report)))
        }
    }
}
