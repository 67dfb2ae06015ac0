// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP API routes.

pub mod error;
pub mod maintenance;
pub mod print;
pub mod scan;
pub mod status;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::services::app_services::AppServices;
use error::ApiError;

/// Largest accepted request body (print uploads).
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Assemble the API router over `services`.
pub fn build_router(services: AppServices) -> Router {
    Router::new()
        .route("/api/status", get(status::printer_status))
        .route("/api/print", post(print::submit))
        .route("/api/print/status", get(print::job_status))
        .route("/api/scan", post(scan::start_scan))
        .route("/api/scan/status", get(scan::scan_status))
        .route("/api/scan/preview", get(scan::preview))
        .route("/api/scan/download", post(scan::download))
        .route(
            "/api/maintenance/head-cleaning",
            get(maintenance::cleaning_options).post(maintenance::head_cleaning),
        )
        .route(
            "/api/maintenance/virtualhere",
            get(maintenance::usb_status).post(maintenance::usb_action),
        )
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
