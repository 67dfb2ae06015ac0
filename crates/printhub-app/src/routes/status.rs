// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// GET /api/status

use axum::Json;
use axum::extract::State;
use tracing::warn;

use printhub_core::types::PrinterStatus;

use crate::services::app_services::AppServices;

/// Printer dashboard snapshot.  An unreachable printer is still a 200: the
/// snapshot itself says so.
pub async fn printer_status(State(svc): State<AppServices>) -> Json<PrinterStatus> {
    match svc.printer_status().await {
        Ok(status) => Json(status),
        Err(e) => {
            warn!(error = %e, "printer status unavailable");
            Json(PrinterStatus::unreachable(&e.to_string()))
        }
    }
}
