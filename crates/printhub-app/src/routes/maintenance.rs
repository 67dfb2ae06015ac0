// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// GET  /api/maintenance/head-cleaning   cleaning catalog
// POST /api/maintenance/head-cleaning   run a cleaning through the web console
// GET  /api/maintenance/virtualhere     USB-sharing unit states
// POST /api/maintenance/virtualhere     start / stop VirtualHere

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use printhub_core::types::{CleaningOption, CleaningType, ServiceAction, UsbSharingStatus};
use printhub_print::{CleaningStep, MaintenanceError, SessionCookie};

use super::error::ApiError;
use crate::services::app_services::AppServices;

/// Cookie carrying the printer session back to the browser.
pub const SESSION_COOKIE_NAME: &str = "printerAuthCookie";

#[derive(Debug, Deserialize)]
pub struct CleaningRequest {
    #[serde(rename = "type")]
    pub kind: CleaningType,
}

/// Every cleaning the printer offers.
pub async fn cleaning_options() -> Json<Vec<CleaningOption>> {
    Json(CleaningType::ALL.iter().map(|t| t.option()).collect())
}

/// Run the head-cleaning sequence for the requested type.
pub async fn head_cleaning(
    State(svc): State<AppServices>,
    payload: Result<Json<CleaningRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    let session = svc.run_head_cleaning(request.kind).await.map_err(|e| {
        error!(error = %e, cleaning_type = %request.kind, "head cleaning failed");
        cleaning_error(&e)
    })?;

    info!(cleaning_type = %request.kind, "head cleaning started");
    let cookie = session_cookie(&session, svc.config().secure_cookies);
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({ "success": true, "message": "Head cleaning started" })),
    )
        .into_response())
}

/// HTTP answer for a failed cleaning sequence, by the step that failed.
pub fn cleaning_error(err: &MaintenanceError) -> ApiError {
    let message = match err.step() {
        Some(CleaningStep::Authenticate) => {
            return ApiError::new(StatusCode::UNAUTHORIZED, "Failed to authenticate with printer");
        }
        Some(CleaningStep::FetchToken) => "Failed to get initial CSRF token",
        Some(CleaningStep::Initiate) => "Failed to initiate head cleaning",
        Some(CleaningStep::Confirm) => {
            "Failed to get the refresh CSRF token after confirming head cleaning"
        }
        Some(CleaningStep::Finalize) => "Failed to confirm head cleaning",
        None => "Failed to start head cleaning",
    };
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
}

/// `Set-Cookie` value handing the printer session to the browser.
pub fn session_cookie(session: &SessionCookie, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly", session.value());
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// State of the VirtualHere and ipp-usb units.
pub async fn usb_status(State(svc): State<AppServices>) -> Result<Json<UsbSharingStatus>, ApiError> {
    svc.usb_sharing().status().await.map(Json).map_err(|e| {
        error!(error = %e, "service status check failed");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to check service status: {e}"),
        )
    })
}

#[derive(Debug, Deserialize)]
pub struct ServiceRequest {
    #[serde(default)]
    pub action: Option<String>,
}

/// Hand the USB port to VirtualHere or back to ipp-usb.
pub async fn usb_action(
    State(svc): State<AppServices>,
    payload: Result<Json<ServiceRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let action = match request.action.as_deref() {
        Some("start") => ServiceAction::Start,
        Some("stop") => ServiceAction::Stop,
        _ => return Err(ApiError::bad_request("Invalid action. Must be 'start' or 'stop'")),
    };

    let message = svc.usb_sharing().apply(action).await.map_err(|e| {
        error!(error = %e, ?action, "VirtualHere service management failed");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to manage VirtualHere service: {e}"),
        )
    })?;

    Ok(Json(json!({ "success": true, "message": message, "action": action })))
}
