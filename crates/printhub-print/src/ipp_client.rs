// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP status client for the dashboard.
//
// Sends Get-Printer-Attributes (RFC 8011 §4.2.5) for a fixed attribute set
// and folds the answer into a `PrinterStatus` snapshot.  Extraction and
// summarization are separate so the summary rules can be tested without a
// printer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use ipp::prelude::*;
use tracing::{debug, error, instrument};

use printhub_core::error::{PrinthubError, Result};
use printhub_core::types::{InkLevels, PrinterActivity, PrinterStatus, QueuedJob};

/// Attributes requested from the printer.
pub const STATUS_ATTRIBUTES: [&str; 15] = [
    "marker-levels",
    "marker-names",
    "queued-job-count",
    "printer-state",
    "printer-state-reasons",
    "printer-is-accepting-jobs",
    "printer-name",
    "printer-info",
    "printer-alert",
    "printer-alert-description",
    "printer-up-time",
    "printer-location",
    "printer-make-and-model",
    "printer-more-info",
    "media-ready",
];

/// Marker level reported when the printer cannot tell.
const LEVEL_UNKNOWN: i32 = -2;

/// Upper bound on placeholder entries built from `queued-job-count`.
pub const MAX_QUEUED_JOBS: u32 = 100;

/// The subset of printer attributes the dashboard cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusAttributes {
    pub marker_levels: Vec<i32>,
    pub marker_names: Vec<String>,
    pub queued_job_count: u32,
    /// `idle`, `processing`, `stopped` or `unknown`.
    pub printer_state: String,
    pub state_reasons: Vec<String>,
    pub is_accepting_jobs: bool,
    pub printer_name: String,
    pub printer_info: String,
    pub printer_location: String,
    pub printer_model: String,
    pub printer_up_time: i64,
    pub printer_more_info: String,
    pub printer_alert: String,
    pub printer_alert_description: String,
    pub media_ready: Vec<String>,
}

impl Default for StatusAttributes {
    fn default() -> Self {
        Self {
            marker_levels: vec![LEVEL_UNKNOWN; 4],
            marker_names: Vec::new(),
            queued_job_count: 0,
            printer_state: "unknown".into(),
            state_reasons: Vec::new(),
            is_accepting_jobs: false,
            printer_name: String::new(),
            printer_info: String::new(),
            printer_location: String::new(),
            printer_model: String::new(),
            printer_up_time: 0,
            printer_more_info: String::new(),
            printer_alert: String::new(),
            printer_alert_description: String::new(),
            media_ready: Vec::new(),
        }
    }
}

impl StatusAttributes {
    /// Pull the status attributes out of a Get-Printer-Attributes response.
    pub fn from_ipp(attrs: &IppAttributes) -> Self {
        let mut out = Self::default();

        for group in attrs.groups_of(DelimiterTag::PrinterAttributes) {
            for (name, attr) in group.attributes() {
                let value = attr.value();
                match name.as_str() {
                    "marker-levels" => out.marker_levels = integers(value),
                    "marker-names" => out.marker_names = texts(value),
                    "queued-job-count" => {
                        out.queued_job_count = first_integer(value)
                            .and_then(|n| u32::try_from(n).ok())
                            .unwrap_or(0)
                    }
                    "printer-state" => {
                        out.printer_state = first_integer(value)
                            .map(printer_state_keyword)
                            .unwrap_or("unknown")
                            .to_string()
                    }
                    "printer-state-reasons" => out.state_reasons = texts(value),
                    "printer-is-accepting-jobs" => {
                        out.is_accepting_jobs = matches!(value, IppValue::Boolean(true))
                    }
                    "printer-name" => out.printer_name = value.to_string(),
                    "printer-info" => out.printer_info = value.to_string(),
                    "printer-location" => out.printer_location = value.to_string(),
                    "printer-make-and-model" => out.printer_model = value.to_string(),
                    "printer-up-time" => {
                        out.printer_up_time = first_integer(value).map(i64::from).unwrap_or(0)
                    }
                    "printer-more-info" => out.printer_more_info = value.to_string(),
                    "printer-alert" => out.printer_alert = texts(value).join(", "),
                    "printer-alert-description" => {
                        out.printer_alert_description = texts(value).join(", ")
                    }
                    "media-ready" => out.media_ready = texts(value),
                    _ => {}
                }
            }
        }
        out
    }
}

/// Fold raw attributes into the dashboard snapshot.
pub fn summarize(attrs: &StatusAttributes, now: DateTime<Utc>) -> PrinterStatus {
    let ink_levels = InkLevels {
        black: ink_level(attrs, "BK", 3),
        cyan: ink_level(attrs, "C", 1),
        magenta: ink_level(attrs, "M", 0),
        yellow: ink_level(attrs, "Y", 2),
    };

    let reasons = if attrs.state_reasons.is_empty() {
        "none".to_string()
    } else {
        attrs.state_reasons.join(", ")
    };

    let mut status = match attrs.printer_state.as_str() {
        "processing" => PrinterActivity::Printing,
        "stopped" => PrinterActivity::Error,
        _ => PrinterActivity::Idle,
    };
    if attrs
        .printer_alert_description
        .to_lowercase()
        .contains("cleaning")
    {
        status = PrinterActivity::Maintenance;
    }

    let message = if !attrs.printer_alert_description.is_empty() {
        attrs.printer_alert_description.clone()
    } else if reasons != "none" {
        reasons.clone()
    } else {
        "Printer ready".to_string()
    };

    let job_queue = (1..=attrs.queued_job_count.min(MAX_QUEUED_JOBS))
        .map(|i| QueuedJob {
            id: i,
            name: format!("Job {i}"),
        })
        .collect();

    PrinterStatus {
        progress: if attrs.printer_state == "processing" { 50 } else { 0 },
        ink_levels,
        job_queue,
        status,
        message,
        printer_state: attrs.printer_state.clone(),
        printer_state_reasons: reasons,
        is_accepting_jobs: attrs.is_accepting_jobs,
        printer_name: attrs.printer_name.clone(),
        printer_info: attrs.printer_info.clone(),
        printer_location: attrs.printer_location.clone(),
        printer_model: attrs.printer_model.clone(),
        printer_up_time: attrs.printer_up_time,
        printer_more_info: attrs.printer_more_info.clone(),
        printer_alert: attrs.printer_alert.clone(),
        printer_alert_description: attrs.printer_alert_description.clone(),
        media_ready: attrs.media_ready.clone(),
        last_updated: now,
    }
}

/// Async IPP client bound to one printer URI.
#[derive(Debug, Clone)]
pub struct IppClient {
    uri: Uri,
    timeout: Duration,
}

impl IppClient {
    /// Create a client for an `ipp://` or `ipps://` URI.
    ///
    /// `timeout` bounds each whole request, so a printer that accepts the
    /// connection but never answers still fails.
    pub fn new(uri: &str, timeout: Duration) -> Result<Self> {
        let parsed: Uri = uri
            .parse()
            .map_err(|e| PrinthubError::IppRequest(format!("invalid URI '{uri}': {e}")))?;
        Ok(Self { uri: parsed, timeout })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Query the printer and return the raw status attributes.
    #[instrument(skip(self), fields(uri = %self.uri))]
    pub async fn get_printer_attributes(&self) -> Result<StatusAttributes> {
        let operation = IppOperationBuilder::get_printer_attributes(self.uri.clone())
            .attributes(&STATUS_ATTRIBUTES[..])
            .build();
        let client = AsyncIppClient::builder(self.uri.clone())
            .request_timeout(self.timeout)
            .build();

        debug!("sending Get-Printer-Attributes");
        let response = client
            .send(operation)
            .await
            .map_err(|e| PrinthubError::IppRequest(format!("Get-Printer-Attributes: {e}")))?;

        if !response.header().status_code().is_success() {
            let code = response.header().status_code();
            error!(status = ?code, "Get-Printer-Attributes failed");
            return Err(PrinthubError::IppRequest(format!(
                "Get-Printer-Attributes returned status {code:?}"
            )));
        }

        let attrs = StatusAttributes::from_ipp(response.attributes());
        debug!(state = %attrs.printer_state, queued = attrs.queued_job_count, "received printer attributes");
        Ok(attrs)
    }

    /// Query the printer and summarize the answer for the dashboard.
    pub async fn printer_status(&self) -> Result<PrinterStatus> {
        let attrs = self.get_printer_attributes().await?;
        Ok(summarize(&attrs, Utc::now()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ink_level(attrs: &StatusAttributes, name: &str, fallback_index: usize) -> u8 {
    let index = attrs
        .marker_names
        .iter()
        .position(|n| n == name)
        .unwrap_or(fallback_index);
    normalize_level(attrs.marker_levels.get(index).copied().unwrap_or(LEVEL_UNKNOWN))
}

/// Map a raw `marker-levels` entry onto 0-100; -2 and -3 mean "unknown".
pub fn normalize_level(raw: i32) -> u8 {
    match raw {
        -3 | -2 => 0,
        level => level.clamp(0, 100) as u8,
    }
}

/// RFC 8011 §5.4.11 printer-state enum.
fn printer_state_keyword(value: i32) -> &'static str {
    match value {
        3 => "idle",
        4 => "processing",
        5 => "stopped",
        _ => "unknown",
    }
}

fn integers(value: &IppValue) -> Vec<i32> {
    match value {
        IppValue::Integer(n) | IppValue::Enum(n) => vec![*n],
        IppValue::Array(items) => items.iter().flat_map(integers).collect(),
        _ => Vec::new(),
    }
}

fn first_integer(value: &IppValue) -> Option<i32> {
    integers(value).into_iter().next()
}

fn texts(value: &IppValue) -> Vec<String> {
    match value {
        IppValue::Array(items) => items.iter().map(|v| v.to_string()).collect(),
        other => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_printer() -> StatusAttributes {
        StatusAttributes {
            marker_levels: vec![60, 70, 80, 90],
            marker_names: vec!["M".into(), "C".into(), "Y".into(), "BK".into()],
            printer_state: "idle".into(),
            is_accepting_jobs: true,
            printer_name: "Brother_MFC".into(),
            ..StatusAttributes::default()
        }
    }

    #[test]
    fn new_rejects_invalid_uri() {
        assert!(IppClient::new("not a valid uri %%%", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn new_accepts_valid_ipp_uri() {
        assert!(IppClient::new("ipp://192.168.1.100:631/ipp/print", Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn ink_levels_follow_marker_names() {
        let mut attrs = ready_printer();
        attrs.marker_names = vec!["BK".into(), "Y".into(), "M".into(), "C".into()];
        let status = summarize(&attrs, Utc::now());
        assert_eq!(status.ink_levels.black, 60);
        assert_eq!(status.ink_levels.yellow, 70);
        assert_eq!(status.ink_levels.magenta, 80);
        assert_eq!(status.ink_levels.cyan, 90);
    }

    #[test]
    fn ink_levels_fall_back_to_positions() {
        let mut attrs = ready_printer();
        attrs.marker_names.clear();
        let status = summarize(&attrs, Utc::now());
        // M C Y BK order
        assert_eq!(status.ink_levels.magenta, 60);
        assert_eq!(status.ink_levels.cyan, 70);
        assert_eq!(status.ink_levels.yellow, 80);
        assert_eq!(status.ink_levels.black, 90);
    }

    #[test]
    fn unknown_and_out_of_range_levels_are_normalized() {
        assert_eq!(normalize_level(-2), 0);
        assert_eq!(normalize_level(-3), 0);
        assert_eq!(normalize_level(-1), 0);
        assert_eq!(normalize_level(140), 100);
        assert_eq!(normalize_level(42), 42);
    }

    #[test]
    fn missing_levels_default_to_zero() {
        let status = summarize(&StatusAttributes::default(), Utc::now());
        assert_eq!(status.ink_levels, InkLevels::default());
    }

    #[test]
    fn idle_printer_is_ready() {
        let status = summarize(&ready_printer(), Utc::now());
        assert_eq!(status.status, PrinterActivity::Idle);
        assert_eq!(status.progress, 0);
        assert_eq!(status.message, "Printer ready");
        assert_eq!(status.printer_state_reasons, "none");
        assert!(status.is_accepting_jobs);
    }

    #[test]
    fn processing_printer_is_printing_with_progress() {
        let mut attrs = ready_printer();
        attrs.printer_state = "processing".into();
        let status = summarize(&attrs, Utc::now());
        assert_eq!(status.status, PrinterActivity::Printing);
        assert_eq!(status.progress, 50);
    }

    #[test]
    fn stopped_printer_is_error_and_reports_reasons() {
        let mut attrs = ready_printer();
        attrs.printer_state = "stopped".into();
        attrs.state_reasons = vec!["media-empty-error".into(), "door-open".into()];
        let status = summarize(&attrs, Utc::now());
        assert_eq!(status.status, PrinterActivity::Error);
        assert_eq!(status.message, "media-empty-error, door-open");
    }

    #[test]
    fn cleaning_alert_means_maintenance() {
        let mut attrs = ready_printer();
        attrs.printer_state = "processing".into();
        attrs.printer_alert_description = "Head Cleaning in progress".into();
        let status = summarize(&attrs, Utc::now());
        assert_eq!(status.status, PrinterActivity::Maintenance);
        assert_eq!(status.message, "Head Cleaning in progress");
    }

    #[test]
    fn queued_jobs_become_placeholder_entries() {
        let mut attrs = ready_printer();
        attrs.queued_job_count = 2;
        let status = summarize(&attrs, Utc::now());
        assert_eq!(
            status.job_queue,
            vec![
                QueuedJob { id: 1, name: "Job 1".into() },
                QueuedJob { id: 2, name: "Job 2".into() },
            ]
        );
    }

    #[test]
    fn huge_queued_job_count_is_capped() {
        let mut attrs = ready_printer();
        attrs.queued_job_count = u32::MAX;
        let status = summarize(&attrs, Utc::now());
        assert_eq!(status.job_queue.len(), MAX_QUEUED_JOBS as usize);
        assert_eq!(status.job_queue.last().map(|j| j.id), Some(MAX_QUEUED_JOBS));
    }

    #[tokio::test]
    async fn silent_printer_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept connections and hold them open without ever replying.
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = IppClient::new(
            &format!("ipp://127.0.0.1:{port}/ipp/print"),
            Duration::from_millis(500),
        )
        .unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(10), client.printer_status()).await;
        holder.abort();

        let result = outcome.expect("status call must not hang");
        assert!(matches!(result, Err(PrinthubError::IppRequest(_))));
    }

    #[test]
    fn numeric_attributes_are_extracted_from_ipp() {
        let mut attrs = IppAttributes::new();
        attrs.add(
            DelimiterTag::PrinterAttributes,
            IppAttribute::new(
                "marker-levels",
                IppValue::Array(vec![
                    IppValue::Integer(10),
                    IppValue::Integer(20),
                    IppValue::Integer(-2),
                    IppValue::Integer(40),
                ]),
            ),
        );
        attrs.add(
            DelimiterTag::PrinterAttributes,
            IppAttribute::new("printer-state", IppValue::Enum(4)),
        );
        attrs.add(
            DelimiterTag::PrinterAttributes,
            IppAttribute::new("queued-job-count", IppValue::Integer(3)),
        );
        attrs.add(
            DelimiterTag::PrinterAttributes,
            IppAttribute::new("printer-is-accepting-jobs", IppValue::Boolean(true)),
        );

        let extracted = StatusAttributes::from_ipp(&attrs);
        assert_eq!(extracted.marker_levels, vec![10, 20, -2, 40]);
        assert_eq!(extracted.printer_state, "processing");
        assert_eq!(extracted.queued_job_count, 3);
        assert!(extracted.is_accepting_jobs);

        let status = summarize(&extracted, Utc::now());
        assert_eq!(status.ink_levels.yellow, 0);
        assert_eq!(status.job_queue.len(), 3);
    }
}
