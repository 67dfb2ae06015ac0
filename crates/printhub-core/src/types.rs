// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the printhub server.
//
// Field names follow the JSON shapes the browser UI exchanges with the API,
// hence the camelCase renames.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PrinthubError, Result};

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// Head-cleaning variant understood by the printer's management console.
///
/// The discriminant is sent verbatim as the `btn_def` form field and is also
/// the numeric suffix of the page's initial CSRF element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum CleaningType {
    BlackNormal = 1,
    BlackStrong = 2,
    BlackStrongest = 3,
    ColorNormal = 4,
    ColorStrong = 5,
    ColorStrongest = 6,
    AllNormal = 7,
    AllStrong = 8,
    AllStrongest = 9,
    Special = 10,
}

impl CleaningType {
    /// Every variant in display order.
    pub const ALL: [CleaningType; 10] = [
        Self::BlackNormal,
        Self::BlackStrong,
        Self::BlackStrongest,
        Self::ColorNormal,
        Self::ColorStrong,
        Self::ColorStrongest,
        Self::AllNormal,
        Self::AllStrong,
        Self::AllStrongest,
        Self::Special,
    ];

    /// Integer code sent to the printer.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Catalog entry shown to users before they start a cleaning cycle.
    pub fn option(self) -> CleaningOption {
        let (label, description, duration_ms, ink_usage) = match self {
            Self::BlackNormal => (
                "Black only - Normal",
                "Standard cleaning for black print head",
                15_000,
                InkUsage::Low,
            ),
            Self::BlackStrong => (
                "Black only - Strong",
                "Intensive cleaning for black print head",
                20_000,
                InkUsage::Medium,
            ),
            Self::BlackStrongest => (
                "Black only - Strongest",
                "Deep cleaning for black print head",
                30_000,
                InkUsage::High,
            ),
            Self::ColorNormal => (
                "Color only - Normal",
                "Standard cleaning for color print heads",
                15_000,
                InkUsage::Low,
            ),
            Self::ColorStrong => (
                "Color only - Strong",
                "Intensive cleaning for color print heads",
                20_000,
                InkUsage::Medium,
            ),
            Self::ColorStrongest => (
                "Color only - Strongest",
                "Deep cleaning for color print heads",
                30_000,
                InkUsage::High,
            ),
            Self::AllNormal => (
                "All - Normal",
                "Standard cleaning for all print heads",
                15_000,
                InkUsage::Medium,
            ),
            Self::AllStrong => (
                "All - Strong",
                "Intensive cleaning for all print heads",
                25_000,
                InkUsage::High,
            ),
            Self::AllStrongest => (
                "All - Strongest",
                "Deep cleaning for all print heads",
                35_000,
                InkUsage::VeryHigh,
            ),
            Self::Special => (
                "Special Cleaning",
                "Special cleaning sequence for severe clogs",
                40_000,
                InkUsage::VeryHigh,
            ),
        };
        CleaningOption {
            id: self,
            label,
            description,
            duration_ms,
            ink_usage,
        }
    }
}

impl TryFrom<u8> for CleaningType {
    type Error = String;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown cleaning type {code} (expected 1-10)"))
    }
}

impl From<CleaningType> for u8 {
    fn from(t: CleaningType) -> Self {
        t.code()
    }
}

impl std::fmt::Display for CleaningType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Relative ink consumption of a cleaning cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InkUsage {
    Low,
    Medium,
    High,
    VeryHigh,
}

/// A selectable cleaning cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningOption {
    pub id: CleaningType,
    pub label: &'static str,
    pub description: &'static str,
    /// Expected run time on the printer, in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    pub ink_usage: InkUsage,
}

// ---------------------------------------------------------------------------
// USB sharing services
// ---------------------------------------------------------------------------

/// Action requested for the VirtualHere USB-sharing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
}

/// State of one systemd unit as reported by `systemctl is-active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    pub status: String,
    pub is_active: bool,
}

impl ServiceState {
    /// Build from the combined stdout/stderr of `systemctl is-active`.
    pub fn from_is_active_output(output: &str) -> Self {
        let status = output.trim().to_string();
        let is_active = status == "active";
        Self { status, is_active }
    }
}

/// Both units involved in handing the printer's USB port between
/// VirtualHere and ipp-usb.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbSharingStatus {
    pub virtualhere: ServiceState,
    pub ipp_usb: ServiceState,
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

/// Print quality, mapped onto IPP `print-quality` (RFC 8011 §5.2.13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintQuality {
    Draft,
    Normal,
    High,
}

impl PrintQuality {
    pub fn ipp_value(&self) -> &'static str {
        match self {
            Self::Draft => "3",
            Self::Normal => "4",
            Self::High => "5",
        }
    }
}

/// Colour mode, mapped onto IPP `print-color-mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintColor {
    Color,
    Bw,
}

impl PrintColor {
    pub fn ipp_keyword(&self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Bw => "monochrome",
        }
    }
}

/// What kind of output is being printed; selects the `media-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Document,
    Photo,
}

impl MediaKind {
    pub fn ipp_media_type(&self) -> &'static str {
        match self {
            Self::Document => "stationery",
            Self::Photo => "photographic-glossy",
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// IPP `orientation-requested` enum value (RFC 8011 §5.2.10).
    pub fn ipp_enum_value(&self) -> i32 {
        match self {
            Self::Portrait => 3,
            Self::Landscape => 4,
        }
    }
}

/// Paper sizes offered by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaSize {
    A4,
    Letter,
    Legal,
    Executive,
    A5,
    A6,
    Photo4x6,
    Photo5x7,
}

impl MediaSize {
    /// PWG self-describing media name (PWG 5101.1).
    pub fn ipp_media_keyword(&self) -> &'static str {
        match self {
            Self::A4 => "iso_a4_210x297mm",
            Self::Letter => "na_letter_8.5x11in",
            Self::Legal => "na_legal_8.5x14in",
            Self::Executive => "na_executive_7.25x10.5in",
            Self::A5 => "iso_a5_148x210mm",
            Self::A6 => "iso_a6_105x148mm",
            Self::Photo4x6 => "na_index-4x6_4x6in",
            Self::Photo5x7 => "na_5x7_5x7in",
        }
    }
}

/// Settings submitted alongside an uploaded document.
///
/// Every field is optional; `lp` falls back to A4 stationery with the
/// queue's own defaults for the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrintSettings {
    pub quality: Option<PrintQuality>,
    pub color: Option<PrintColor>,
    pub copies: Option<u32>,
    #[serde(rename = "type")]
    pub kind: Option<MediaKind>,
    pub orientation: Option<Orientation>,
    pub media_size: Option<MediaSize>,
}

/// State of a CUPS job as reported to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintJobState {
    Pending,
    Processing,
    Completed,
    Canceled,
    Aborted,
    Unknown,
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Unique identifier for a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied id.  Only canonical UUIDs are accepted so the
    /// value is always safe to splice into a file name.
    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| PrinthubError::InvalidRequest(format!("invalid scan job id '{raw}'")))
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output format of a scan or a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanFormat {
    Pdf,
    Jpg,
    Png,
}

impl ScanFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Jpg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// Scan resolution preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanQuality {
    Draft,
    Normal,
    High,
}

impl ScanQuality {
    pub fn dpi(&self) -> u32 {
        match self {
            Self::Draft => 150,
            Self::Normal => 300,
            Self::High => 600,
        }
    }
}

/// Scan colour mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanColor {
    Color,
    Grayscale,
    Bw,
}

impl ScanColor {
    /// SANE `--mode` value.
    pub fn sane_mode(&self) -> &'static str {
        match self {
            Self::Color => "Color",
            Self::Grayscale => "Gray",
            Self::Bw => "Lineart",
        }
    }
}

/// Settings for a single scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSettings {
    pub format: ScanFormat,
    pub quality: ScanQuality,
    pub color: ScanColor,
    /// Free-form resolution hint from the UI; the quality preset decides the
    /// actual dpi.
    #[serde(default)]
    pub resolution: String,
}

/// Metadata sidecar persisted next to every scanned file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub job_id: ScanId,
    pub timestamp: DateTime<Utc>,
    pub settings: ScanSettings,
    pub file_path: PathBuf,
    pub file_size: u64,
}

// ---------------------------------------------------------------------------
// Printer status
// ---------------------------------------------------------------------------

/// Remaining ink per cartridge, 0-100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InkLevels {
    pub black: u8,
    pub cyan: u8,
    pub magenta: u8,
    pub yellow: u8,
}

/// Placeholder entry for each job the printer reports as queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: u32,
    pub name: String,
}

/// Coarse printer activity shown in the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterActivity {
    Idle,
    Printing,
    Error,
    Maintenance,
}

/// Dashboard snapshot built from Get-Printer-Attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterStatus {
    pub progress: u8,
    pub ink_levels: InkLevels,
    pub job_queue: Vec<QueuedJob>,
    pub status: PrinterActivity,
    pub message: String,
    pub printer_state: String,
    pub printer_state_reasons: String,
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
    pub last_updated: DateTime<Utc>,
}

impl PrinterStatus {
    /// Snapshot returned when the printer cannot be reached at all.
    pub fn unreachable(reason: &str) -> Self {
        Self {
            progress: 0,
            ink_levels: InkLevels::default(),
            job_queue: Vec::new(),
            status: PrinterActivity::Error,
            message: format!("Failed to communicate with printer: {reason}"),
            printer_state: "unknown".into(),
            printer_state_reasons: "error".into(),
            is_accepting_jobs: false,
            printer_name: "Unknown".into(),
            printer_info: "Unknown Printer".into(),
            printer_location: String::new(),
            printer_model: String::new(),
            printer_up_time: 0,
            printer_more_info: String::new(),
            printer_alert: String::new(),
            printer_alert_description: String::new(),
            media_ready: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_type_codes_cover_one_to_ten() {
        let codes: Vec<u8> = CleaningType::ALL.iter().map(|t| t.code()).collect();
        assert_eq!(codes, (1..=10).collect::<Vec<u8>>());
    }

    #[test]
    fn cleaning_type_deserializes_from_integer() {
        let t: CleaningType = serde_json::from_str("7").unwrap();
        assert_eq!(t, CleaningType::AllNormal);
        assert!(serde_json::from_str::<CleaningType>("11").is_err());
        assert!(serde_json::from_str::<CleaningType>("0").is_err());
    }

    #[test]
    fn cleaning_option_serializes_catalog_shape() {
        let json = serde_json::to_value(CleaningType::AllStrongest.option()).unwrap();
        assert_eq!(json["id"], 9);
        assert_eq!(json["label"], "All - Strongest");
        assert_eq!(json["duration"], 35_000);
        assert_eq!(json["inkUsage"], "very-high");
    }

    #[test]
    fn print_settings_accepts_partial_json() {
        let s: PrintSettings =
            serde_json::from_str(r#"{"quality":"high","type":"photo","mediaSize":"photo4x6"}"#)
                .unwrap();
        assert_eq!(s.quality, Some(PrintQuality::High));
        assert_eq!(s.kind, Some(MediaKind::Photo));
        assert_eq!(s.media_size, Some(MediaSize::Photo4x6));
        assert_eq!(s.copies, None);
    }

    #[test]
    fn print_settings_rejects_unknown_media_size() {
        assert!(serde_json::from_str::<PrintSettings>(r#"{"mediaSize":"tabloid"}"#).is_err());
    }

    #[test]
    fn print_settings_rejects_unknown_quality() {
        assert!(serde_json::from_str::<PrintSettings>(r#"{"quality":"ultra"}"#).is_err());
    }

    #[test]
    fn scan_id_rejects_path_like_input() {
        assert!(ScanId::parse("../../etc/passwd").is_err());
        assert!(ScanId::parse("").is_err());
        let id = ScanId::new();
        assert_eq!(ScanId::parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn service_state_trims_output() {
        let s = ServiceState::from_is_active_output("active\n");
        assert!(s.is_active);
        let s = ServiceState::from_is_active_output("inactive\n");
        assert_eq!(s.status, "inactive");
        assert!(!s.is_active);
    }

    #[test]
    fn unreachable_status_is_error() {
        let s = PrinterStatus::unreachable("connection refused");
        assert_eq!(s.status, PrinterActivity::Error);
        assert!(s.message.contains("connection refused"));
        assert_eq!(s.ink_levels, InkLevels::default());
    }

    #[test]
    fn scan_settings_use_camel_case() {
        let s: ScanSettings =
            serde_json::from_str(r#"{"format":"pdf","quality":"draft","color":"bw","resolution":"150"}"#)
                .unwrap();
        assert_eq!(s.quality.dpi(), 150);
        assert_eq!(s.color.sane_mode(), "Lineart");
        assert!(s.format.is_pdf());
    }
}
