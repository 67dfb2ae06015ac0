// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Layered as: built-in defaults, then an optional TOML file, then the
// process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PrinthubError, Result};

/// Server and printer settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP API binds to.
    pub listen_addr: String,
    /// CUPS queue name passed to `lp -d`.
    pub printer_name: String,
    /// Printer host, used to derive the management console URL.
    pub printer_ip: String,
    pub printer_port: u16,
    /// Management console base URL; derived from ip/port when unset.
    pub printer_base_url: Option<String>,
    /// Password for the management console.
    #[serde(skip_serializing)]
    pub printer_password: String,
    /// IPP endpoint used for status queries.
    pub printer_ipp_uri: String,
    /// SANE device name passed to `scanimage --device-name`.
    pub scanner_device: String,
    /// Scan directory.  Relative names live under the system temp dir.
    pub scan_dir_name: String,
    /// Preview cache, relative to the scan directory.
    pub preview_dir_name: String,
    /// Timeout for each request to the printer's web console.
    pub http_timeout_secs: u64,
    /// Timeout for short-lived helper commands (lp, lpstat, convert, ...).
    pub command_timeout_secs: u64,
    /// Timeout for `scanimage`, which can take minutes at high resolution.
    pub scan_timeout_secs: u64,
    /// Prefix `systemctl` calls with `sudo -n`.
    pub use_sudo: bool,
    pub virtualhere_unit: String,
    pub ipp_usb_unit: String,
    /// Advertise the web UI over mDNS-SD.
    pub advertise_mdns: bool,
    /// Mark the forwarded printer session cookie `Secure`.
    pub secure_cookies: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".into(),
            printer_name: "printer".into(),
            printer_ip: "192.168.1.100".into(),
            printer_port: 80,
            printer_base_url: None,
            printer_password: String::new(),
            printer_ipp_uri: "ipp://192.168.1.100:631/ipp/print".into(),
            scanner_device: "escl:http://192.168.1.100:80".into(),
            scan_dir_name: "printhub-scans".into(),
            preview_dir_name: "previews".into(),
            http_timeout_secs: 30,
            command_timeout_secs: 120,
            scan_timeout_secs: 300,
            use_sudo: true,
            virtualhere_unit: "virtualhere.service".into(),
            ipp_usb_unit: "ipp-usb.service".into(),
            advertise_mdns: false,
            secure_cookies: false,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("listen_addr", &self.listen_addr)
            .field("printer_name", &self.printer_name)
            .field("printer_base_url", &self.base_url())
            .field("printer_password", &"<redacted>")
            .field("printer_ipp_uri", &self.printer_ipp_uri)
            .field("scanner_device", &self.scanner_device)
            .field("scan_dir", &self.scan_dir())
            .field("use_sudo", &self.use_sudo)
            .field("advertise_mdns", &self.advertise_mdns)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        info!(config = ?config, "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| PrinthubError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PrinthubError::Config(e.to_string()))
    }

    /// Overlay values from environment-style lookups.
    ///
    /// Variable names match the deployed `.env` file so existing
    /// installs keep working.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PRINTHUB_LISTEN") {
            self.listen_addr = v;
        }
        if let Some(v) = get("PRINTER_NAME") {
            self.printer_name = v;
        }
        if let Some(v) = get("PRINTER_IP") {
            self.printer_ip = v;
        }
        if let Some(v) = get("PRINTER_PORT") {
            self.printer_port = v
                .trim()
                .parse()
                .map_err(|_| PrinthubError::Config(format!("PRINTER_PORT is not a port: '{v}'")))?;
        }
        if let Some(v) = get("PRINTER_BASE_URL") {
            self.printer_base_url = Some(v);
        }
        if let Some(v) = lookup("PRINTER_PASSWORD") {
            self.printer_password = v;
        }
        if let Some(v) = get("PRINTER_IPP") {
            self.printer_ipp_uri = v;
        }
        if let Some(v) = get("SCANNER_ESCL") {
            self.scanner_device = v;
        }
        if let Some(v) = get("SCAN_TEMP_DIR_NAME") {
            self.scan_dir_name = v;
        }
        if let Some(v) = get("SCAN_TEMP_PREVIEW_DIR_NAME") {
            self.preview_dir_name = v;
        }
        if let Some(v) = get("PRINTHUB_USE_SUDO") {
            self.use_sudo = parse_bool("PRINTHUB_USE_SUDO", &v)?;
        }
        if let Some(v) = get("PRINTHUB_MDNS") {
            self.advertise_mdns = parse_bool("PRINTHUB_MDNS", &v)?;
        }
        debug!("environment overrides applied");
        Ok(())
    }

    /// Reject settings that would only fail later, mid-request.
    pub fn validate(&self) -> Result<()> {
        if self.printer_name.trim().is_empty() {
            return Err(PrinthubError::Config("printer name must not be empty".into()));
        }
        let base = self.base_url();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(PrinthubError::Config(format!(
                "printer base URL must be http(s): '{base}'"
            )));
        }
        if self.scan_dir_name.trim().is_empty() || self.preview_dir_name.trim().is_empty() {
            return Err(PrinthubError::Config("scan directories must be named".into()));
        }
        Ok(())
    }

    /// Base URL of the printer's management console, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.printer_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.printer_ip, self.printer_port),
        }
    }

    /// Directory holding scans and their metadata sidecars.
    pub fn scan_dir(&self) -> PathBuf {
        // An absolute name replaces the temp dir entirely.
        std::env::temp_dir().join(&self.scan_dir_name)
    }

    pub fn preview_dir(&self) -> PathBuf {
        self.scan_dir().join(&self.preview_dir_name)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PrinthubError::Config(format!("{key} is not a boolean: '{other}'"))),
    }
}
