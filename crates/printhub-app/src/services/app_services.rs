// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: builds every backend client from the loaded
// configuration and hands the HTTP handlers one cheaply cloneable bundle.
//
// The clients themselves are stateless between calls.  The only shared
// mutable state is the head-cleaning lock: the printer console keeps one
// session per login, so two overlapping cleaning sequences would trample
// each other's CSRF tokens.

use std::sync::Arc;

use printhub_core::command::CommandRunner;
use printhub_core::config::AppConfig;
use printhub_core::error::{PrinthubError, Result};
use printhub_core::types::{CleaningType, PrinterStatus};
use printhub_document::{Bundler, PreviewGenerator, ScanStore, Scanner, Toolchain};
use printhub_print::{CupsClient, IppClient, MaintenanceError, PrinterWebClient, SessionCookie, UsbSharing};
use tracing::{info, warn};

/// Shared application services, handed to every axum handler as state.
///
/// All fields are cheaply cloneable so that the struct can be cloned into
/// each request.
#[derive(Clone)]
pub struct AppServices {
    config: Arc<AppConfig>,
    web: PrinterWebClient,
    ipp: Option<IppClient>,
    cups: CupsClient,
    usb: UsbSharing,
    scanner: Scanner,
    previews: PreviewGenerator,
    bundler: Bundler,
    cleaning_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppServices {
    /// Initialise all services.  Call once at startup.
    pub fn init(config: AppConfig) -> Result<Self> {
        let web = PrinterWebClient::new(&config.base_url(), config.http_timeout())
            .map_err(|e| PrinthubError::Config(e.to_string()))?;

        // Status falls back to the "unreachable" snapshot without an endpoint.
        let ipp = match IppClient::new(&config.printer_ipp_uri, config.http_timeout()) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "IPP status endpoint unusable");
                None
            }
        };

        let runner = CommandRunner::new(config.command_timeout()).with_sudo(config.use_sudo);
        let store = ScanStore::from_config(&config);

        let services = Self {
            web,
            ipp,
            cups: CupsClient::new(runner.clone(), config.printer_name.clone()),
            usb: UsbSharing::new(
                runner.clone(),
                config.virtualhere_unit.clone(),
                config.ipp_usb_unit.clone(),
            ),
            scanner: Scanner::new(
                runner.with_timeout(config.scan_timeout()),
                config.scanner_device.clone(),
                store.clone(),
            ),
            previews: PreviewGenerator::new(runner.clone(), store.clone()),
            bundler: Bundler::new(runner, store),
            cleaning_lock: Arc::new(tokio::sync::Mutex::new(())),
            config: Arc::new(config),
        };

        info!(
            printer = %services.config.printer_name,
            scan_dir = %services.config.scan_dir().display(),
            "app services initialised"
        );
        Ok(services)
    }

    /// Replace the CUPS client (e.g. to use other `lp` binaries).
    pub fn with_cups(mut self, cups: CupsClient) -> Self {
        self.cups = cups;
        self
    }

    /// Replace the systemd unit controller.
    pub fn with_usb_sharing(mut self, usb: UsbSharing) -> Self {
        self.usb = usb;
        self
    }

    /// Rebuild the scan pipeline around other imaging executables.
    pub fn with_document_tools(mut self, runner: CommandRunner, tools: Toolchain) -> Self {
        let store = ScanStore::from_config(&self.config);
        self.scanner = Scanner::new(
            runner.with_timeout(self.config.scan_timeout()),
            self.config.scanner_device.clone(),
            store.clone(),
        )
        .with_tools(tools.clone());
        self.previews = PreviewGenerator::new(runner.clone(), store.clone()).with_tools(tools.clone());
        self.bundler = Bundler::new(runner, store).with_tools(tools);
        self
    }

    /// Drop the IPP endpoint so status always reports the printer unreachable.
    pub fn without_ipp(mut self) -> Self {
        self.ipp = None;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cups(&self) -> &CupsClient {
        &self.cups
    }

    pub fn usb_sharing(&self) -> &UsbSharing {
        &self.usb
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn previews(&self) -> &PreviewGenerator {
        &self.previews
    }

    pub fn bundler(&self) -> &Bundler {
        &self.bundler
    }

    /// Current printer status from IPP.
    pub async fn printer_status(&self) -> Result<PrinterStatus> {
        match &self.ipp {
            Some(client) => client.printer_status().await,
            None => Err(PrinthubError::IppRequest("no IPP endpoint configured".into())),
        }
    }

    /// Run one head-cleaning sequence with the configured password.
    ///
    /// Concurrent callers queue behind each other.
    pub async fn run_head_cleaning(
        &self,
        cleaning_type: CleaningType,
    ) -> std::result::Result<SessionCookie, MaintenanceError> {
        let _guard = self.cleaning_lock.lock().await;
        self.web
            .run_head_cleaning(&self.config.printer_password, cleaning_type)
            .await
    }
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("config", &self.config)
            .field("web", &self.web)
            .field("ipp", &self.ipp)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_with_defaults_succeeds() {
        let services = AppServices::init(AppConfig::default()).unwrap();
        assert!(services.ipp.is_some());
        assert_eq!(services.cups().printer_name(), "printer");
    }

    #[test]
    fn bad_ipp_uri_disables_status_only() {
        let config = AppConfig {
            printer_ipp_uri: "not a uri at all".into(),
            ..AppConfig::default()
        };
        let services = AppServices::init(config).unwrap();
        assert!(services.ipp.is_none());
    }

    #[test]
    fn bad_console_url_is_a_config_error() {
        let config = AppConfig {
            printer_base_url: Some("ftp://printer".into()),
            ..AppConfig::default()
        };
        let err = AppServices::init(config).unwrap_err();
        assert!(matches!(err, PrinthubError::Config(_)));
    }

    #[tokio::test]
    async fn status_without_endpoint_is_an_ipp_error() {
        let services = AppServices::init(AppConfig::default()).unwrap().without_ipp();
        let err = services.printer_status().await.unwrap_err();
        assert!(matches!(err, PrinthubError::IppRequest(_)));
    }

    #[test]
    fn debug_output_hides_password() {
        let config = AppConfig {
            printer_password: "hunter2".into(),
            ..AppConfig::default()
        };
        let services = AppServices::init(config).unwrap();
        assert!(!format!("{services:?}").contains("hunter2"));
    }
}
