// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning through SANE's `scanimage`.

use chrono::Utc;
use tracing::{info, instrument, warn};

use printhub_core::command::CommandRunner;
use printhub_core::error::{PrinthubError, Result};
use printhub_core::types::{ScanFormat, ScanId, ScanRecord, ScanSettings};

use crate::store::ScanStore;
use crate::tools::Toolchain;

/// Runs scans on one SANE device and files the results in a [`ScanStore`].
#[derive(Debug, Clone)]
pub struct Scanner {
    runner: CommandRunner,
    tools: Toolchain,
    device: String,
    store: ScanStore,
}

impl Scanner {
    /// `runner` should carry the (long) scan timeout.
    pub fn new(runner: CommandRunner, device: impl Into<String>, store: ScanStore) -> Self {
        Self {
            runner,
            tools: Toolchain::default(),
            device: device.into(),
            store,
        }
    }

    pub fn with_tools(mut self, tools: Toolchain) -> Self {
        self.tools = tools;
        self
    }

    pub fn store(&self) -> &ScanStore {
        &self.store
    }

    /// Scan one page and record it.
    #[instrument(skip(self), fields(device = %self.device))]
    pub async fn scan(&self, settings: ScanSettings) -> Result<ScanRecord> {
        self.store.ensure_dirs().await?;

        let job_id = ScanId::new();
        let format = capture_format(settings.format);
        let path = self.store.scan_path(job_id, format);
        let args = scan_args(&self.device, &settings);

        let written = match self.runner.run_to_file(&self.tools.scanimage, &args, &path).await {
            Ok(n) => n,
            Err(e) => {
                discard(&path).await;
                return Err(e);
            }
        };
        if written == 0 {
            discard(&path).await;
            warn!(job_id = %job_id, "scanner produced no data");
            return Err(PrinthubError::Scan("Scanned file is empty".into()));
        }

        let record = ScanRecord {
            job_id,
            timestamp: Utc::now(),
            settings,
            file_path: path,
            file_size: written,
        };
        self.store.save_record(&record).await?;

        info!(job_id = %job_id, bytes = written, "scan completed");
        Ok(record)
    }
}

/// Format `scanimage` is asked to produce.  Only PDF and JPEG are captured;
/// PNG requests are scanned as JPEG.
pub fn capture_format(requested: ScanFormat) -> ScanFormat {
    if requested.is_pdf() {
        ScanFormat::Pdf
    } else {
        ScanFormat::Jpg
    }
}

/// Build the `scanimage` argument vector.
pub fn scan_args(device: &str, settings: &ScanSettings) -> Vec<String> {
    let sane_format = match capture_format(settings.format) {
        ScanFormat::Pdf => "pdf",
        _ => "jpeg",
    };
    vec![
        "--device-name".into(),
        device.to_string(),
        "--resolution".into(),
        settings.quality.dpi().to_string(),
        "--mode".into(),
        settings.color.sane_mode().to_string(),
        "--format".into(),
        sane_format.into(),
    ]
}

async fn discard(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "could not remove partial scan");
    }
}
