// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// On-disk layout of scan results.
//
//   <root>/<job>.pdf | <job>.jpg      scanned file
//   <root>/<job>.json                 ScanRecord sidecar
//   <root>/<previews>/<job>_preview.jpg
//
// Job ids are UUIDs (`ScanId`), so every path built here stays inside the
// root directory.

use std::path::{Path, PathBuf};

use tracing::debug;

use printhub_core::config::AppConfig;
use printhub_core::error::{PrinthubError, Result};
use printhub_core::types::{ScanFormat, ScanId, ScanRecord};

/// Directory holding scans, their metadata sidecars and cached previews.
#[derive(Debug, Clone)]
pub struct ScanStore {
    root: PathBuf,
    preview_dir: PathBuf,
}

impl ScanStore {
    pub fn new(root: impl Into<PathBuf>, preview_dir_name: &str) -> Self {
        let root = root.into();
        let preview_dir = root.join(preview_dir_name);
        Self { root, preview_dir }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            root: config.scan_dir(),
            preview_dir: config.preview_dir(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preview_dir(&self) -> &Path {
        &self.preview_dir
    }

    /// Create the scan and preview directories if missing.
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.preview_dir).await?;
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn scan_path(&self, id: ScanId, format: ScanFormat) -> PathBuf {
        self.root.join(format!("{id}.{}", format.extension()))
    }

    pub fn metadata_path(&self, id: ScanId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    pub fn preview_path(&self, id: ScanId) -> PathBuf {
        self.preview_dir.join(format!("{id}_preview.jpg"))
    }

    /// Persist the sidecar for a finished scan.
    pub async fn save_record(&self, record: &ScanRecord) -> Result<()> {
        let json = serde_json::to_vec(record)?;
        tokio::fs::write(self.metadata_path(record.job_id), json).await?;
        debug!(job_id = %record.job_id, "scan metadata written");
        Ok(())
    }

    /// Load the sidecar for `id`; a missing or unreadable sidecar means the
    /// job does not exist.
    pub async fn load_record(&self, id: ScanId) -> Result<ScanRecord> {
        let path = self.metadata_path(id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            debug!(job_id = %id, error = %e, "scan metadata unavailable");
            PrinthubError::NotFound(format!("Scan job {id} not found"))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            debug!(job_id = %id, error = %e, "scan metadata unreadable");
            PrinthubError::NotFound(format!("Scan job {id} not found"))
        })
    }

    /// Private scratch directory under the root, removed on drop.
    pub fn scratch_dir(&self, prefix: &str) -> Result<tempfile::TempDir> {
        std::fs::create_dir_all(&self.root)?;
        Ok(tempfile::Builder::new().prefix(prefix).tempdir_in(&self.root)?)
    }
}

/// Format of the bytes actually on disk.
///
/// PNG scans are captured as JPEG, so the file extension is authoritative
/// rather than the requested format.
pub fn stored_format(record: &ScanRecord) -> ScanFormat {
    match record.file_path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => ScanFormat::Pdf,
        Some("png") => ScanFormat::Png,
        _ => ScanFormat::Jpg,
    }
}
