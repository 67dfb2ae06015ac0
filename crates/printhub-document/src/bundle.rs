// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Download bundling: turn one or more scanned pages into a single file for
// the browser.
//
//   one page            stored bytes, or converted with ImageMagick
//   many pages, pdf     pages converted to PDF and merged with Ghostscript
//   many pages, images  ZIP archive of `scan_<n>.<ext>` entries
//
// Intermediate files live in a scratch directory that is removed when the
// bundle is done, whatever the outcome.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, instrument};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use printhub_core::command::CommandRunner;
use printhub_core::error::{PrinthubError, Result};
use printhub_core::types::{ScanFormat, ScanId, ScanRecord};

use crate::store::{ScanStore, stored_format};
use crate::tools::Toolchain;

/// A finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Builds downloads out of stored scans.
#[derive(Debug, Clone)]
pub struct Bundler {
    runner: CommandRunner,
    tools: Toolchain,
    store: ScanStore,
}

impl Bundler {
    pub fn new(runner: CommandRunner, store: ScanStore) -> Self {
        Self {
            runner,
            tools: Toolchain::default(),
            store,
        }
    }

    pub fn with_tools(mut self, tools: Toolchain) -> Self {
        self.tools = tools;
        self
    }

    /// Bundle `page_ids` in `format`; `None` keeps each page's own format.
    #[instrument(skip(self, page_ids), fields(pages = page_ids.len()))]
    pub async fn bundle(&self, page_ids: &[ScanId], format: Option<ScanFormat>) -> Result<Download> {
        if page_ids.is_empty() {
            return Err(PrinthubError::InvalidRequest("Valid page IDs are required".into()));
        }

        let mut records = Vec::with_capacity(page_ids.len());
        for id in page_ids {
            records.push(self.store.load_record(*id).await?);
        }

        let stamp = download_timestamp(Utc::now());
        let scratch = self.store.scratch_dir("download-")?;

        let download = match (records.as_slice(), format) {
            ([single], _) => self.single(single, format, &stamp, scratch.path()).await?,
            (pages, Some(ScanFormat::Pdf)) => self.merged_pdf(pages, &stamp, scratch.path()).await?,
            (pages, _) => self.archive(pages, format, &stamp, scratch.path()).await?,
        };

        info!(
            filename = %download.filename,
            bytes = download.bytes.len(),
            "download prepared"
        );
        Ok(download)
    }

    async fn single(
        &self,
        record: &ScanRecord,
        format: Option<ScanFormat>,
        stamp: &str,
        scratch: &Path,
    ) -> Result<Download> {
        let target = format.unwrap_or_else(|| stored_format(record));
        let bytes = self.page_as(record, target, scratch, "converted").await?;
        Ok(Download {
            bytes,
            content_type: target.mime_type(),
            filename: format!("scan_{stamp}.{}", target.extension()),
        })
    }

    async fn merged_pdf(&self, pages: &[ScanRecord], stamp: &str, scratch: &Path) -> Result<Download> {
        let mut inputs = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            if stored_format(page).is_pdf() {
                inputs.push(page.file_path.clone());
            } else {
                let pdf = scratch.join(format!("page_{i}.pdf"));
                self.convert(&page.file_path, &pdf).await?;
                inputs.push(pdf);
            }
        }

        let output = scratch.join("combined.pdf");
        let mut args = vec![
            "-dBATCH".to_string(),
            "-dNOPAUSE".into(),
            "-q".into(),
            "-sDEVICE=pdfwrite".into(),
            format!("-sOutputFile={}", output.display()),
        ];
        args.extend(inputs.iter().map(|p| p.to_string_lossy().into_owned()));
        self.runner.run(&self.tools.gs, &args).await?;
        debug!(pages = inputs.len(), "pages merged");

        Ok(Download {
            bytes: tokio::fs::read(&output).await?,
            content_type: ScanFormat::Pdf.mime_type(),
            filename: format!("scan_{stamp}.pdf"),
        })
    }

    async fn archive(
        &self,
        pages: &[ScanRecord],
        format: Option<ScanFormat>,
        stamp: &str,
        scratch: &Path,
    ) -> Result<Download> {
        let mut entries = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            let target = format.unwrap_or_else(|| stored_format(page));
            let bytes = self.page_as(page, target, scratch, &format!("page_{i}")).await?;
            entries.push((format!("scan_{}.{}", i + 1, target.extension()), bytes));
        }

        let bytes = tokio::task::spawn_blocking(move || zip_entries(&entries))
            .await
            .map_err(|e| PrinthubError::Archive(format!("archive task failed: {e}")))??;

        Ok(Download {
            bytes,
            content_type: "application/zip",
            filename: format!("scans_{stamp}.zip"),
        })
    }

    /// Bytes of `record` in `target` format, converting through `scratch`
    /// when the stored format differs.
    async fn page_as(
        &self,
        record: &ScanRecord,
        target: ScanFormat,
        scratch: &Path,
        stem: &str,
    ) -> Result<Vec<u8>> {
        if stored_format(record) == target {
            return Ok(tokio::fs::read(&record.file_path).await?);
        }
        let converted: PathBuf = scratch.join(format!("{stem}.{}", target.extension()));
        self.convert(&record.file_path, &converted).await?;
        Ok(tokio::fs::read(&converted).await?)
    }

    async fn convert(&self, src: &Path, dest: &Path) -> Result<()> {
        let args = vec![
            src.to_string_lossy().into_owned(),
            dest.to_string_lossy().into_owned(),
        ];
        self.runner
            .run(&self.tools.convert, &args)
            .await
            .map_err(|e| PrinthubError::Conversion(format!("{} -> {}: {e}", src.display(), dest.display())))?;
        Ok(())
    }
}

/// Deflate-compressed ZIP of `(name, bytes)` entries.
pub fn zip_entries(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)
            .map_err(|e| PrinthubError::Archive(format!("{name}: {e}")))?;
        zip.write_all(bytes)?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| PrinthubError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Timestamp used in download file names: RFC 3339 in UTC with `:` and `.`
/// replaced so it is safe in a file name.
pub fn download_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Read;

    use chrono::TimeZone;

    #[test]
    fn timestamp_is_filename_safe() {
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(download_timestamp(now), "2025-03-14T15-09-26-000Z");
    }

    #[test]
    fn zip_entries_round_trip() {
        let bytes = zip_entries(&[
            ("scan_1.jpg".into(), b"first".to_vec()),
            ("scan_2.jpg".into(), b"second page".to_vec()),
        ])
        .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        let mut entry = archive.by_name("scan_2.jpg").unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "second page");
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use crate::store::tests::record;
        use crate::tools::testing::{CONVERT_COPY, FAIL, GS_CONCAT, toolchain};

        struct Fixture {
            _dir: tempfile::TempDir,
            bundler: Bundler,
            store: ScanStore,
        }

        fn fixture(convert: &str) -> Fixture {
            let dir = tempfile::tempdir().unwrap();
            let (tools, runner) = toolchain(dir.path(), FAIL, FAIL, GS_CONCAT, convert);
            let store = ScanStore::new(dir.path().join("scans"), "previews");
            std::fs::create_dir_all(store.root()).unwrap();
            Fixture {
                bundler: Bundler::new(runner, store.clone()).with_tools(tools),
                store,
                _dir: dir,
            }
        }

        async fn page(store: &ScanStore, stored: ScanFormat, content: &[u8]) -> ScanId {
            let rec = record(store, stored, stored);
            std::fs::write(&rec.file_path, content).unwrap();
            store.save_record(&rec).await.unwrap();
            rec.job_id
        }

        fn scratch_is_clean(store: &ScanStore) -> bool {
            !std::fs::read_dir(store.root())
                .unwrap()
                .filter_map(|e| e.ok())
                .any(|e| e.file_name().to_string_lossy().starts_with("download-"))
        }

        #[tokio::test]
        async fn empty_page_list_is_rejected() {
            let f = fixture(FAIL);
            let err = f.bundler.bundle(&[], None).await.unwrap_err();
            assert!(matches!(err, PrinthubError::InvalidRequest(_)));
        }

        #[tokio::test]
        async fn unknown_page_is_not_found() {
            let f = fixture(FAIL);
            let err = f.bundler.bundle(&[ScanId::new()], None).await.unwrap_err();
            assert!(matches!(err, PrinthubError::NotFound(_)));
        }

        #[tokio::test]
        async fn single_page_same_format_is_passed_through() {
            let f = fixture(FAIL);
            let id = page(&f.store, ScanFormat::Pdf, b"%PDF-one").await;

            let dl = f.bundler.bundle(&[id], Some(ScanFormat::Pdf)).await.unwrap();
            assert_eq!(dl.bytes, b"%PDF-one");
            assert_eq!(dl.content_type, "application/pdf");
            assert!(dl.filename.starts_with("scan_"));
            assert!(dl.filename.ends_with(".pdf"));
            assert!(scratch_is_clean(&f.store));
        }

        #[tokio::test]
        async fn single_page_other_format_is_converted() {
            let f = fixture(CONVERT_COPY);
            let id = page(&f.store, ScanFormat::Jpg, b"jpeg").await;

            let dl = f.bundler.bundle(&[id], Some(ScanFormat::Png)).await.unwrap();
            assert_eq!(dl.bytes, b"converted:jpeg");
            assert_eq!(dl.content_type, "image/png");
            assert!(dl.filename.ends_with(".png"));
        }

        #[tokio::test]
        async fn many_pages_to_pdf_are_merged() {
            let f = fixture(CONVERT_COPY);
            let a = page(&f.store, ScanFormat::Pdf, b"[A]").await;
            let b = page(&f.store, ScanFormat::Jpg, b"[B]").await;

            let dl = f.bundler.bundle(&[a, b], Some(ScanFormat::Pdf)).await.unwrap();
            assert_eq!(dl.bytes, b"[A]converted:[B]");
            assert_eq!(dl.content_type, "application/pdf");
            assert!(scratch_is_clean(&f.store));
        }

        #[tokio::test]
        async fn many_pages_to_images_are_zipped() {
            let f = fixture(CONVERT_COPY);
            let a = page(&f.store, ScanFormat::Jpg, b"[A]").await;
            let b = page(&f.store, ScanFormat::Pdf, b"[B]").await;

            let dl = f.bundler.bundle(&[a, b], Some(ScanFormat::Jpg)).await.unwrap();
            assert_eq!(dl.content_type, "application/zip");
            assert!(dl.filename.starts_with("scans_"));
            assert!(dl.filename.ends_with(".zip"));

            let mut archive = zip::ZipArchive::new(Cursor::new(dl.bytes)).unwrap();
            let mut first = String::new();
            archive.by_name("scan_1.jpg").unwrap().read_to_string(&mut first).unwrap();
            let mut second = String::new();
            archive.by_name("scan_2.jpg").unwrap().read_to_string(&mut second).unwrap();
            assert_eq!(first, "[A]");
            assert_eq!(second, "converted:[B]");
        }

        #[tokio::test]
        async fn many_pages_without_format_keep_their_own() {
            let f = fixture(FAIL);
            let a = page(&f.store, ScanFormat::Jpg, b"[A]").await;
            let b = page(&f.store, ScanFormat::Pdf, b"[B]").await;

            let dl = f.bundler.bundle(&[a, b], None).await.unwrap();
            let archive = zip::ZipArchive::new(Cursor::new(dl.bytes)).unwrap();
            let mut names: Vec<&str> = archive.file_names().collect();
            names.sort();
            assert_eq!(names, vec!["scan_1.jpg", "scan_2.pdf"]);
        }

        #[tokio::test]
        async fn failed_conversion_is_reported() {
            let f = fixture(FAIL);
            let id = page(&f.store, ScanFormat::Jpg, b"jpeg").await;
            let err = f.bundler.bundle(&[id], Some(ScanFormat::Pdf)).await.unwrap_err();
            assert!(matches!(err, PrinthubError::Conversion(_)));
            assert!(scratch_is_clean(&f.store));
        }
    }
}
