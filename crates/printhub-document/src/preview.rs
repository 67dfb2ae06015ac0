// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thumbnail previews of scanned pages.
//
// Previews are rendered once and cached next to the scans.  Rendering walks
// a chain of external tools and ends with an in-process blank page, so a
// preview request for an existing job always yields a JPEG.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracing::{debug, info, instrument, warn};

use printhub_core::command::CommandRunner;
use printhub_core::error::{PrinthubError, Result};
use printhub_core::types::{ScanFormat, ScanId};

use crate::store::{ScanStore, stored_format};
use crate::tools::Toolchain;

/// Preview canvas size.
pub const PREVIEW_WIDTH: u32 = 300;
pub const PREVIEW_HEIGHT: u32 = 400;

/// Renders and caches page previews.
#[derive(Debug, Clone)]
pub struct PreviewGenerator {
    runner: CommandRunner,
    tools: Toolchain,
    store: ScanStore,
}

/// One way of producing the preview file.
struct Attempt {
    label: &'static str,
    program: String,
    args: Vec<String>,
}

impl PreviewGenerator {
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

    /// JPEG preview for `id`, rendering it on first request.
    #[instrument(skip(self))]
    pub async fn preview(&self, id: ScanId) -> Result<Vec<u8>> {
        let record = self.store.load_record(id).await?;
        self.store.ensure_dirs().await?;

        let preview = self.store.preview_path(id);
        if let Ok(bytes) = tokio::fs::read(&preview).await {
            if !bytes.is_empty() {
                debug!(job_id = %id, "serving cached preview");
                return Ok(bytes);
            }
        }

        let attempts = match stored_format(&record) {
            ScanFormat::Pdf => self.pdf_attempts(&record.file_path, &preview),
            _ => self.image_attempts(&record.file_path, &preview),
        };

        if !self.run_chain(attempts, &preview).await {
            warn!(job_id = %id, "all preview tools failed, rendering blank page");
            tokio::fs::write(&preview, placeholder_jpeg()?).await?;
        }

        Ok(tokio::fs::read(&preview).await?)
    }

    async fn run_chain(&self, attempts: Vec<Attempt>, output: &Path) -> bool {
        for attempt in attempts {
            match self.runner.run(&attempt.program, &attempt.args).await {
                Ok(_) if non_empty(output).await => {
                    info!(method = attempt.label, "preview rendered");
                    return true;
                }
                Ok(_) => debug!(method = attempt.label, "preview tool produced no output"),
                Err(e) => debug!(method = attempt.label, error = %e, "preview method failed"),
            }
        }
        false
    }

    fn pdf_attempts(&self, source: &Path, output: &Path) -> Vec<Attempt> {
        let src = path_arg(source);
        let out = path_arg(output);
        // pdftoppm appends the extension itself.
        let out_stem = path_arg(&output.with_extension(""));

        vec![
            Attempt {
                label: "pdftoppm",
                program: self.tools.pdftoppm.clone(),
                args: vec![
                    "-jpeg".into(),
                    "-f".into(),
                    "1".into(),
                    "-singlefile".into(),
                    src.clone(),
                    out_stem,
                ],
            },
            Attempt {
                label: "ghostscript",
                program: self.tools.gs.clone(),
                args: vec![
                    "-sDEVICE=jpeg".into(),
                    "-dTextAlphaBits=4".into(),
                    "-r150".into(),
                    "-dFirstPage=1".into(),
                    "-dLastPage=1".into(),
                    "-dNOPAUSE".into(),
                    "-dBATCH".into(),
                    format!("-sOutputFile={out}"),
                    src.clone(),
                ],
            },
            Attempt {
                label: "imagemagick",
                program: self.tools.convert.clone(),
                args: vec![
                    "-density".into(),
                    "150".into(),
                    format!("{src}[0]"),
                    "-quality".into(),
                    "90".into(),
                    out.clone(),
                ],
            },
            self.label_placeholder("PDF Preview", &out),
            self.blank_canvas(&out),
        ]
    }

    fn image_attempts(&self, source: &Path, output: &Path) -> Vec<Attempt> {
        let out = path_arg(output);
        vec![
            Attempt {
                label: "resize",
                program: self.tools.convert.clone(),
                args: vec![
                    path_arg(source),
                    "-resize".into(),
                    format!("{PREVIEW_WIDTH}x{PREVIEW_HEIGHT}"),
                    out.clone(),
                ],
            },
            self.label_placeholder("Preview", &out),
        ]
    }

    fn label_placeholder(&self, title: &str, out: &str) -> Attempt {
        Attempt {
            label: "label placeholder",
            program: self.tools.convert.clone(),
            args: vec![
                "-size".into(),
                format!("{PREVIEW_WIDTH}x{PREVIEW_HEIGHT}"),
                "-background".into(),
                "white".into(),
                "-fill".into(),
                "black".into(),
                "-gravity".into(),
                "center".into(),
                "-pointsize".into(),
                "20".into(),
                // ImageMagick expands the literal `\n`.
                format!("label:{title}\\nNot Available"),
                out.to_string(),
            ],
        }
    }

    fn blank_canvas(&self, out: &str) -> Attempt {
        Attempt {
            label: "blank canvas",
            program: self.tools.convert.clone(),
            args: vec![
                "-size".into(),
                format!("{PREVIEW_WIDTH}x{PREVIEW_HEIGHT}"),
                "xc:white".into(),
                out.to_string(),
            ],
        }
    }
}

/// Blank white page with a thin grey frame, encoded as JPEG.
pub fn placeholder_jpeg() -> Result<Vec<u8>> {
    let frame = Rgb([200u8, 200, 200]);
    let img = RgbImage::from_fn(PREVIEW_WIDTH, PREVIEW_HEIGHT, |x, y| {
        if x < 2 || y < 2 || x >= PREVIEW_WIDTH - 2 || y >= PREVIEW_HEIGHT - 2 {
            frame
        } else {
            Rgb([255, 255, 255])
        }
    });

    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|e| PrinthubError::ImageError(format!("failed to encode placeholder: {e}")))?;
    Ok(buf.into_inner())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

async fn non_empty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_a_decodable_jpeg() {
        let bytes = placeholder_jpeg().unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).unwrap();
        assert_eq!((img.width(), img.height()), (PREVIEW_WIDTH, PREVIEW_HEIGHT));
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use crate::store::tests::record;
        use crate::tools::testing::{CONVERT_COPY, FAIL, toolchain};

        /// `gs` stand-in that writes a marker to its -sOutputFile.
        const GS_MARK: &str = r#"for a; do case "$a" in -sOutputFile=*) printf 'gs-preview' > "${a#-sOutputFile=}";; esac; done"#;

        async fn setup(
            dir: &Path,
            pdftoppm: &str,
            gs: &str,
            convert: &str,
            format: ScanFormat,
        ) -> (PreviewGenerator, ScanId) {
            let (tools, runner) = toolchain(dir, FAIL, pdftoppm, gs, convert);
            let store = ScanStore::new(dir.join("scans"), "previews");
            store.ensure_dirs().await.unwrap();

            let rec = record(&store, format, format);
            std::fs::write(&rec.file_path, b"src").unwrap();
            store.save_record(&rec).await.unwrap();

            (PreviewGenerator::new(runner, store).with_tools(tools), rec.job_id)
        }

        #[tokio::test]
        async fn pdf_falls_through_to_ghostscript() {
            let dir = tempfile::tempdir().unwrap();
            let (previews, id) = setup(dir.path(), FAIL, GS_MARK, FAIL, ScanFormat::Pdf).await;
            assert_eq!(previews.preview(id).await.unwrap(), b"gs-preview");
        }

        #[tokio::test]
        async fn image_preview_uses_convert_resize() {
            let dir = tempfile::tempdir().unwrap();
            let (previews, id) = setup(dir.path(), FAIL, FAIL, CONVERT_COPY, ScanFormat::Jpg).await;
            assert_eq!(previews.preview(id).await.unwrap(), b"converted:src");
        }

        #[tokio::test]
        async fn every_tool_failing_yields_builtin_placeholder() {
            let dir = tempfile::tempdir().unwrap();
            let (previews, id) = setup(dir.path(), FAIL, FAIL, FAIL, ScanFormat::Pdf).await;
            let bytes = previews.preview(id).await.unwrap();
            assert_eq!(bytes, placeholder_jpeg().unwrap());
        }

        #[tokio::test]
        async fn cached_preview_is_reused() {
            let dir = tempfile::tempdir().unwrap();
            let (previews, id) = setup(dir.path(), FAIL, GS_MARK, FAIL, ScanFormat::Pdf).await;
            std::fs::write(previews.store.preview_path(id), b"cached").unwrap();
            assert_eq!(previews.preview(id).await.unwrap(), b"cached");
        }

        #[tokio::test]
        async fn empty_cached_preview_is_rendered_again() {
            let dir = tempfile::tempdir().unwrap();
            let (previews, id) = setup(dir.path(), FAIL, GS_MARK, FAIL, ScanFormat::Pdf).await;
            std::fs::write(previews.store.preview_path(id), b"").unwrap();
            assert_eq!(previews.preview(id).await.unwrap(), b"gs-preview");
        }

        #[tokio::test]
        async fn unknown_job_is_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let (previews, _) = setup(dir.path(), FAIL, FAIL, FAIL, ScanFormat::Pdf).await;
            let err = previews.preview(ScanId::new()).await.unwrap_err();
            assert!(matches!(err, PrinthubError::NotFound(_)));
        }
    }
}
