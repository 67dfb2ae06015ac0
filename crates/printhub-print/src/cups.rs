// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local CUPS queue: job submission through `lp` and job tracking through
// `lpstat`.
//
// The printer itself is only reachable through CUPS for printing, so this
// module shells out to the standard CUPS client tools via `CommandRunner`.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use printhub_core::command::CommandRunner;
use printhub_core::error::{PrinthubError, Result};
use printhub_core::types::{MediaKind, MediaSize, Orientation, PrintJobState, PrintSettings};

/// Title used when an upload's name sanitizes to nothing.
const FALLBACK_FILE_NAME: &str = "document";

/// Result of a job status lookup, shaped for the JSON API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub job_id: String,
    pub status: PrintJobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The matching `lpstat -o` line while the job is queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub printer_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusReport {
    fn new(job_id: &str, status: PrintJobState, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status,
            message: Some(message.to_string()),
            details: None,
            printer_state: None,
            error: None,
        }
    }
}

/// Client for the local CUPS scheduler.
#[derive(Debug, Clone)]
pub struct CupsClient {
    runner: CommandRunner,
    printer_name: String,
    lp: String,
    lpstat: String,
}

impl CupsClient {
    pub fn new(runner: CommandRunner, printer_name: impl Into<String>) -> Self {
        Self {
            runner,
            printer_name: printer_name.into(),
            lp: "lp".into(),
            lpstat: "lpstat".into(),
        }
    }

    /// Use different `lp` / `lpstat` executables.
    pub fn with_programs(mut self, lp: impl Into<String>, lpstat: impl Into<String>) -> Self {
        self.lp = lp.into();
        self.lpstat = lpstat.into();
        self
    }

    pub fn printer_name(&self) -> &str {
        &self.printer_name
    }

    /// Stage an uploaded document in a private temporary directory and
    /// submit it.  The directory is removed whether or not `lp` succeeds.
    #[instrument(skip(self, contents, settings), fields(printer = %self.printer_name, bytes = contents.len()))]
    pub async fn print_upload(
        &self,
        file_name: &str,
        contents: &[u8],
        settings: &PrintSettings,
    ) -> Result<String> {
        let name = sanitize_file_name(file_name);
        let staging = tempfile::Builder::new().prefix("print-").tempdir()?;
        let path = staging.path().join(&name);
        tokio::fs::write(&path, contents).await?;
        debug!(path = %path.display(), "upload staged");

        self.submit(&path, &name, settings).await
    }

    /// Submit a file already on disk; returns the CUPS request id or
    /// `"unknown"` when `lp` does not print one.
    pub async fn submit(&self, path: &Path, title: &str, settings: &PrintSettings) -> Result<String> {
        let args = lp_args(&self.printer_name, settings, title, path);
        let output = self.runner.run(&self.lp, &args).await?;

        let job_id = parse_request_id(&output.stdout)
            .unwrap_or("unknown")
            .to_string();
        info!(job_id = %job_id, "print job submitted");
        Ok(job_id)
    }

    /// Raw `lpstat -p` output for every queue.
    pub async fn printer_overview(&self) -> Result<String> {
        let output = self.runner.run(&self.lpstat, &["-p".to_string()]).await?;
        Ok(output.stdout)
    }

    /// Work out what happened to `job_id`.
    ///
    /// Checks the active queue first, then the completed list, then the
    /// printer's own state.  A job found nowhere is assumed completed.
    #[instrument(skip(self))]
    pub async fn job_status(&self, job_id: &str) -> Result<JobStatusReport> {
        validate_job_id(job_id)?;
        let printer = printer_for_job(job_id).to_string();

        let queue = self
            .runner
            .output(&self.lpstat, &["-o".to_string(), printer.clone()])
            .await?;
        let stderr = queue.stderr.trim();
        if !stderr.is_empty() {
            warn!(printer = %printer, stderr, "lpstat -o reported an error");
            return Ok(JobStatusReport {
                error: Some(stderr.to_string()),
                message: None,
                ..JobStatusReport::new(job_id, PrintJobState::Unknown, "")
            });
        }
        if !queue.success() {
            return Err(PrinthubError::CommandFailed {
                program: self.lpstat.clone(),
                status: queue.status.unwrap_or(-1),
                stderr: String::new(),
            });
        }

        if let Some(line) = find_job_line(&queue.stdout, job_id) {
            return Ok(JobStatusReport {
                details: Some(line.to_string()),
                ..JobStatusReport::new(job_id, PrintJobState::Processing, "Job is being processed")
            });
        }

        let completed_args = ["-W".to_string(), "completed".to_string()];
        match self.runner.run(&self.lpstat, &completed_args).await {
            Ok(out) if out.stdout.contains(job_id) => {
                return Ok(JobStatusReport::new(
                    job_id,
                    PrintJobState::Completed,
                    "Print job completed successfully",
                ));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not list completed jobs"),
        }

        match self.runner.run(&self.lpstat, &["-p".to_string(), printer.clone()]).await {
            Ok(out) if printer_unhealthy(&out.stdout) => {
                return Ok(JobStatusReport {
                    printer_state: Some(out.stdout.trim().to_string()),
                    ..JobStatusReport::new(
                        job_id,
                        PrintJobState::Aborted,
                        "Printer is disabled or in error state",
                    )
                });
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "could not check printer state"),
        }

        Ok(JobStatusReport::new(
            job_id,
            PrintJobState::Completed,
            "Job is no longer in the queue (assumed completed)",
        ))
    }
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Build the `lp` argument vector for one job.
pub fn lp_args(printer: &str, settings: &PrintSettings, title: &str, path: &Path) -> Vec<String> {
    let mut args = vec!["-d".to_string(), printer.to_string()];

    if let Some(copies) = settings.copies.filter(|c| *c > 1) {
        args.push("-n".into());
        args.push(copies.to_string());
    }
    if let Some(quality) = settings.quality {
        args.push("-o".into());
        args.push(format!("print-quality={}", quality.ipp_value()));
    }
    if let Some(color) = settings.color {
        args.push("-o".into());
        args.push(format!("print-color-mode={}", color.ipp_keyword()));
    }
    if settings.orientation == Some(Orientation::Landscape) {
        args.push("-o".into());
        args.push(format!(
            "orientation-requested={}",
            Orientation::Landscape.ipp_enum_value()
        ));
    }

    let media = settings.media_size.unwrap_or(MediaSize::A4);
    args.push("-o".into());
    args.push(format!("media={}", media.ipp_media_keyword()));

    let kind = settings.kind.unwrap_or(MediaKind::Document);
    args.push("-o".into());
    args.push(format!("media-type={}", kind.ipp_media_type()));

    args.push("-t".into());
    args.push(title.to_string());
    args.push(path.to_string_lossy().into_owned());
    args
}

/// Extract `<id>` from `lp`'s "request id is <id> (1 file(s))" line.
pub fn parse_request_id(stdout: &str) -> Option<&str> {
    let rest = &stdout[stdout.find("request id is ")? + "request id is ".len()..];
    rest.split_whitespace().next()
}

/// CUPS job ids are `<queue>-<n>`; the queue is everything before the first `-`.
pub fn printer_for_job(job_id: &str) -> &str {
    job_id.split('-').next().unwrap_or(job_id)
}

/// The `lpstat -o` line describing `job_id`, trimmed.
pub fn find_job_line<'a>(stdout: &'a str, job_id: &str) -> Option<&'a str> {
    stdout
        .lines()
        .find(|line| line.contains(job_id))
        .map(str::trim)
}

/// Whether `lpstat -p` output shows the queue disabled or faulted.
pub fn printer_unhealthy(stdout: &str) -> bool {
    stdout.contains("disabled") || stdout.contains("error")
}

/// Make an upload's name safe to use as a file name and job title.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let mut out = String::with_capacity(base.len());
    let mut in_space = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        }
    }

    let trimmed = out.trim_start_matches('.');
    if trimmed.is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

fn validate_job_id(job_id: &str) -> Result<()> {
    let valid = !job_id.is_empty()
        && !job_id.starts_with('-')
        && job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(PrinthubError::InvalidRequest(format!("invalid print job id '{job_id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::time::Duration;

    use printhub_core::command::CommandPolicy;
    use printhub_core::types::{PrintColor, PrintQuality};

    #[test]
    fn lp_args_for_defaults() {
        let args = lp_args(
            "office",
            &PrintSettings::default(),
            "report.pdf",
            Path::new("/tmp/print-x/report.pdf"),
        );
        assert_eq!(
            args,
            vec![
                "-d",
                "office",
                "-o",
                "media=iso_a4_210x297mm",
                "-o",
                "media-type=stationery",
                "-t",
                "report.pdf",
                "/tmp/print-x/report.pdf",
            ]
        );
    }

    #[test]
    fn lp_args_for_full_settings() {
        let settings = PrintSettings {
            quality: Some(PrintQuality::High),
            color: Some(PrintColor::Bw),
            copies: Some(3),
            kind: Some(MediaKind::Photo),
            orientation: Some(Orientation::Landscape),
            media_size: Some(MediaSize::Photo4x6),
        };
        let args = lp_args("office", &settings, "cat.jpg", Path::new("/tmp/cat.jpg"));
        assert_eq!(
            args,
            vec![
                "-d",
                "office",
                "-n",
                "3",
                "-o",
                "print-quality=5",
                "-o",
                "print-color-mode=monochrome",
                "-o",
                "orientation-requested=4",
                "-o",
                "media=na_index-4x6_4x6in",
                "-o",
                "media-type=photographic-glossy",
                "-t",
                "cat.jpg",
                "/tmp/cat.jpg",
            ]
        );
    }

    #[test]
    fn single_copy_and_portrait_add_no_options() {
        let settings = PrintSettings {
            copies: Some(1),
            orientation: Some(Orientation::Portrait),
            ..PrintSettings::default()
        };
        let args = lp_args("p", &settings, "t", Path::new("/f"));
        assert!(!args.contains(&"-n".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("orientation-requested")));
    }

    #[test]
    fn request_id_is_parsed() {
        assert_eq!(
            parse_request_id("request id is office-42 (1 file(s))\n"),
            Some("office-42")
        );
        assert_eq!(parse_request_id("lp: Error - no default destination"), None);
    }

    #[test]
    fn printer_is_prefix_of_job_id() {
        assert_eq!(printer_for_job("office-42"), "office");
        assert_eq!(printer_for_job("office"), "office");
    }

    #[test]
    fn job_line_is_found_and_trimmed() {
        let out = "office-41 alice 1024 Mon\n  office-42 bob 2048 Mon  \n";
        assert_eq!(find_job_line(out, "office-42"), Some("office-42 bob 2048 Mon"));
        assert_eq!(find_job_line(out, "office-43"), None);
    }

    #[test]
    fn unhealthy_printer_detection() {
        assert!(printer_unhealthy("printer office disabled since Mon"));
        assert!(printer_unhealthy("printer office is idle. error: paper jam"));
        assert!(!printer_unhealthy("printer office is idle.  enabled since Mon"));
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("My Report  2024.pdf"), "My_Report_2024.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\doc.pdf"), "doc.pdf");
        assert_eq!(sanitize_file_name("rapport$;|.pdf"), "rapport.pdf");
        assert_eq!(sanitize_file_name("résumé.pdf"), "rsum.pdf");
        assert_eq!(sanitize_file_name(""), "document");
        assert_eq!(sanitize_file_name("..."), "document");
    }

    #[test]
    fn job_ids_that_look_like_options_are_rejected() {
        assert!(validate_job_id("office-42").is_ok());
        assert!(validate_job_id("-W").is_err());
        assert!(validate_job_id("office 42").is_err());
        assert!(validate_job_id("").is_err());
    }

    #[test]
    fn job_status_report_omits_empty_fields() {
        let report = JobStatusReport::new("office-1", PrintJobState::Completed, "done");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["jobId"], "office-1");
        assert_eq!(json["status"], "completed");
        assert!(json.get("details").is_none());
        assert!(json.get("error").is_none());
    }

    // -- Against fake CUPS tools ---------------------------------------------

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn fake_cups(dir: &Path, lp_body: &str, lpstat_body: &str) -> CupsClient {
        let lp = fake_tool(dir, "lp", lp_body);
        let lpstat = fake_tool(dir, "lpstat", lpstat_body);
        let lp = lp.to_string_lossy().into_owned();
        let lpstat = lpstat.to_string_lossy().into_owned();
        let runner = CommandRunner::new(Duration::from_secs(5))
            .with_policy(CommandPolicy::allow([lp.clone(), lpstat.clone()]));
        CupsClient::new(runner, "office").with_programs(lp, lpstat)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn print_upload_returns_request_id() {
        let dir = tempfile::tempdir().unwrap();
        // Echo the staged file's contents so the test can see it was written.
        let cups = fake_cups(
            dir.path(),
            r#"for last; do :; done; cat "$last" >&2; echo "request id is office-7 (1 file(s))""#,
            "true",
        );
        let id = cups
            .print_upload("my file.pdf", b"%PDF-1.4", &PrintSettings::default())
            .await
            .unwrap();
        assert_eq!(id, "office-7");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn print_upload_without_request_id_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let cups = fake_cups(dir.path(), "echo queued", "true");
        let id = cups
            .print_upload("a.pdf", b"x", &PrintSettings::default())
            .await
            .unwrap();
        assert_eq!(id, "unknown");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_lp_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cups = fake_cups(dir.path(), "echo 'lp: printer not found' >&2; exit 1", "true");
        let err = cups
            .print_upload("a.pdf", b"x", &PrintSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PrinthubError::CommandFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn queued_job_is_processing() {
        let dir = tempfile::tempdir().unwrap();
        let cups = fake_cups(
            dir.path(),
            "true",
            r#"[ "$1" = "-o" ] && echo "office-42 bob 2048 Mon 10:00""#,
        );
        let report = cups.job_status("office-42").await.unwrap();
        assert_eq!(report.status, PrintJobState::Processing);
        assert_eq!(report.details.as_deref(), Some("office-42 bob 2048 Mon 10:00"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lpstat_stderr_makes_status_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let cups = fake_cups(dir.path(), "true", "echo 'lpstat: Invalid destination name' >&2");
        let report = cups.job_status("ghost-1").await.unwrap();
        assert_eq!(report.status, PrintJobState::Unknown);
        assert_eq!(report.error.as_deref(), Some("lpstat: Invalid destination name"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn completed_list_means_completed() {
        let dir = tempfile::tempdir().unwrap();
        let cups = fake_cups(
            dir.path(),
            "true",
            r#"[ "$1" = "-W" ] && echo "office-42 bob 2048 Mon"; exit 0"#,
        );
        let report = cups.job_status("office-42").await.unwrap();
        assert_eq!(report.status, PrintJobState::Completed);
        assert_eq!(report.message.as_deref(), Some("Print job completed successfully"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn disabled_printer_means_aborted() {
        let dir = tempfile::tempdir().unwrap();
        let cups = fake_cups(
            dir.path(),
            "true",
            r#"[ "$1" = "-p" ] && echo "printer office disabled since Mon"; exit 0"#,
        );
        let report = cups.job_status("office-42").await.unwrap();
        assert_eq!(report.status, PrintJobState::Aborted);
        assert_eq!(
            report.printer_state.as_deref(),
            Some("printer office disabled since Mon")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn vanished_job_is_assumed_completed() {
        let dir = tempfile::tempdir().unwrap();
        let cups = fake_cups(dir.path(), "true", "exit 0");
        let report = cups.job_status("office-42").await.unwrap();
        assert_eq!(report.status, PrintJobState::Completed);
        assert_eq!(
            report.message.as_deref(),
            Some("Job is no longer in the queue (assumed completed)")
        );
    }
}
