// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External imaging programs used by the document pipeline.

use printhub_core::command::CommandPolicy;

/// Executable names (or paths) of the SANE, poppler, Ghostscript and
/// ImageMagick tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub scanimage: String,
    pub pdftoppm: String,
    pub gs: String,
    pub convert: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            scanimage: "scanimage".into(),
            pdftoppm: "pdftoppm".into(),
            gs: "gs".into(),
            convert: "convert".into(),
        }
    }
}

impl Toolchain {
    /// A policy allowing exactly these programs.
    pub fn policy(&self) -> CommandPolicy {
        CommandPolicy::allow([
            self.scanimage.as_str(),
            self.pdftoppm.as_str(),
            self.gs.as_str(),
            self.convert.as_str(),
        ])
    }
}
