// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printhub-document: the scanning side of printhub.
//
// Runs SANE scans into a scan directory, renders cached JPEG previews of the
// results, and bundles pages into PDF, image or ZIP downloads.  Heavy lifting
// is delegated to scanimage, poppler, Ghostscript and ImageMagick.

pub mod bundle;
pub mod preview;
pub mod scan;
pub mod store;
pub mod tools;

pub use bundle::{Bundler, Download};
pub use preview::PreviewGenerator;
pub use scan::Scanner;
pub use store::ScanStore;
pub use tools::Toolchain;
