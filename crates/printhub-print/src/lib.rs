// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printhub Print: everything that talks to the printer: the embedded web
// console (head cleaning), the IPP status endpoint, the local CUPS queue and
// the systemd units that share the printer's USB port.

pub mod csrf;
pub mod cups;
pub mod ipp_client;
pub mod services;
pub mod web_access;

pub use csrf::{RegexTokenExtractor, TokenExtractor};
pub use cups::{CupsClient, JobStatusReport};
pub use ipp_client::{IppClient, StatusAttributes};
pub use services::UsbSharing;
pub use web_access::{CleaningStep, MaintenanceError, PrinterWebClient, SessionCookie};
