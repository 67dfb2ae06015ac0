// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printhub: Core types, configuration, errors and the subprocess runner
// shared across all crates.

pub mod command;
pub mod config;
pub mod error;
pub mod types;

pub use command::{CommandOutput, CommandPolicy, CommandRunner};
pub use config::AppConfig;
pub use error::PrinthubError;
pub use types::*;
