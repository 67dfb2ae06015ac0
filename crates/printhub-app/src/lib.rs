// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printhub App: the HTTP API in front of the print and document crates.

pub mod routes;
pub mod services;

pub use routes::build_router;
pub use services::app_services::AppServices;
