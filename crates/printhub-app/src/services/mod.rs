// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: wires configuration into the backend crates for the HTTP
// handlers, and advertises the server on the LAN.

pub mod advertise;
pub mod app_services;
