// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// mDNS-SD advertisement of the web UI as `_http._tcp.local.`, so phones and
// laptops on the LAN can find the server without knowing its address.

use mdns_sd::{ServiceDaemon, ServiceInfo};
use tracing::{info, warn};

/// mDNS service type for the web UI.
pub const HTTP_SERVICE_TYPE: &str = "_http._tcp.local.";

/// A live registration; dropped advertisements are not withdrawn, call
/// [`shutdown`](Self::shutdown).
pub struct LanAdvertisement {
    daemon: ServiceDaemon,
    fullname: String,
}

impl LanAdvertisement {
    /// Register `instance` on `port`.
    ///
    /// Failure is logged and returns `None`: the API still works by address.
    pub fn register(instance: &str, port: u16) -> Option<Self> {
        let daemon = match ServiceDaemon::new() {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "failed to create mDNS daemon for advertisement");
                return None;
            }
        };

        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "printhub".into());
        let service_info = match service_info(instance, &hostname, port) {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "failed to create mDNS ServiceInfo");
                return None;
            }
        };

        let fullname = service_info.get_fullname().to_owned();
        if let Err(e) = daemon.register(service_info) {
            warn!(error = %e, "failed to register mDNS service");
            return None;
        }

        info!(service_type = HTTP_SERVICE_TYPE, name = %instance, port, "mDNS service registered");
        Some(Self { daemon, fullname })
    }

    /// Withdraw the advertisement and stop the daemon.
    pub fn shutdown(self) {
        match self.daemon.unregister(&self.fullname) {
            Ok(_) => info!(name = %self.fullname, "mDNS service unregistered"),
            Err(e) => warn!(error = %e, "failed to unregister mDNS service"),
        }
        if let Err(e) = self.daemon.shutdown() {
            warn!(error = %e, "failed to shut down mDNS daemon");
        }
    }
}

/// Service record for the web UI; addresses are filled in by the daemon.
pub fn service_info(instance: &str, hostname: &str, port: u16) -> Result<ServiceInfo, mdns_sd::Error> {
    let properties = [("path", "/"), ("product", "printhub")];
    let info = ServiceInfo::new(
        HTTP_SERVICE_TYPE,
        instance,
        &format!("{hostname}.local."),
        "",
        port,
        &properties[..],
    )?;
    Ok(info.enable_addr_auto())
}
