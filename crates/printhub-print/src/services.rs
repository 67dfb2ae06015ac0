// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-over of the printer's USB port between VirtualHere (remote USB
// sharing) and ipp-usb (local IPP-over-USB), both managed as systemd units.

use tracing::{info, instrument};

use printhub_core::command::CommandRunner;
use printhub_core::error::Result;
use printhub_core::types::{ServiceAction, ServiceState, UsbSharingStatus};

/// Controls the two systemd units that compete for the printer's USB port.
#[derive(Debug, Clone)]
pub struct UsbSharing {
    runner: CommandRunner,
    systemctl: String,
    virtualhere_unit: String,
    ipp_usb_unit: String,
}

impl UsbSharing {
    pub fn new(
        runner: CommandRunner,
        virtualhere_unit: impl Into<String>,
        ipp_usb_unit: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            systemctl: "systemctl".into(),
            virtualhere_unit: virtualhere_unit.into(),
            ipp_usb_unit: ipp_usb_unit.into(),
        }
    }

    /// Use a different `systemctl` executable.
    pub fn with_systemctl(mut self, program: impl Into<String>) -> Self {
        self.systemctl = program.into();
        self
    }

    /// Report whether each unit is active.
    #[instrument(skip(self))]
    pub async fn status(&self) -> Result<UsbSharingStatus> {
        Ok(UsbSharingStatus {
            virtualhere: self.unit_state(&self.virtualhere_unit).await?,
            ipp_usb: self.unit_state(&self.ipp_usb_unit).await?,
        })
    }

    /// Start VirtualHere, or stop it and give the port back to ipp-usb.
    ///
    /// Returns the message shown to the user.
    #[instrument(skip(self))]
    pub async fn apply(&self, action: ServiceAction) -> Result<&'static str> {
        match action {
            ServiceAction::Start => {
                self.systemctl("start", &self.virtualhere_unit).await?;
                info!(unit = %self.virtualhere_unit, "VirtualHere started");
                Ok("VirtualHere service started successfully")
            }
            ServiceAction::Stop => {
                self.systemctl("stop", &self.virtualhere_unit).await?;
                self.systemctl("restart", &self.ipp_usb_unit).await?;
                info!(unit = %self.ipp_usb_unit, "VirtualHere stopped, ipp-usb restarted");
                Ok("VirtualHere service stopped and IPP-USB service restarted")
            }
        }
    }

    // `is-active` exits non-zero for inactive units; its output is the answer
    // either way.
    async fn unit_state(&self, unit: &str) -> Result<ServiceState> {
        let output = self
            .runner
            .privileged_output(&self.systemctl, &["is-active".to_string(), unit.to_string()])
            .await?;
        Ok(ServiceState::from_is_active_output(&output.combined()))
    }

    async fn systemctl(&self, verb: &str, unit: &str) -> Result<()> {
        self.runner
            .privileged_run(&self.systemctl, &[verb.to_string(), unit.to_string()])
            .await?;
        Ok(())
    }
}
