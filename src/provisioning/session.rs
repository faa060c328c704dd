// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Request/response handshake for sending WiFi credentials.

use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::request::{classify, CommandFormat, CredentialPolicy, ProvisioningRequest, ProvisioningResult};
use crate::bluetooth::{BluetoothAdapter, LinkManager};
use crate::config::ProvisioningConfig;
use crate::error::ProvisionError;

/// Sends credentials over a link and waits for the bridge's verdict.
pub struct ProvisioningSession<A> {
    link: LinkManager<A>,
    policy: CredentialPolicy,
    format: CommandFormat,
    response_timeout: Duration,
    in_flight: Mutex<()>,
}

impl<A: BluetoothAdapter> ProvisioningSession<A> {
    pub fn new(link: LinkManager<A>, config: &ProvisioningConfig) -> Self {
        Self {
            link,
            policy: CredentialPolicy {
                min_password_len: config.min_password_len,
                trim_input: config.trim_input,
            },
            format: config.command_format,
            response_timeout: config.response_timeout(),
            in_flight: Mutex::new(()),
        }
    }

    /// Override the response deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Send `ssid`/`password` and wait for the bridge to answer.
    ///
    /// Resolves on the first success or failure line, or with
    /// [`ProvisioningResult::Timeout`] once the deadline passes. Lines with
    /// neither marker are skipped. Invalid input is rejected before
    /// anything is written.
    pub async fn send_credentials(
        &self,
        ssid: &str,
        password: &str,
    ) -> Result<ProvisioningResult, ProvisionError> {
        let request = ProvisioningRequest::new(ssid, password, &self.policy)?;

        // One request at a time, or replies would resolve the wrong caller.
        let _guard = self.in_flight.lock().await;

        // Subscribe before writing so a fast reply is not missed.
        let mut messages = self.link.subscribe();
        let mut state = self.link.watch_state();

        self.link.send(&request.command(self.format)).await?;
        info!("Credentials for '{}' sent, awaiting response", request.ssid);

        let deadline = tokio::time::sleep(self.response_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    warn!("No response within {:?}", self.response_timeout);
                    return Ok(ProvisioningResult::Timeout);
                }
                received = messages.recv() => match received {
                    Ok(message) => match classify(&message.text) {
                        ProvisioningResult::Unclassified(raw) => {
                            debug!("Unclassified response: {}", raw);
                        }
                        result => {
                            info!("Provisioning result: {}", result);
                            return Ok(result);
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} messages while awaiting response", skipped);
                    }
                    Err(RecvError::Closed) => return Err(ProvisionError::ConnectionLost),
                },
                changed = state.changed() => {
                    if changed.is_err() || !state.borrow().is_connected() {
                        warn!("Link closed while awaiting response");
                        return Err(ProvisionError::ConnectionLost);
                    }
                }
            }
        }
    }
}
