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

//! Bonded device lookup.

use bluer::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::adapter::{BluetoothAdapter, DeviceHandle};
use crate::error::FailureReason;

/// How a name criterion is compared against bonded device names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Name must be equal to the criterion.
    #[default]
    Exact,
    /// Name must contain the criterion.
    Contains,
}

impl MatchPolicy {
    pub fn matches(self, name: &str, criterion: &str) -> bool {
        match self {
            MatchPolicy::Exact => name == criterion,
            MatchPolicy::Contains => name.contains(criterion),
        }
    }
}

/// Resolves a bonded device by name or address.
pub struct DeviceLocator<'a, A> {
    adapter: &'a A,
    policy: MatchPolicy,
}

impl<'a, A: BluetoothAdapter> DeviceLocator<'a, A> {
    pub fn new(adapter: &'a A, policy: MatchPolicy) -> Self {
        Self { adapter, policy }
    }

    /// Find the first bonded device matching `criterion`.
    ///
    /// A criterion that parses as a Bluetooth address is matched against
    /// device addresses; anything else against names using the policy.
    pub async fn find(&self, criterion: &str) -> Result<DeviceHandle, FailureReason> {
        let devices = self.adapter.bonded_devices().await?;
        debug!("{} bonded devices", devices.len());

        let found = match criterion.parse::<Address>() {
            Ok(address) => devices.into_iter().find(|d| d.address == address),
            Err(_) => devices
                .into_iter()
                .find(|d| self.policy.matches(&d.name, criterion)),
        };

        match found {
            Some(device) => {
                info!("Resolved '{}' to {}", criterion, device);
                Ok(device)
            }
            None => Err(FailureReason::DeviceNotFound(criterion.to_string())),
        }
    }
}
