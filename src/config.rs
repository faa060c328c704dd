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

//! Configuration module.
//!
//! Handles loading and saving application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::MatchPolicy;
use crate::provisioning::CommandFormat;

const APP_DIR: &str = "spp-wifi-provisioner";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Link and framing settings.
    pub link: LinkConfig,

    /// Provisioning handshake settings.
    pub provisioning: ProvisioningConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Bonded device to connect to (name or address).
    pub device_name: String,

    /// Connect straight to this RFCOMM channel instead of looking the SPP
    /// service up over SDP.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rfcomm_channel: Option<u8>,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device_name: "ESP32ETH2WiFi".to_string(),
            rfcomm_channel: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// How device names are matched.
    pub match_policy: MatchPolicy,

    /// Bytes requested per read.
    pub read_chunk_size: usize,

    /// Capacity of the message queue feeding protocol subscribers.
    pub message_queue: usize,

    /// Longest accepted inbound line in bytes.
    pub max_line_len: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            match_policy: MatchPolicy::Exact,
            read_chunk_size: 1024,
            message_queue: 64,
            max_line_len: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Minimum password length in characters.
    pub min_password_len: usize,

    /// Seconds to wait for the peripheral's answer.
    pub response_timeout_secs: u64,

    /// Outbound command layout.
    pub command_format: CommandFormat,

    /// Strip surrounding whitespace from SSID and password.
    pub trim_input: bool,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            min_password_len: 8,
            response_timeout_secs: 10,
            command_format: CommandFormat::SetWifi,
            trim_input: true,
        }
    }
}

impl ProvisioningConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default file or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults there if the file
    /// does not exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
