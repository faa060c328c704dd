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

//! Bluetooth SPP link manager and WiFi provisioning client for ESP32
//! Ethernet-to-WiFi bridges.

pub mod bluetooth;
pub mod config;
pub mod error;
pub mod events;
pub mod provisioning;
pub mod state;

pub use bluetooth::{BluetoothAdapter, BluezAdapter, DeviceHandle, LinkManager, Message};
pub use config::Config;
pub use error::{CredentialError, FailureReason, LinkError, ProvisionError};
pub use events::{ConnectionEvent, EventProcessor, EventSink};
pub use provisioning::{ProvisioningResult, ProvisioningSession};
pub use state::{ConnectionState, LinkStatus};
