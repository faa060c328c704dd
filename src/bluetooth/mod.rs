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

//! Bluetooth communication module.
//!
//! Handles the RFCOMM (SPP) link to the provisioning bridge and the line
//! framing on top of it.

mod adapter;
mod bluez;
mod framing;
mod link;
mod locator;

pub use adapter::{
    AdapterState, BluetoothAdapter, BoxedReader, BoxedWriter, DeviceHandle, Transport, SPP_UUID,
};
pub use bluez::BluezAdapter;
pub use framing::{FrameReader, FrameWriter, LineFramer, Message, ReaderExit};
pub use link::LinkManager;
pub use locator::{DeviceLocator, MatchPolicy};
