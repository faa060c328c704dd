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

//! Platform Bluetooth capability.
//!
//! The link layer never reaches for a global adapter. Everything it needs
//! from the platform goes through a [`BluetoothAdapter`] value handed to
//! [`super::LinkManager::new`].

use bluer::Address;
use std::fmt;
use std::future::Future;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use crate::error::FailureReason;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Inbound half of an open link.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Outbound half of an open link.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Availability of the local adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Ready,
    Disabled,
    PermissionDenied,
    Unavailable,
}

impl AdapterState {
    /// Turn a non-ready adapter into the matching failure.
    pub fn check(self) -> Result<(), FailureReason> {
        match self {
            AdapterState::Ready => Ok(()),
            AdapterState::Disabled => Err(FailureReason::AdapterDisabled),
            AdapterState::PermissionDenied => Err(FailureReason::PermissionDenied),
            AdapterState::Unavailable => Err(FailureReason::AdapterUnavailable),
        }
    }
}

/// A bonded remote device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub name: String,
    pub address: Address,
}

impl DeviceHandle {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.name, self.address)
    }
}

/// An open byte-stream link, split into its two directions.
pub struct Transport {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl Transport {
    /// Build a transport from separately owned halves.
    pub fn new(
        reader: impl AsyncRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Split a bidirectional stream into a transport.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

/// What the link layer needs from the platform Bluetooth stack.
pub trait BluetoothAdapter: Send + Sync + 'static {
    /// Query whether the adapter can be used right now.
    fn state(&self) -> impl Future<Output = AdapterState> + Send;

    /// Enumerate bonded (paired) devices.
    fn bonded_devices(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceHandle>, FailureReason>> + Send;

    /// Open a byte stream to `device` for the given service. May block for
    /// as long as the platform takes to connect.
    fn open_stream(
        &self,
        device: &DeviceHandle,
        service: Uuid,
    ) -> impl Future<Output = io::Result<Transport>> + Send;
}
