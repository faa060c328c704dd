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

//! BlueZ implementation of the adapter capability.

use bluer::rfcomm::{Profile, Role, SocketAddr, Stream};
use bluer::{Adapter, ErrorKind, Session};
use futures::StreamExt;
use std::io;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::adapter::{AdapterState, BluetoothAdapter, DeviceHandle, Transport};
use crate::error::FailureReason;

/// Bluetooth adapter backed by the system BlueZ daemon.
pub struct BluezAdapter {
    handles: Option<(Session, Adapter)>,
    rfcomm_channel: Option<u8>,
}

impl BluezAdapter {
    /// Open a BlueZ session on the default adapter.
    ///
    /// Never fails: without a usable adapter every operation reports
    /// [`AdapterState::Unavailable`]. With `rfcomm_channel` set, streams are
    /// opened on that channel directly instead of via an SDP lookup.
    pub async fn new(rfcomm_channel: Option<u8>) -> Self {
        let handles = match Self::open_session().await {
            Ok(handles) => Some(handles),
            Err(e) => {
                warn!("Bluetooth unavailable: {}", e);
                None
            }
        };

        Self {
            handles,
            rfcomm_channel,
        }
    }

    async fn open_session() -> bluer::Result<(Session, Adapter)> {
        // Create BlueZ session
        let session = Session::new().await?;
        info!("BlueZ session created");

        // Get the default adapter
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        Ok((session, adapter))
    }

    fn handles(&self) -> io::Result<&(Session, Adapter)> {
        self.handles
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no BlueZ session"))
    }

    /// Connect through a client profile registered for `service`, letting
    /// BlueZ resolve the RFCOMM channel over SDP.
    async fn connect_profile(
        session: &Session,
        adapter: &Adapter,
        device: &DeviceHandle,
        service: Uuid,
    ) -> io::Result<Stream> {
        let profile = Profile {
            uuid: service,
            name: Some("SPP client".to_string()),
            role: Some(Role::Client),
            require_authentication: Some(false),
            require_authorization: Some(false),
            auto_connect: Some(false),
            ..Default::default()
        };
        let mut handle = session.register_profile(profile).await.map_err(io_error)?;
        debug!("Registered SPP client profile {}", service);

        let target = adapter.device(device.address).map_err(io_error)?;

        // BlueZ hands the socket to the profile while connect_profile is
        // still pending, so wait on both.
        let request = tokio::select! {
            res = target.connect_profile(&service) => {
                res.map_err(io_error)?;
                handle.next().await
            }
            req = handle.next() => req,
        };
        let request = request.ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "profile closed before a connection arrived",
            )
        })?;

        request.accept().map_err(io_error)
    }
}

impl BluetoothAdapter for BluezAdapter {
    async fn state(&self) -> AdapterState {
        let Some((_, adapter)) = self.handles.as_ref() else {
            return AdapterState::Unavailable;
        };

        match adapter.is_powered().await {
            Ok(true) => AdapterState::Ready,
            Ok(false) => AdapterState::Disabled,
            Err(e) if is_permission_error(&e) => AdapterState::PermissionDenied,
            Err(e) => {
                warn!("Adapter query failed: {}", e);
                AdapterState::Unavailable
            }
        }
    }

    async fn bonded_devices(&self) -> Result<Vec<DeviceHandle>, FailureReason> {
        let (_, adapter) = self
            .handles
            .as_ref()
            .ok_or(FailureReason::AdapterUnavailable)?;

        let mut devices = Vec::new();
        for address in adapter.device_addresses().await.map_err(failure)? {
            let device = adapter.device(address).map_err(failure)?;
            if !device.is_paired().await.unwrap_or(false) {
                continue;
            }
            let name = match device.name().await {
                Ok(Some(name)) => name,
                _ => device.alias().await.unwrap_or_else(|_| address.to_string()),
            };
            debug!("Bonded device: {} - {}", name, address);
            devices.push(DeviceHandle::new(name, address));
        }

        Ok(devices)
    }

    async fn open_stream(&self, device: &DeviceHandle, service: Uuid) -> io::Result<Transport> {
        let (session, adapter) = self.handles()?;

        let stream = match self.rfcomm_channel {
            Some(channel) => {
                info!("Opening RFCOMM channel {} on {}", channel, device.address);
                Stream::connect(SocketAddr::new(device.address, channel))
                    .await
                    .map_err(io_error)?
            }
            None => {
                info!("Opening SPP service {} on {}", service, device.address);
                Self::connect_profile(session, adapter, device, service).await?
            }
        };

        let (reader, writer) = stream.into_split();
        Ok(Transport::new(reader, writer))
    }
}

fn is_permission_error(err: &bluer::Error) -> bool {
    matches!(err.kind, ErrorKind::NotAuthorized | ErrorKind::NotPermitted)
}

fn failure(err: bluer::Error) -> FailureReason {
    if is_permission_error(&err) {
        FailureReason::PermissionDenied
    } else {
        warn!("Bluetooth error: {}", err);
        FailureReason::AdapterUnavailable
    }
}

fn io_error<E>(err: E) -> io::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    io::Error::new(io::ErrorKind::Other, err)
}
