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

//! Connection lifecycle for the single SPP link.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::adapter::{BluetoothAdapter, DeviceHandle, Transport, SPP_UUID};
use super::framing::{FrameReader, FrameWriter, LineFramer, Message, ReaderExit};
use super::locator::DeviceLocator;
use crate::config::LinkConfig;
use crate::error::{FailureReason, LinkError, Result};
use crate::events::{ConnectionEvent, EventSink};
use crate::state::ConnectionState;

/// Upper bound on closing the outbound half during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Everything owned by an open link.
struct ActiveLink {
    attempt: u64,
    device: DeviceHandle,
    writer: FrameWriter,
    cancel: CancellationToken,
    closing: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl ActiveLink {
    /// Claim the right to tear this link down. Only the first caller wins.
    fn claim(&self) -> bool {
        self.closing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Stop the reader, wait for it, and close the outbound half.
    async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                error!("Frame reader task failed: {}", e);
            }
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, self.writer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Closing link: {}", e),
            Err(_) => warn!("Timed out closing link to {}", self.device),
        }
        info!("Link to {} closed", self.device);
    }
}

/// State guarded by the link mutex.
struct LinkSlot {
    state: ConnectionState,
    /// Bumped by every connect and by disconnects that abort one.
    attempt: u64,
    active: Option<ActiveLink>,
}

struct Inner<A> {
    adapter: Arc<A>,
    config: LinkConfig,
    sink: EventSink,
    slot: Mutex<LinkSlot>,
    state_tx: watch::Sender<ConnectionState>,
    messages: broadcast::Sender<Message>,
}

impl<A> Inner<A> {
    /// Must be called with the slot locked.
    fn set_state(&self, slot: &mut LinkSlot, state: ConnectionState) {
        debug!("Link state: {} -> {}", slot.state.as_str(), state.as_str());
        slot.state = state.clone();
        self.state_tx.send_replace(state);
    }

    /// Tear down after a read or write failure on link `attempt`.
    ///
    /// Returns the reader's handle so a caller other than the reader can
    /// wait for it. Does nothing when the link is already gone or another
    /// path claimed the teardown first.
    fn link_lost(&self, attempt: u64, detail: &str) -> Option<JoinHandle<()>> {
        let lost = {
            let mut slot = self.slot.lock();
            let owned = slot
                .active
                .as_ref()
                .map_or(false, |link| link.attempt == attempt && link.claim());
            if !owned {
                return None;
            }
            self.set_state(&mut slot, ConnectionState::Disconnected);
            self.sink
                .emit(ConnectionEvent::Failed(FailureReason::ConnectionLost));
            slot.active.take()
        };

        let mut link = lost?;
        warn!("Connection to {} lost: {}", link.device, detail);
        link.cancel.cancel();
        link.reader.take()
    }
}

/// Owns the connection to one bonded SPP peripheral.
///
/// Cheap to clone; clones share the same link.
pub struct LinkManager<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for LinkManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: BluetoothAdapter> LinkManager<A> {
    /// Create a link manager on top of `adapter`. Events go to `sink`.
    pub fn new(adapter: Arc<A>, config: LinkConfig, sink: EventSink) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (messages, _) = broadcast::channel(config.message_queue.max(1));

        Self {
            inner: Arc::new(Inner {
                adapter,
                config,
                sink,
                slot: Mutex::new(LinkSlot {
                    state: ConnectionState::Disconnected,
                    attempt: 0,
                    active: None,
                }),
                state_tx,
                messages,
            }),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.inner.slot.lock().state.clone()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Receive every line read from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.inner.messages.subscribe()
    }

    /// Device of the open link, if any.
    pub fn connected_device(&self) -> Option<DeviceHandle> {
        self.inner
            .slot
            .lock()
            .active
            .as_ref()
            .map(|link| link.device.clone())
    }

    /// Bonded devices known to the adapter.
    pub async fn bonded_devices(&self) -> Result<Vec<DeviceHandle>> {
        self.inner.adapter.state().await.check()?;
        Ok(self.inner.adapter.bonded_devices().await?)
    }

    /// Connect to the bonded device matching `criterion`.
    ///
    /// An open link is torn down first. Fails with
    /// [`LinkError::ConnectInProgress`] while another attempt is running.
    pub async fn connect(&self, criterion: &str) -> Result<DeviceHandle> {
        let (attempt, previous) = {
            let mut slot = self.inner.slot.lock();
            if slot.state == ConnectionState::Connecting {
                return Err(LinkError::ConnectInProgress);
            }
            let previous = slot.active.take().filter(|link| link.claim());
            if previous.is_some() {
                self.inner.sink.emit(ConnectionEvent::Disconnected);
            }
            slot.attempt += 1;
            let attempt = slot.attempt;
            self.inner.set_state(&mut slot, ConnectionState::Connecting);
            (attempt, previous)
        };

        if let Some(link) = previous {
            info!("Replacing link to {}", link.device);
            link.shutdown().await;
        }

        info!("Connecting to '{}'...", criterion);
        match self.open(criterion).await {
            Ok((device, transport)) => self.install(attempt, device, transport),
            Err(reason) => {
                let mut slot = self.inner.slot.lock();
                if slot.attempt != attempt {
                    return Err(LinkError::Aborted);
                }
                error!("Connection to '{}' failed: {}", criterion, reason);
                self.inner
                    .set_state(&mut slot, ConnectionState::Failed(reason.clone()));
                self.inner.sink.emit(ConnectionEvent::Failed(reason.clone()));
                Err(reason.into())
            }
        }
    }

    /// Resolve the device and open its stream. No link state is touched.
    async fn open(
        &self,
        criterion: &str,
    ) -> std::result::Result<(DeviceHandle, Transport), FailureReason> {
        let adapter = self.inner.adapter.as_ref();
        adapter.state().await.check()?;

        let device = DeviceLocator::new(adapter, self.inner.config.match_policy)
            .find(criterion)
            .await?;

        let transport = adapter
            .open_stream(&device, SPP_UUID)
            .await
            .map_err(|e| FailureReason::ConnectIo(e.to_string()))?;

        Ok((device, transport))
    }

    /// Publish a freshly opened stream as the active link, unless a
    /// disconnect or newer connect superseded `attempt` meanwhile.
    fn install(
        &self,
        attempt: u64,
        device: DeviceHandle,
        transport: Transport,
    ) -> Result<DeviceHandle> {
        let mut slot = self.inner.slot.lock();
        if slot.attempt != attempt || slot.state != ConnectionState::Connecting {
            info!("Discarding stream to {}: attempt aborted", device);
            return Err(LinkError::Aborted);
        }

        let Transport { reader, writer } = transport;
        let cancel = CancellationToken::new();
        let closing = Arc::new(AtomicBool::new(false));

        let frame_reader = FrameReader::new(
            reader,
            LineFramer::new(self.inner.config.max_line_len),
            self.inner.config.read_chunk_size,
            closing.clone(),
            self.inner.messages.clone(),
            self.inner.sink.clone(),
        );
        let inner = Arc::clone(&self.inner);
        let reader_cancel = cancel.clone();
        let reader = tokio::spawn(async move {
            if let ReaderExit::Lost(detail) = frame_reader.run(reader_cancel).await {
                // The handle is our own; dropping it detaches.
                drop(inner.link_lost(attempt, &detail));
            }
        });

        slot.active = Some(ActiveLink {
            attempt,
            device: device.clone(),
            writer: FrameWriter::new(writer),
            cancel,
            closing,
            reader: Some(reader),
        });
        self.inner.set_state(&mut slot, ConnectionState::Connected);
        self.inner.sink.emit(ConnectionEvent::Connected {
            device: device.clone(),
        });
        info!("Connected to {}", device);

        Ok(device)
    }

    /// Close the link. Idempotent.
    ///
    /// Returns once the frame reader has stopped.
    pub async fn disconnect(&self) {
        let link = {
            let mut slot = self.inner.slot.lock();
            let state = slot.state.clone();
            match state {
                ConnectionState::Connected => {
                    let link = slot.active.take().filter(|link| link.claim());
                    self.inner.set_state(&mut slot, ConnectionState::Disconnected);
                    if link.is_some() {
                        self.inner.sink.emit(ConnectionEvent::Disconnected);
                    }
                    link
                }
                ConnectionState::Connecting => {
                    info!("Aborting connection attempt");
                    slot.attempt += 1;
                    self.inner.set_state(&mut slot, ConnectionState::Disconnected);
                    None
                }
                _ => return,
            }
        };

        if let Some(link) = link {
            link.shutdown().await;
        }
    }

    /// Send one line. `text` must not contain a line break; the terminator
    /// is appended here.
    ///
    /// A write failure tears the link down exactly like a read failure, and
    /// returns once the reader has stopped.
    pub async fn send(&self, text: &str) -> Result<()> {
        if text.contains(['\n', '\r']) {
            return Err(LinkError::InvalidFrame);
        }

        let (attempt, writer) = {
            let slot = self.inner.slot.lock();
            match slot.active.as_ref() {
                Some(link) if slot.state.is_connected() => (link.attempt, link.writer.clone()),
                _ => return Err(LinkError::NotConnected),
            }
        };

        match writer.write_line(text).await {
            Ok(()) => {
                debug!("Sent {} bytes", text.len() + 1);
                Ok(())
            }
            Err(e) => {
                error!("Write error: {}", e);
                if let Some(reader) = self.inner.link_lost(attempt, &e.to_string()) {
                    if let Err(join_err) = reader.await {
                        error!("Frame reader task failed: {}", join_err);
                    }
                }
                Err(LinkError::Write(e))
            }
        }
    }
}
