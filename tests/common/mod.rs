//! In-memory adapter shared by the integration tests.

#![allow(dead_code)]

use bluer::Address;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncWrite, DuplexStream};
use uuid::Uuid;

use spp_wifi_provisioner::bluetooth::{AdapterState, BluetoothAdapter, DeviceHandle, Transport};
use spp_wifi_provisioner::config::LinkConfig;
use spp_wifi_provisioner::events::{ConnectionEvent, EventSink};
use spp_wifi_provisioner::{FailureReason, LinkManager};

pub const BRIDGE: &str = "ESP32ETH2WiFi";

pub fn bridge_address() -> Address {
    Address::new([0x24, 0x6F, 0x28, 0x01, 0x02, 0x03])
}

/// Adapter whose streams are queued up front by the test.
pub struct MockAdapter {
    pub state: Mutex<AdapterState>,
    pub devices: Vec<DeviceHandle>,
    pending: Mutex<VecDeque<io::Result<Transport>>>,
    pub open_delay: Mutex<Duration>,
    pub opened: AtomicUsize,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(AdapterState::Ready),
            devices: vec![
                DeviceHandle::new("Headphones", Address::new([0x10, 0, 0, 0, 0, 1])),
                DeviceHandle::new(BRIDGE, bridge_address()),
            ],
            pending: Mutex::new(VecDeque::new()),
            open_delay: Mutex::new(Duration::ZERO),
            opened: AtomicUsize::new(0),
        })
    }

    /// Queue a stream for the next `open_stream`; returns the peripheral's
    /// end of it.
    pub fn queue_peer(&self) -> DuplexStream {
        let (local, peer) = tokio::io::duplex(4096);
        self.pending.lock().push_back(Ok(Transport::from_stream(local)));
        peer
    }

    /// Queue a transport built by the test.
    pub fn queue_transport(&self, transport: Transport) {
        self.pending.lock().push_back(Ok(transport));
    }

    /// Make the next `open_stream` fail.
    pub fn queue_error(&self, kind: io::ErrorKind) {
        self.pending
            .lock()
            .push_back(Err(io::Error::new(kind, "page timeout")));
    }

    pub fn set_state(&self, state: AdapterState) {
        *self.state.lock() = state;
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock() = delay;
    }
}

impl BluetoothAdapter for MockAdapter {
    async fn state(&self) -> AdapterState {
        *self.state.lock()
    }

    async fn bonded_devices(&self) -> Result<Vec<DeviceHandle>, FailureReason> {
        Ok(self.devices.clone())
    }

    async fn open_stream(&self, _device: &DeviceHandle, _service: Uuid) -> io::Result<Transport> {
        let delay = *self.open_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.pending
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::ConnectionRefused, "no stream queued")))
    }
}

/// Writer that fails every write, for half-open link tests.
pub struct BrokenWriter;

impl AsyncWrite for BrokenWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

pub fn link_manager(
    adapter: &Arc<MockAdapter>,
) -> (
    LinkManager<MockAdapter>,
    tokio::sync::mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    let (sink, events) = EventSink::channel();
    let link = LinkManager::new(adapter.clone(), LinkConfig::default(), sink);
    (link, events)
}

/// Drain events that are already queued.
pub fn drain(events: &mut tokio::sync::mpsc::UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Wait for the next event, failing the test after a second.
pub async fn next_event(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<ConnectionEvent>,
) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("no event within 1s")
        .expect("event channel closed")
}
