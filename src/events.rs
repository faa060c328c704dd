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

//! Connection events and their single consumer.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::bluetooth::{DeviceHandle, Message};
use crate::error::FailureReason;
use crate::state::LinkStatus;

/// Events emitted by the link layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Link established.
    Connected { device: DeviceHandle },
    /// Link closed by an explicit disconnect.
    Disconnected,
    /// Connecting failed, or an open link was lost.
    Failed(FailureReason),
    /// A complete line arrived from the peripheral.
    MessageReceived(Message),
}

/// Sending side of the event channel.
///
/// Every producer (connect path, frame reader, writer) pushes into the same
/// channel, so the consumer sees one ordered sequence of events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl EventSink {
    /// Create a sink and the receiver its events arrive on.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event.
    pub fn emit(&self, event: ConnectionEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

/// Drains the event channel, logging each event and keeping the shared
/// status view current.
pub struct EventProcessor {
    status: Arc<LinkStatus>,
}

impl EventProcessor {
    /// Create a new event processor.
    pub fn new(status: Arc<LinkStatus>) -> Self {
        Self { status }
    }

    /// Process a single event.
    pub fn process_event(&self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::Connected { device } => {
                info!("Device connected: {}", device);
                self.status.set_connected(device.clone());
            }
            ConnectionEvent::Disconnected => {
                info!("Device disconnected");
                self.status.set_disconnected();
            }
            ConnectionEvent::Failed(FailureReason::ConnectionLost) => {
                // The link manager is back in Disconnected after a loss.
                error!("Connection lost");
                self.status.set_disconnected();
            }
            ConnectionEvent::Failed(reason) => {
                error!("Connection failed: {}", reason);
                self.status.set_failed(reason.clone());
            }
            ConnectionEvent::MessageReceived(message) => {
                info!("Message received: {}", message.text);
                self.status.push_message(message.clone());
            }
        }
    }

    /// Run until every sink has been dropped, forwarding each event to
    /// `forward` after processing it.
    pub async fn run<F>(self, mut rx: mpsc::UnboundedReceiver<ConnectionEvent>, mut forward: F)
    where
        F: FnMut(ConnectionEvent),
    {
        while let Some(event) = rx.recv().await {
            self.process_event(&event);
            forward(event);
        }
        debug!("Event processor stopped");
    }
}
