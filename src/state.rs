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

//! Connection state and the shared status view.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::bluetooth::{DeviceHandle, Message};
use crate::error::FailureReason;

/// Number of received lines kept in the transcript.
pub const TRANSCRIPT_LEN: usize = 100;

/// Link state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed(FailureReason),
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Failed(_) => "Failed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Shared view of the link for front ends.
#[derive(Debug)]
pub struct LinkStatus {
    /// Current connection state.
    pub state: RwLock<ConnectionState>,

    /// Connected device.
    pub device: RwLock<Option<DeviceHandle>>,

    /// Most recent received lines, oldest first.
    pub transcript: RwLock<VecDeque<Message>>,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            state: RwLock::new(ConnectionState::Disconnected),
            device: RwLock::new(None),
            transcript: RwLock::new(VecDeque::with_capacity(TRANSCRIPT_LEN)),
        }
    }
}

impl LinkStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_connected(&self, device: DeviceHandle) {
        *self.state.write() = ConnectionState::Connected;
        *self.device.write() = Some(device);
    }

    pub fn set_disconnected(&self) {
        *self.state.write() = ConnectionState::Disconnected;
        *self.device.write() = None;
    }

    pub fn set_failed(&self, reason: FailureReason) {
        *self.state.write() = ConnectionState::Failed(reason);
        *self.device.write() = None;
    }

    pub fn push_message(&self, message: Message) {
        let mut transcript = self.transcript.write();
        if transcript.len() == TRANSCRIPT_LEN {
            transcript.pop_front();
        }
        transcript.push_back(message);
    }

    pub fn get_state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    pub fn get_device(&self) -> Option<DeviceHandle> {
        self.device.read().clone()
    }

    pub fn get_last_message(&self) -> Option<String> {
        self.transcript.read().back().map(|m| m.text.clone())
    }

    /// Received lines, oldest first.
    pub fn get_transcript(&self) -> Vec<String> {
        self.transcript.read().iter().map(|m| m.text.clone()).collect()
    }
}
