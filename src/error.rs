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

//! Error types for the link and provisioning layers.

use std::io;

/// Result type alias for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// Why a connection failed or was lost.
///
/// Carried by [`crate::state::ConnectionState::Failed`] and by
/// [`crate::events::ConnectionEvent::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    /// No Bluetooth adapter (or no BlueZ daemon) is available.
    #[error("bluetooth adapter unavailable")]
    AdapterUnavailable,

    /// The adapter exists but is powered off.
    #[error("bluetooth adapter disabled")]
    AdapterDisabled,

    /// The platform refused access to the adapter.
    #[error("bluetooth permission denied")]
    PermissionDenied,

    /// No bonded device matched the connect criterion.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Opening the stream failed.
    #[error("connect failed: {0}")]
    ConnectIo(String),

    /// An established link broke while reading or writing.
    #[error("connection lost")]
    ConnectionLost,
}

/// Errors returned by [`crate::bluetooth::LinkManager`] operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Connecting failed; the state machine is now `Failed`.
    #[error(transparent)]
    Failed(#[from] FailureReason),

    /// The operation needs an open link.
    #[error("not connected")]
    NotConnected,

    /// Another connect attempt owns the state machine.
    #[error("a connection attempt is already in progress")]
    ConnectInProgress,

    /// `disconnect()` was called while the attempt was still opening.
    #[error("connection attempt aborted by disconnect")]
    Aborted,

    /// Outbound text must be a single line.
    #[error("outbound text contains a line break")]
    InvalidFrame,

    /// Writing to the link failed; the link has been torn down.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// Credential validation failures (the `InvalidInput` cases).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("SSID cannot be empty")]
    SsidEmpty,

    #[error("SSID too long ({len} bytes, max {max})")]
    SsidTooLong { len: usize, max: usize },

    #[error("SSID contains forbidden character {0:?}")]
    SsidForbiddenChar(char),

    #[error("password cannot be empty")]
    PasswordEmpty,

    #[error("password too short ({len} chars, min {min})")]
    PasswordTooShort { len: usize, min: usize },

    #[error("password too long ({len} bytes, max {max})")]
    PasswordTooLong { len: usize, max: usize },

    #[error("password contains forbidden character {0:?}")]
    PasswordForbiddenChar(char),
}

/// Errors returned by [`crate::provisioning::ProvisioningSession`].
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Rejected before anything was written.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] CredentialError),

    /// The command could not be sent.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The link dropped while waiting for the peripheral's answer.
    #[error("connection lost while awaiting response")]
    ConnectionLost,
}
