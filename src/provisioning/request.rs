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

//! WiFi credential requests and response classification.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CredentialError;

/// Maximum SSID length per IEEE 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA2 passphrase length.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Command prefix understood by the bridge firmware.
pub const SET_WIFI: &str = "SET_WIFI";

/// Reply markers meaning the bridge accepted the credentials.
pub const SUCCESS_MARKERS: [&str; 2] = ["WIFI_SUCCESS", "WIFI_SET_OK"];

/// Reply markers meaning the bridge rejected them.
pub const FAILURE_MARKERS: [&str; 2] = ["WIFI_FAIL", "WIFI_SET_ERROR"];

/// Characters that would break the comma/line framing.
const FORBIDDEN: [char; 3] = [',', '\n', '\r'];

/// Layout of the outbound credentials command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandFormat {
    /// `SET_WIFI,<ssid>,<password>`
    #[default]
    SetWifi,
    /// `<ssid>,<password>` for older bridge firmware.
    Legacy,
}

/// Validation rules for credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub min_password_len: usize,
    pub trim_input: bool,
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self {
            min_password_len: 8,
            trim_input: true,
        }
    }
}

/// Validated WiFi credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub ssid: String,
    pub password: String,
}

impl ProvisioningRequest {
    /// Validate credentials against `policy`.
    pub fn new(ssid: &str, password: &str, policy: &CredentialPolicy) -> Result<Self, CredentialError> {
        let (ssid, password) = if policy.trim_input {
            (ssid.trim(), password.trim())
        } else {
            (ssid, password)
        };

        if ssid.is_empty() {
            return Err(CredentialError::SsidEmpty);
        }
        if let Some(c) = ssid.chars().find(|c| FORBIDDEN.contains(c)) {
            return Err(CredentialError::SsidForbiddenChar(c));
        }
        if ssid.len() > MAX_SSID_LEN {
            return Err(CredentialError::SsidTooLong {
                len: ssid.len(),
                max: MAX_SSID_LEN,
            });
        }

        if password.is_empty() {
            return Err(CredentialError::PasswordEmpty);
        }
        if let Some(c) = password.chars().find(|c| FORBIDDEN.contains(c)) {
            return Err(CredentialError::PasswordForbiddenChar(c));
        }
        let chars = password.chars().count();
        if chars < policy.min_password_len {
            return Err(CredentialError::PasswordTooShort {
                len: chars,
                min: policy.min_password_len,
            });
        }
        if password.len() > MAX_PASSWORD_LEN {
            return Err(CredentialError::PasswordTooLong {
                len: password.len(),
                max: MAX_PASSWORD_LEN,
            });
        }

        Ok(Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
        })
    }

    /// Outbound command line, without terminator.
    pub fn command(&self, format: CommandFormat) -> String {
        match format {
            CommandFormat::SetWifi => format!("{},{},{}", SET_WIFI, self.ssid, self.password),
            CommandFormat::Legacy => format!("{},{}", self.ssid, self.password),
        }
    }
}

impl fmt::Debug for ProvisioningRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningRequest")
            .field("ssid", &self.ssid)
            .field("password", &"****")
            .finish()
    }
}

/// Outcome of a provisioning exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningResult {
    /// The bridge accepted the credentials.
    Success,
    /// The bridge rejected them; carries the reply line.
    Failure(String),
    /// No classified reply before the deadline.
    Timeout,
    /// A reply carrying neither marker.
    Unclassified(String),
}

impl ProvisioningResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProvisioningResult::Success)
    }
}

impl fmt::Display for ProvisioningResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningResult::Success => write!(f, "success"),
            ProvisioningResult::Failure(reason) => write!(f, "failure: {}", reason),
            ProvisioningResult::Timeout => write!(f, "timed out waiting for response"),
            ProvisioningResult::Unclassified(raw) => write!(f, "unclassified response: {}", raw),
        }
    }
}

/// Classify one reply line from the bridge.
pub fn classify(line: &str) -> ProvisioningResult {
    if SUCCESS_MARKERS.iter().any(|m| line.contains(m)) {
        ProvisioningResult::Success
    } else if FAILURE_MARKERS.iter().any(|m| line.contains(m)) {
        ProvisioningResult::Failure(line.trim().to_string())
    } else {
        ProvisioningResult::Unclassified(line.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CredentialPolicy {
        CredentialPolicy::default()
    }

    #[test]
    fn test_valid_request() {
        let request = ProvisioningRequest::new("lab", "longpass1", &policy()).unwrap();
        assert_eq!(request.command(CommandFormat::SetWifi), "SET_WIFI,lab,longpass1");
        assert_eq!(request.command(CommandFormat::Legacy), "lab,longpass1");
    }

    #[test]
    fn test_short_password() {
        assert_eq!(
            ProvisioningRequest::new("lab", "short", &policy()),
            Err(CredentialError::PasswordTooShort { len: 5, min: 8 })
        );
    }

    #[test]
    fn test_min_length_counts_characters() {
        // Eight characters, more than eight bytes.
        assert!(ProvisioningRequest::new("lab", "pässwörd", &policy()).is_ok());
    }

    #[test]
    fn test_configurable_min_length() {
        let relaxed = CredentialPolicy {
            min_password_len: 4,
            trim_input: true,
        };
        assert!(ProvisioningRequest::new("lab", "short", &relaxed).is_ok());
    }

    #[test]
    fn test_empty_fields() {
        assert_eq!(
            ProvisioningRequest::new("", "longpass1", &policy()),
            Err(CredentialError::SsidEmpty)
        );
        assert_eq!(
            ProvisioningRequest::new("   ", "longpass1", &policy()),
            Err(CredentialError::SsidEmpty)
        );
        let no_min = CredentialPolicy {
            min_password_len: 0,
            trim_input: true,
        };
        assert_eq!(
            ProvisioningRequest::new("lab", "", &no_min),
            Err(CredentialError::PasswordEmpty)
        );
    }

    #[test]
    fn test_forbidden_characters() {
        assert_eq!(
            ProvisioningRequest::new("la,b", "longpass1", &policy()),
            Err(CredentialError::SsidForbiddenChar(','))
        );
        assert_eq!(
            ProvisioningRequest::new("lab", "long\npass1", &policy()),
            Err(CredentialError::PasswordForbiddenChar('\n'))
        );
        assert_eq!(
            ProvisioningRequest::new("lab", "long,pass1", &policy()),
            Err(CredentialError::PasswordForbiddenChar(','))
        );
    }

    #[test]
    fn test_length_limits() {
        let long_ssid = "s".repeat(MAX_SSID_LEN + 1);
        assert!(matches!(
            ProvisioningRequest::new(&long_ssid, "longpass1", &policy()),
            Err(CredentialError::SsidTooLong { .. })
        ));
        let long_password = "p".repeat(MAX_PASSWORD_LEN + 1);
        assert!(matches!(
            ProvisioningRequest::new("lab", &long_password, &policy()),
            Err(CredentialError::PasswordTooLong { .. })
        ));
    }

    #[test]
    fn test_trimming() {
        let request = ProvisioningRequest::new("  lab ", " longpass1\t", &policy()).unwrap();
        assert_eq!(request.ssid, "lab");
        assert_eq!(request.password, "longpass1");

        let verbatim = CredentialPolicy {
            min_password_len: 8,
            trim_input: false,
        };
        let request = ProvisioningRequest::new("lab", " longpass1", &verbatim).unwrap();
        assert_eq!(request.password, " longpass1");
    }

    #[test]
    fn test_debug_hides_password() {
        let request = ProvisioningRequest::new("lab", "longpass1", &policy()).unwrap();
        assert!(!format!("{:?}", request).contains("longpass1"));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("WIFI_SUCCESS"), ProvisioningResult::Success);
        assert_eq!(classify("OK: WIFI_SET_OK"), ProvisioningResult::Success);
        assert_eq!(
            classify("WIFI_FAIL auth"),
            ProvisioningResult::Failure("WIFI_FAIL auth".to_string())
        );
        assert_eq!(
            classify("WIFI_SET_ERROR"),
            ProvisioningResult::Failure("WIFI_SET_ERROR".to_string())
        );
        assert_eq!(
            classify("ETH link up"),
            ProvisioningResult::Unclassified("ETH link up".to_string())
        );
    }
}
