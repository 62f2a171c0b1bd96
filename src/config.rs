//! Connection modes and per-session configuration

use std::str::FromStr;

use pcsc::ShareMode;

use crate::error::ConnectError;

/// Function code of the vendor control channel used by
/// [`ReaderSession::control`](crate::ReaderSession::control)
pub const CONTROL_FUNCTION: u32 = 3500;

/// How a session connects to its reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Direct access to the reader hardware, no card required
    Direct,
    /// Shared card-level access (default)
    Card,
}

impl From<ConnectMode> for ShareMode {
    fn from(mode: ConnectMode) -> Self {
        match mode {
            ConnectMode::Direct => Self::Direct,
            ConnectMode::Card => Self::Shared,
        }
    }
}

impl FromStr for ConnectMode {
    type Err = ConnectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "card" => Ok(Self::Card),
            _ => Err(ConnectError::InvalidMode(s.to_string())),
        }
    }
}

/// Configuration options applied to each reader session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether card insertion automatically runs application selection
    /// instead of merely emitting a card event
    pub auto_processing: bool,

    /// Control code passed to the driver by `control`, built from the
    /// vendor function code
    pub control_code: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_processing: true,
            control_code: pcsc::ctl_code(CONTROL_FUNCTION.into()) as u32,
        }
    }
}

impl SessionConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether insertion handling runs automatically
    #[must_use]
    pub const fn with_auto_processing(mut self, auto_processing: bool) -> Self {
        self.auto_processing = auto_processing;
        self
    }

    /// Set the control code used for vendor control commands
    #[must_use]
    pub const fn with_control_code(mut self, control_code: u32) -> Self {
        self.control_code = control_code;
        self
    }
}
