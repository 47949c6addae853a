//! Receiver configuration.

#[cfg(feature = "compression")]
use crate::extensions::deflate::DeflateConfig;

/// Which side of the connection this receiver sits on.
///
/// The role decides which half of the negotiated `permessage-deflate`
/// parameters governs the inbound stream: a server inflates what the
/// client compressed and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Receiving server frames on the client side.
    Client,
    /// Receiving client frames on the server side.
    Server,
}

/// Configuration for a [`Receiver`](crate::Receiver).
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Cap on the cumulative decoded payload of a single message, in
    /// bytes. `0` means unbounded.
    pub max_payload: u64,

    /// Pre-negotiated permessage-deflate parameters. `None` disables the
    /// extension; frames carrying RSV1 are then protocol errors.
    #[cfg(feature = "compression")]
    pub deflate: Option<DeflateConfig>,
}

impl Config {
    /// Create a configuration with no payload cap and no extensions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cumulative payload cap (builder pattern).
    #[must_use]
    pub fn with_max_payload(mut self, max_payload: u64) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Install a pre-negotiated permessage-deflate context (builder
    /// pattern).
    #[cfg(feature = "compression")]
    #[must_use]
    pub fn with_deflate(mut self, deflate: DeflateConfig) -> Self {
        self.deflate = Some(deflate);
        self
    }
}
