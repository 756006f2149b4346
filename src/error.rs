//! Error taxonomy for the node.
//!
//! Only [`NodeError::ConfigurationMissing`] is fatal. Everything else is
//! recovered locally: retried (join, network reconnect), counted (cycle
//! failures) or absorbed into validity bits (sensor faults never surface
//! here at all).

use thiserror::Error;

/// Top-level error returned by the node's public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Radio identity credentials are unset; the node must not start.
    #[error("radio identity credentials are not configured")]
    ConfigurationMissing,
    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    /// The radio MAC stack rejected an operation.
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),
    /// The local network transport could not be brought up.
    #[error("network connect failed: {0}")]
    Network(#[from] ConnectFailure),
}

/// Configuration validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Button duration bands overlap or are out of order.
    #[error("button duration bands must satisfy debounce < min <= short_max < long < very_long")]
    InvalidButtonBands,
    /// A credential string is not valid hex of the expected length.
    #[error("credential is not {expected} hex-encoded bytes")]
    InvalidHex {
        /// Number of bytes the credential must decode to.
        expected: usize,
    },
    /// Backoff delays or multiplier are zero, or the cap is below the initial delay.
    #[error("backoff policy requires initial > 0, multiplier >= 1 and cap >= initial")]
    InvalidBackoff,
    /// Failure threshold of zero would request fallback before any cycle ran.
    #[error("failure threshold must be at least 1")]
    InvalidThreshold,
    /// Status route is not an absolute path.
    #[error("status route must start with '/' and contain no whitespace")]
    InvalidRoute,
}

/// Errors reported by a [`RadioMac`](crate::traits::RadioMac) implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RadioError {
    /// A transmit or receive is already pending in the MAC.
    #[error("radio MAC is busy")]
    Busy,
    /// The session has not joined a network yet.
    #[error("radio session is not joined")]
    NotJoined,
    /// The session manager is not permitted to drive the MAC.
    #[error("radio session manager is not armed")]
    NotArmed,
    /// Low-level transceiver fault.
    #[error("radio hardware fault")]
    Hardware,
}

/// Typed reason for a failed network association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectFailure {
    /// The configured network identity was not visible.
    #[error("target network not found")]
    TargetNotFound,
    /// The network rejected the configured credentials.
    #[error("authentication failed")]
    AuthenticationFailed,
    /// Association did not complete within the connection timeout.
    #[error("connection timed out")]
    Timeout,
}

/// Errors raised while the network transport is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The link dropped and the bounded reconnect attempt failed.
    #[error("link lost, reconnect failed: {0}")]
    LinkLost(ConnectFailure),
    /// The status responder could not be started.
    #[error("status responder unavailable")]
    ResponderUnavailable,
}

/// Telemetry frame decoding errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// The buffer is not exactly one frame long.
    #[error("frame must be {expected} bytes, got {actual}")]
    Length {
        /// Required frame length.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn node_error_from_connect_failure() {
        let err: NodeError = ConnectFailure::Timeout.into();
        assert_eq!(err, NodeError::Network(ConnectFailure::Timeout));
    }

    #[test]
    fn messages_are_descriptive() {
        assert_eq!(
            NodeError::ConfigurationMissing.to_string(),
            "radio identity credentials are not configured"
        );
        assert_eq!(
            FrameError::Length {
                expected: 30,
                actual: 12
            }
            .to_string(),
            "frame must be 30 bytes, got 12"
        );
        assert_eq!(
            NetworkError::LinkLost(ConnectFailure::TargetNotFound).to_string(),
            "link lost, reconnect failed: target network not found"
        );
    }
}
