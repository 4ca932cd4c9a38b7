use thiserror::Error;

/// The primary error type for the `telink-lib` library.
#[derive(Error, Debug)]
pub enum TelinkError {
    #[error("invalid MAC address '{0}': expected AA:BB:CC:DD:EE:FF")]
    InvalidAddress(String),

    #[error("{field} is {len} bytes, device accepts at most 16")]
    CredentialTooLong { field: &'static str, len: usize },

    #[cfg(feature = "btleplug")]
    #[error("BLE error: {0}")]
    Ble(#[from] btleplug::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timeout during BLE operation: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("OS RNG refused to produce pairing nonce")]
    Rng,

    #[error("AES primitive failed")]
    Crypto,

    #[error("pairing handshake failed: {0}")]
    Handshake(String),

    #[error("inbound frame too short: {actual} bytes, need at least 8")]
    ShortFrame { actual: usize },

    #[error("no live session with the device, and reconnection failed")]
    NotConnected,
}
