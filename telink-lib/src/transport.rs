//! GATT transport abstraction.
//!
//! The protocol core only needs a handful of operations against three fixed
//! characteristics; everything OS-specific lives behind [`GattTransport`].
//! A [btleplug](crate::ble) implementation ships behind the `btleplug`
//! feature.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::addr::MacAddress;
use crate::error::TelinkError;

/// Telink mesh information service.
pub const INFO_SERVICE_UUID: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0A0B0C0D1910);
/// Notification characteristic: subscribe, then write `{0x01}` to enable.
pub const NOTIFICATION_CHAR_UUID: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0A0B0C0D1911);
/// Command characteristic: accepts 20-byte encrypted frames.
pub const COMMAND_CHAR_UUID: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0A0B0C0D1912);
/// Pair characteristic: 17-byte handshake write, 17-byte response read.
pub const PAIR_CHAR_UUID: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0A0B0C0D1914);

/// The three characteristics of the info service the protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattCharacteristic {
    Notification,
    Command,
    Pair,
}

impl GattCharacteristic {
    pub fn uuid(self) -> Uuid {
        match self {
            GattCharacteristic::Notification => NOTIFICATION_CHAR_UUID,
            GattCharacteristic::Command => COMMAND_CHAR_UUID,
            GattCharacteristic::Pair => PAIR_CHAR_UUID,
        }
    }
}

/// A BLE GATT link to one mesh node.
///
/// Implementations must deliver subscription notifications sequentially per
/// device; the receiver returned by [`subscribe`](Self::subscribe) is drained
/// by a single consumer task.
#[async_trait]
pub trait GattTransport: Send {
    /// Discovers and connects to the device, bounded by `timeout`.
    async fn open(&mut self, address: &MacAddress, timeout: Duration) -> Result<(), TelinkError>;

    /// Tears the link down. Safe to call when already closed.
    async fn close(&mut self) -> Result<(), TelinkError>;

    async fn is_connected(&self) -> bool;

    async fn read(&mut self, characteristic: GattCharacteristic) -> Result<Vec<u8>, TelinkError>;

    async fn write(
        &mut self,
        characteristic: GattCharacteristic,
        data: &[u8],
    ) -> Result<(), TelinkError>;

    /// Subscribes to value notifications on `characteristic`; raw values
    /// arrive on the returned channel in delivery order.
    async fn subscribe(
        &mut self,
        characteristic: GattCharacteristic,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TelinkError>;
}
