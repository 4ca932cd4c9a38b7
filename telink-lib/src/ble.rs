//! btleplug-backed [`GattTransport`] implementation.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::addr::MacAddress;
use crate::error::TelinkError;
use crate::transport::{GattCharacteristic, GattTransport};

const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);
// Per-operation bound on GATT reads and writes
const GATT_TIMEOUT: Duration = Duration::from_secs(2);

const NOTIFICATION_QUEUE_DEPTH: usize = 64;

/// GATT transport on top of the system Bluetooth stack via btleplug.
pub struct BtleplugTransport {
    adapter: Adapter,
    peripheral: Option<Peripheral>,
    notify_task: Option<JoinHandle<()>>,
}

impl BtleplugTransport {
    /// Binds to the first Bluetooth adapter on the system.
    pub async fn new() -> Result<Self, TelinkError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TelinkError::Transport("no Bluetooth adapter available".into()))?;
        Ok(Self {
            adapter,
            peripheral: None,
            notify_task: None,
        })
    }

    fn peripheral(&self) -> Result<&Peripheral, TelinkError> {
        self.peripheral.as_ref().ok_or(TelinkError::NotConnected)
    }

    fn find_characteristic(
        &self,
        kind: GattCharacteristic,
    ) -> Result<(Peripheral, btleplug::api::Characteristic), TelinkError> {
        let peripheral = self.peripheral()?.clone();
        let uuid = kind.uuid();
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| TelinkError::Transport(format!("characteristic {uuid} not found")))?;
        Ok((peripheral, characteristic))
    }

    async fn discover(&self, address: &MacAddress) -> Result<Peripheral, TelinkError> {
        let wanted = address.to_string();
        loop {
            for peripheral in self.adapter.peripherals().await? {
                let found = peripheral
                    .properties()
                    .await?
                    .map(|p| p.address.to_string().eq_ignore_ascii_case(&wanted))
                    .unwrap_or(false);
                if found {
                    return Ok(peripheral);
                }
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl GattTransport for BtleplugTransport {
    async fn open(&mut self, address: &MacAddress, limit: Duration) -> Result<(), TelinkError> {
        info!("scanning for {address}");
        self.adapter.start_scan(ScanFilter::default()).await?;
        let discovered = timeout(limit, self.discover(address)).await;
        let _ = self.adapter.stop_scan().await;
        let peripheral = discovered??;

        debug!("connecting to {address}");
        peripheral.connect().await?;
        peripheral.discover_services().await?;
        info!("connected to {address}");
        self.peripheral = Some(peripheral);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TelinkError> {
        if let Some(task) = self.notify_task.take() {
            task.abort();
        }
        if let Some(peripheral) = self.peripheral.take() {
            let _ = peripheral.disconnect().await;
            debug!("disconnected");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match &self.peripheral {
            Some(p) => p.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn read(&mut self, characteristic: GattCharacteristic) -> Result<Vec<u8>, TelinkError> {
        let (peripheral, c) = self.find_characteristic(characteristic)?;
        let value = timeout(GATT_TIMEOUT, peripheral.read(&c)).await??;
        trace!("read {characteristic:?}: {value:02x?}");
        Ok(value)
    }

    async fn write(
        &mut self,
        characteristic: GattCharacteristic,
        data: &[u8],
    ) -> Result<(), TelinkError> {
        let (peripheral, c) = self.find_characteristic(characteristic)?;
        trace!("write {characteristic:?}: {data:02x?}");
        timeout(GATT_TIMEOUT, peripheral.write(&c, data, WriteType::WithResponse)).await??;
        Ok(())
    }

    async fn subscribe(
        &mut self,
        characteristic: GattCharacteristic,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TelinkError> {
        let (peripheral, c) = self.find_characteristic(characteristic)?;
        peripheral.subscribe(&c).await?;
        let mut notifications = peripheral.notifications().await?;
        let uuid = c.uuid;

        let (tx, rx) = mpsc::channel(NOTIFICATION_QUEUE_DEPTH);
        let task = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    break;
                }
            }
        });
        if let Some(previous) = self.notify_task.replace(task) {
            previous.abort();
        }
        Ok(rx)
    }
}

impl Drop for BtleplugTransport {
    fn drop(&mut self) {
        if let Some(task) = self.notify_task.take() {
            task.abort();
        }
        if let Some(peripheral) = self.peripheral.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = peripheral.disconnect().await;
                });
            }
        }
    }
}
