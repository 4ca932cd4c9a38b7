//! Session handling for one Telink mesh node.

use std::str::FromStr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{Datelike, Local, Timelike};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::addr::MacAddress;
use crate::command::Command;
use crate::crypto;
use crate::error::TelinkError;
use crate::frame;
use crate::report::{
    AddressReport, AlarmReport, DeviceInfoReport, GroupsReport, OnlineStatusReport, ReportHandler,
    ScenarioReport, StatusReport, TimeReport,
};
use crate::transport::{GattCharacteristic, GattTransport};

/// Telink vendor code.
pub const VENDOR_TELINK: u16 = 0x0211;

/// Device discovery bound for [`TelinkMesh::connect`].
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const PAIR_REQUEST_OPCODE: u8 = 0x0C;
const CREDENTIAL_LEN: usize = 16;

/// Per-connection state. The key is only present while paired; the counter
/// runs 1..=0xFFFF and wraps back to 1.
struct Session {
    key: Option<[u8; 16]>,
    counter: u16,
    mesh_id: u16,
}

type SharedHandler = Arc<RwLock<Option<Arc<dyn ReportHandler>>>>;

/// A client session with one Telink mesh node, reached over a GATT
/// transport. Commands address the connected node by default (mesh id 0);
/// [`set_mesh_id`](Self::set_mesh_id) retargets them at a unit or group.
pub struct TelinkMesh {
    address: MacAddress,
    name: [u8; CREDENTIAL_LEN],
    password: [u8; CREDENTIAL_LEN],
    vendor: u16,
    session: Arc<Mutex<Session>>,
    handler: SharedHandler,
    transport: Box<dyn GattTransport + Send>,
    dispatch_task: Option<JoinHandle<()>>,
}

fn pad_credential(value: &str, field: &'static str) -> Result<[u8; CREDENTIAL_LEN], TelinkError> {
    let bytes = value.as_bytes();
    if bytes.len() > CREDENTIAL_LEN {
        return Err(TelinkError::CredentialTooLong {
            field,
            len: bytes.len(),
        });
    }
    let mut out = [0u8; CREDENTIAL_LEN];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

impl TelinkMesh {
    /// Creates a disconnected session for the node at `address`, with the
    /// mesh credentials the device was provisioned with.
    pub fn new(
        address: &str,
        name: &str,
        password: &str,
        transport: Box<dyn GattTransport + Send>,
    ) -> Result<Self, TelinkError> {
        Ok(Self {
            address: MacAddress::from_str(address)?,
            name: pad_credential(name, "name")?,
            password: pad_credential(password, "password")?,
            vendor: VENDOR_TELINK,
            session: Arc::new(Mutex::new(Session {
                key: None,
                counter: 1,
                mesh_id: frame::MESH_ID_CONNECTED,
            })),
            handler: Arc::new(RwLock::new(None)),
            transport,
            dispatch_task: None,
        })
    }

    pub fn address(&self) -> MacAddress {
        self.address
    }

    pub fn mesh_id(&self) -> u16 {
        self.session.lock().unwrap().mesh_id
    }

    pub fn vendor(&self) -> u16 {
        self.vendor
    }

    pub fn packet_counter(&self) -> u16 {
        self.session.lock().unwrap().counter
    }

    /// Overrides the packet counter (for protocol research/sync purposes).
    pub fn set_packet_counter(&mut self, counter: u16) {
        self.session.lock().unwrap().counter = counter;
    }

    /// Registers the callbacks invoked for decoded reports. Takes effect for
    /// all frames dispatched after the call.
    pub fn set_report_handler(&self, handler: Arc<dyn ReportHandler>) {
        *self.handler.write().unwrap() = Some(handler);
    }

    fn paired(&self) -> bool {
        self.session.lock().unwrap().key.is_some()
    }

    /// Changes the target MAC address. Refused while a session is live.
    pub fn set_address(&mut self, address: &str) -> Result<(), TelinkError> {
        let parsed = MacAddress::from_str(address)?;
        if self.paired() {
            warn!("address change can only occur when disconnected");
            return Ok(());
        }
        self.address = parsed;
        Ok(())
    }

    /// Changes the mesh name used for pairing. While connected, the new name
    /// only applies to the next connection.
    pub fn set_name(&mut self, name: &str) -> Result<(), TelinkError> {
        let padded = pad_credential(name, "name")?;
        if self.paired() {
            warn!("connection already established, name change applies after reconnection");
        }
        self.name = padded;
        Ok(())
    }

    /// Changes the mesh password used for pairing. While connected, the new
    /// password only applies to the next connection.
    pub fn set_password(&mut self, password: &str) -> Result<(), TelinkError> {
        let padded = pad_credential(password, "password")?;
        if self.paired() {
            warn!("connection already established, password change applies after reconnection");
        }
        self.password = padded;
        Ok(())
    }

    /// Overrides the vendor code (0x0211 for Telink hardware).
    pub fn set_vendor(&mut self, vendor: u16) {
        self.vendor = vendor;
    }

    pub async fn is_connected(&self) -> bool {
        self.paired() && self.transport.is_connected().await
    }

    /// Connects to the node and runs the pairing handshake.
    ///
    /// Generates an 8-byte nonce, seals it under the name ⊕ password
    /// identity key, exchanges it for the device's half-nonce, derives the
    /// session key and enables notifications.
    pub async fn connect(&mut self) -> Result<(), TelinkError> {
        if self.is_connected().await {
            debug!("node {} is already connected", self.address);
            return Ok(());
        }

        self.transport
            .open(&self.address, CONNECT_TIMEOUT)
            .await
            .map_err(|err| match err {
                TelinkError::Timeout(_) => {
                    TelinkError::Handshake("device not found within timeout".into())
                }
                other => other,
            })?;
        match self.pair().await {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = self.transport.close().await;
                self.invalidate_session();
                Err(err)
            }
        }
    }

    async fn pair(&mut self) -> Result<(), TelinkError> {
        let mut local = [0u8; crypto::NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut local)
            .map_err(|_| TelinkError::Rng)?;

        let identity = crypto::mix_credentials(&self.name, &self.password);
        let sealed = crypto::seal_local_nonce(&identity, &local)?;

        let mut request = [0u8; 17];
        request[0] = PAIR_REQUEST_OPCODE;
        request[1..9].copy_from_slice(&local);
        request[9..17].copy_from_slice(&sealed[..8]);
        self.transport
            .write(GattCharacteristic::Pair, &request)
            .await
            .map_err(|e| TelinkError::Handshake(format!("pair request rejected: {e}")))?;

        let response = self
            .transport
            .read(GattCharacteristic::Pair)
            .await
            .map_err(|e| TelinkError::Handshake(format!("pair response unavailable: {e}")))?;
        if response.len() < 9 {
            return Err(TelinkError::Handshake(format!(
                "pair response too short: {} bytes",
                response.len()
            )));
        }
        let mut remote = [0u8; crypto::NONCE_LEN];
        remote.copy_from_slice(&response[1..9]);

        let key = crypto::derive_session_key(&identity, &local, &remote)?;
        {
            let mut session = self.session.lock().unwrap();
            session.key = Some(key);
            session.counter = 1;
        }

        let receiver = self
            .transport
            .subscribe(GattCharacteristic::Notification)
            .await
            .map_err(|e| TelinkError::Handshake(format!("notification subscribe failed: {e}")))?;
        let dispatcher = Dispatcher {
            session: Arc::clone(&self.session),
            rev_addr: self.address.reversed(),
            vendor: self.vendor,
            handler: Arc::clone(&self.handler),
        };
        let task = tokio::spawn(async move {
            let mut receiver = receiver;
            while let Some(data) = receiver.recv().await {
                dispatcher.handle_notification(data);
            }
        });
        if let Some(previous) = self.dispatch_task.replace(task) {
            previous.abort();
        }

        self.transport
            .write(GattCharacteristic::Notification, &[0x01])
            .await
            .map_err(|e| TelinkError::Handshake(format!("notification enable failed: {e}")))?;

        info!("paired with {}", self.address);
        Ok(())
    }

    fn invalidate_session(&mut self) {
        if let Some(task) = self.dispatch_task.take() {
            task.abort();
        }
        let mut session = self.session.lock().unwrap();
        if let Some(key) = session.key.as_mut() {
            key.fill(0);
        }
        session.key = None;
    }

    /// Tears the session down and wipes the shared key.
    pub async fn disconnect(&mut self) -> Result<(), TelinkError> {
        self.invalidate_session();
        self.transport.close().await
    }

    /// Builds, encrypts and writes one command frame.
    ///
    /// Fire and forget: transport or crypto failures after a live session
    /// was (re)established are logged and swallowed. The only reported
    /// failure is a dead session that could not be reconnected.
    pub async fn send_packet(&mut self, command: Command, payload: &[u8]) -> Result<(), TelinkError> {
        if !self.is_connected().await {
            debug!("session with {} is down, reconnecting", self.address);
            let _ = self.disconnect().await;
            if let Err(err) = self.connect().await {
                warn!("reconnection to {} failed: {err}", self.address);
                return Err(TelinkError::NotConnected);
            }
        }

        let frame = {
            let mut session = self.session.lock().unwrap();
            let key = session.key.ok_or(TelinkError::NotConnected)?;
            let counter = session.counter;
            session.counter = if counter >= 0xFFFF { 1 } else { counter + 1 };
            let mut frame = frame::build(counter, session.mesh_id, command, self.vendor, payload);
            if let Err(err) = crypto::encrypt_packet(&key, &self.address.reversed(), &mut frame) {
                warn!("dropping {command:?} frame: {err}");
                return Ok(());
            }
            frame
        };

        if let Err(err) = self
            .transport
            .write(GattCharacteristic::Command, &frame)
            .await
        {
            warn!("dropping {command:?} frame: {err}");
        }
        Ok(())
    }

    /// Sets the device clock to the local date and time.
    pub async fn set_time(&mut self) -> Result<(), TelinkError> {
        let now = Local::now();
        let year = now.year() as u16;
        self.send_packet(
            Command::TimeSet,
            &[
                (year & 0xFF) as u8,
                (year >> 8) as u8,
                now.month() as u8,
                now.day() as u8,
                now.hour() as u8,
                now.minute() as u8,
                now.second() as u8,
            ],
        )
        .await
    }

    /// Asks the device for its clock; answered with a time report.
    pub async fn query_time(&mut self) -> Result<(), TelinkError> {
        self.send_packet(Command::TimeQuery, &[0x10]).await
    }

    /// Asks the device for its group memberships; answered with a group
    /// report.
    pub async fn query_groups(&mut self) -> Result<(), TelinkError> {
        self.send_packet(Command::GroupQuery, &[0x0A, 0x01]).await
    }

    /// Adds the addressed node(s) to `group_id`.
    pub async fn add_group(&mut self, group_id: u8) -> Result<(), TelinkError> {
        self.send_packet(Command::GroupEdit, &[0x01, group_id, 0x80])
            .await
    }

    /// Removes the addressed node(s) from `group_id`.
    pub async fn delete_group(&mut self, group_id: u8) -> Result<(), TelinkError> {
        self.send_packet(Command::GroupEdit, &[0x00, group_id, 0x80])
            .await
    }

    /// Retargets subsequent commands and reassigns the device address.
    ///
    /// No range validation happens here: 1..=254 addresses a unit,
    /// 0x8000..=0x80FF a group; the device ignores ids outside the ranges it
    /// supports.
    pub async fn set_mesh_id(&mut self, mesh_id: u16) -> Result<(), TelinkError> {
        self.session.lock().unwrap().mesh_id = mesh_id;
        self.send_packet(
            Command::AddressEdit,
            &[(mesh_id & 0xFF) as u8, (mesh_id >> 8) as u8],
        )
        .await
    }

    /// Asks the device for its mesh id; answered with an address report.
    pub async fn query_mesh_id(&mut self) -> Result<(), TelinkError> {
        self.send_packet(Command::AddressEdit, &[0xFF, 0xFF]).await
    }

    pub async fn query_device_info(&mut self) -> Result<(), TelinkError> {
        self.send_packet(Command::DeviceInfoQuery, &[0x10]).await
    }

    pub async fn query_device_version(&mut self) -> Result<(), TelinkError> {
        self.send_packet(Command::DeviceInfoQuery, &[0x10, 0x02]).await
    }
}

impl Drop for TelinkMesh {
    fn drop(&mut self) {
        self.invalidate_session();
    }
}

/// Decrypts, validates and routes one notification frame. Runs on the
/// notification consumer task, strictly in delivery order.
struct Dispatcher {
    session: Arc<Mutex<Session>>,
    rev_addr: [u8; 6],
    vendor: u16,
    handler: SharedHandler,
}

impl Dispatcher {
    fn handle_notification(&self, mut frame: Vec<u8>) {
        let Some(key) = self.session.lock().unwrap().key else {
            trace!("notification before pairing completed, dropped");
            return;
        };
        if let Err(err) = crypto::decrypt_packet(&key, &self.rev_addr, &mut frame) {
            debug!("undecryptable notification dropped: {err}");
            return;
        }
        if !frame::vendor_matches(&frame, self.vendor) {
            trace!("foreign-vendor notification dropped");
            return;
        }

        let command = frame::command(&frame);
        let received_id = frame::received_id(&frame);
        {
            let mut session = self.session.lock().unwrap();
            if command == Command::OnlineStatusReport && session.mesh_id == frame::MESH_ID_CONNECTED
            {
                debug!("adopting mesh id {received_id} from online status report");
                session.mesh_id = received_id;
            }
            if received_id != session.mesh_id && received_id != 0 {
                trace!("notification for mesh id {received_id} dropped");
                return;
            }
        }

        let Some(handler) = self.handler.read().unwrap().clone() else {
            return;
        };
        match command {
            Command::TimeReport => {
                if let Some(report) = TimeReport::parse(&frame) {
                    handler.on_time(report);
                }
            }
            Command::AddressReport => {
                if let Some(report) = AddressReport::parse(&frame) {
                    handler.on_address(report);
                }
            }
            Command::DeviceInfoReport => {
                if let Some(report) = DeviceInfoReport::parse(&frame) {
                    handler.on_device_info(report);
                }
            }
            Command::GroupReport => {
                if let Some(report) = GroupsReport::parse(&frame) {
                    handler.on_groups(report);
                }
            }
            Command::OnlineStatusReport => {
                if let Some(report) = OnlineStatusReport::parse(&frame) {
                    handler.on_online_status(report);
                }
            }
            Command::StatusReport => {
                if let Some(report) = StatusReport::parse(&frame) {
                    handler.on_status(report);
                }
            }
            Command::AlarmReport => {
                if let Some(report) = AlarmReport::parse(&frame) {
                    handler.on_alarm(report);
                }
            }
            Command::ScenarioReport => {
                if let Some(report) = ScenarioReport::parse(&frame) {
                    handler.on_scenario(report);
                }
            }
            other => handler.on_unhandled(other.into(), &frame),
        }
    }
}
