//! Common test utilities: a scripted in-memory GATT transport and crypto
//! helpers for opening the frames a session emits.

// Allow dead code since this module is shared across multiple test files
// and not every helper is used in every file
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use telink_lib::addr::MacAddress;
use telink_lib::crypto;
use telink_lib::error::TelinkError;
use telink_lib::transport::{GattCharacteristic, GattTransport};

pub const MAC: &str = "AA:BB:CC:DD:EE:FF";
pub const NAME: &str = "telink_mesh1";
pub const PASSWORD: &str = "123";
pub const VENDOR: u16 = 0x0211;

/// Half-nonce the scripted device answers the pairing request with.
pub const REMOTE_NONCE: [u8; 8] = [0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, 0xA8];

pub fn padded(value: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..value.len()].copy_from_slice(value.as_bytes());
    out
}

pub fn rev_addr() -> [u8; 6] {
    [0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]
}

/// Session key as the device would derive it from the client's half-nonce.
pub fn session_key(local: &[u8; 8]) -> [u8; 16] {
    let identity = crypto::mix_credentials(&padded(NAME), &padded(PASSWORD));
    crypto::derive_session_key(&identity, local, &REMOTE_NONCE).unwrap()
}

/// Unmasks an outbound frame the way the device does and clears the MAC
/// slot, recovering the pre-encryption plaintext.
pub fn open_outbound(key: &[u8; 16], frame: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(frame);
    let mut iv = [0u8; 16];
    iv[1..5].copy_from_slice(&rev_addr()[..4]);
    iv[5] = 0x01;
    iv[6..9].copy_from_slice(&out[..3]);
    let stream = crypto::aes_ecb(key, &iv, crypto::Direction::Encrypt).unwrap();
    for i in 0..15 {
        out[i + 5] ^= stream[i];
    }
    out[3] = 0;
    out[4] = 0;
    out
}

/// Masks a device-side plaintext frame into the notification ciphertext the
/// client expects. The inbound keystream XOR is its own inverse.
pub fn device_encrypt(key: &[u8; 16], mut frame: Vec<u8>) -> Vec<u8> {
    crypto::decrypt_packet(key, &rev_addr(), &mut frame).unwrap();
    frame
}

/// Plaintext device-side frame with the command, addressing byte and vendor
/// filled in; extra bytes land at their given offsets.
pub fn device_frame(command: u8, echoed_id: u8, fill: &[(usize, u8)]) -> Vec<u8> {
    let mut frame = vec![0u8; 20];
    frame[3] = echoed_id;
    frame[7] = command;
    frame[8] = (VENDOR & 0xFF) as u8;
    frame[9] = (VENDOR >> 8) as u8;
    for &(i, v) in fill {
        frame[i] = v;
    }
    frame
}

pub fn standard_pair_response() -> Vec<u8> {
    let mut response = vec![0u8; 17];
    response[0] = 0x0D;
    response[1..9].copy_from_slice(&REMOTE_NONCE);
    response
}

#[derive(Default)]
struct MockShared {
    writes: Mutex<Vec<(GattCharacteristic, Vec<u8>)>>,
    notify_tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
}

/// Scripted in-memory GATT transport. Records every write and answers pair
/// reads with a fixed handshake response.
pub struct MockTransport {
    shared: Arc<MockShared>,
    connected: Arc<AtomicBool>,
    fail_open: Arc<AtomicBool>,
    pair_response: Vec<u8>,
}

/// Test-side view of a [`MockTransport`] that has been handed to a session.
pub struct MockHandle {
    shared: Arc<MockShared>,
    connected: Arc<AtomicBool>,
    fail_open: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> (Box<dyn GattTransport + Send>, MockHandle) {
        Self::with_pair_response(standard_pair_response())
    }

    pub fn with_pair_response(
        pair_response: Vec<u8>,
    ) -> (Box<dyn GattTransport + Send>, MockHandle) {
        let shared = Arc::new(MockShared::default());
        let connected = Arc::new(AtomicBool::new(false));
        let fail_open = Arc::new(AtomicBool::new(false));
        let handle = MockHandle {
            shared: Arc::clone(&shared),
            connected: Arc::clone(&connected),
            fail_open: Arc::clone(&fail_open),
        };
        let transport = Box::new(MockTransport {
            shared,
            connected,
            fail_open,
            pair_response,
        });
        (transport, handle)
    }
}

#[async_trait]
impl GattTransport for MockTransport {
    async fn open(&mut self, _address: &MacAddress, _timeout: Duration) -> Result<(), TelinkError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TelinkError::Transport("scripted open failure".into()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TelinkError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read(&mut self, characteristic: GattCharacteristic) -> Result<Vec<u8>, TelinkError> {
        match characteristic {
            GattCharacteristic::Pair => Ok(self.pair_response.clone()),
            other => Err(TelinkError::Transport(format!("unexpected read of {other:?}"))),
        }
    }

    async fn write(
        &mut self,
        characteristic: GattCharacteristic,
        data: &[u8],
    ) -> Result<(), TelinkError> {
        self.shared
            .writes
            .lock()
            .unwrap()
            .push((characteristic, data.to_vec()));
        Ok(())
    }

    async fn subscribe(
        &mut self,
        _characteristic: GattCharacteristic,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TelinkError> {
        let (tx, rx) = mpsc::channel(16);
        *self.shared.notify_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

impl MockHandle {
    pub fn writes(&self) -> Vec<(GattCharacteristic, Vec<u8>)> {
        self.shared.writes.lock().unwrap().clone()
    }

    /// Frames written to the command characteristic, in order.
    pub fn command_frames(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|(c, _)| *c == GattCharacteristic::Command)
            .map(|(_, data)| data)
            .collect()
    }

    pub fn pair_requests(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|(c, _)| *c == GattCharacteristic::Pair)
            .map(|(_, data)| data)
            .collect()
    }

    /// The client half-nonce of the most recent pairing exchange.
    pub fn local_nonce(&self) -> [u8; 8] {
        let requests = self.pair_requests();
        let request = requests.last().expect("no pairing request recorded");
        let mut nonce = [0u8; 8];
        nonce.copy_from_slice(&request[1..9]);
        nonce
    }

    /// Session key of the most recent pairing exchange.
    pub fn session_key(&self) -> [u8; 16] {
        session_key(&self.local_nonce())
    }

    /// Simulates the BLE link going down without the session noticing.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Makes every subsequent open attempt fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.fail_open.store(refuse, Ordering::SeqCst);
    }

    /// Injects a raw notification as if the device had sent it.
    pub async fn notify(&self, frame: Vec<u8>) {
        let tx = self
            .shared
            .notify_tx
            .lock()
            .unwrap()
            .clone()
            .expect("no notification subscription");
        tx.send(frame).await.expect("notification channel closed");
    }
}

/// Polls `cond` until it holds, panicking after a deadline.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within deadline");
}
