//! Mocks für die Host-Tests
//!
//! - `MockClock`: Zeit läuft nur, wenn ein Test (oder ein Mock) sie vorstellt
//! - `MockTransport`: spielt einen Broker nach Skript (`BrokerScript`)
//! - `MockDelay`: merkt sich alle Wartezeiten und stellt die Uhr vor
//!
//! Transport und Uhr teilen sich ihren Zustand über `Rc`, damit ein Test
//! nachsehen kann, was die Session gesendet hat, obwohl sie den Transport besitzt.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use esp_mqtt_core::protocol::Publish;
use esp_mqtt_core::protocol::utils::read_variable_length;
use esp_mqtt_core::{
    Clock, Delay, DeviceIdentity, HardwareId, LastWill, Message, QoS, RetryPolicy, Session,
    SessionConfig, TopicSet, Transport, TransportError,
};

pub const CLIENT_ID: &str = "A1B2C3";
pub const STATUS_TOPIC: &str = "client/ESP32/A1B2C3/status";
pub const SENSOR_TOPIC: &str = "v1/ESP32/A1B2C3/sensor/temperature";
pub const COMMAND_TOPIC: &str = "v1/ESP32/A1B2C3/command";

// Pakettypen (obere 4 Bit des ersten Bytes)
pub const CONNECT: u8 = 1;
pub const PUBLISH: u8 = 3;
pub const PUBACK: u8 = 4;
pub const SUBSCRIBE: u8 = 8;
pub const PINGREQ: u8 = 12;
pub const DISCONNECT: u8 = 14;

pub type TestSession = Session<'static, MockTransport, MockClock, 256, 256, 2>;

// ============================================================================
// Mock Clock
// ============================================================================

#[derive(Clone, Default)]
pub struct MockClock(Rc<Cell<u64>>);

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, millis: u64) {
        self.0.set(self.0.get() + millis);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

// ============================================================================
// Mock Delay
// ============================================================================

pub struct MockDelay {
    clock: MockClock,
    pub slept: Vec<u32>,
}

impl MockDelay {
    pub fn new(clock: &MockClock) -> Self {
        Self {
            clock: clock.clone(),
            slept: Vec::new(),
        }
    }
}

impl Delay for MockDelay {
    async fn sleep_ms(&mut self, millis: u32) {
        self.slept.push(millis);
        self.clock.advance(millis as u64);
    }
}

// ============================================================================
// Mock Broker / Transport
// ============================================================================

/// Wann der Mock-Broker ein QoS1 PUBLISH bestätigt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PubAckMode {
    Always,
    Never,
    /// Erst die Wiederholung (DUP=1) wird bestätigt
    OnRedelivery,
}

/// Verhalten des Mock-Brokers
#[derive(Debug, Clone)]
pub struct BrokerScript {
    /// TCP-Verbindungsaufbau schlägt fehl
    pub refuse_tcp: bool,
    /// CONNACK Return-Code, `None` = Broker schweigt
    pub connack: Option<u8>,
    pub puback: PubAckMode,
    /// SUBACK Return-Code, `None` = Broker schweigt
    pub suback: Option<u8>,
    pub pingresp: bool,
    /// Retained Nachricht, die nach jedem SUBACK zugestellt wird
    pub retained: Option<Vec<u8>>,
    /// Broker schließt die Verbindung, sobald so viele Pakete empfangen wurden
    pub max_frames: Option<usize>,
}

impl Default for BrokerScript {
    fn default() -> Self {
        Self {
            refuse_tcp: false,
            connack: Some(0),
            puback: PubAckMode::Always,
            suback: Some(1),
            pingresp: true,
            retained: None,
            max_frames: None,
        }
    }
}

#[derive(Default)]
struct BrokerState {
    script: BrokerScript,
    open: bool,
    tcp_attempts: usize,
    closes: usize,
    sent: Vec<Vec<u8>>,
    inbound: VecDeque<u8>,
}

impl BrokerState {
    /// Reagiert wie ein Broker auf ein Paket des Clients
    fn react(&mut self, frame: &[u8]) {
        let (header, body) = split_frame(frame);
        match header >> 4 {
            CONNECT => {
                if let Some(code) = self.script.connack {
                    self.inbound.extend([0x20, 0x02, 0x00, code]);
                }
            }
            PUBLISH => {
                let qos = (header >> 1) & 0b11;
                let dup = header & 0b1000 != 0;
                if qos != 1 {
                    return;
                }
                let ack = match self.script.puback {
                    PubAckMode::Always => true,
                    PubAckMode::Never => false,
                    PubAckMode::OnRedelivery => dup,
                };
                if ack {
                    let topic_len = u16::from_be_bytes([body[0], body[1]]) as usize;
                    let id = &body[2 + topic_len..4 + topic_len];
                    self.inbound.extend([0x40, 0x02, id[0], id[1]]);
                }
            }
            SUBSCRIBE => {
                if let Some(code) = self.script.suback {
                    self.inbound.extend([0x90, 0x03, body[0], body[1], code]);
                    if let Some(retained) = self.script.retained.clone() {
                        self.inbound.extend(retained);
                    }
                }
            }
            PINGREQ => {
                if self.script.pingresp {
                    self.inbound.extend([0xD0, 0x00]);
                }
            }
            _ => {}
        }
    }
}

#[derive(Clone)]
pub struct MockTransport {
    state: Rc<RefCell<BrokerState>>,
    clock: MockClock,
}

impl MockTransport {
    pub fn new(script: BrokerScript, clock: &MockClock) -> Self {
        Self {
            state: Rc::new(RefCell::new(BrokerState {
                script,
                ..BrokerState::default()
            })),
            clock: clock.clone(),
        }
    }

    /// Ändert das Broker-Verhalten mitten im Test
    pub fn script(&self, change: impl FnOnce(&mut BrokerScript)) {
        change(&mut self.state.borrow_mut().script);
    }

    /// Legt Bytes in den Empfangspuffer, als hätte der Broker sie geschickt
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.state.borrow_mut().inbound.extend(bytes.iter().copied());
    }

    /// Broker schließt die Verbindung von sich aus
    pub fn drop_from_broker(&self) {
        self.state.borrow_mut().open = false;
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.borrow().sent.clone()
    }

    /// Alle gesendeten Pakete eines Typs
    pub fn sent_of_type(&self, packet_type: u8) -> Vec<Vec<u8>> {
        self.sent()
            .into_iter()
            .filter(|frame| frame[0] >> 4 == packet_type)
            .collect()
    }

    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.state.borrow().sent.last().cloned()
    }

    pub fn tcp_attempts(&self) -> usize {
        self.state.borrow().tcp_attempts
    }

    pub fn closes(&self) -> usize {
        self.state.borrow().closes
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self, _host: &str, _port: u16) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.tcp_attempts += 1;
        if state.script.refuse_tcp {
            return Err(TransportError::ConnectFailed);
        }
        state.open = true;
        state.inbound.clear();
        Ok(())
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(TransportError::Closed);
        }
        if state.script.max_frames.is_some_and(|max| state.sent.len() >= max) {
            state.open = false;
            return Err(TransportError::Closed);
        }
        state.sent.push(buf.to_vec());
        state.react(buf);
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(TransportError::Closed);
        }
        if state.inbound.is_empty() {
            // Nichts da: der komplette Timeout verstreicht
            self.clock.advance(timeout_ms as u64);
            return Ok(0);
        }
        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().open
    }

    async fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.closes += 1;
    }
}

// ============================================================================
// Aufzeichnender Message-Handler
// ============================================================================

/// Kopie einer zugestellten Nachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    pub packet_id: Option<u16>,
}

thread_local! {
    static RECEIVED: RefCell<Vec<Received>> = const { RefCell::new(Vec::new()) };
}

/// Handler, der jede Nachricht kopiert (jeder Test läuft in eigenem Thread)
pub fn record(message: &Message<'_>) {
    RECEIVED.with(|received| {
        received.borrow_mut().push(Received {
            topic: message.topic.to_string(),
            payload: message.payload.to_vec(),
            qos: message.qos,
            retain: message.retain,
            dup: message.dup,
            packet_id: message.packet_id,
        })
    });
}

/// Alle bisher zugestellten Nachrichten (leert die Aufzeichnung)
pub fn received() -> Vec<Received> {
    RECEIVED.with(|received| std::mem::take(&mut *received.borrow_mut()))
}

// ============================================================================
// Setup-Helfer
// ============================================================================

pub fn identity() -> DeviceIdentity {
    DeviceIdentity::new("ESP32", HardwareId::from_u32(0xA1B2C3)).unwrap()
}

pub fn topics() -> TopicSet {
    TopicSet::new(&identity())
}

/// Standard-Konfiguration wie in der Firmware (LWT auf dem Status-Topic)
pub fn config() -> SessionConfig<'static> {
    SessionConfig::new("broker.local", CLIENT_ID).with_will(LastWill::disconnected(STATUS_TOPIC))
}

pub struct Harness {
    pub session: TestSession,
    pub transport: MockTransport,
    pub clock: MockClock,
}

pub fn setup(script: BrokerScript) -> Harness {
    received();
    let clock = MockClock::new();
    let transport = MockTransport::new(script, &clock);
    let session = Session::new(
        transport.clone(),
        clock.clone(),
        config(),
        RetryPolicy::default(),
    )
    .unwrap();
    Harness {
        session,
        transport,
        clock,
    }
}

/// Wie `setup`, aber bereits verbunden
pub fn connected(script: BrokerScript) -> Harness {
    let mut harness = setup(script);
    embassy_futures::block_on(harness.session.connect()).unwrap();
    harness
}

// ============================================================================
// Paket-Helfer
// ============================================================================

/// Trennt Fixed-Header Byte und Body
pub fn split_frame(frame: &[u8]) -> (u8, &[u8]) {
    let (remaining_length, n) = read_variable_length(&frame[1..]).unwrap();
    (frame[0], &frame[1 + n..1 + n + remaining_length])
}

/// Dekodiert ein gesendetes PUBLISH
pub fn decode_publish(frame: &[u8]) -> Publish<'_> {
    let (header, body) = split_frame(frame);
    Publish::decode(header, body).unwrap()
}

/// Baut ein PUBLISH, wie es der Broker schicken würde
pub fn inbound_publish(topic: &str, payload: &[u8], qos: QoS, packet_id: Option<u16>) -> Vec<u8> {
    let publish = Publish {
        topic,
        payload,
        qos,
        retain: false,
        dup: false,
        packet_id,
    };
    let mut buf = vec![0u8; publish.encoded_len()];
    publish.encode(&mut buf).unwrap();
    buf
}
