//! MQTT Session State Machine
//!
//! ```text
//! Disconnected → TcpConnecting → TcpConnected → MqttConnecting → MqttConnected
//!       ↑                                                              │
//!       └──────────────────────── jeder Fehler ────────────────────────┘
//! ```
//!
//! Die Session besitzt Transport, Uhr, Send- und Receive-Buffer exklusiv.
//! Alle Operationen laufen strikt nacheinander (`&mut self`), es gibt immer
//! höchstens eine offene Anfrage (CONNACK, PUBACK oder SUBACK) plus
//! optional ein ausstehendes PINGRESP.
//!
//! # Fehlerbehandlung
//! Jeder Fehler (Transport, Timeout, Ablehnung, kaputtes Paket, Buffer voll)
//! schließt die Verbindung und setzt den Zustand auf `Disconnected`.
//! Ausnahme: `NotConnected`, `InvalidTopic` und `UnsupportedQos` werden vor dem
//! Senden erkannt und lassen die Verbindung unangetastet.

use heapless::Vec;

use crate::config::SessionConfig;
use crate::error::{ConfigError, Error, PacketError, Rejection, Reply, Resource};
use crate::policy::RetryPolicy;
use crate::protocol::{
    self, ConnAck, ConnectReturnCode, Packet, PacketType, Publish, QoS, SubAck, SubAckCode,
};
use crate::topics::{TOPIC_CAPACITY, Topic, filter_matches, is_valid_topic_filter, is_valid_topic_name};
use crate::traits::{Clock, Transport};

/// Verbindungszustand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Disconnected,
    TcpConnecting,
    TcpConnected,
    MqttConnecting,
    MqttConnected,
}

/// Eingehende Nachricht, wie sie ein Handler sieht
///
/// Topic und Payload zeigen in den Receive-Buffer der Session. Der Buffer
/// wird nach dem Handler-Aufruf wiederverwendet, wer Daten behalten will,
/// muss sie kopieren.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    pub packet_id: Option<u16>,
}

impl<'a> From<&Publish<'a>> for Message<'a> {
    fn from(publish: &Publish<'a>) -> Self {
        Self {
            topic: publish.topic,
            payload: publish.payload,
            qos: publish.qos,
            retain: publish.retain,
            dup: publish.dup,
            packet_id: publish.packet_id,
        }
    }
}

/// Callback für eingehende Nachrichten eines Topic-Filters
pub type MessageHandler = fn(&Message<'_>);

struct Subscription {
    filter: Topic,
    qos: QoS,
    handler: MessageHandler,
}

/// Antworten des Brokers, auf die eine Operation warten kann
enum Ack {
    ConnAck(ConnAck),
    PubAck(u16),
    SubAck(SubAck),
    /// Keine Antwort auf eine Anfrage, beendet aber die PINGRESP-Frist
    PingResp,
}

/// Ergebnis der Verarbeitung eines Pakets aus dem Receive-Buffer
enum Inbound {
    Ack(Ack),
    PingResp,
    /// PUBLISH wurde zugestellt, bei QoS1 mit der zu bestätigenden Packet-ID
    Delivered(Option<u16>),
}

/// MQTT 3.1.1 Client-Session
///
/// # Type Parameters
/// - `T`: Transport (TCP-Verbindung)
/// - `C`: Monotone Uhr
/// - `TX` / `RX`: Größe von Send- und Receive-Buffer
/// - `SUBS`: Maximale Anzahl gleichzeitiger Subscriptions
pub struct Session<'a, T, C, const TX: usize, const RX: usize, const SUBS: usize> {
    transport: T,
    clock: C,
    config: SessionConfig<'a>,
    policy: RetryPolicy,
    state: ConnectionState,
    tx: [u8; TX],
    rx: [u8; RX],
    rx_len: usize,
    subscriptions: Vec<Subscription, SUBS>,
    next_packet_id: u16,
    last_sent_ms: u64,
    ping_deadline_ms: Option<u64>,
}

impl<'a, T, C, const TX: usize, const RX: usize, const SUBS: usize> Session<'a, T, C, TX, RX, SUBS>
where
    T: Transport,
    C: Clock,
{
    /// Erstellt eine neue Session im Zustand `Disconnected`
    ///
    /// # Fehlerbehandlung
    /// Die Konfiguration wird gegen `TX`, `RX` und `SUBS` geprüft.
    /// Passt z.B. das CONNECT-Paket nicht in den Send-Buffer, gibt es
    /// `ConfigError::SendBufferTooSmall` statt eines späteren Overflows.
    pub fn new(
        transport: T,
        clock: C,
        config: SessionConfig<'a>,
        policy: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        config.validate(TX, RX, SUBS)?;

        Ok(Self {
            transport,
            clock,
            config,
            policy,
            state: ConnectionState::Disconnected,
            tx: [0; TX],
            rx: [0; RX],
            rx_len: 0,
            subscriptions: Vec::new(),
            next_packet_id: 1,
            last_sent_ms: 0,
            ping_deadline_ms: None,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// MQTT verbunden und Transport meldet eine offene Verbindung
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::MqttConnected && self.transport.is_connected()
    }

    pub fn config(&self) -> &SessionConfig<'a> {
        &self.config
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Vom Broker gewährte QoS für `filter`, `None` wenn nicht subscribed
    pub fn subscription_qos(&self, filter: &str) -> Option<QoS> {
        self.subscriptions
            .iter()
            .find(|s| s.filter.as_str() == filter)
            .map(|s| s.qos)
    }

    // ========================================================================
    // Öffentliche Operationen
    // ========================================================================

    /// TCP-Verbindung + MQTT Handshake (CONNECT → CONNACK)
    ///
    /// Auf einer bereits verbundenen Session passiert nichts.
    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.state == ConnectionState::MqttConnected {
            return Ok(());
        }
        let result = self.connect_inner().await;
        self.settle(result).await
    }

    /// Published eine Nachricht
    ///
    /// - QoS0: senden und fertig
    /// - QoS1: auf PUBACK warten, nach Timeout bis zu
    ///   `RetryPolicy::publish_redeliveries` mal mit DUP=1 wiederholen
    pub async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Error> {
        self.ensure_connected()?;
        if !is_valid_topic_name(topic) {
            return Err(Error::InvalidTopic);
        }
        if qos == QoS::ExactlyOnce {
            return Err(Error::UnsupportedQos);
        }
        let result = self.publish_inner(topic, payload, qos, retain).await;
        self.settle(result).await
    }

    /// Subscribed einen Topic-Filter mit QoS1 und registriert den Handler
    ///
    /// Darf beliebig oft mit demselben Filter aufgerufen werden: SUBSCRIBE
    /// wird erneut gesendet, der Tabelleneintrag aber nur aktualisiert.
    /// Gibt die vom Broker gewährte QoS zurück.
    pub async fn subscribe(&mut self, filter: &str, handler: MessageHandler) -> Result<QoS, Error> {
        self.ensure_connected()?;
        if filter.len() > TOPIC_CAPACITY || !is_valid_topic_filter(filter) {
            return Err(Error::InvalidTopic);
        }
        let result = self.subscribe_inner(filter, handler).await;
        self.settle(result).await
    }

    /// Keep-Alive Prüfung ohne zu warten
    ///
    /// Sendet PINGREQ, wenn seit `keep_alive_secs` nichts gesendet wurde, und
    /// meldet `Timeout(PingResp)`, wenn die Antwort überfällig ist.
    pub async fn keep_alive(&mut self) -> Result<(), Error> {
        self.ensure_connected()?;
        let result = self.keep_alive_inner().await;
        self.settle(result).await
    }

    /// Wartet `duration_ms` und bedient dabei eingehende Pakete und Keep-Alive
    ///
    /// Ersatz für ein blindes Sleep im Application-Loop.
    pub async fn idle(&mut self, duration_ms: u32) -> Result<(), Error> {
        self.ensure_connected()?;
        let result = self.idle_inner(duration_ms).await;
        self.settle(result).await
    }

    /// Sendet DISCONNECT (best effort) und schließt die Verbindung
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::MqttConnected {
            if let Ok(len) = protocol::encode_disconnect(&mut self.tx) {
                if self.transport.write(&self.tx[..len]).await.is_err() {
                    debug!("MQTT: DISCONNECT could not be sent");
                }
            }
        }
        self.drop_connection().await;
        info!("MQTT: Disconnected");
    }

    // ========================================================================
    // Ablauf der Operationen
    // ========================================================================

    async fn connect_inner(&mut self) -> Result<(), Error> {
        self.reset();

        self.state = ConnectionState::TcpConnecting;
        info!(
            "MQTT: Connecting to {}:{}...",
            self.config.host, self.config.port
        );
        self.transport
            .connect(self.config.host, self.config.port)
            .await?;
        self.state = ConnectionState::TcpConnected;
        debug!("MQTT: TCP connected");

        let len = self.config.connect_packet().encode(&mut self.tx)?;
        self.state = ConnectionState::MqttConnecting;
        self.send(len).await?;

        let deadline = self.reply_deadline();
        loop {
            match self.next_ack(deadline).await? {
                Some(Ack::ConnAck(connack)) => {
                    if connack.code != ConnectReturnCode::Accepted {
                        warn!("MQTT: Broker refused connection: {}", connack.code);
                        return Err(Error::Rejected(Rejection::Connect(connack.code)));
                    }
                    self.state = ConnectionState::MqttConnected;
                    info!(
                        "MQTT: Connected as '{}' (session present: {})",
                        self.config.client_id, connack.session_present
                    );
                    return Ok(());
                }
                // Vor dem CONNACK lässt service_buffered nichts anderes durch
                Some(_) => {}
                None => return Err(Error::Timeout(Reply::ConnAck)),
            }
        }
    }

    async fn publish_inner(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), Error> {
        let packet_id = match qos {
            QoS::AtMostOnce => None,
            _ => Some(self.next_packet_id()),
        };
        let mut publish = Publish {
            topic,
            payload,
            qos,
            retain,
            dup: false,
            packet_id,
        };

        let len = publish.encode(&mut self.tx)?;
        self.send(len).await?;

        let Some(id) = packet_id else {
            return Ok(());
        };

        let mut redeliveries = self.policy.publish_redeliveries;
        loop {
            let deadline = self.reply_deadline();
            if self.await_puback(id, deadline).await? {
                return Ok(());
            }
            if redeliveries == 0 {
                return Err(Error::Timeout(Reply::PubAck));
            }
            redeliveries -= 1;

            warn!("MQTT: No PUBACK for packet {}, redelivering", id);
            publish.dup = true;
            let len = publish.encode(&mut self.tx)?;
            self.send(len).await?;
        }
    }

    async fn await_puback(&mut self, id: u16, deadline: u64) -> Result<bool, Error> {
        loop {
            match self.next_ack(deadline).await? {
                Some(Ack::PubAck(acked)) if acked == id => return Ok(true),
                Some(Ack::PingResp) => {}
                Some(_) => debug!("MQTT: Ignoring stale acknowledgement"),
                None => return Ok(false),
            }
        }
    }

    async fn subscribe_inner(&mut self, filter: &str, handler: MessageHandler) -> Result<QoS, Error> {
        let existing = self
            .subscriptions
            .iter()
            .position(|s| s.filter.as_str() == filter);
        if existing.is_none() && self.subscriptions.is_full() {
            warn!("MQTT: Subscription table full ({} slots)", SUBS);
            return Err(Error::Exhausted(Resource::Subscriptions));
        }

        let id = self.next_packet_id();
        let len = protocol::encode_subscribe(id, filter, QoS::AtLeastOnce, &mut self.tx)?;
        self.send(len).await?;

        let deadline = self.reply_deadline();
        let granted = loop {
            match self.next_ack(deadline).await? {
                Some(Ack::SubAck(suback)) if suback.packet_id == id => match suback.code {
                    SubAckCode::Granted(qos) => break qos,
                    SubAckCode::Failure => return Err(Error::Rejected(Rejection::Subscribe)),
                },
                Some(Ack::PingResp) => {}
                Some(_) => debug!("MQTT: Ignoring stale acknowledgement"),
                None => return Err(Error::Timeout(Reply::SubAck)),
            }
        };

        match existing {
            Some(index) => {
                let entry = &mut self.subscriptions[index];
                entry.qos = granted;
                entry.handler = handler;
            }
            None => {
                let stored = Topic::try_from(filter).map_err(|_| Error::InvalidTopic)?;
                self.subscriptions
                    .push(Subscription {
                        filter: stored,
                        qos: granted,
                        handler,
                    })
                    .map_err(|_| Error::Exhausted(Resource::Subscriptions))?;
                info!("MQTT: Subscribed to '{}' ({})", filter, granted);
            }
        }
        Ok(granted)
    }

    async fn keep_alive_inner(&mut self) -> Result<(), Error> {
        let now = self.clock.now_ms();

        if let Some(deadline) = self.ping_deadline_ms {
            if now >= deadline {
                warn!("MQTT: No PINGRESP within {} ms", self.config.command_timeout_ms);
                return Err(Error::Timeout(Reply::PingResp));
            }
            return Ok(());
        }

        if now.saturating_sub(self.last_sent_ms) >= self.config.keep_alive_ms() {
            let len = protocol::encode_pingreq(&mut self.tx)?;
            self.send(len).await?;
            self.ping_deadline_ms = Some(self.reply_deadline());
            debug!("MQTT: PINGREQ sent");
        }
        Ok(())
    }

    async fn idle_inner(&mut self, duration_ms: u32) -> Result<(), Error> {
        let end = self.clock.now_ms() + duration_ms as u64;
        loop {
            self.keep_alive_inner().await?;
            if self.clock.now_ms() >= end {
                return Ok(());
            }

            // Nach einem PINGRESP gilt wieder das Keep-Alive Intervall
            let wake = end.min(self.next_keep_alive_event());
            loop {
                match self.next_ack(wake).await? {
                    Some(Ack::PingResp) | None => break,
                    Some(_) => debug!("MQTT: Ignoring stale acknowledgement"),
                }
            }
        }
    }

    // ========================================================================
    // Empfang
    // ========================================================================

    /// Liest bis eine Antwort da ist oder `deadline` erreicht ist
    ///
    /// Eingehende PUBLISH und PINGRESP werden unterwegs verarbeitet.
    /// `Ok(None)` bedeutet: Deadline erreicht.
    async fn next_ack(&mut self, deadline: u64) -> Result<Option<Ack>, Error> {
        loop {
            if let Some(ack) = self.service_buffered().await? {
                return Ok(Some(ack));
            }

            let now = self.clock.now_ms();
            if now >= deadline {
                return Ok(None);
            }
            let timeout = u32::try_from(deadline - now).unwrap_or(u32::MAX);
            let read = self
                .transport
                .read(&mut self.rx[self.rx_len..], timeout)
                .await?;
            self.rx_len += read;
        }
    }

    /// Verarbeitet alle vollständigen Pakete im Receive-Buffer
    ///
    /// Gibt die erste Antwort (CONNACK/PUBACK/SUBACK/PINGRESP) zurück,
    /// eingehende PUBLISH werden hier zugestellt und bestätigt.
    async fn service_buffered(&mut self) -> Result<Option<Ack>, Error> {
        loop {
            let Some(len) = protocol::frame_length(&self.rx[..self.rx_len])? else {
                return Ok(None);
            };
            if len > RX {
                warn!("MQTT: Inbound packet of {} bytes exceeds receive buffer", len);
                return Err(Error::Exhausted(Resource::ReceiveBuffer));
            }
            if len > self.rx_len {
                return Ok(None);
            }

            let inbound = match Packet::decode(&self.rx[..len])? {
                Packet::ConnAck(connack) => {
                    self.expect_state(ConnectionState::MqttConnecting, PacketType::ConnAck)?;
                    Inbound::Ack(Ack::ConnAck(connack))
                }
                Packet::PubAck(id) => {
                    self.expect_state(ConnectionState::MqttConnected, PacketType::PubAck)?;
                    Inbound::Ack(Ack::PubAck(id))
                }
                Packet::SubAck(suback) => {
                    self.expect_state(ConnectionState::MqttConnected, PacketType::SubAck)?;
                    Inbound::Ack(Ack::SubAck(suback))
                }
                Packet::PingResp => {
                    self.expect_state(ConnectionState::MqttConnected, PacketType::PingResp)?;
                    Inbound::PingResp
                }
                Packet::Publish(publish) => {
                    self.expect_state(ConnectionState::MqttConnected, PacketType::Publish)?;
                    // Wir subscriben nur mit QoS1, QoS2 darf der Broker nicht liefern
                    if publish.qos == QoS::ExactlyOnce {
                        return Err(Error::Malformed(PacketError::InvalidQos(2)));
                    }
                    dispatch(&self.subscriptions, &Message::from(&publish));
                    Inbound::Delivered(publish.packet_id)
                }
            };
            self.consume(len);

            match inbound {
                Inbound::Ack(ack) => return Ok(Some(ack)),
                Inbound::PingResp => {
                    self.ping_deadline_ms = None;
                    debug!("MQTT: PINGRESP received");
                    return Ok(Some(Ack::PingResp));
                }
                Inbound::Delivered(Some(id)) => {
                    let len = protocol::encode_puback(id, &mut self.tx)?;
                    self.send(len).await?;
                }
                Inbound::Delivered(None) => {}
            }
        }
    }

    fn expect_state(&self, state: ConnectionState, packet: PacketType) -> Result<(), Error> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::Malformed(PacketError::UnexpectedPacket(packet)))
        }
    }

    fn consume(&mut self, len: usize) {
        self.rx.copy_within(len..self.rx_len, 0);
        self.rx_len -= len;
    }

    // ========================================================================
    // Hilfsfunktionen
    // ========================================================================

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.state == ConnectionState::MqttConnected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn send(&mut self, len: usize) -> Result<(), Error> {
        self.transport.write(&self.tx[..len]).await?;
        self.last_sent_ms = self.clock.now_ms();
        Ok(())
    }

    /// Packet-IDs laufen 1..=65535 und überspringen beim Überlauf die 0
    fn next_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = id.checked_add(1).unwrap_or(1);
        id
    }

    fn reply_deadline(&self) -> u64 {
        self.clock.now_ms() + self.config.command_timeout_ms as u64
    }

    /// Nächster Zeitpunkt, an dem `keep_alive_inner` etwas zu tun hat
    fn next_keep_alive_event(&self) -> u64 {
        match self.ping_deadline_ms {
            Some(deadline) => deadline,
            None => self.last_sent_ms + self.config.keep_alive_ms(),
        }
    }

    fn reset(&mut self) {
        self.rx_len = 0;
        self.ping_deadline_ms = None;
        // Clean Session: der Broker vergisst alle Subscriptions
        self.subscriptions.clear();
    }

    async fn drop_connection(&mut self) {
        self.transport.close().await;
        self.state = ConnectionState::Disconnected;
        self.reset();
    }

    /// Jeder Fehler beendet die Verbindung
    async fn settle<R>(&mut self, result: Result<R, Error>) -> Result<R, Error> {
        if let Err(e) = &result {
            error!("MQTT: Session failed: {}", e);
            self.drop_connection().await;
        }
        result
    }
}

/// Stellt eine Nachricht allen passenden Handlern zu
fn dispatch(subscriptions: &[Subscription], message: &Message<'_>) -> usize {
    let mut delivered = 0;
    for subscription in subscriptions
        .iter()
        .filter(|s| filter_matches(s.filter.as_str(), message.topic))
    {
        (subscription.handler)(message);
        delivered += 1;
    }
    if delivered == 0 {
        warn!("MQTT: No subscription matches '{}'", message.topic);
    }
    delivered
}
