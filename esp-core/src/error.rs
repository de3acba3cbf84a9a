//! Fehler-Typen für Transport, Codec, Konfiguration und Session
//!
//! Jeder Fehler der Session ist für die aktuelle Verbindung fatal.
//! Die Varianten existieren, damit Aufrufer (und Tests) die Ursache
//! unterscheiden können, statt nur den Neustart zu sehen.

use core::fmt;

use crate::protocol::{ConnectReturnCode, PacketType};

// ============================================================================
// Transport
// ============================================================================

/// Fehler der TCP-Verbindung zum Broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Hostname konnte nicht aufgelöst werden
    DnsFailed,
    /// TCP-Verbindungsaufbau fehlgeschlagen (Broker nicht erreichbar)
    ConnectFailed,
    /// Gegenstelle hat die Verbindung geschlossen
    Closed,
    /// Lese- oder Schreibfehler auf dem Socket
    Io,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::DnsFailed => write!(f, "DNS resolution failed"),
            TransportError::ConnectFailed => write!(f, "TCP connect failed"),
            TransportError::Closed => write!(f, "connection closed by peer"),
            TransportError::Io => write!(f, "socket I/O error"),
        }
    }
}

impl core::error::Error for TransportError {}

// ============================================================================
// Codec
// ============================================================================

/// Fehler beim Kodieren oder Dekodieren von MQTT-Paketen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Paket ist (noch) nicht vollständig im Buffer
    Incomplete,
    /// Ziel-Buffer zu klein für das kodierte Paket
    BufferTooSmall,
    /// Remaining-Length Feld ist ungültig kodiert
    InvalidLengthEncoding,
    /// Reservierter Pakettyp (0 oder 15)
    InvalidPacketType(u8),
    /// Fixed-Header Flags passen nicht zum Pakettyp
    InvalidFlags(PacketType),
    /// QoS-Wert außerhalb 0..=2
    InvalidQos(u8),
    /// Unbekannter Return-Code in CONNACK/SUBACK
    InvalidReturnCode(u8),
    /// Längenangaben im Paket sind inkonsistent
    InvalidLength,
    /// String ist kein gültiges UTF-8
    InvalidUtf8,
    /// Packet-ID 0 oder fehlende Packet-ID bei QoS > 0
    InvalidPacketId,
    /// Paket ist in dieser Richtung/diesem Zustand nicht erlaubt
    UnexpectedPacket(PacketType),
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::Incomplete => write!(f, "incomplete packet"),
            PacketError::BufferTooSmall => write!(f, "buffer too small"),
            PacketError::InvalidLengthEncoding => write!(f, "invalid remaining length encoding"),
            PacketError::InvalidPacketType(t) => write!(f, "invalid packet type {}", t),
            PacketError::InvalidFlags(t) => write!(f, "invalid header flags for {:?}", t),
            PacketError::InvalidQos(q) => write!(f, "invalid QoS {}", q),
            PacketError::InvalidReturnCode(c) => write!(f, "invalid return code 0x{:02X}", c),
            PacketError::InvalidLength => write!(f, "inconsistent packet length"),
            PacketError::InvalidUtf8 => write!(f, "invalid UTF-8 string"),
            PacketError::InvalidPacketId => write!(f, "invalid packet identifier"),
            PacketError::UnexpectedPacket(t) => write!(f, "unexpected {:?} packet", t),
        }
    }
}

impl core::error::Error for PacketError {}

// ============================================================================
// Konfiguration
// ============================================================================

/// Fehler in der Konfiguration (wird beim Erstellen erkannt, nicht zur Laufzeit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Geräteklasse leer, zu lang oder mit '/', '+', '#'
    InvalidDeviceClass,
    /// Hardware-ID ist keine Hex-Zahl mit 1..=16 Stellen
    InvalidHardwareId,
    /// Broker-Hostname fehlt
    EmptyHost,
    /// Client-ID leer obwohl Clean-Session aus ist
    InvalidClientId,
    /// Keep-Alive 0 würde den Keep-Alive-Mechanismus abschalten
    InvalidKeepAlive,
    /// Command-Timeout 0 ms
    InvalidCommandTimeout,
    /// Passwort ohne Username ist in MQTT 3.1.1 nicht erlaubt
    PasswordWithoutUsername,
    /// Last-Will Topic leer oder mit Wildcards
    InvalidWillTopic,
    /// Subscription-Tabelle mit Kapazität 0
    NoSubscriptionSlots,
    /// CONNECT-Paket passt nicht in den Send-Buffer
    SendBufferTooSmall { required: usize, capacity: usize },
    /// Receive-Buffer kleiner als das Minimum
    ReceiveBufferTooSmall { required: usize, capacity: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDeviceClass => write!(f, "invalid device class"),
            ConfigError::InvalidHardwareId => write!(f, "invalid hardware id"),
            ConfigError::EmptyHost => write!(f, "broker host is empty"),
            ConfigError::InvalidClientId => write!(f, "client id required without clean session"),
            ConfigError::InvalidKeepAlive => write!(f, "keep-alive must be greater than zero"),
            ConfigError::InvalidCommandTimeout => {
                write!(f, "command timeout must be greater than zero")
            }
            ConfigError::PasswordWithoutUsername => write!(f, "password requires a username"),
            ConfigError::InvalidWillTopic => write!(f, "invalid last-will topic"),
            ConfigError::NoSubscriptionSlots => write!(f, "subscription table has no capacity"),
            ConfigError::SendBufferTooSmall { required, capacity } => write!(
                f,
                "send buffer too small: CONNECT needs {} bytes, capacity {}",
                required, capacity
            ),
            ConfigError::ReceiveBufferTooSmall { required, capacity } => write!(
                f,
                "receive buffer too small: need at least {} bytes, capacity {}",
                required, capacity
            ),
        }
    }
}

impl core::error::Error for ConfigError {}

// ============================================================================
// Session
// ============================================================================

/// Antwort, auf die die Session gewartet hat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    ConnAck,
    PubAck,
    SubAck,
    PingResp,
}

/// Ablehnung durch den Broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejection {
    /// CONNACK mit Return-Code != 0
    Connect(ConnectReturnCode),
    /// SUBACK mit Return-Code 0x80
    Subscribe,
}

/// Begrenzte Ressource, die erschöpft ist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resource {
    /// Alle Subscription-Slots belegt
    Subscriptions,
    /// Ausgehendes Paket größer als der Send-Buffer
    SendBuffer,
    /// Eingehendes Paket größer als der Receive-Buffer
    ReceiveBuffer,
}

/// Grobe Fehler-Klassen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    Transport,
    ProtocolTimeout,
    ProtocolReject,
    ResourceExhaustion,
    /// Ungültiges Paket vom Broker
    Protocol,
    /// Falsche Benutzung der API (nichts wurde gesendet)
    Usage,
}

/// Fehler der MQTT Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    Transport(TransportError),
    Timeout(Reply),
    Rejected(Rejection),
    Exhausted(Resource),
    Malformed(PacketError),
    /// Operation auf einer Session, die nicht MqttConnected ist
    NotConnected,
    /// Topic-Name oder -Filter ungültig
    InvalidTopic,
    /// Ausgehendes QoS2 wird nicht unterstützt
    UnsupportedQos,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transport(_) => ErrorKind::Transport,
            Error::Timeout(_) => ErrorKind::ProtocolTimeout,
            Error::Rejected(_) => ErrorKind::ProtocolReject,
            Error::Exhausted(_) => ErrorKind::ResourceExhaustion,
            Error::Malformed(_) => ErrorKind::Protocol,
            Error::NotConnected | Error::InvalidTopic | Error::UnsupportedQos => ErrorKind::Usage,
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<PacketError> for Error {
    fn from(e: PacketError) -> Self {
        match e {
            PacketError::BufferTooSmall => Error::Exhausted(Resource::SendBuffer),
            other => Error::Malformed(other),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "transport error: {}", e),
            Error::Timeout(reply) => write!(f, "no {:?} within command timeout", reply),
            Error::Rejected(Rejection::Connect(code)) => {
                write!(f, "broker refused connection: {:?}", code)
            }
            Error::Rejected(Rejection::Subscribe) => write!(f, "broker refused subscription"),
            Error::Exhausted(resource) => write!(f, "resource exhausted: {:?}", resource),
            Error::Malformed(e) => write!(f, "malformed packet: {}", e),
            Error::NotConnected => write!(f, "session is not connected"),
            Error::InvalidTopic => write!(f, "invalid topic"),
            Error::UnsupportedQos => write!(f, "QoS 2 is not supported"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::Transport(TransportError::ConnectFailed).kind(),
            ErrorKind::Transport
        );
        assert_eq!(Error::Timeout(Reply::PubAck).kind(), ErrorKind::ProtocolTimeout);
        assert_eq!(
            Error::Rejected(Rejection::Subscribe).kind(),
            ErrorKind::ProtocolReject
        );
        assert_eq!(
            Error::Exhausted(Resource::Subscriptions).kind(),
            ErrorKind::ResourceExhaustion
        );
        assert_eq!(Error::NotConnected.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_buffer_too_small_is_exhaustion() {
        let e: Error = PacketError::BufferTooSmall.into();
        assert_eq!(e, Error::Exhausted(Resource::SendBuffer));

        let e: Error = PacketError::InvalidUtf8.into();
        assert_eq!(e, Error::Malformed(PacketError::InvalidUtf8));
    }
}
