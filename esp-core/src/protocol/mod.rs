//! MQTT 3.1.1 Wire-Protokoll
//!
//! Fixed Header + Variable Header + Payload, wie in MQTT v3.1.1 beschrieben.
//! Nur die Pakete, die ein Client für QoS0/QoS1 braucht:
//! - Client → Broker: CONNECT, PUBLISH, PUBACK, SUBSCRIBE, PINGREQ, DISCONNECT
//! - Broker → Client: CONNACK, PUBLISH, PUBACK, SUBACK, PINGRESP

pub mod packets;
pub mod utils;

pub use packets::{
    ConnAck, Connect, Packet, Publish, SubAck, SubAckCode, Will, encode_disconnect,
    encode_pingreq, encode_puback, encode_subscribe, frame_length,
};

use crate::error::PacketError;

/// Protokoll-Name im CONNECT Variable Header
pub const PROTOCOL_NAME: &str = "MQTT";

/// Protokoll-Level für MQTT 3.1.1
pub const PROTOCOL_LEVEL: u8 = 4;

/// MQTT Control Packet Typen (obere 4 Bit des Fixed Headers)
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    PubAck = 4,
    PubRec = 5,
    PubRel = 6,
    PubComp = 7,
    Subscribe = 8,
    SubAck = 9,
    Unsubscribe = 10,
    UnsubAck = 11,
    PingReq = 12,
    PingResp = 13,
    Disconnect = 14,
}

impl PacketType {
    /// Liest den Pakettyp aus dem ersten Header-Byte
    pub const fn from_header(byte: u8) -> Result<Self, PacketError> {
        match byte >> 4 {
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::ConnAck),
            3 => Ok(PacketType::Publish),
            4 => Ok(PacketType::PubAck),
            5 => Ok(PacketType::PubRec),
            6 => Ok(PacketType::PubRel),
            7 => Ok(PacketType::PubComp),
            8 => Ok(PacketType::Subscribe),
            9 => Ok(PacketType::SubAck),
            10 => Ok(PacketType::Unsubscribe),
            11 => Ok(PacketType::UnsubAck),
            12 => Ok(PacketType::PingReq),
            13 => Ok(PacketType::PingResp),
            14 => Ok(PacketType::Disconnect),
            other => Err(PacketError::InvalidPacketType(other)),
        }
    }

    /// Fixed-Header Flags, die MQTT 3.1.1 für diesen Typ vorschreibt
    ///
    /// PUBLISH hat variable Flags und liefert `None`.
    pub const fn fixed_flags(self) -> Option<u8> {
        match self {
            PacketType::Publish => None,
            PacketType::PubRel | PacketType::Subscribe | PacketType::Unsubscribe => Some(0b0010),
            _ => Some(0),
        }
    }

    /// Erstes Header-Byte mit den vorgeschriebenen Flags
    pub const fn header_byte(self) -> u8 {
        let flags = match self.fixed_flags() {
            Some(flags) => flags,
            None => 0,
        };
        ((self as u8) << 4) | flags
    }
}

/// Quality of Service
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    pub const fn from_u8(value: u8) -> Result<Self, PacketError> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(PacketError::InvalidQos(value)),
        }
    }
}

/// CONNACK Return-Codes (MQTT 3.1.1, Tabelle 3.1)
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReturnCode {
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUsernameOrPassword = 4,
    NotAuthorized = 5,
}

impl ConnectReturnCode {
    pub const fn from_u8(value: u8) -> Result<Self, PacketError> {
        match value {
            0 => Ok(ConnectReturnCode::Accepted),
            1 => Ok(ConnectReturnCode::UnacceptableProtocolVersion),
            2 => Ok(ConnectReturnCode::IdentifierRejected),
            3 => Ok(ConnectReturnCode::ServerUnavailable),
            4 => Ok(ConnectReturnCode::BadUsernameOrPassword),
            5 => Ok(ConnectReturnCode::NotAuthorized),
            _ => Err(PacketError::InvalidReturnCode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_from_header() {
        assert_eq!(PacketType::from_header(0x20), Ok(PacketType::ConnAck));
        assert_eq!(PacketType::from_header(0x3B), Ok(PacketType::Publish));
        assert_eq!(PacketType::from_header(0xD0), Ok(PacketType::PingResp));
        assert_eq!(
            PacketType::from_header(0x00),
            Err(PacketError::InvalidPacketType(0))
        );
        assert_eq!(
            PacketType::from_header(0xF0),
            Err(PacketError::InvalidPacketType(15))
        );
    }

    #[test]
    fn test_header_bytes() {
        assert_eq!(PacketType::Connect.header_byte(), 0x10);
        assert_eq!(PacketType::Subscribe.header_byte(), 0x82);
        assert_eq!(PacketType::PingReq.header_byte(), 0xC0);
        assert_eq!(PacketType::Disconnect.header_byte(), 0xE0);
    }

    #[test]
    fn test_qos_from_u8() {
        assert_eq!(QoS::from_u8(1), Ok(QoS::AtLeastOnce));
        assert_eq!(QoS::from_u8(3), Err(PacketError::InvalidQos(3)));
    }
}
