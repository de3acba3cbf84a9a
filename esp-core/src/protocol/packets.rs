// MQTT 3.1.1 Pakete: Encoder (Client → Broker) und Decoder (Broker → Client)
//
// Alle Encoder schreiben in einen festen Buffer und geben die Anzahl
// geschriebener Bytes zurück. Decoder arbeiten zero-copy auf dem
// Receive-Buffer (Topic und Payload sind geliehene Slices).

use super::utils::{
    prefixed_len, read_string, read_u8, read_u16, read_variable_length, variable_length_length,
    write_binary, write_raw, write_string, write_u8, write_u16, write_variable_length,
};
use super::{ConnectReturnCode, PROTOCOL_LEVEL, PROTOCOL_NAME, PacketType, QoS};
use crate::error::PacketError;

// CONNECT Flags (Variable Header, Byte 8)
const FLAG_USERNAME: u8 = 0x80;
const FLAG_PASSWORD: u8 = 0x40;
const FLAG_WILL_RETAIN: u8 = 0x20;
const FLAG_WILL: u8 = 0x04;
const FLAG_CLEAN_SESSION: u8 = 0x02;

/// SUBACK Return-Code für abgelehnte Subscriptions
const SUBACK_FAILURE: u8 = 0x80;

/// Schreibt Fixed Header (Typ/Flags + Remaining Length)
fn write_fixed_header(
    header: u8,
    remaining_length: usize,
    buffer: &mut [u8],
    offset: &mut usize,
) -> Result<(), PacketError> {
    write_u8(header, buffer, offset)?;
    let rest = buffer.get_mut(*offset..).ok_or(PacketError::BufferTooSmall)?;
    *offset += write_variable_length(remaining_length, rest)?;
    Ok(())
}

/// Gesamtlänge eines Pakets mit dieser Remaining Length
const fn packet_len(remaining_length: usize) -> usize {
    1 + variable_length_length(remaining_length) + remaining_length
}

// ============================================================================
// CONNECT
// ============================================================================

/// Last-Will-and-Testament
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Will<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
}

/// CONNECT Paket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connect<'a> {
    pub client_id: &'a str,
    pub keep_alive_secs: u16,
    pub clean_session: bool,
    pub username: Option<&'a str>,
    pub password: Option<&'a [u8]>,
    pub will: Option<Will<'a>>,
}

impl Connect<'_> {
    fn flags(&self) -> u8 {
        let mut flags = 0;
        if self.username.is_some() {
            flags |= FLAG_USERNAME;
        }
        if self.password.is_some() {
            flags |= FLAG_PASSWORD;
        }
        if let Some(will) = &self.will {
            flags |= FLAG_WILL | ((will.qos as u8) << 3);
            if will.retain {
                flags |= FLAG_WILL_RETAIN;
            }
        }
        if self.clean_session {
            flags |= FLAG_CLEAN_SESSION;
        }
        flags
    }

    fn remaining_length(&self) -> usize {
        // Protokoll-Name + Level + Flags + Keep-Alive
        let mut len = prefixed_len(PROTOCOL_NAME.len()) + 1 + 1 + 2;
        len += prefixed_len(self.client_id.len());
        if let Some(will) = &self.will {
            len += prefixed_len(will.topic.len()) + prefixed_len(will.payload.len());
        }
        if let Some(username) = self.username {
            len += prefixed_len(username.len());
        }
        if let Some(password) = self.password {
            len += prefixed_len(password.len());
        }
        len
    }

    /// Anzahl Bytes, die `encode()` schreiben wird
    pub fn encoded_len(&self) -> usize {
        packet_len(self.remaining_length())
    }

    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, PacketError> {
        let mut offset = 0;
        write_fixed_header(
            PacketType::Connect.header_byte(),
            self.remaining_length(),
            buffer,
            &mut offset,
        )?;

        // Variable Header
        write_string(PROTOCOL_NAME, buffer, &mut offset)?;
        write_u8(PROTOCOL_LEVEL, buffer, &mut offset)?;
        write_u8(self.flags(), buffer, &mut offset)?;
        write_u16(self.keep_alive_secs, buffer, &mut offset)?;

        // Payload: Reihenfolge ist vom Protokoll festgelegt
        write_string(self.client_id, buffer, &mut offset)?;
        if let Some(will) = &self.will {
            write_string(will.topic, buffer, &mut offset)?;
            write_binary(will.payload, buffer, &mut offset)?;
        }
        if let Some(username) = self.username {
            write_string(username, buffer, &mut offset)?;
        }
        if let Some(password) = self.password {
            write_binary(password, buffer, &mut offset)?;
        }

        Ok(offset)
    }
}

// ============================================================================
// PUBLISH
// ============================================================================

/// PUBLISH Paket (beide Richtungen)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    /// Nur bei QoS > 0 vorhanden
    pub packet_id: Option<u16>,
}

impl<'a> Publish<'a> {
    fn header_byte(&self) -> u8 {
        let mut header = (PacketType::Publish as u8) << 4;
        if self.dup {
            header |= 0b1000;
        }
        header |= (self.qos as u8) << 1;
        if self.retain {
            header |= 0b0001;
        }
        header
    }

    fn remaining_length(&self) -> usize {
        let id_len = if self.qos == QoS::AtMostOnce { 0 } else { 2 };
        prefixed_len(self.topic.len()) + id_len + self.payload.len()
    }

    pub fn encoded_len(&self) -> usize {
        packet_len(self.remaining_length())
    }

    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, PacketError> {
        let mut offset = 0;
        write_fixed_header(
            self.header_byte(),
            self.remaining_length(),
            buffer,
            &mut offset,
        )?;
        write_string(self.topic, buffer, &mut offset)?;
        if self.qos != QoS::AtMostOnce {
            match self.packet_id {
                Some(id) if id != 0 => write_u16(id, buffer, &mut offset)?,
                _ => return Err(PacketError::InvalidPacketId),
            }
        }
        write_raw(self.payload, buffer, &mut offset)?;
        Ok(offset)
    }

    /// Dekodiert einen PUBLISH Body (alles nach dem Fixed Header)
    pub fn decode(header: u8, body: &'a [u8]) -> Result<Self, PacketError> {
        let qos = QoS::from_u8((header >> 1) & 0b11)?;
        let dup = header & 0b1000 != 0;
        let retain = header & 0b0001 != 0;

        // DUP muss bei QoS0 immer 0 sein
        if qos == QoS::AtMostOnce && dup {
            return Err(PacketError::InvalidFlags(PacketType::Publish));
        }

        let mut offset = 0;
        let topic = read_string(body, &mut offset)?;
        let packet_id = if qos == QoS::AtMostOnce {
            None
        } else {
            let id = read_u16(body, &mut offset)?;
            if id == 0 {
                return Err(PacketError::InvalidPacketId);
            }
            Some(id)
        };

        Ok(Self {
            topic,
            payload: &body[offset..],
            qos,
            retain,
            dup,
            packet_id,
        })
    }
}

// ============================================================================
// PUBACK / SUBSCRIBE / PINGREQ / DISCONNECT (Client → Broker)
// ============================================================================

pub fn encode_puback(packet_id: u16, buffer: &mut [u8]) -> Result<usize, PacketError> {
    let mut offset = 0;
    write_fixed_header(PacketType::PubAck.header_byte(), 2, buffer, &mut offset)?;
    write_u16(packet_id, buffer, &mut offset)?;
    Ok(offset)
}

/// SUBSCRIBE für genau einen Topic-Filter
pub fn encode_subscribe(
    packet_id: u16,
    filter: &str,
    qos: QoS,
    buffer: &mut [u8],
) -> Result<usize, PacketError> {
    if packet_id == 0 {
        return Err(PacketError::InvalidPacketId);
    }
    let remaining_length = 2 + prefixed_len(filter.len()) + 1;
    let mut offset = 0;
    write_fixed_header(
        PacketType::Subscribe.header_byte(),
        remaining_length,
        buffer,
        &mut offset,
    )?;
    write_u16(packet_id, buffer, &mut offset)?;
    write_string(filter, buffer, &mut offset)?;
    write_u8(qos as u8, buffer, &mut offset)?;
    Ok(offset)
}

pub fn encode_pingreq(buffer: &mut [u8]) -> Result<usize, PacketError> {
    let mut offset = 0;
    write_fixed_header(PacketType::PingReq.header_byte(), 0, buffer, &mut offset)?;
    Ok(offset)
}

pub fn encode_disconnect(buffer: &mut [u8]) -> Result<usize, PacketError> {
    let mut offset = 0;
    write_fixed_header(PacketType::Disconnect.header_byte(), 0, buffer, &mut offset)?;
    Ok(offset)
}

// ============================================================================
// Broker → Client
// ============================================================================

/// CONNACK Paket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnAck {
    pub session_present: bool,
    pub code: ConnectReturnCode,
}

/// SUBACK Return-Code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubAckCode {
    Granted(QoS),
    Failure,
}

/// SUBACK Paket (nur der erste Return-Code, wir subscriben je ein Topic)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubAck {
    pub packet_id: u16,
    pub code: SubAckCode,
}

/// Dekodiertes Paket vom Broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    ConnAck(ConnAck),
    Publish(Publish<'a>),
    PubAck(u16),
    SubAck(SubAck),
    PingResp,
}

/// Länge des nächsten Pakets im Buffer
///
/// - `Ok(None)`: Fixed Header noch nicht vollständig empfangen
/// - `Ok(Some(len))`: Paket belegt `len` Bytes (kann größer als der Buffer sein)
pub fn frame_length(bytes: &[u8]) -> Result<Option<usize>, PacketError> {
    let Some(&header) = bytes.first() else {
        return Ok(None);
    };
    PacketType::from_header(header)?;
    match read_variable_length(&bytes[1..]) {
        Ok((remaining_length, n)) => Ok(Some(1 + n + remaining_length)),
        Err(PacketError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

impl<'a> Packet<'a> {
    /// Dekodiert genau ein vollständiges Paket (`frame` = Ergebnis von `frame_length`)
    pub fn decode(frame: &'a [u8]) -> Result<Self, PacketError> {
        let header = *frame.first().ok_or(PacketError::Incomplete)?;
        let packet_type = PacketType::from_header(header)?;
        let (remaining_length, n) = read_variable_length(&frame[1..])?;
        let body = frame
            .get(1 + n..1 + n + remaining_length)
            .ok_or(PacketError::Incomplete)?;

        if let Some(flags) = packet_type.fixed_flags() {
            if header & 0x0F != flags {
                return Err(PacketError::InvalidFlags(packet_type));
            }
        }

        match packet_type {
            PacketType::ConnAck => {
                if body.len() != 2 {
                    return Err(PacketError::InvalidLength);
                }
                // Nur Bit 0 (Session Present) ist erlaubt
                if body[0] & 0xFE != 0 {
                    return Err(PacketError::InvalidFlags(PacketType::ConnAck));
                }
                Ok(Packet::ConnAck(ConnAck {
                    session_present: body[0] & 0x01 != 0,
                    code: ConnectReturnCode::from_u8(body[1])?,
                }))
            }
            PacketType::Publish => Ok(Packet::Publish(Publish::decode(header, body)?)),
            PacketType::PubAck => {
                if body.len() != 2 {
                    return Err(PacketError::InvalidLength);
                }
                let mut offset = 0;
                Ok(Packet::PubAck(read_u16(body, &mut offset)?))
            }
            PacketType::SubAck => {
                if body.len() < 3 {
                    return Err(PacketError::InvalidLength);
                }
                let mut offset = 0;
                let packet_id = read_u16(body, &mut offset)?;
                let code = match read_u8(body, &mut offset)? {
                    SUBACK_FAILURE => SubAckCode::Failure,
                    granted @ 0..=2 => SubAckCode::Granted(QoS::from_u8(granted)?),
                    other => return Err(PacketError::InvalidReturnCode(other)),
                };
                Ok(Packet::SubAck(SubAck { packet_id, code }))
            }
            PacketType::PingResp => {
                if !body.is_empty() {
                    return Err(PacketError::InvalidLength);
                }
                Ok(Packet::PingResp)
            }
            // Client-Pakete, QoS2-Flows und UNSUBACK erwarten wir nie
            other => Err(PacketError::UnexpectedPacket(other)),
        }
    }
}
