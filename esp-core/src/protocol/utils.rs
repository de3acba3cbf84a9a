// Hilfsfunktionen für das MQTT Wire-Format
//
// Remaining Length (Variable Byte Integer), UTF-8 Strings und Binärdaten
// mit 2-Byte Längenpräfix (Big Endian).

use crate::error::PacketError;

/// Maximaler Wert für Remaining Length (4 Bytes, 0x0FFFFFFF)
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Anzahl Bytes, die `value` als Remaining Length belegt
pub const fn variable_length_length(value: usize) -> usize {
    if value < 128 {
        1
    } else if value < 16_384 {
        2
    } else if value < 2_097_152 {
        3
    } else {
        4
    }
}

/// Liest eine Remaining Length
///
/// Gibt `(wert, gelesene_bytes)` zurück, oder `Incomplete` wenn der Buffer
/// vor dem letzten Byte endet.
pub fn read_variable_length(bytes: &[u8]) -> Result<(usize, usize), PacketError> {
    let mut multiplier = 1usize;
    let mut value = 0usize;
    let mut bytes_read = 0usize;

    loop {
        if bytes_read == 4 {
            return Err(PacketError::InvalidLengthEncoding);
        }
        let Some(&byte) = bytes.get(bytes_read) else {
            return Err(PacketError::Incomplete);
        };
        bytes_read += 1;
        value += (byte & 0x7F) as usize * multiplier;
        multiplier *= 128;

        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((value, bytes_read))
}

/// Schreibt eine Remaining Length, gibt die Anzahl geschriebener Bytes zurück
pub fn write_variable_length(value: usize, buffer: &mut [u8]) -> Result<usize, PacketError> {
    if value > MAX_REMAINING_LENGTH {
        return Err(PacketError::InvalidLengthEncoding);
    }

    let mut encoded = value;
    let mut bytes_written = 0;

    loop {
        let slot = buffer
            .get_mut(bytes_written)
            .ok_or(PacketError::BufferTooSmall)?;
        let mut byte = (encoded & 0x7F) as u8;
        encoded >>= 7;
        if encoded > 0 {
            byte |= 0x80;
        }
        *slot = byte;
        bytes_written += 1;
        if encoded == 0 {
            break;
        }
    }

    Ok(bytes_written)
}

pub fn write_u8(value: u8, buffer: &mut [u8], offset: &mut usize) -> Result<(), PacketError> {
    let slot = buffer.get_mut(*offset).ok_or(PacketError::BufferTooSmall)?;
    *slot = value;
    *offset += 1;
    Ok(())
}

pub fn write_u16(value: u16, buffer: &mut [u8], offset: &mut usize) -> Result<(), PacketError> {
    write_raw(&value.to_be_bytes(), buffer, offset)
}

/// Schreibt Bytes ohne Längenpräfix (z.B. PUBLISH Payload)
pub fn write_raw(bytes: &[u8], buffer: &mut [u8], offset: &mut usize) -> Result<(), PacketError> {
    let end = *offset + bytes.len();
    if end > buffer.len() {
        return Err(PacketError::BufferTooSmall);
    }
    buffer[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

/// Schreibt Binärdaten mit 2-Byte Längenpräfix
pub fn write_binary(bytes: &[u8], buffer: &mut [u8], offset: &mut usize) -> Result<(), PacketError> {
    let len = u16::try_from(bytes.len()).map_err(|_| PacketError::InvalidLength)?;
    write_u16(len, buffer, offset)?;
    write_raw(bytes, buffer, offset)
}

pub fn write_string(s: &str, buffer: &mut [u8], offset: &mut usize) -> Result<(), PacketError> {
    write_binary(s.as_bytes(), buffer, offset)
}

pub fn read_u8(bytes: &[u8], offset: &mut usize) -> Result<u8, PacketError> {
    let byte = *bytes.get(*offset).ok_or(PacketError::InvalidLength)?;
    *offset += 1;
    Ok(byte)
}

pub fn read_u16(bytes: &[u8], offset: &mut usize) -> Result<u16, PacketError> {
    let hi = read_u8(bytes, offset)?;
    let lo = read_u8(bytes, offset)?;
    Ok(u16::from_be_bytes([hi, lo]))
}

pub fn read_string<'a>(bytes: &'a [u8], offset: &mut usize) -> Result<&'a str, PacketError> {
    let len = read_u16(bytes, offset)? as usize;
    let end = *offset + len;
    let raw = bytes.get(*offset..end).ok_or(PacketError::InvalidLength)?;
    *offset = end;
    core::str::from_utf8(raw).map_err(|_| PacketError::InvalidUtf8)
}

/// Länge eines Strings/Binärfelds inklusive 2-Byte Präfix
pub const fn prefixed_len(len: usize) -> usize {
    2 + len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_length_boundaries() {
        let cases: [(usize, &[u8]); 6] = [
            (0, &[0x00]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (16_383, &[0xFF, 0x7F]),
            (16_384, &[0x80, 0x80, 0x01]),
            (MAX_REMAINING_LENGTH, &[0xFF, 0xFF, 0xFF, 0x7F]),
        ];

        for (value, expected) in cases {
            let mut buf = [0u8; 4];
            let n = write_variable_length(value, &mut buf).unwrap();
            assert_eq!(&buf[..n], expected);
            assert_eq!(n, variable_length_length(value));
            assert_eq!(read_variable_length(expected), Ok((value, n)));
        }
    }

    #[test]
    fn test_variable_length_incomplete() {
        assert_eq!(read_variable_length(&[]), Err(PacketError::Incomplete));
        assert_eq!(read_variable_length(&[0x80]), Err(PacketError::Incomplete));
    }

    #[test]
    fn test_variable_length_too_long() {
        assert_eq!(
            read_variable_length(&[0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(PacketError::InvalidLengthEncoding)
        );
        let mut buf = [0u8; 4];
        assert_eq!(
            write_variable_length(MAX_REMAINING_LENGTH + 1, &mut buf),
            Err(PacketError::InvalidLengthEncoding)
        );
    }

    #[test]
    fn test_string_write_and_read() {
        let mut buf = [0u8; 8];
        let mut offset = 0;
        write_string("MQTT", &mut buf, &mut offset).unwrap();
        assert_eq!(offset, 6);
        assert_eq!(&buf[..6], &[0x00, 0x04, b'M', b'Q', b'T', b'T']);

        let mut read_offset = 0;
        assert_eq!(read_string(&buf[..6], &mut read_offset), Ok("MQTT"));
        assert_eq!(read_offset, 6);
    }

    #[test]
    fn test_string_buffer_too_small() {
        let mut buf = [0u8; 4];
        let mut offset = 0;
        assert_eq!(
            write_string("MQTT", &mut buf, &mut offset),
            Err(PacketError::BufferTooSmall)
        );
    }

    #[test]
    fn test_read_string_invalid_utf8() {
        let bytes = [0x00, 0x02, 0xC3, 0x28];
        let mut offset = 0;
        assert_eq!(
            read_string(&bytes, &mut offset),
            Err(PacketError::InvalidUtf8)
        );
    }
}
