//! Geräte-Identität: Geräteklasse + Hardware-ID
//!
//! Die Hardware-ID wird einmal beim Boot gelesen und ist danach unveränderlich.
//! Sie erscheint immer als Großbuchstaben-Hex (z.B. `A1B2C3`) in Topics
//! und als MQTT Client-ID.

use core::fmt::{self, Write};

use heapless::String;

use crate::error::ConfigError;

/// Maximale Länge der Geräteklasse (z.B. "ESP32")
pub const DEVICE_CLASS_CAPACITY: usize = 32;

/// Maximale Länge der Hex-Darstellung (u64 → 16 Stellen)
pub const HARDWARE_ID_CAPACITY: usize = 16;

/// Hex-String einer Hardware-ID (Großbuchstaben, ohne führende Nullen)
pub type HardwareIdString = String<HARDWARE_ID_CAPACITY>;

/// Eindeutige Hardware-ID des Chips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HardwareId(u64);

impl HardwareId {
    pub const fn from_u32(raw: u32) -> Self {
        Self(raw as u64)
    }

    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Hardware-ID aus der Factory-MAC (eFuse)
    ///
    /// Nimmt die unteren 32 Bit der MAC, gelesen als Little-Endian.
    /// Das ergibt dieselbe ID wie `(uint32_t)ESP.getEfuseMac()` auf dem ESP32.
    pub const fn from_efuse_mac(mac: [u8; 6]) -> Self {
        Self::from_u32(u32::from_le_bytes([mac[0], mac[1], mac[2], mac[3]]))
    }

    /// Parst eine Hex-ID in beliebiger Schreibweise, optional mit `0x`-Präfix
    ///
    /// ```
    /// # use esp_mqtt_core::HardwareId;
    /// let id = HardwareId::parse("0xa1b2c3").unwrap();
    /// assert_eq!(id.to_hex().as_str(), "A1B2C3");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);

        if digits.is_empty()
            || digits.len() > HARDWARE_ID_CAPACITY
            || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(ConfigError::InvalidHardwareId);
        }

        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| ConfigError::InvalidHardwareId)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Großbuchstaben-Hex ohne führende Nullen
    pub fn to_hex(self) -> HardwareIdString {
        let mut out = HardwareIdString::new();
        // u64 hat maximal 16 Hex-Stellen, passt immer
        let _ = write!(out, "{:X}", self.0);
        out
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// Geräteklasse + Hardware-ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    class: String<DEVICE_CLASS_CAPACITY>,
    id: HardwareId,
}

impl DeviceIdentity {
    /// Erstellt die Identität
    ///
    /// # Fehlerbehandlung
    /// `ConfigError::InvalidDeviceClass` wenn die Klasse leer ist, länger als
    /// `DEVICE_CLASS_CAPACITY` oder Topic-Trennzeichen/Wildcards enthält.
    pub fn new(class: &str, id: HardwareId) -> Result<Self, ConfigError> {
        if class.is_empty() || class.contains(|c: char| matches!(c, '/' | '+' | '#')) {
            return Err(ConfigError::InvalidDeviceClass);
        }
        let class = String::try_from(class).map_err(|_| ConfigError::InvalidDeviceClass)?;
        Ok(Self { class, id })
    }

    pub fn class(&self) -> &str {
        self.class.as_str()
    }

    pub fn id(&self) -> HardwareId {
        self.id
    }

    /// MQTT Client-ID = Hardware-ID in Großbuchstaben
    pub fn client_id(&self) -> HardwareIdString {
        self.id.to_hex()
    }

    /// DHCP-Hostname, gleich der Client-ID
    pub fn hostname(&self) -> HardwareIdString {
        self.client_id()
    }
}
