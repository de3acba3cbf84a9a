//! Geräteprofil: alles, was zur Build-Zeit feststeht
//!
//! Die Firmware füllt ein `DeviceProfile` aus den Umgebungsvariablen
//! (`.env` via build.rs). Daraus entstehen Identität und Session-Konfiguration.

use crate::config::{LastWill, SessionConfig};
use crate::error::ConfigError;
use crate::identity::{DeviceIdentity, HardwareId};
use crate::topics::TopicSet;

/// Geräteklasse der ESP32-Variante
pub const DEVICE_CLASS_ESP32: &str = "ESP32";

/// Geräteklasse der ESP8266-Variante
///
/// Die Chip-ID wird wie beim ESP32 hexadezimal gerendert, nicht dezimal,
/// damit beide Varianten dasselbe Topic-Schema haben.
pub const DEVICE_CLASS_ESP8266: &str = "ESP8266";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiCredentials<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerSettings<'a> {
    pub host: &'a str,
    pub port: u16,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile<'a> {
    pub device_class: &'a str,
    pub wifi: WifiCredentials<'a>,
    pub broker: BrokerSettings<'a>,
}

impl<'a> DeviceProfile<'a> {
    /// Identität aus Profil + ausgelesener Hardware-ID
    pub fn identity(&self, id: HardwareId) -> Result<DeviceIdentity, ConfigError> {
        DeviceIdentity::new(self.device_class, id)
    }

    /// Session-Konfiguration mit Standardwerten und LWT auf dem Status-Topic
    pub fn session_config(&self, client_id: &'a str, topics: &'a TopicSet) -> SessionConfig<'a> {
        let mut config = SessionConfig::new(self.broker.host, client_id)
            .with_port(self.broker.port)
            .with_will(LastWill::disconnected(topics.status()));

        if let Some(username) = self.broker.username {
            config = config.with_credentials(username, self.broker.password);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::QoS;

    const PROFILE: DeviceProfile<'static> = DeviceProfile {
        device_class: DEVICE_CLASS_ESP32,
        wifi: WifiCredentials {
            ssid: "lab",
            password: "secret",
        },
        broker: BrokerSettings {
            host: "192.168.1.10",
            port: 1884,
            username: None,
            password: None,
        },
    };

    #[test]
    fn test_session_config_from_profile() {
        let identity = PROFILE.identity(HardwareId::from_u32(0xA1B2C3)).unwrap();
        let topics = TopicSet::new(&identity);
        let client_id = identity.client_id();
        let config = PROFILE.session_config(client_id.as_str(), &topics);

        assert_eq!(config.host, "192.168.1.10");
        assert_eq!(config.port, 1884);
        assert_eq!(config.client_id, "A1B2C3");
        assert_eq!(config.keep_alive_secs, 15);
        assert!(config.clean_session);
        assert_eq!(config.credentials.username, None);

        let will = config.will.unwrap();
        assert_eq!(will.topic, "client/ESP32/A1B2C3/status");
        assert_eq!(will.payload, b"disconnected");
        assert_eq!(will.qos, QoS::AtLeastOnce);
        assert!(will.retain);
    }

    #[test]
    fn test_credentials_only_with_username() {
        let profile = DeviceProfile {
            broker: BrokerSettings {
                username: Some("node"),
                password: Some("pw"),
                ..PROFILE.broker
            },
            ..PROFILE
        };
        let identity = profile.identity(HardwareId::from_u32(1)).unwrap();
        let topics = TopicSet::new(&identity);
        let config = profile.session_config("1", &topics);
        assert_eq!(config.credentials.username, Some("node"));
        assert_eq!(config.credentials.password, Some("pw"));
    }
}
