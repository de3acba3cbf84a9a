// Session-Konfiguration
//
// Wird einmal vor dem Connect gesetzt und ist danach unveränderlich.
// Validierung passiert in `validate()` gegen die Buffer-Kapazitäten der Session.

use crate::error::ConfigError;
use crate::protocol::{Connect, QoS, Will};
use crate::topics::is_valid_topic_name;

/// Standard MQTT Port (unverschlüsselt)
pub const DEFAULT_PORT: u16 = 1883;

/// Keep-Alive Intervall in Sekunden
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 15;

/// Maximale Wartezeit auf eine Antwort des Brokers
pub const DEFAULT_COMMAND_TIMEOUT_MS: u32 = 10_000;

/// Last-Will Payload, die der Broker bei Verbindungsabbruch published
pub const DEFAULT_WILL_PAYLOAD: &[u8] = b"disconnected";

/// Kleinster sinnvoller Receive-Buffer (CONNACK, SUBACK, PUBACK, PINGRESP)
pub const MIN_RECEIVE_BUFFER: usize = 16;

/// Zugangsdaten für den Broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

/// Last-Will-and-Testament
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastWill<'a> {
    pub topic: &'a str,
    pub payload: &'a [u8],
    pub qos: QoS,
    pub retain: bool,
}

impl<'a> LastWill<'a> {
    /// Standard-LWT: `disconnected`, QoS1, retained auf dem Status-Topic
    pub fn disconnected(status_topic: &'a str) -> Self {
        Self {
            topic: status_topic,
            payload: DEFAULT_WILL_PAYLOAD,
            qos: QoS::AtLeastOnce,
            retain: true,
        }
    }
}

/// Konfiguration einer MQTT Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub credentials: Credentials<'a>,
    pub keep_alive_secs: u16,
    pub command_timeout_ms: u32,
    pub clean_session: bool,
    pub will: Option<LastWill<'a>>,
}

impl<'a> SessionConfig<'a> {
    /// Konfiguration mit den Standardwerten (Port 1883, Keep-Alive 15s,
    /// Command-Timeout 10s, Clean Session, ohne Credentials und LWT)
    pub fn new(host: &'a str, client_id: &'a str) -> Self {
        Self {
            host,
            port: DEFAULT_PORT,
            client_id,
            credentials: Credentials {
                username: None,
                password: None,
            },
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            clean_session: true,
            will: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: &'a str, password: Option<&'a str>) -> Self {
        self.credentials = Credentials {
            username: Some(username),
            password,
        };
        self
    }

    pub fn with_will(mut self, will: LastWill<'a>) -> Self {
        self.will = Some(will);
        self
    }

    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    pub fn with_command_timeout_ms(mut self, millis: u32) -> Self {
        self.command_timeout_ms = millis;
        self
    }

    pub fn keep_alive_ms(&self) -> u64 {
        self.keep_alive_secs as u64 * 1000
    }

    /// Das CONNECT-Paket zu dieser Konfiguration
    pub fn connect_packet(&self) -> Connect<'a> {
        Connect {
            client_id: self.client_id,
            keep_alive_secs: self.keep_alive_secs,
            clean_session: self.clean_session,
            username: self.credentials.username,
            password: self.credentials.password.map(str::as_bytes),
            will: self.will.map(|will| Will {
                topic: will.topic,
                payload: will.payload,
                qos: will.qos,
                retain: will.retain,
            }),
        }
    }

    /// Prüft die Konfiguration gegen die Kapazitäten der Session
    pub fn validate(
        &self,
        send_capacity: usize,
        receive_capacity: usize,
        subscription_slots: usize,
    ) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.client_id.is_empty() && !self.clean_session {
            return Err(ConfigError::InvalidClientId);
        }
        if self.keep_alive_secs == 0 {
            return Err(ConfigError::InvalidKeepAlive);
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::InvalidCommandTimeout);
        }
        if self.credentials.password.is_some() && self.credentials.username.is_none() {
            return Err(ConfigError::PasswordWithoutUsername);
        }
        if let Some(will) = &self.will {
            if !is_valid_topic_name(will.topic) {
                return Err(ConfigError::InvalidWillTopic);
            }
        }
        if subscription_slots == 0 {
            return Err(ConfigError::NoSubscriptionSlots);
        }
        if receive_capacity < MIN_RECEIVE_BUFFER {
            return Err(ConfigError::ReceiveBufferTooSmall {
                required: MIN_RECEIVE_BUFFER,
                capacity: receive_capacity,
            });
        }

        let required = self.connect_packet().encoded_len();
        if required > send_capacity {
            return Err(ConfigError::SendBufferTooSmall {
                required,
                capacity: send_capacity,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig<'static> {
        SessionConfig::new("broker.local", "A1B2C3")
            .with_credentials("user", Some("secret"))
            .with_will(LastWill::disconnected("client/ESP32/A1B2C3/status"))
    }

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("broker.local", "A1B2C3");
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive_secs, 15);
        assert_eq!(config.keep_alive_ms(), 15_000);
        assert_eq!(config.command_timeout_ms, 10_000);
        assert!(config.clean_session);
        assert!(config.will.is_none());
    }

    #[test]
    fn test_valid_config() {
        assert_eq!(config().validate(128, 128, 2), Ok(()));
    }

    #[test]
    fn test_send_buffer_too_small() {
        let required = config().connect_packet().encoded_len();
        assert_eq!(
            config().validate(32, 128, 2),
            Err(ConfigError::SendBufferTooSmall {
                required,
                capacity: 32
            })
        );
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            SessionConfig::new("", "A1").validate(128, 128, 2),
            Err(ConfigError::EmptyHost)
        );
        assert_eq!(
            config().with_keep_alive_secs(0).validate(128, 128, 2),
            Err(ConfigError::InvalidKeepAlive)
        );
        assert_eq!(
            config().with_command_timeout_ms(0).validate(128, 128, 2),
            Err(ConfigError::InvalidCommandTimeout)
        );
        assert_eq!(
            config().validate(128, 128, 0),
            Err(ConfigError::NoSubscriptionSlots)
        );
        assert_eq!(
            config().validate(128, 8, 2),
            Err(ConfigError::ReceiveBufferTooSmall {
                required: MIN_RECEIVE_BUFFER,
                capacity: 8
            })
        );
    }

    #[test]
    fn test_password_requires_username() {
        let mut config = config();
        config.credentials = Credentials {
            username: None,
            password: Some("secret"),
        };
        assert_eq!(
            config.validate(128, 128, 2),
            Err(ConfigError::PasswordWithoutUsername)
        );
    }

    #[test]
    fn test_will_topic_must_not_contain_wildcards() {
        let config = config().with_will(LastWill::disconnected("client/+/status"));
        assert_eq!(
            config.validate(128, 128, 2),
            Err(ConfigError::InvalidWillTopic)
        );
    }
}
