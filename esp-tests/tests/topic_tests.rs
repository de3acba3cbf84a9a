//! Integration Tests für Geräteprofil, Identität und Topics
//!
//! Vom Profil über die Hardware-ID bis zu Topics und Session-Konfiguration.

use esp_mqtt_core::profile::{DEVICE_CLASS_ESP32, DEVICE_CLASS_ESP8266};
use esp_mqtt_core::topics::filter_matches;
use esp_mqtt_core::{BrokerSettings, DeviceProfile, HardwareId, QoS, TopicSet, WifiCredentials};

fn profile(device_class: &'static str) -> DeviceProfile<'static> {
    DeviceProfile {
        device_class,
        wifi: WifiCredentials {
            ssid: "werkstatt",
            password: "geheim",
        },
        broker: BrokerSettings {
            host: "mqtt.local",
            port: 1883,
            username: Some("node"),
            password: Some("pw"),
        },
    }
}

// ============================================================================
// Tests: Topics
// ============================================================================

#[test]
fn test_topics_share_device_segment() {
    for raw in [0x1u32, 0xA1B2C3, 0xDEADBEEF] {
        let identity = profile(DEVICE_CLASS_ESP32)
            .identity(HardwareId::from_u32(raw))
            .unwrap();
        let topics = TopicSet::new(&identity);
        let segment = format!("/{}/{:X}/", DEVICE_CLASS_ESP32, raw);

        assert!(topics.status().contains(&segment));
        assert!(topics.sensor().contains(&segment));
        assert!(topics.command().contains(&segment));
        assert_eq!(identity.client_id().as_str(), format!("{:X}", raw));
    }
}

#[test]
fn test_topics_from_efuse_mac() {
    // Untere 32 Bit der MAC als Little-Endian gelesen
    let id = HardwareId::from_efuse_mac([0xC3, 0xB2, 0xA1, 0x00, 0x55, 0x60]);
    let identity = profile(DEVICE_CLASS_ESP32).identity(id).unwrap();
    let topics = TopicSet::new(&identity);

    assert_eq!(topics.status(), "client/ESP32/A1B2C3/status");
    assert_eq!(topics.sensor(), "v1/ESP32/A1B2C3/sensor/temperature");
    assert_eq!(topics.command(), "v1/ESP32/A1B2C3/command");
}

#[test]
fn test_hostname_is_uppercase_hardware_id() {
    let id = HardwareId::parse("a1b2c3").unwrap();
    let identity = profile(DEVICE_CLASS_ESP32).identity(id).unwrap();

    assert_eq!(identity.hostname().as_str(), "A1B2C3");
    assert_eq!(identity.hostname(), identity.client_id());
}

#[test]
fn test_lowercase_hardware_id_is_normalized() {
    let id = HardwareId::parse("a1b2c3").unwrap();
    let identity = profile(DEVICE_CLASS_ESP32).identity(id).unwrap();

    assert_eq!(TopicSet::new(&identity).command(), "v1/ESP32/A1B2C3/command");
}

#[test]
fn test_esp8266_profile() {
    let identity = profile(DEVICE_CLASS_ESP8266)
        .identity(HardwareId::from_u32(0x00C0FFEE))
        .unwrap();
    let topics = TopicSet::new(&identity);

    assert_eq!(topics.status(), "client/ESP8266/C0FFEE/status");
    assert_eq!(identity.client_id().as_str(), "C0FFEE");
}

#[test]
fn test_invalid_device_class_rejected() {
    assert!(profile("ESP/32").identity(HardwareId::from_u32(1)).is_err());
    assert!(profile("").identity(HardwareId::from_u32(1)).is_err());
}

#[test]
fn test_command_filter_matches_own_topic_only() {
    let own = profile(DEVICE_CLASS_ESP32)
        .identity(HardwareId::from_u32(0xA1B2C3))
        .unwrap();
    let other = profile(DEVICE_CLASS_ESP32)
        .identity(HardwareId::from_u32(0xA1B2C4))
        .unwrap();
    let own_topics = TopicSet::new(&own);
    let other_topics = TopicSet::new(&other);

    assert!(filter_matches(own_topics.command(), own_topics.command()));
    assert!(!filter_matches(own_topics.command(), other_topics.command()));
    assert!(filter_matches("v1/ESP32/+/command", other_topics.command()));
    assert!(filter_matches("v1/#", own_topics.sensor()));
}

// ============================================================================
// Tests: Session-Konfiguration aus dem Profil
// ============================================================================

#[test]
fn test_session_config_from_profile() {
    let profile = profile(DEVICE_CLASS_ESP32);
    let identity = profile.identity(HardwareId::from_u32(0xA1B2C3)).unwrap();
    let topics = TopicSet::new(&identity);
    let client_id = identity.client_id();

    let config = profile.session_config(client_id.as_str(), &topics);

    assert_eq!(config.host, "mqtt.local");
    assert_eq!(config.client_id, "A1B2C3");
    assert_eq!(config.credentials.username, Some("node"));
    assert_eq!(config.credentials.password, Some("pw"));

    let will = config.will.unwrap();
    assert_eq!(will.topic, topics.status());
    assert_eq!(will.payload, b"disconnected");
    assert_eq!(will.qos, QoS::AtLeastOnce);
    assert!(will.retain);

    assert!(config.validate(256, 256, 2).is_ok());
}
