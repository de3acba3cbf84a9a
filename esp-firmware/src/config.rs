// Projekt-Konfiguration: Build-Zeit Werte aus .env und Tuning-Konstanten
#![allow(dead_code)]

use esp_mqtt_core::profile::DEVICE_CLASS_ESP32;
use esp_mqtt_core::{BrokerSettings, DeviceProfile, WifiCredentials};

// ============================================================================
// Geräte-Profil
// ============================================================================

/// Geräteklasse im Topic (`client/<DEVICE>/...`)
/// Standard: "ESP32", kann per DEVICE_CLASS in .env überschrieben werden
pub const DEVICE_CLASS: &str = match option_env!("DEVICE_CLASS") {
    Some(class) => class,
    None => DEVICE_CLASS_ESP32,
};

/// Alles, was für dieses Board zur Build-Zeit feststeht
pub const PROFILE: DeviceProfile<'static> = DeviceProfile {
    device_class: DEVICE_CLASS,
    wifi: WifiCredentials {
        ssid: WIFI_SSID,
        password: WIFI_PASSWORD,
    },
    broker: BrokerSettings {
        host: MQTT_BROKER,
        port: MQTT_PORT,
        username: MQTT_USERNAME,
        password: MQTT_PASSWORD,
    },
};

// ============================================================================
// WiFi Konfiguration
// ============================================================================

/// WiFi SSID (Netzwerk-Name)
/// Wird zur Build-Zeit aus der Environment Variable WIFI_SSID geladen
/// Setze diese in .env file (siehe .env.example)
pub const WIFI_SSID: &str = env!(
    "WIFI_SSID",
    "WiFi SSID nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// WiFi Passwort
/// Wird zur Build-Zeit aus der Environment Variable WIFI_PASSWORD geladen
/// Setze diese in .env file (siehe .env.example)
pub const WIFI_PASSWORD: &str = env!(
    "WIFI_PASSWORD",
    "WiFi Password nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// Heap-Größe für WiFi (Bytes)
/// WiFi benötigt dynamischen Speicher für Pakete
pub const WIFI_HEAP_SIZE: usize = 65536; // 64 KB

/// Zusätzliche Heap-Größe (Bytes)
pub const EXTRA_HEAP_SIZE: usize = 36864; // 36 KB

/// Wartezeit nach fehlgeschlagenem WiFi-Start oder -Connect
pub const WIFI_RETRY_DELAY_SECS: u64 = 5;

/// Poll-Intervall beim Warten auf Link und DHCP
pub const NETWORK_POLL_MS: u64 = 500;

// ============================================================================
// MQTT Konfiguration
// ============================================================================

/// MQTT Broker Hostname oder IP-Adresse
/// Wird zur Build-Zeit aus der Environment Variable MQTT_BROKER geladen
/// Setze diese in .env file (siehe .env.example)
pub const MQTT_BROKER: &str = env!(
    "MQTT_BROKER",
    "MQTT Broker nicht gesetzt! Erstelle .env file (siehe .env.example)"
);

/// MQTT Broker Port
/// Standard: 1883 (unverschlüsselt), kann per MQTT_PORT in .env überschrieben werden
pub const MQTT_PORT: u16 = match option_env!("MQTT_PORT") {
    Some(port) => parse_port(port),
    None => esp_mqtt_core::config::DEFAULT_PORT,
};

/// MQTT Username (optional, leer = anonym)
pub const MQTT_USERNAME: Option<&str> = non_empty(option_env!("MQTT_USERNAME"));

/// MQTT Passwort (optional, nur zusammen mit Username)
pub const MQTT_PASSWORD: Option<&str> = non_empty(option_env!("MQTT_PASSWORD"));

/// Größe von Send- und Receive-Buffer der Session in Bytes
/// Muss das CONNECT-Paket inkl. Last-Will fassen (wird in Session::new geprüft)
pub const MQTT_BUFFER_SIZE: usize = 256;

/// Maximale Anzahl gleichzeitiger Subscriptions
pub const MAX_SUBSCRIPTIONS: usize = 2;

/// Pause zwischen zwei Telemetrie-Runden
pub const PUBLISH_INTERVAL_MS: u32 = 10_000;

// ============================================================================
// TCP Konfiguration
// ============================================================================

/// TCP RX/TX Socket-Buffer in Bytes
pub const TCP_RX_BUFFER_SIZE: usize = 1024;
pub const TCP_TX_BUFFER_SIZE: usize = 1024;

/// DNS Query Timeout in Sekunden
pub const DNS_TIMEOUT_SECS: u64 = 10;

/// Maximale Dauer des TCP-Verbindungsaufbaus
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Socket-Timeout: länger als Keep-Alive + Command-Timeout,
/// sonst bricht smoltcp eine ruhige Verbindung ab
pub const TCP_SOCKET_TIMEOUT_SECS: u64 = 60;

/// Wie lange `close()` auf das Abschicken des FIN wartet
pub const TCP_CLOSE_TIMEOUT_MS: u64 = 500;

// ============================================================================
// Hilfsfunktionen (const)
// ============================================================================

const fn parse_port(raw: &str) -> u16 {
    let bytes = raw.as_bytes();
    assert!(!bytes.is_empty(), "MQTT_PORT ist leer");

    let mut value: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        assert!(bytes[i].is_ascii_digit(), "MQTT_PORT muss eine Zahl sein");
        value = value * 10 + (bytes[i] - b'0') as u32;
        assert!(value <= u16::MAX as u32, "MQTT_PORT ist zu groß");
        i += 1;
    }
    value as u16
}

const fn non_empty(value: Option<&'static str>) -> Option<&'static str> {
    match value {
        Some(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}
