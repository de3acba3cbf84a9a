// Library-Root: Firmware-Module für den ESP32 MQTT-Knoten
// Keine Standard-Bibliothek (Embedded System)
#![no_std]

// Module
pub mod config;
pub mod hal;
pub mod tasks;

// Re-exports von esp-mqtt-core
pub use esp_mqtt_core::{DeviceIdentity, HardwareId, TopicSet};
