// Chip-Identität und Neustart

use esp_hal::efuse::Efuse;
use esp_mqtt_core::HardwareId;

/// Factory-MAC aus dem eFuse (Basis für WiFi-STA MAC)
pub fn mac_address() -> [u8; 6] {
    Efuse::read_base_mac_address()
}

/// Hardware-ID aus der Factory-MAC
pub fn hardware_id() -> HardwareId {
    HardwareId::from_efuse_mac(mac_address())
}

/// Kompletter Neustart des Chips (WiFi und MQTT starten von vorne)
pub fn restart() -> ! {
    esp_hal::system::software_reset()
}
