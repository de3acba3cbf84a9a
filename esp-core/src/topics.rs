//! Topic-Namen und Topic-Filter
//!
//! Drei feste Topics pro Gerät:
//! - Status:  `client/<DEVICE>/<ID>/status` (retained, Last-Will Ziel)
//! - Sensor:  `v1/<DEVICE>/<ID>/sensor/temperature` (periodische Telemetrie)
//! - Command: `v1/<DEVICE>/<ID>/command` (subscribed)

use core::fmt::Write;

use heapless::String;

use crate::identity::DeviceIdentity;

/// Maximale Länge eines Topics bzw. Topic-Filters
///
/// Reicht für alle Templates: Geräteklasse max. 32 Zeichen,
/// Hardware-ID max. 16 Zeichen, längstes Template 23 feste Zeichen.
pub const TOPIC_CAPACITY: usize = 128;

/// Topic-String mit fester Kapazität
pub type Topic = String<TOPIC_CAPACITY>;

/// Die drei Topics eines Geräts
///
/// Wird einmal beim Start berechnet und danach nie verändert.
/// Alle drei teilen sich dasselbe `<DEVICE>/<ID>` Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    status: Topic,
    sensor: Topic,
    command: Topic,
}

impl TopicSet {
    pub fn new(identity: &DeviceIdentity) -> Self {
        let device = identity.class();
        let id = identity.id().to_hex();

        Self {
            status: compose(format_args!("client/{}/{}/status", device, id)),
            sensor: compose(format_args!("v1/{}/{}/sensor/temperature", device, id)),
            command: compose(format_args!("v1/{}/{}/command", device, id)),
        }
    }

    pub fn status(&self) -> &str {
        self.status.as_str()
    }

    pub fn sensor(&self) -> &str {
        self.sensor.as_str()
    }

    pub fn command(&self) -> &str {
        self.command.as_str()
    }
}

fn compose(args: core::fmt::Arguments<'_>) -> Topic {
    let mut topic = Topic::new();
    // DeviceIdentity begrenzt Klasse und ID, das Template passt immer
    let result = topic.write_fmt(args);
    debug_assert!(result.is_ok());
    topic
}

/// Prüft einen Topic-Namen für PUBLISH (keine Wildcards, nicht leer)
pub fn is_valid_topic_name(topic: &str) -> bool {
    !topic.is_empty()
        && topic.len() <= u16::MAX as usize
        && !topic.contains(|c: char| matches!(c, '+' | '#' | '\0'))
}

/// Prüft einen Topic-Filter für SUBSCRIBE
///
/// `+` muss eine ganze Ebene belegen, `#` nur als letzte Ebene.
pub fn is_valid_topic_filter(filter: &str) -> bool {
    if filter.is_empty() || filter.len() > u16::MAX as usize || filter.contains('\0') {
        return false;
    }

    let mut levels = filter.split('/').peekable();
    while let Some(level) = levels.next() {
        match level {
            "+" => {}
            "#" => return levels.peek().is_none(),
            other if other.contains(|c: char| matches!(c, '+' | '#')) => return false,
            _ => {}
        }
    }
    true
}

/// MQTT Wildcard-Matching (`+` = eine Ebene, `#` = Rest inkl. Eltern-Ebene)
///
/// Topics mit `$` am Anfang matchen keine Wildcards auf der ersten Ebene.
pub fn filter_matches(filter: &str, topic: &str) -> bool {
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::HardwareId;

    #[test]
    fn test_topic_templates() {
        let identity = DeviceIdentity::new("ESP32", HardwareId::from_u32(0xA1B2C3)).unwrap();
        let topics = TopicSet::new(&identity);
        assert_eq!(topics.status(), "client/ESP32/A1B2C3/status");
        assert_eq!(topics.sensor(), "v1/ESP32/A1B2C3/sensor/temperature");
        assert_eq!(topics.command(), "v1/ESP32/A1B2C3/command");
    }

    #[test]
    fn test_longest_identity_fits() {
        let identity = DeviceIdentity::new(
            "ABCDEFGHIJKLMNOPQRSTUVWXYZ012345",
            HardwareId::from_u64(u64::MAX),
        )
        .unwrap();
        let topics = TopicSet::new(&identity);
        assert!(topics.sensor().ends_with("/FFFFFFFFFFFFFFFF/sensor/temperature"));
        assert!(topics.sensor().starts_with("v1/ABCDEFGHIJKLMNOPQRSTUVWXYZ012345/"));
    }

    #[test]
    fn test_topic_name_validation() {
        assert!(is_valid_topic_name("v1/ESP32/A1/command"));
        assert!(!is_valid_topic_name(""));
        assert!(!is_valid_topic_name("v1/+/x"));
        assert!(!is_valid_topic_name("v1/#"));
    }

    #[test]
    fn test_topic_filter_validation() {
        assert!(is_valid_topic_filter("v1/+/A1/command"));
        assert!(is_valid_topic_filter("v1/#"));
        assert!(is_valid_topic_filter("#"));
        assert!(!is_valid_topic_filter("v1/#/x"));
        assert!(!is_valid_topic_filter("v1/a+/x"));
        assert!(!is_valid_topic_filter(""));
    }

    #[test]
    fn test_filter_matching() {
        assert!(filter_matches("v1/ESP32/A1/command", "v1/ESP32/A1/command"));
        assert!(filter_matches("v1/+/A1/command", "v1/ESP32/A1/command"));
        assert!(filter_matches("v1/#", "v1/ESP32/A1/command"));
        assert!(filter_matches("v1/ESP32/#", "v1/ESP32"));
        assert!(!filter_matches("v1/+", "v1/ESP32/A1"));
        assert!(!filter_matches("v1/ESP32/A1/command", "v1/ESP32/A1"));
        assert!(!filter_matches("#", "$SYS/broker/uptime"));
    }
}
