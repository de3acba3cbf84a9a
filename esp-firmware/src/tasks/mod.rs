// Task-Modul: Enthält alle Embassy Tasks
//
// Jeder Task läuft asynchron auf demselben Executor.
// WiFi und Netzwerk-Stack laufen neben der MQTT-Session weiter,
// während diese auf Antworten des Brokers wartet.

pub mod mqtt;
pub mod wifi;

// Re-export Tasks für einfachen Import
pub use mqtt::mqtt_task;
pub use wifi::{connection_task, net_task};
