//! ESP MQTT Core - Platform-agnostic Session Logic
//!
//! Diese Crate enthält KEINE Hardware-Dependencies.
//! Sie definiert Traits (Transport, Clock, Delay), den MQTT 3.1.1 Codec,
//! die Session State Machine und den Application-Loop.
//! Alles hier läuft auch auf dem Host und ist dort testbar.

#![no_std]

// Logging-Makros zuerst, damit alle Module sie sehen
#[macro_use]
mod fmt;

pub mod app;
pub mod config;
pub mod error;
pub mod identity;
pub mod policy;
pub mod profile;
pub mod protocol;
pub mod session;
pub mod topics;
pub mod traits;

// Re-exports für einfachen Zugriff
pub use app::{Application, Fault, Phase};
pub use config::{Credentials, LastWill, SessionConfig};
pub use error::{
    ConfigError, Error, ErrorKind, PacketError, Rejection, Reply, Resource, TransportError,
};
pub use identity::{DeviceIdentity, HardwareId};
pub use policy::{Backoff, RetryPolicy};
pub use profile::{BrokerSettings, DeviceProfile, WifiCredentials};
pub use protocol::{ConnectReturnCode, QoS};
pub use session::{ConnectionState, Message, MessageHandler, Session};
pub use topics::{TOPIC_CAPACITY, Topic, TopicSet};
pub use traits::{Clock, Delay, Transport};
