//! Platform Abstraction Traits
//!
//! Diese Traits definieren Schnittstellen für Netzwerk und Zeit
//! ohne konkrete Implementierung.
//!
//! # Implementierungen
//! - **Production:** `TcpTransport` (embassy-net), `EmbassyClock`, `EmbassyDelay`
//! - **Testing:** `MockTransport`, `MockClock`, `MockDelay` (in-memory Mocks)

use crate::error::TransportError;

/// Eine TCP-Verbindung zum Broker
///
/// Die Session besitzt den Transport exklusiv. Alle Wartezeiten laufen über
/// `read()` mit Timeout, damit der Executor währenddessen den Netzwerk-Stack
/// bedienen kann.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Baut die TCP-Verbindung zu `host:port` auf
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Schreibt den kompletten Buffer
    async fn write(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Liest verfügbare Bytes, wartet höchstens `timeout_ms`
    ///
    /// # Rückgabe
    /// - `Ok(0)`: innerhalb des Timeouts kam nichts an
    /// - `Ok(n)`: `n` Bytes gelesen
    /// - `Err(TransportError::Closed)`: Gegenstelle hat geschlossen
    async fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError>;

    /// Status-Abfrage: Verbindung steht noch?
    fn is_connected(&self) -> bool;

    /// Schließt die Verbindung (Fehler werden ignoriert)
    async fn close(&mut self);
}

/// Monotone Uhr in Millisekunden
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Async Delay für feste Wartezeiten (Backoff, Grace-Delay)
#[allow(async_fn_in_trait)]
pub trait Delay {
    async fn sleep_ms(&mut self, millis: u32);
}
