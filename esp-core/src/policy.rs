// Retry- und Neustart-Policy
//
// Wie oft wird TCP neu versucht, wie oft ein PUBLISH wiederholt,
// und wie lange wartet die Firmware vor dem Neustart.

use crate::app::Phase;

/// Zahlen für Retries und Grace-Delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetryPolicy {
    /// Anzahl TCP-Verbindungsversuche pro `start()` (mindestens 1)
    pub tcp_connect_attempts: u8,
    /// Pause zwischen zwei TCP-Versuchen
    pub tcp_retry_delay_ms: u32,
    /// Wie oft ein unbestätigtes QoS1 PUBLISH mit DUP wiederholt wird
    pub publish_redeliveries: u8,
    /// Wartezeit vor dem Neustart nach einem Fehler beim Verbinden
    pub connect_grace_ms: u32,
    /// Wartezeit vor dem Neustart nach einem Fehler beim Publishen
    pub publish_grace_ms: u32,
    /// Wartezeit vor dem Neustart nach einem Fehler beim Subscriben
    pub subscribe_grace_ms: u32,
}

impl RetryPolicy {
    pub const fn new() -> Self {
        Self {
            tcp_connect_attempts: 3,
            tcp_retry_delay_ms: 5_000,
            publish_redeliveries: 1,
            connect_grace_ms: 5_000,
            publish_grace_ms: 2_000,
            subscribe_grace_ms: 0,
        }
    }

    /// Grace-Delay vor dem Neustart, abhängig von der fehlgeschlagenen Phase
    pub const fn grace_ms(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Connect | Phase::Idle => self.connect_grace_ms,
            Phase::Announce | Phase::Publish => self.publish_grace_ms,
            Phase::Subscribe => self.subscribe_grace_ms,
        }
    }

    /// Neuer Backoff-Zähler für einen Verbindungsaufbau
    pub const fn tcp_backoff(&self) -> Backoff {
        let attempts = if self.tcp_connect_attempts == 0 {
            1
        } else {
            self.tcp_connect_attempts
        };
        Backoff {
            remaining: attempts - 1,
            delay_ms: self.tcp_retry_delay_ms,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Zähler für verbleibende Wiederholungen mit festem Delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    remaining: u8,
    delay_ms: u32,
}

impl Backoff {
    /// Delay bis zum nächsten Versuch, `None` wenn keine Versuche mehr übrig sind
    pub fn next_delay(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.delay_ms)
    }

    pub fn remaining(&self) -> u8 {
        self.remaining
    }
}
