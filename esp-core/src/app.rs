//! Application Loop
//!
//! Ablauf pro Boot:
//! 1. `start()`: Verbinden (mit TCP-Backoff) und Online-Meldung auf dem Status-Topic
//! 2. `iterate()` endlos: Command-Topic subscriben, Telemetrie publishen, 10s warten
//!
//! Jeder Fehler wird zu einem `Fault`. Was dann passiert (Log, Grace-Delay,
//! Neustart) entscheidet die Firmware.

use core::fmt::Write;

use heapless::String;

use crate::error::Error;
use crate::identity::DeviceIdentity;
use crate::policy::RetryPolicy;
use crate::protocol::QoS;
use crate::session::{Message, MessageHandler, Session};
use crate::topics::TopicSet;
use crate::traits::{Clock, Delay, Transport};

/// Pause zwischen zwei Iterationen
pub const DEFAULT_INTERVAL_MS: u32 = 10_000;

/// Länge der Online-Meldung: "message from: " + Klasse (32) + "-" + ID (16)
pub const ANNOUNCEMENT_CAPACITY: usize = 64;

/// Schritt, in dem ein Fehler aufgetreten ist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    Connect,
    Announce,
    Subscribe,
    Publish,
    Idle,
}

/// Unbehebbarer Fehler: die Firmware wartet `grace_ms` und startet neu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fault {
    pub phase: Phase,
    pub error: Error,
    pub grace_ms: u32,
}

pub struct Application<'a> {
    identity: &'a DeviceIdentity,
    topics: &'a TopicSet,
    policy: RetryPolicy,
    interval_ms: u32,
    handler: MessageHandler,
    announcement: String<ANNOUNCEMENT_CAPACITY>,
}

impl<'a> Application<'a> {
    pub fn new(identity: &'a DeviceIdentity, topics: &'a TopicSet, policy: RetryPolicy) -> Self {
        let mut announcement = String::new();
        // Klasse und ID sind durch DeviceIdentity begrenzt
        let _ = write!(
            announcement,
            "message from: {}-{}",
            identity.class(),
            identity.id()
        );

        Self {
            identity,
            topics,
            policy,
            interval_ms: DEFAULT_INTERVAL_MS,
            handler: log_command,
            announcement,
        }
    }

    pub fn with_interval_ms(mut self, interval_ms: u32) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_handler(mut self, handler: MessageHandler) -> Self {
        self.handler = handler;
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        self.identity
    }

    pub fn topics(&self) -> &TopicSet {
        self.topics
    }

    /// `message from: <DEVICE>-<ID>`
    pub fn announcement(&self) -> &str {
        self.announcement.as_str()
    }

    /// Verbindet die Session und meldet das Gerät online
    ///
    /// Nur TCP-Fehler werden wiederholt (`RetryPolicy::tcp_connect_attempts`),
    /// eine Ablehnung durch den Broker ist sofort ein `Fault`.
    pub async fn start<T, C, D, const TX: usize, const RX: usize, const SUBS: usize>(
        &self,
        session: &mut Session<'_, T, C, TX, RX, SUBS>,
        delay: &mut D,
    ) -> Result<(), Fault>
    where
        T: Transport,
        C: Clock,
        D: Delay,
    {
        let mut backoff = self.policy.tcp_backoff();
        loop {
            match session.connect().await {
                Ok(()) => break,
                Err(Error::Transport(e)) => match backoff.next_delay() {
                    Some(delay_ms) => {
                        warn!(
                            "MQTT: Broker unreachable ({}), retrying in {} ms",
                            e, delay_ms
                        );
                        delay.sleep_ms(delay_ms).await;
                    }
                    None => return Err(self.fault(Phase::Connect, Error::Transport(e))),
                },
                Err(e) => return Err(self.fault(Phase::Connect, e)),
            }
        }

        session
            .publish(
                self.topics.status(),
                self.announcement.as_bytes(),
                QoS::AtLeastOnce,
                true,
            )
            .await
            .map_err(|e| self.fault(Phase::Announce, e))?;
        info!("MQTT: Online message sent to '{}'", self.topics.status());
        Ok(())
    }

    /// Eine Runde: Command-Topic (erneut) subscriben, Telemetrie senden, warten
    pub async fn iterate<T, C, const TX: usize, const RX: usize, const SUBS: usize>(
        &self,
        session: &mut Session<'_, T, C, TX, RX, SUBS>,
    ) -> Result<(), Fault>
    where
        T: Transport,
        C: Clock,
    {
        if let Err(e) = session.subscribe(self.topics.command(), self.handler).await {
            // Verbindung vor dem Neustart explizit abbauen
            session.disconnect().await;
            return Err(self.fault(Phase::Subscribe, e));
        }

        session
            .publish(
                self.topics.sensor(),
                self.announcement.as_bytes(),
                QoS::AtLeastOnce,
                true,
            )
            .await
            .map_err(|e| self.fault(Phase::Publish, e))?;
        debug!("MQTT: Telemetry published to '{}'", self.topics.sensor());

        session
            .idle(self.interval_ms)
            .await
            .map_err(|e| self.fault(Phase::Idle, e))
    }

    /// `start()` und danach `iterate()` bis zum ersten Fehler
    ///
    /// Kehrt nur mit einem `Fault` zurück.
    pub async fn run<T, C, D, const TX: usize, const RX: usize, const SUBS: usize>(
        &self,
        session: &mut Session<'_, T, C, TX, RX, SUBS>,
        delay: &mut D,
    ) -> Fault
    where
        T: Transport,
        C: Clock,
        D: Delay,
    {
        if let Err(fault) = self.start(session, delay).await {
            return fault;
        }
        loop {
            if let Err(fault) = self.iterate(session).await {
                return fault;
            }
        }
    }

    fn fault(&self, phase: Phase, error: Error) -> Fault {
        Fault {
            phase,
            error,
            grace_ms: self.policy.grace_ms(phase),
        }
    }
}

/// Standard-Handler für das Command-Topic: Nachricht loggen
pub fn log_command(message: &Message<'_>) {
    info!(
        "Message arrived: qos {}, retained {}, dup {}, packetid {}, payload:[{}]",
        message.qos as u8,
        message.retain,
        message.dup,
        message.packet_id.unwrap_or(0),
        core::str::from_utf8(message.payload).unwrap_or("<binary>")
    );
}
