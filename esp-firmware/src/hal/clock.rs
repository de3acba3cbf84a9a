// Zeitquelle und Delay über embassy-time

use embassy_time::{Instant, Timer};
use esp_mqtt_core::{Clock, Delay};

/// Monotone Uhr seit Boot
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

/// Async Delay, gibt den Executor während des Wartens frei
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyDelay;

impl Delay for EmbassyDelay {
    async fn sleep_ms(&mut self, millis: u32) {
        Timer::after_millis(millis as u64).await;
    }
}
