// MQTT Task - Session, Online-Meldung und Telemetrie-Loop
use defmt::{error, info};
use embassy_net::Stack;
use embassy_time::{Duration, Timer};

use esp_mqtt_core::{Application, DeviceIdentity, Fault, RetryPolicy, Session, TopicSet};

use crate::config::{
    MAX_SUBSCRIPTIONS, MQTT_BUFFER_SIZE, PROFILE, PUBLISH_INTERVAL_MS, TCP_RX_BUFFER_SIZE,
    TCP_TX_BUFFER_SIZE,
};
use crate::hal::{EmbassyClock, EmbassyDelay, TcpTransport, restart};
use crate::tasks::wifi::wait_for_network;

/// Session-Typ der Firmware: TCP über embassy-net, Zeit über embassy-time
type NodeSession<'a> =
    Session<'a, TcpTransport<'a>, EmbassyClock, MQTT_BUFFER_SIZE, MQTT_BUFFER_SIZE, MAX_SUBSCRIPTIONS>;

/// MQTT Task
///
/// - Wartet auf WiFi + DHCP
/// - Verbindet mit dem Broker (Last-Will auf dem Status-Topic)
/// - Meldet das Gerät online und published alle 10s Telemetrie
/// - Subscribed dabei jede Runde erneut das Command-Topic
///
/// Es gibt keine Wiederherstellung im laufenden Betrieb: jeder Fehler endet
/// nach dem Grace-Delay in einem Neustart des Chips.
#[embassy_executor::task]
pub async fn mqtt_task(
    stack: Stack<'static>,
    identity: &'static DeviceIdentity,
    topics: &'static TopicSet,
) -> ! {
    info!("MQTT: Task started, waiting for network...");
    wait_for_network(stack).await;
    info!("MQTT: Network ready");

    match run_session(stack, identity, topics).await {
        Some(fault) => restart_after(fault).await,
        None => park().await,
    }
}

/// Baut Session und Application auf und läuft bis zum ersten Fehler
///
/// `None` bedeutet: die Konfiguration selbst ist ungültig, ein Neustart
/// würde daran nichts ändern.
async fn run_session(
    stack: Stack<'static>,
    identity: &'static DeviceIdentity,
    topics: &'static TopicSet,
) -> Option<Fault> {
    let mut rx_buffer = [0u8; TCP_RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TCP_TX_BUFFER_SIZE];
    let transport = TcpTransport::new(stack, &mut rx_buffer, &mut tx_buffer);

    let client_id = identity.client_id();
    let policy = RetryPolicy::default();
    let config = PROFILE.session_config(client_id.as_str(), topics);

    let mut session: NodeSession<'_> = match Session::new(transport, EmbassyClock, config, policy) {
        Ok(session) => session,
        Err(e) => {
            error!("MQTT: Invalid session configuration: {}", e);
            return None;
        }
    };

    info!("MQTT: Client ID '{}'", client_id.as_str());
    info!("MQTT: Status  -> {}", topics.status());
    info!("MQTT: Sensor  -> {}", topics.sensor());
    info!("MQTT: Command <- {}", topics.command());

    let app = Application::new(identity, topics, policy).with_interval_ms(PUBLISH_INTERVAL_MS);
    Some(app.run(&mut session, &mut EmbassyDelay).await)
}

/// Loggt den Fehler, wartet den Grace-Delay ab und startet neu
async fn restart_after(fault: Fault) -> ! {
    error!(
        "MQTT: {} failed: {} ({}), restarting in {} ms",
        fault.phase,
        fault.error,
        fault.error.kind(),
        fault.grace_ms
    );
    if fault.grace_ms > 0 {
        Timer::after(Duration::from_millis(fault.grace_ms as u64)).await;
    }
    restart()
}

/// Task bleibt stehen, ohne den Executor zu blockieren
async fn park() -> ! {
    error!("MQTT: Fix the .env configuration and reflash");
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
