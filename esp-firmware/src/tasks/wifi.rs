// WiFi Task - Verbindet mit dem Access Point aus dem Geräteprofil
use defmt::{Debug2Format, error, info, warn};
use embassy_net::{Runner, Stack};
use embassy_time::{Duration, Timer};
use esp_mqtt_core::WifiCredentials;
use esp_radio::wifi::{
    ClientConfig, ModeConfig, ScanConfig, WifiController, WifiDevice, WifiEvent,
};

use crate::config::{NETWORK_POLL_MS, PROFILE, WIFI_RETRY_DELAY_SECS};

/// WiFi Connection Task
///
/// - Startet den Station-Mode mit SSID/Passwort aus `PROFILE`
/// - Loggt die Signalstärke des Ziel-APs (Scan vor jedem Connect)
/// - Verbindet neu, sobald der AP die Verbindung trennt
///
/// Die MQTT-Session merkt einen WiFi-Abbruch als Transport-Fehler und
/// startet das Gerät neu, dieser Task hält die Verbindung bis dahin.
#[embassy_executor::task]
pub async fn connection_task(mut controller: WifiController<'static>) {
    let wifi = PROFILE.wifi;
    info!("WiFi: Starting connection task");

    loop {
        if matches!(controller.is_started(), Ok(false)) {
            if let Err(reason) = start_station(&mut controller, &wifi).await {
                error!("WiFi: {}", reason);
                Timer::after(Duration::from_secs(WIFI_RETRY_DELAY_SECS)).await;
                continue;
            }
            info!("WiFi: Station started");
        }

        log_signal_strength(&mut controller, wifi.ssid).await;

        info!("WiFi: Connecting to '{}'...", wifi.ssid);
        if let Err(e) = controller.connect_async().await {
            error!("WiFi: Connection failed: {}", Debug2Format(&e));
            Timer::after(Duration::from_secs(WIFI_RETRY_DELAY_SECS)).await;
            continue;
        }
        info!("WiFi: Associated with '{}'", wifi.ssid);

        controller.wait_for_event(WifiEvent::StaDisconnected).await;
        warn!("WiFi: Disconnected from AP, will retry...");
        Timer::after(Duration::from_secs(2)).await;
    }
}

/// Konfiguriert Station-Mode und startet den Controller
async fn start_station(
    controller: &mut WifiController<'static>,
    wifi: &WifiCredentials<'static>,
) -> Result<(), &'static str> {
    let client_config = ModeConfig::Client(
        ClientConfig::default()
            .with_ssid(wifi.ssid.into())
            .with_password(wifi.password.into()),
    );

    controller.set_config(&client_config).map_err(|e| {
        warn!("WiFi: set_config: {}", Debug2Format(&e));
        "Failed to set configuration"
    })?;

    controller.start_async().await.map_err(|e| {
        warn!("WiFi: start: {}", Debug2Format(&e));
        "Failed to start"
    })
}

/// Sucht den Ziel-AP per Scan und loggt dessen RSSI
async fn log_signal_strength(controller: &mut WifiController<'static>, ssid: &str) {
    match controller
        .scan_with_config_async(ScanConfig::default())
        .await
    {
        Ok(ap_infos) => match ap_infos.iter().find(|ap| ap.ssid.as_str() == ssid) {
            Some(ap) => info!(
                "WiFi: Target AP '{}' visible, signal {} dBm",
                ssid, ap.signal_strength
            ),
            None => warn!(
                "WiFi: Target AP '{}' not among {} access points",
                ssid,
                ap_infos.len()
            ),
        },
        Err(e) => warn!("WiFi: Scan failed: {}", Debug2Format(&e)),
    }
}

/// Network Task
///
/// Treibt den embassy-net Stack (Pakete senden/empfangen, DHCP, DNS).
#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// Wartet bis Link steht und DHCP eine Adresse geliefert hat
///
/// Loggt danach die IP-Konfiguration.
pub async fn wait_for_network(stack: Stack<'_>) {
    while !stack.is_link_up() {
        Timer::after(Duration::from_millis(NETWORK_POLL_MS)).await;
    }
    info!("WiFi: Link is up, waiting for IP address...");

    loop {
        if let Some(config) = stack.config_v4() {
            info!("WiFi: Got IP address");
            info!("  IP:      {}", Debug2Format(&config.address.address()));
            info!("  Gateway: {}", Debug2Format(&config.gateway));
            info!("  DNS:     {}", Debug2Format(&config.dns_servers));
            return;
        }
        Timer::after(Duration::from_millis(NETWORK_POLL_MS)).await;
    }
}
