// Keine Standard-Bibliothek verwenden (Embedded System)
#![no_std]
// Kein normaler main() Einstiegspunkt (wird von esp_rtos bereitgestellt)
#![no_main]
// Verbiete mem::forget - gefährlich bei ESP HAL Types mit DMA-Buffern
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
// Verbiete große Stack-Frames (Stack ist auf Embedded Systemen begrenzt)
#![deny(clippy::large_stack_frames)]

// Heap Allocator (WiFi benötigt dynamischen Speicher)
extern crate alloc;

// Embassy Async Runtime
use defmt::{error, info};
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, DhcpConfig, StackResources};
use embassy_time::{Duration, Timer};

// ESP32-C6 HAL
use esp_hal::clock::CpuClock;
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;

// Backtrace bei Panic und println!() Support
use {esp_backtrace as _, esp_println as _};

// Projekt-Module und Konfiguration
use esp_mqtt_node::config::{EXTRA_HEAP_SIZE, PROFILE, WIFI_HEAP_SIZE};
use esp_mqtt_node::hal::{hardware_id, mac_address, restart};
use esp_mqtt_node::tasks::{connection_task, mqtt_task, net_task};
use esp_mqtt_node::{DeviceIdentity, TopicSet};

// ESP-IDF App Descriptor - erforderlich für den Bootloader!
// Ohne diesen schlägt das Flashen mit "ESP-IDF App Descriptor missing" fehl
esp_bootloader_esp_idf::esp_app_desc!();

/// Main Entry Point
///
/// Initialisiert Hardware, liest die Geräte-Identität, startet WiFi und
/// spawnt die Tasks. Danach schläft main() - alle Arbeit läuft in Tasks.
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // ESP32-C6 Konfiguration: CPU auf maximale Taktfrequenz (160 MHz)
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Heap Allocator initialisieren (WiFi braucht dynamischen Speicher!)
    // Zwei Bereiche: reclaimed RAM (64 KB) + extra (36 KB) = 100 KB total
    esp_alloc::heap_allocator!(
        #[esp_hal::ram(reclaimed)]
        size: WIFI_HEAP_SIZE
    );
    esp_alloc::heap_allocator!(size: EXTRA_HEAP_SIZE);

    // Embassy Runtime initialisieren (Timer + Software Interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt =
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    // Geräte-Identität: einmal beim Boot aus dem eFuse gelesen
    static IDENTITY: static_cell::StaticCell<DeviceIdentity> = static_cell::StaticCell::new();
    let identity = match PROFILE.identity(hardware_id()) {
        Ok(identity) => &*IDENTITY.init(identity),
        Err(e) => {
            // Ungültige DEVICE_CLASS in .env - Neustart hilft nicht
            error!("Device: Invalid profile: {}", e);
            loop {
                Timer::after(Duration::from_secs(3600)).await;
            }
        }
    };
    info!("Device: MAC {:02X}", mac_address());
    info!(
        "Device: {}-{} ({})",
        identity.class(),
        identity.client_id().as_str(),
        PROFILE.wifi.ssid
    );

    static TOPICS: static_cell::StaticCell<TopicSet> = static_cell::StaticCell::new();
    let topics = &*TOPICS.init(TopicSet::new(identity));

    // WiFi Hardware initialisieren
    static RADIO_INIT: static_cell::StaticCell<esp_radio::Controller> =
        static_cell::StaticCell::new();
    let radio_init = match esp_radio::init() {
        Ok(controller) => RADIO_INIT.init(controller),
        Err(e) => {
            error!("Device: Wi-Fi controller init failed: {}", defmt::Debug2Format(&e));
            restart();
        }
    };

    let (wifi_controller, wifi_interface) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi");

    // Netzwerk-Stack erstellen
    // Random seed für TCP/IP Stack (von Hardware RNG)
    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    // Static resources für embassy-net
    // 3 Sockets: MQTT (TCP) + DHCP + DNS
    static RESOURCES: static_cell::StaticCell<StackResources<3>> = static_cell::StaticCell::new();
    let resources = RESOURCES.init(StackResources::new());

    // Im Netzwerk meldet sich der Node mit seiner Hardware-ID als Hostname
    let mut dhcp = DhcpConfig::default();
    dhcp.hostname = identity.hostname().as_str().parse().ok();

    // embassy-net erstellt Stack + Runner (nutzt STA interface für Client-Modus)
    let (stack, runner) = embassy_net::new(
        wifi_interface.sta,
        NetConfig::dhcpv4(dhcp),
        resources,
        seed,
    );

    // Spawn WiFi Tasks
    spawner.spawn(connection_task(wifi_controller)).unwrap();
    spawner.spawn(net_task(runner)).unwrap();

    // Spawn MQTT Task
    spawner.spawn(mqtt_task(stack, identity, topics)).unwrap();

    // Main-Loop: schläft (alle Arbeit läuft in Tasks)
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
