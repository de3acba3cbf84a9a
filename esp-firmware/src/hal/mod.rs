// Hardware Abstraction Layer (HAL) Module
//
// Implementierungen der esp-mqtt-core Traits für ESP32 + embassy.
// Die Session selbst kennt nur die Traits und bleibt auf dem Host testbar.

pub mod clock;
pub mod system;
pub mod transport;

pub use clock::{EmbassyClock, EmbassyDelay};
pub use system::{hardware_id, mac_address, restart};
pub use transport::TcpTransport;
