// TCP Transport über embassy-net
//
// Eine TcpSocket pro Session. DNS-Auflösung und Verbindungsaufbau laufen in
// connect(), Lesen mit Timeout über embassy_time::with_timeout.

use defmt::{Debug2Format, debug, info, warn};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpAddress, Ipv4Address, Stack};
use embassy_time::{Duration, with_timeout};
use esp_mqtt_core::{Transport, TransportError};
use smoltcp::socket::tcp::State;

use crate::config::{
    DNS_TIMEOUT_SECS, TCP_CLOSE_TIMEOUT_MS, TCP_CONNECT_TIMEOUT_SECS, TCP_SOCKET_TIMEOUT_SECS,
};

/// Transport-Implementierung für die MQTT Session
///
/// Die Socket-Buffer kommen vom Aufrufer (meist Arrays im Task),
/// damit sie nicht auf dem Heap landen.
pub struct TcpTransport<'a> {
    stack: Stack<'a>,
    socket: TcpSocket<'a>,
}

impl<'a> TcpTransport<'a> {
    pub fn new(stack: Stack<'a>, rx_buffer: &'a mut [u8], tx_buffer: &'a mut [u8]) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(TCP_SOCKET_TIMEOUT_SECS)));
        Self { stack, socket }
    }
}

impl Transport for TcpTransport<'_> {
    async fn connect(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        // Reste einer alten Verbindung verwerfen
        if self.socket.state() != State::Closed {
            self.socket.abort();
        }

        let address = resolve_hostname(self.stack, host).await?;
        info!("TCP: Connecting to {}:{}", Debug2Format(&address), port);

        match with_timeout(
            Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS),
            self.socket.connect((address, port)),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!("TCP: Connect failed: {}", Debug2Format(&e));
                Err(TransportError::ConnectFailed)
            }
            Err(_) => {
                warn!("TCP: Connect timed out after {}s", TCP_CONNECT_TIMEOUT_SECS);
                self.socket.abort();
                Err(TransportError::ConnectFailed)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let mut written = 0;
        while written < buf.len() {
            match self.socket.write(&buf[written..]).await {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => written += n,
                Err(e) => {
                    warn!("TCP: Write failed: {}", Debug2Format(&e));
                    return Err(TransportError::Io);
                }
            }
        }
        self.socket.flush().await.map_err(|_| TransportError::Io)
    }

    async fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }

        match with_timeout(
            Duration::from_millis(timeout_ms as u64),
            self.socket.read(buf),
        )
        .await
        {
            // Timeout: nichts angekommen
            Err(_) => Ok(0),
            // EOF: Broker hat die Verbindung geschlossen
            Ok(Ok(0)) => Err(TransportError::Closed),
            Ok(Ok(n)) => Ok(n),
            Ok(Err(e)) => {
                warn!("TCP: Read failed: {}", Debug2Format(&e));
                Err(TransportError::Io)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.socket.state() == State::Established
    }

    async fn close(&mut self) {
        self.socket.close();
        // FIN rausschicken, aber nicht ewig warten
        let _ = with_timeout(
            Duration::from_millis(TCP_CLOSE_TIMEOUT_MS),
            self.socket.flush(),
        )
        .await;
        self.socket.abort();
        debug!("TCP: Socket closed");
    }
}

/// Löst Hostname zu IPv4-Adresse auf
///
/// IP-Adressen in Textform werden direkt übernommen, alles andere geht
/// über den embassy-net DNS-Stack mit Timeout.
async fn resolve_hostname(stack: Stack<'_>, hostname: &str) -> Result<Ipv4Address, TransportError> {
    if let Ok(address) = hostname.parse::<Ipv4Address>() {
        return Ok(address);
    }

    info!("TCP: Resolving '{}'...", hostname);
    let result = with_timeout(
        Duration::from_secs(DNS_TIMEOUT_SECS),
        stack.dns_query(hostname, DnsQueryType::A),
    )
    .await;

    match result {
        Ok(Ok(addrs)) => addrs
            .iter()
            .find_map(|addr| match addr {
                IpAddress::Ipv4(ipv4) => Some(*ipv4),
                #[allow(unreachable_patterns)]
                _ => None,
            })
            .ok_or(TransportError::DnsFailed),
        Ok(Err(e)) => {
            warn!("TCP: DNS query failed: {}", Debug2Format(&e));
            Err(TransportError::DnsFailed)
        }
        Err(_) => {
            warn!("TCP: DNS query timed out after {}s", DNS_TIMEOUT_SECS);
            Err(TransportError::DnsFailed)
        }
    }
}
