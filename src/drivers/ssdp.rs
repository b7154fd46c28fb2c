//! SSDP search for Yamaha receivers on the local network
//!
//! Used when no receiver address is configured. Sends one M-SEARCH for media
//! renderers and returns the source address of the first answer that looks
//! like a Yamaha network module.

use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::DriverError;

/// Search target advertised by MusicCast/YXC receivers
pub const SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";

const MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// Parsed SSDP answer
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SsdpResponse {
    pub location: String,
    pub st: String,
    pub usn: String,
    pub server: Option<String>,
}

impl SsdpResponse {
    /// Yamaha receivers announce themselves with a `Network_Module` server string
    pub fn is_yamaha(&self) -> bool {
        self.server
            .as_deref()
            .map(|server| {
                let server = server.to_ascii_lowercase();
                server.contains("network_module") || server.contains("yamaha")
            })
            .unwrap_or(false)
    }
}

/// Search the network and return the IP of the first Yamaha receiver found
pub async fn discover_receiver(timeout: Duration) -> Result<String, DriverError> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| DriverError::Discovery(format!("failed to bind UDP socket: {}", e)))?;

    socket
        .send_to(search_request(SEARCH_TARGET).as_bytes(), MULTICAST_ADDR)
        .await
        .map_err(|e| DriverError::Discovery(format!("failed to send M-SEARCH: {}", e)))?;

    debug!("SSDP M-SEARCH sent ({}s window)", timeout.as_secs_f32());

    let deadline = Instant::now() + timeout;
    let mut buffer = [0u8; 2048];

    loop {
        let (size, from) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buffer)).await {
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                return Err(DriverError::Discovery(format!("socket error: {}", e)));
            }
            Err(_) => {
                return Err(DriverError::Discovery(
                    "no Yamaha receiver answered the SSDP search".to_string(),
                ));
            }
        };

        let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
            continue;
        };

        match parse_ssdp_response(text) {
            Some(response) if response.is_yamaha() => {
                debug!("SSDP: Yamaha receiver at {} ({})", from.ip(), response.location);
                return Ok(from.ip().to_string());
            }
            Some(response) => {
                trace!("SSDP: ignoring {} ({:?})", from.ip(), response.server);
            }
            None => {}
        }
    }
}

fn search_request(search_target: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {}\r\n\
         USER-AGENT: yxc-gw/0.1 UPnP/1.0\r\n\
         \r\n",
        search_target
    )
}

/// Parse an SSDP response from HTTP text
pub(crate) fn parse_ssdp_response(response: &str) -> Option<SsdpResponse> {
    let mut location = None;
    let mut st = None;
    let mut usn = None;
    let mut server = None;

    for line in response.lines() {
        let line = line.trim();

        if let Some(value) = extract_header_value(line, "LOCATION:") {
            location = Some(value);
        } else if let Some(value) = extract_header_value(line, "ST:") {
            st = Some(value);
        } else if let Some(value) = extract_header_value(line, "USN:") {
            usn = Some(value);
        } else if let Some(value) = extract_header_value(line, "SERVER:") {
            server = Some(value);
        }
    }

    Some(SsdpResponse {
        location: location?,
        st: st?,
        usn: usn?,
        server,
    })
}

fn extract_header_value(line: &str, header: &str) -> Option<String> {
    let prefix = line.get(..header.len())?;
    if line.len() > header.len() && prefix.eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}
