//! Yamaha Extended Control (YXC) HTTP driver
//!
//! Talks to `http://<receiver>/YamahaExtendedControl/v1/...`. Every YXC reply
//! carries a `response_code`; anything other than 0 is treated as a failure.
//! The main zone is the only zone the bridge controls.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::{
    ssdp, DeviceInfo, DriverError, DriverFactory, Features, Power, ReceiverDriver,
    ReceiverStatus,
};
use crate::config::ReceiverConfig;

const API_ROOT: &str = "YamahaExtendedControl/v1";
const ZONE: &str = "main";

/// Minimal envelope every YXC response carries
#[derive(Debug, Deserialize)]
struct Envelope {
    response_code: i64,
}

/// YXC receiver driver
pub struct YxcDriver {
    http: reqwest::Client,
    /// Address from settings (None = use SSDP)
    configured: Option<String>,
    /// Address resolved by `discover()`
    address: RwLock<Option<String>>,
    discovery_timeout: Duration,
}

impl YxcDriver {
    /// Create a driver with its own HTTP client
    pub fn new(receiver_url: &str, config: &ReceiverConfig) -> Result<Self, DriverError> {
        let http = build_http_client(config)?;
        Ok(Self::with_client(http, receiver_url, config.discovery_timeout()))
    }

    /// Create a driver sharing an existing HTTP client
    pub fn with_client(http: reqwest::Client, receiver_url: &str, discovery_timeout: Duration) -> Self {
        let receiver_url = receiver_url.trim();
        let configured = (!receiver_url.is_empty()).then(|| receiver_url.to_string());

        Self {
            http,
            configured,
            address: RwLock::new(None),
            discovery_timeout,
        }
    }

    /// Driver factory sharing one connection pool across rebinds
    pub fn factory(config: &ReceiverConfig) -> Result<DriverFactory, DriverError> {
        let http = build_http_client(config)?;
        let discovery_timeout = config.discovery_timeout();

        Ok(Arc::new(move |receiver_url: &str| {
            Arc::new(YxcDriver::with_client(http.clone(), receiver_url, discovery_timeout))
                as Arc<dyn ReceiverDriver>
        }))
    }

    /// Address resolved by the last successful discovery
    pub fn address(&self) -> Option<String> {
        self.address.read().clone()
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<String, DriverError> {
        let address = self.address().ok_or(DriverError::NotDiscovered)?;
        Ok(format!("http://{}/{}/{}", address, API_ROOT, endpoint))
    }

    /// Issue a GET and decode the body once `response_code` is verified
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, DriverError> {
        let url = self.endpoint_url(endpoint)?;
        trace!("YXC → GET {} {:?}", url, query);

        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::HttpStatus {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let envelope: Envelope = serde_json::from_str(&body)?;
        if envelope.response_code != 0 {
            return Err(DriverError::Rejected {
                endpoint: endpoint.to_string(),
                code: envelope.response_code,
            });
        }

        trace!("YXC ← {} {}", endpoint, body);
        Ok(serde_json::from_str(&body)?)
    }

    async fn command(&self, endpoint: &str, query: &[(&str, String)]) -> Result<(), DriverError> {
        self.call::<Envelope>(endpoint, query).await.map(|_| ())
    }
}

fn build_http_client(config: &ReceiverConfig) -> Result<reqwest::Client, DriverError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!("yxc-gw/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(DriverError::Http)
}

#[async_trait]
impl ReceiverDriver for YxcDriver {
    async fn discover(&self) -> Result<String, DriverError> {
        match &self.configured {
            Some(address) => {
                // Configured address: probe it instead of searching
                *self.address.write() = Some(address.clone());
                self.command("system/getDeviceInfo", &[]).await?;
                debug!("YXC receiver answered at configured address {}", address);
                Ok(address.clone())
            }
            None => {
                let address = ssdp::discover_receiver(self.discovery_timeout).await?;
                *self.address.write() = Some(address.clone());
                Ok(address)
            }
        }
    }

    async fn get_status(&self) -> Result<ReceiverStatus, DriverError> {
        self.call(&format!("{}/getStatus", ZONE), &[]).await
    }

    async fn get_device_info(&self) -> Result<DeviceInfo, DriverError> {
        self.call("system/getDeviceInfo", &[]).await
    }

    async fn get_features(&self) -> Result<Features, DriverError> {
        self.call("system/getFeatures", &[]).await
    }

    async fn set_volume_to(&self, volume: u16) -> Result<(), DriverError> {
        self.command(&format!("{}/setVolume", ZONE), &[("volume", volume.to_string())])
            .await
    }

    async fn mute(&self, muted: bool) -> Result<(), DriverError> {
        self.command(&format!("{}/setMute", ZONE), &[("enable", muted.to_string())])
            .await
    }

    async fn power(&self, power: Power) -> Result<(), DriverError> {
        self.command(
            &format!("{}/setPower", ZONE),
            &[("power", power.as_str().to_string())],
        )
        .await
    }

    async fn set_input(&self, input: &str) -> Result<(), DriverError> {
        self.command(&format!("{}/setInput", ZONE), &[("input", input.to_string())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn driver_for(server: &Server) -> YxcDriver {
        YxcDriver::new(&server.host_with_port(), &ReceiverConfig::default()).unwrap()
    }

    fn path(endpoint: &str) -> String {
        format!("/{}/{}", API_ROOT, endpoint)
    }

    async fn discovered_driver(server: &mut Server) -> YxcDriver {
        let probe = server
            .mock("GET", path("system/getDeviceInfo").as_str())
            .with_status(200)
            .with_body(r#"{"response_code":0,"model_name":"RX-A880"}"#)
            .create_async()
            .await;

        let driver = driver_for(server);
        driver.discover().await.unwrap();
        probe.remove_async().await;
        driver
    }

    #[tokio::test]
    async fn test_discover_probes_configured_address() {
        let mut server = Server::new_async().await;
        let probe = server
            .mock("GET", path("system/getDeviceInfo").as_str())
            .with_status(200)
            .with_body(r#"{"response_code":0,"model_name":"RX-A880"}"#)
            .create_async()
            .await;

        let driver = driver_for(&server);
        let address = driver.discover().await.unwrap();

        assert_eq!(address, server.host_with_port());
        assert_eq!(driver.address(), Some(server.host_with_port()));
        probe.assert_async().await;
    }

    #[tokio::test]
    async fn test_discover_fails_when_receiver_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", path("system/getDeviceInfo").as_str())
            .with_status(503)
            .create_async()
            .await;

        let driver = driver_for(&server);
        let result = driver.discover().await;

        assert!(
            matches!(result, Err(DriverError::HttpStatus { status: 503, .. })),
            "expected HttpStatus error, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_calls_before_discovery_fail() {
        let server = Server::new_async().await;
        let driver = driver_for(&server);

        let result = driver.get_status().await;
        assert!(matches!(result, Err(DriverError::NotDiscovered)));
    }

    #[tokio::test]
    async fn test_get_status() {
        let mut server = Server::new_async().await;
        let driver = discovered_driver(&mut server).await;

        server
            .mock("GET", path("main/getStatus").as_str())
            .with_status(200)
            .with_body(r#"{"response_code":0,"power":"on","volume":10,"mute":true,"input":"coaxial"}"#)
            .create_async()
            .await;

        let status = driver.get_status().await.unwrap();
        assert!(status.is_powered_on());
        assert_eq!(status.volume, 10);
        assert!(status.mute);
    }

    #[tokio::test]
    async fn test_nonzero_response_code_is_rejected() {
        let mut server = Server::new_async().await;
        let driver = discovered_driver(&mut server).await;

        server
            .mock("GET", path("main/setInput").as_str())
            .match_query(Matcher::UrlEncoded("input".into(), "bogus".into()))
            .with_status(200)
            .with_body(r#"{"response_code":3}"#)
            .create_async()
            .await;

        let result = driver.set_input("bogus").await;
        assert!(
            matches!(result, Err(DriverError::Rejected { code: 3, .. })),
            "expected Rejected error, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_write_commands_use_main_zone_queries() {
        let mut server = Server::new_async().await;
        let driver = discovered_driver(&mut server).await;

        let volume = server
            .mock("GET", path("main/setVolume").as_str())
            .match_query(Matcher::UrlEncoded("volume".into(), "20".into()))
            .with_body(r#"{"response_code":0}"#)
            .create_async()
            .await;
        let mute = server
            .mock("GET", path("main/setMute").as_str())
            .match_query(Matcher::UrlEncoded("enable".into(), "true".into()))
            .with_body(r#"{"response_code":0}"#)
            .create_async()
            .await;
        let power = server
            .mock("GET", path("main/setPower").as_str())
            .match_query(Matcher::UrlEncoded("power".into(), "standby".into()))
            .with_body(r#"{"response_code":0}"#)
            .create_async()
            .await;

        driver.set_volume_to(20).await.unwrap();
        driver.mute(true).await.unwrap();
        driver.power(Power::Standby).await.unwrap();

        volume.assert_async().await;
        mute.assert_async().await;
        power.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_features_and_device_info() {
        let mut server = Server::new_async().await;
        let driver = discovered_driver(&mut server).await;

        server
            .mock("GET", path("system/getDeviceInfo").as_str())
            .with_body(r#"{"response_code":0,"model_name":"RX-V481","device_id":"00A0DE000000","api_version":2.05}"#)
            .create_async()
            .await;
        server
            .mock("GET", path("system/getFeatures").as_str())
            .with_body(r#"{"response_code":0,"system":{"input_list":[{"id":"tuner"},{"id":"hdmi1"}]}}"#)
            .create_async()
            .await;

        let info = driver.get_device_info().await.unwrap();
        assert_eq!(info.model_name, "RX-V481");

        let features = driver.get_features().await.unwrap();
        assert_eq!(features.input_ids(), vec!["tuner", "hdmi1"]);
    }

    #[tokio::test]
    async fn test_factory_builds_independent_drivers() {
        let factory = YxcDriver::factory(&ReceiverConfig::default()).unwrap();
        let first = factory("10.0.0.5");
        let second = factory("");

        // Neither has discovered anything yet
        assert!(matches!(first.get_status().await, Err(DriverError::NotDiscovered)));
        assert!(matches!(second.get_status().await, Err(DriverError::NotDiscovered)));
    }
}
