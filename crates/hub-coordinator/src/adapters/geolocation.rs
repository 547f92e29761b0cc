//! IP geolocation for new validator records.
//!
//! Lookups are best-effort: any failure yields `None` and the caller falls
//! back to `"Unknown"`.

use crate::ports::Geolocator;
use async_trait::async_trait;
use std::net::IpAddr;

/// Never resolves a location.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGeolocator;

#[async_trait]
impl Geolocator for NoopGeolocator {
    async fn locate(&self, _ip: &str) -> Option<String> {
        None
    }
}

/// Addresses worth sending to a public lookup service.
pub fn is_public_ip(ip: &str) -> bool {
    match ip.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        Ok(IpAddr::V6(v6)) => {
            let unique_local = (v6.segments()[0] & 0xfe00) == 0xfc00;
            let link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
        Err(_) => false,
    }
}

#[cfg(feature = "geolocation")]
pub use http::IpApiGeolocator;

#[cfg(feature = "geolocation")]
mod http {
    use super::is_public_ip;
    use crate::ports::Geolocator;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::time::Duration;
    use tracing::debug;

    /// Default lookup endpoint (ip-api.com JSON API).
    pub const DEFAULT_ENDPOINT: &str = "http://ip-api.com/json";

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct LookupResponse {
        status: String,
        #[serde(default)]
        city: Option<String>,
        #[serde(default)]
        country: Option<String>,
    }

    /// Looks up `<endpoint>/<ip>` and renders `"City, Country"`.
    #[derive(Debug, Clone)]
    pub struct IpApiGeolocator {
        client: reqwest::Client,
        endpoint: String,
    }

    impl IpApiGeolocator {
        pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
            let client = reqwest::Client::builder().timeout(timeout).build()?;
            Ok(Self {
                client,
                endpoint: endpoint.into().trim_end_matches('/').to_string(),
            })
        }
    }

    #[async_trait]
    impl Geolocator for IpApiGeolocator {
        async fn locate(&self, ip: &str) -> Option<String> {
            if !is_public_ip(ip) {
                return None;
            }

            let url = format!("{}/{}", self.endpoint, ip.trim());
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!(ip = ip, error = %e, "Geolocation request failed");
                    return None;
                }
            };

            let body: LookupResponse = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    debug!(ip = ip, error = %e, "Geolocation response unreadable");
                    return None;
                }
            };

            if body.status != "success" {
                return None;
            }

            match (body.city, body.country) {
                (Some(city), Some(country)) if !city.is_empty() => {
                    Some(format!("{}, {}", city, country))
                }
                (_, Some(country)) if !country.is_empty() => Some(country),
                _ => None,
            }
        }
    }
}
