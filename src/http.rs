//! HTTP clients for the position source and the SMS gateway.
//!
//! Both clients share the same 20 second timeout and surface failures as
//! [`MonitorError`] variants so the daemon can log a cycle and move on.
//! Request construction for the gateway is pure and lives in [`crate::sms`];
//! this module only performs the network calls.

use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::error::{MonitorError, Result};
use crate::positions::{Device, Position};
use crate::sms::{build_gateway_request, GatewayBody, GatewayRequest};

/// Shared timeout for position source and gateway calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Client for a Traccar-compatible position source.
///
/// Talks to the two read endpoints the monitor needs, `/api/devices` and
/// `/api/positions`, authenticating with a bearer token.
pub struct TraccarClient {
    client: Client,
    base_url: String,
    auth_header: String,
}

impl TraccarClient {
    /// Create a client for the given server. The token may be empty, in
    /// which case requests go out unauthenticated.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| MonitorError::HttpTransport {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let auth_header = if token.is_empty() {
            String::new()
        } else {
            format!("Bearer {}", token)
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    /// Fetch the device roster.
    pub async fn fetch_devices(&self) -> Result<Vec<Device>> {
        self.fetch_list("/api/devices").await
    }

    /// Fetch the latest known position per device.
    pub async fn fetch_positions(&self) -> Result<Vec<Position>> {
        self.fetch_list("/api/positions").await
    }

    async fn fetch_list<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[Traccar] GET {}", url);

        let mut request = self.client.get(&url);
        if !self.auth_header.is_empty() {
            request = request.header("Authorization", &self.auth_header);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MonitorError::HttpTransport {
                message: format!("{}: {}", url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::HttpStatus {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| MonitorError::HttpTransport {
                message: format!("{}: {}", url, e),
            })?;

        // A well-behaved server answers with an array; anything else is
        // treated as an empty roster rather than a fatal cycle.
        if !value.is_array() {
            return Ok(Vec::new());
        }
        serde_json::from_value(value).map_err(|e| MonitorError::HttpTransport {
            message: format!("{}: {}", url, e),
        })
    }
}

/// Deliver one SMS through the configured gateway.
pub async fn send_sms(gateway: &GatewayConfig, to: &str, message: &str) -> Result<()> {
    let request = build_gateway_request(gateway, to, message)?;
    dispatch_gateway_request(&request).await
}

/// Send an already-built gateway request and check the response status.
pub async fn dispatch_gateway_request(request: &GatewayRequest) -> Result<()> {
    let client = Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|e| MonitorError::Gateway {
            message: format!("Failed to create HTTP client: {}", e),
        })?;

    let method =
        Method::from_bytes(request.method.as_bytes()).map_err(|_| MonitorError::Gateway {
            message: format!("Invalid HTTP method: {}", request.method),
        })?;

    let mut url = Url::parse(&request.url).map_err(|e| MonitorError::Gateway {
        message: format!("{}: {}", request.url, e),
    })?;
    merge_query(&mut url, &request.query);
    debug!("[Gateway] {} {}", request.method, url);

    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| MonitorError::Gateway {
            message: format!("Invalid header name: {}", name),
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| MonitorError::Gateway {
            message: format!("Invalid value for header {}", name),
        })?;
        headers.insert(name, value);
    }

    let mut builder = client.request(method, url);
    builder = match &request.body {
        Some(GatewayBody::Raw(text)) => builder.body(text.clone()),
        Some(GatewayBody::Form(fields)) => builder.form(fields),
        None => builder,
    };
    // Configured headers go on last so they win over anything the body
    // encoding set, Content-Type included.
    let response = builder
        .headers(headers)
        .send()
        .await
        .map_err(|e| MonitorError::Gateway {
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MonitorError::GatewayStatus {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

/// Merge rendered query parameters into the URL. A configured parameter
/// replaces an existing one of the same name instead of duplicating it.
fn merge_query(url: &mut Url, params: &[(String, String)]) {
    if params.is_empty() {
        return;
    }
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !params.iter().any(|(new_name, _)| new_name == name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in kept.iter().chain(params.iter()) {
            pairs.append_pair(name, value);
        }
    }
}
