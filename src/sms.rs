//! Declarative SMS gateway requests.
//!
//! Gateways differ wildly, so the request shape lives in configuration:
//! method, path, query, headers and body are all templates. This module
//! renders them into a concrete [`GatewayRequest`] for one message, which
//! keeps every gateway quirk testable without a network. The actual send
//! lives in the `http` module behind the `http` feature.

use serde_json::Value;

use crate::config::GatewayConfig;
use crate::error::{MonitorError, Result};
use crate::template::render_value;

/// Body payload of a gateway request, encoded per `bodyFormat`.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayBody {
    /// Pre-encoded body text (JSON or plain text)
    Raw(String),
    /// Form fields, percent-encoded by the HTTP client at send time
    Form(Vec<(String, String)>),
}

/// A fully rendered gateway request, ready for an HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayRequest {
    /// Uppercased HTTP method
    pub method: String,
    /// Base URL joined with the configured path; may already carry a query
    /// string when the path does
    pub url: String,
    /// Rendered query parameters. Keys already present in `url` are meant
    /// to be replaced, not duplicated.
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// `None` for GET requests
    pub body: Option<GatewayBody>,
}

/// Render the gateway request for one message.
///
/// Placeholders available everywhere: `{to}` and `{phone}` (the recipient),
/// `{message}`, `{authorization}` (the first configured credential),
/// `{token}` and `{apiKey}`. The configured path is joined verbatim, it is
/// not a template.
pub fn build_gateway_request(
    gateway: &GatewayConfig,
    to: &str,
    message: &str,
) -> Result<GatewayRequest> {
    if gateway.base_url.is_empty() {
        return Err(MonitorError::Gateway {
            message: "smsGateway.baseUrl is required".to_string(),
        });
    }

    let method = gateway.method.to_uppercase();
    let credential = gateway.credential().to_string();
    let vars = [
        ("to", to.to_string()),
        ("phone", to.to_string()),
        ("message", message.to_string()),
        ("authorization", credential.clone()),
        ("token", gateway.token.clone()),
        ("apiKey", gateway.api_key.clone()),
    ];

    let url = format!(
        "{}/{}",
        gateway.base_url.trim_end_matches('/'),
        gateway.path.trim_start_matches('/')
    );

    let query: Vec<(String, String)> = match render_value(&gateway.query, &vars) {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, value)| {
                let text = value_to_string(&value);
                if text.is_empty() {
                    None
                } else {
                    Some((key, text))
                }
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut headers: Vec<(String, String)> = match render_value(&gateway.headers, &vars) {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key, value_to_string(&value)))
            .collect(),
        _ => Vec::new(),
    };
    if headers.is_empty() && !credential.is_empty() {
        // No headers configured: the bare credential goes out verbatim
        headers.push(("Authorization".to_string(), credential));
    }

    let body = if method == "GET" {
        None
    } else {
        let default_body = serde_json::json!({"to": "{to}", "message": "{message}"});
        let rendered = render_value(gateway.body.as_ref().unwrap_or(&default_body), &vars);
        match gateway.body_format.to_lowercase().as_str() {
            "form" => {
                ensure_content_type(&mut headers, "application/x-www-form-urlencoded");
                let fields = match rendered {
                    Value::Object(map) => map
                        .into_iter()
                        .map(|(key, value)| (key, value_to_string(&value)))
                        .collect(),
                    _ => {
                        return Err(MonitorError::Gateway {
                            message: "form body must be an object".to_string(),
                        })
                    }
                };
                Some(GatewayBody::Form(fields))
            }
            "text" => {
                ensure_content_type(&mut headers, "text/plain");
                Some(GatewayBody::Raw(raw_body_text(&rendered)?))
            }
            _ => {
                ensure_content_type(&mut headers, "application/json");
                Some(GatewayBody::Raw(raw_body_text(&rendered)?))
            }
        }
    };

    Ok(GatewayRequest {
        method,
        url,
        query,
        headers,
        body,
    })
}

/// A string body passes through untouched; anything else is serialized as
/// JSON.
fn raw_body_text(rendered: &Value) -> Result<String> {
    match rendered {
        Value::String(text) => Ok(text.clone()),
        other => serde_json::to_string(other).map_err(|e| MonitorError::Gateway {
            message: e.to_string(),
        }),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn ensure_content_type(headers: &mut Vec<(String, String)>, value: &str) {
    let present = headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
    if !present {
        headers.push(("Content-Type".to_string(), value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateway() -> GatewayConfig {
        GatewayConfig {
            base_url: "https://sms.example".to_string(),
            ..GatewayConfig::default()
        }
    }

    fn header<'a>(request: &'a GatewayRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_default_request_is_json_post() {
        let mut config = gateway();
        config.token = "tok".to_string();

        let request = build_gateway_request(&config, "+46700000001", "hello").unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://sms.example/");
        assert_eq!(header(&request, "authorization"), Some("tok"));
        assert_eq!(header(&request, "content-type"), Some("application/json"));

        let Some(GatewayBody::Raw(body)) = &request.body else {
            panic!("expected a raw body");
        };
        let parsed: Value = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed,
            json!({"to": "+46700000001", "message": "hello"})
        );
    }

    #[test]
    fn test_base_url_and_path_join_with_single_slash() {
        let mut config = gateway();
        config.base_url = "https://sms.example/api/".to_string();
        config.path = "/v1/send".to_string();
        let request = build_gateway_request(&config, "1", "m").unwrap();
        assert_eq!(request.url, "https://sms.example/api/v1/send");
    }

    #[test]
    fn test_get_request_renders_query_and_skips_body() {
        let mut config = gateway();
        config.method = "get".to_string();
        config.path = "send".to_string();
        config.api_key = "k123".to_string();
        config.query = json!({
            "to": "{to}",
            "text": "{message}",
            "key": "{apiKey}",
            "silent": "{authorization}"
        });
        // apiKey is the only credential, so {authorization} renders to it
        config.authorization = String::new();

        let request = build_gateway_request(&config, "+46700000001", "hi there").unwrap();
        assert_eq!(request.method, "GET");
        assert!(request.body.is_none());
        assert!(request
            .query
            .contains(&("to".to_string(), "+46700000001".to_string())));
        assert!(request
            .query
            .contains(&("text".to_string(), "hi there".to_string())));
        assert!(request
            .query
            .contains(&("key".to_string(), "k123".to_string())));
    }

    #[test]
    fn test_query_params_rendering_empty_are_dropped() {
        let mut config = gateway();
        config.method = "GET".to_string();
        config.query = json!({"auth": "{authorization}", "fixed": "x"});

        // No credential configured: {authorization} renders empty
        let request = build_gateway_request(&config, "1", "m").unwrap();
        assert_eq!(request.query, vec![("fixed".to_string(), "x".to_string())]);
    }

    #[test]
    fn test_credential_fallback_is_verbatim() {
        // Only a token: it is NOT wrapped in a Bearer scheme
        let mut config = gateway();
        config.token = "plain-token".to_string();
        let request = build_gateway_request(&config, "1", "m").unwrap();
        assert_eq!(header(&request, "authorization"), Some("plain-token"));

        // An explicit authorization value wins over token and apiKey
        let mut config = gateway();
        config.authorization = "Bearer abc".to_string();
        config.token = "ignored".to_string();
        let request = build_gateway_request(&config, "1", "m").unwrap();
        assert_eq!(header(&request, "authorization"), Some("Bearer abc"));
    }

    #[test]
    fn test_configured_headers_suppress_fallback() {
        let mut config = gateway();
        config.api_key = "k".to_string();
        config.headers = json!({"X-Api-Key": "{apiKey}"});

        let request = build_gateway_request(&config, "1", "m").unwrap();
        assert_eq!(header(&request, "x-api-key"), Some("k"));
        assert_eq!(header(&request, "authorization"), None);
    }

    #[test]
    fn test_form_body_stringifies_fields() {
        let mut config = gateway();
        config.body_format = "form".to_string();
        config.body = Some(json!({"To": "{to}", "Text": "{message}", "Limit": 160}));

        let request = build_gateway_request(&config, "+4670", "hej").unwrap();
        assert_eq!(
            header(&request, "content-type"),
            Some("application/x-www-form-urlencoded")
        );
        let Some(GatewayBody::Form(fields)) = &request.body else {
            panic!("expected form fields");
        };
        assert!(fields.contains(&("To".to_string(), "+4670".to_string())));
        assert!(fields.contains(&("Text".to_string(), "hej".to_string())));
        assert!(fields.contains(&("Limit".to_string(), "160".to_string())));
    }

    #[test]
    fn test_form_body_must_be_an_object() {
        let mut config = gateway();
        config.body_format = "form".to_string();
        config.body = Some(json!("to={to}"));
        assert!(matches!(
            build_gateway_request(&config, "1", "m"),
            Err(MonitorError::Gateway { .. })
        ));
    }

    #[test]
    fn test_text_body_passes_string_through() {
        let mut config = gateway();
        config.body_format = "text".to_string();
        config.body = Some(json!("TO={to};MSG={message}"));

        let request = build_gateway_request(&config, "+4670", "hej").unwrap();
        assert_eq!(header(&request, "content-type"), Some("text/plain"));
        assert_eq!(
            request.body,
            Some(GatewayBody::Raw("TO=+4670;MSG=hej".to_string()))
        );
    }

    #[test]
    fn test_configured_content_type_is_kept() {
        let mut config = gateway();
        config.headers = json!({"content-type": "application/xml", "Authorization": "x"});
        config.body = Some(json!("<sms/>"));

        let request = build_gateway_request(&config, "1", "m").unwrap();
        let content_types = request
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .count();
        assert_eq!(content_types, 1);
        assert_eq!(header(&request, "content-type"), Some("application/xml"));
    }

    #[test]
    fn test_missing_base_url_is_an_error() {
        let config = GatewayConfig::default();
        let err = build_gateway_request(&config, "1", "m").unwrap_err();
        assert!(err.to_string().contains("baseUrl"));
    }

    #[test]
    fn test_method_is_uppercased() {
        let mut config = gateway();
        config.method = "put".to_string();
        let request = build_gateway_request(&config, "1", "m").unwrap();
        assert_eq!(request.method, "PUT");
    }
}
