//! IPC protocol types and validation for the herald banner service.
//!
//! This crate is shared by the banner service and its clients to prevent
//! schema drift. Messages are newline-delimited JSON over a Unix socket, one
//! request per connection. A `subscribe_banners` request keeps the connection
//! open and the service writes one [`StreamMessage`] per line.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod banner;

pub use banner::{lenient_banners, Banner, BannerType};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_BANNER_ID_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetBanners,
    SubscribeBanners,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GetHealth => "get_health",
            Method::GetBanners => "get_banners",
            Method::SubscribeBanners => "subscribe_banners",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, id: Option<String>, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id,
            params,
        }
    }

    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.protocol_version != PROTOCOL_VERSION {
            return Err(ErrorInfo::new(
                "unsupported_protocol",
                format!(
                    "protocol_version {} is not supported (expected {})",
                    self.protocol_version, PROTOCOL_VERSION
                ),
            ));
        }
        if self.method == Method::GetBanners && self.params.is_none() {
            return Err(ErrorInfo::new(
                "missing_params",
                "get_banners requires params",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }
}

/// Snapshot of the client environment sent along with a one-shot fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientContext {
    pub client: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub endpoint: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClientContext {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.client.trim().is_empty() {
            return Err(ErrorInfo::new("missing_field", "client is required"));
        }
        if DateTime::parse_from_rfc3339(&self.timestamp).is_err() {
            return Err(ErrorInfo::new(
                "invalid_timestamp",
                "timestamp must be RFC3339",
            ));
        }
        Ok(())
    }
}

/// Params for `get_banners`: the client's local candidates plus its context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannersParams {
    #[serde(default, deserialize_with = "lenient_banners")]
    pub banners: Vec<Banner>,
    pub context: ClientContext,
}

impl BannersParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        self.context.validate()?;
        for banner in &self.banners {
            validate_banner_id(banner)?;
        }
        Ok(())
    }
}

/// `data` payload of a successful `get_banners` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BannersData {
    #[serde(default, deserialize_with = "lenient_banners")]
    pub banners: Vec<Banner>,
}

/// One line on a `subscribe_banners` connection: a full batch, or an error
/// notice from the service. A notice does not end the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamMessage {
    Error {
        error: String,
    },
    Banners {
        #[serde(default, deserialize_with = "lenient_banners")]
        banners: Vec<Banner>,
    },
}

pub fn validate_banner_id(banner: &Banner) -> Result<(), ErrorInfo> {
    match banner.id() {
        Some(id) if id.len() > MAX_BANNER_ID_LEN => Err(ErrorInfo::new(
            "invalid_banner_id",
            format!(
                "banner id must be {} characters or fewer",
                MAX_BANNER_ID_LEN
            ),
        )),
        _ => Ok(()),
    }
}

pub fn parse_banners_params(params: Value) -> Result<BannersParams, ErrorInfo> {
    let params: BannersParams = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("get_banners payload is invalid JSON: {}", err),
        )
    })?;
    params.validate()?;
    Ok(params)
}

pub fn parse_response(line: &[u8]) -> Result<Response, ErrorInfo> {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_response", "response was empty"));
    }
    serde_json::from_slice(line).map_err(|err| {
        ErrorInfo::new(
            "invalid_response",
            format!("failed to parse response JSON: {}", err),
        )
    })
}

pub fn parse_stream_message(line: &[u8]) -> Result<StreamMessage, ErrorInfo> {
    serde_json::from_slice(line).map_err(|err| {
        ErrorInfo::new(
            "malformed_message",
            format!("stream message is not a banner batch: {}", err),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ClientContext {
        ClientContext {
            client: "herald-cli/0.1.0".to_string(),
            hostname: "devbox".to_string(),
            platform: "linux".to_string(),
            endpoint: "/tmp/herald.sock".to_string(),
            timestamp: "2026-01-30T12:00:00Z".to_string(),
            extra: Map::new(),
        }
    }

    #[test]
    fn validates_request_version() {
        let mut request = Request::new(Method::GetHealth, None, None);
        assert!(request.validate().is_ok());
        request.protocol_version = 99;
        assert_eq!(request.validate().unwrap_err().code, "unsupported_protocol");
    }

    #[test]
    fn get_banners_requires_params() {
        let request = Request::new(Method::GetBanners, Some("r-1".to_string()), None);
        assert_eq!(request.validate().unwrap_err().code, "missing_params");
    }

    #[test]
    fn request_rejects_unknown_fields() {
        let raw = br#"{"protocol_version":1,"method":"get_health","extra":true}"#;
        assert!(serde_json::from_slice::<Request>(raw).is_err());
    }

    #[test]
    fn method_serializes_snake_case() {
        let value = serde_json::to_value(Method::SubscribeBanners).unwrap();
        assert_eq!(value, json!(Method::SubscribeBanners.as_str()));
    }

    #[test]
    fn parses_banner_batch() {
        let message = parse_stream_message(br#"{"banners":[{"id":"a","priority":3}]}"#).unwrap();
        match message {
            StreamMessage::Banners { banners } => {
                assert_eq!(banners.len(), 1);
                assert_eq!(banners[0].priority, 3.0);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn parses_error_notice() {
        let message = parse_stream_message(br#"{"error":"extension failed"}"#).unwrap();
        assert_eq!(
            message,
            StreamMessage::Error {
                error: "extension failed".to_string()
            }
        );
    }

    #[test]
    fn one_bad_banner_does_not_sink_the_batch() {
        let message =
            parse_stream_message(br#"{"banners":[{"id":"good"},{"id":"b","type":null},{"id":7}]}"#)
                .unwrap();
        match message {
            StreamMessage::Banners { banners } => {
                let ids: Vec<_> = banners.iter().filter_map(Banner::id).collect();
                assert_eq!(ids, vec!["good", "b"]);
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let data: BannersData =
            serde_json::from_value(json!({ "banners": [{ "id": "ok" }, { "priority": "high" }] }))
                .unwrap();
        assert_eq!(data.banners.len(), 1);
    }

    #[test]
    fn empty_object_is_an_empty_batch() {
        let message = parse_stream_message(b"{}").unwrap();
        assert_eq!(message, StreamMessage::Banners { banners: vec![] });
    }

    #[test]
    fn rejects_malformed_stream_message() {
        let err = parse_stream_message(b"data: {not json").unwrap_err();
        assert_eq!(err.code, "malformed_message");
        assert!(parse_stream_message(br#"{"banners":"nope"}"#).is_err());
    }

    #[test]
    fn rejects_empty_response() {
        assert_eq!(parse_response(b"  ").unwrap_err().code, "empty_response");
    }

    #[test]
    fn validates_banners_params() {
        let params = parse_banners_params(json!({
            "banners": [{ "id": "local-1" }],
            "context": context(),
        }))
        .unwrap();
        assert_eq!(params.banners.len(), 1);
    }

    #[test]
    fn rejects_bad_context_timestamp() {
        let mut ctx = context();
        ctx.timestamp = "yesterday".to_string();
        let err = parse_banners_params(json!({ "banners": [], "context": ctx })).unwrap_err();
        assert_eq!(err.code, "invalid_timestamp");
    }

    #[test]
    fn rejects_long_banner_id() {
        let params = BannersParams {
            banners: vec![Banner::new("a".repeat(256))],
            context: context(),
        };
        assert_eq!(params.validate().unwrap_err().code, "invalid_banner_id");
    }
}
