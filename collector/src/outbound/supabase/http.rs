//! Shared HTTP plumbing for the Supabase adapters.
//!
//! Owns the reqwest client, endpoint URLs and the translation of transport
//! and status failures into a small classification each port maps into its
//! own error type.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use tracing::debug;

use super::SupabaseEndpoint;
use super::dto::ErrorBodyDto;

const PREVIEW_CHAR_LIMIT: usize = 160;

/// Coarse failure category shared by every Supabase call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FailureKind {
    Unauthorized,
    NotFound,
    Conflict,
    Rejected,
    Timeout,
    Transport,
    Decode,
}

/// A failed Supabase call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct HttpFailure {
    pub(super) kind: FailureKind,
    pub(super) message: String,
}

impl HttpFailure {
    pub(super) fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Decode,
            message: message.into(),
        }
    }

    pub(super) fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unauthorized,
            message: message.into(),
        }
    }
}

/// Client bound to one Supabase project.
#[derive(Debug, Clone)]
pub(super) struct SupabaseHttp {
    client: Client,
    base_url: Url,
    anon_key: String,
}

impl SupabaseHttp {
    pub(super) fn new(endpoint: &SupabaseEndpoint) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(endpoint.timeout.max(Duration::from_secs(1)))
            .build()?;
        Ok(Self {
            client,
            base_url: with_trailing_slash(endpoint.base_url.clone()),
            anon_key: endpoint.anon_key.clone(),
        })
    }

    /// `<base>/auth/v1/<path>`.
    pub(super) fn auth_url(&self, path: &str) -> Result<Url, HttpFailure> {
        self.join(&format!("auth/v1/{path}"))
    }

    /// `<base>/rest/v1/<table>`.
    pub(super) fn rest_url(&self, table: &str) -> Result<Url, HttpFailure> {
        self.join(&format!("rest/v1/{table}"))
    }

    fn join(&self, path: &str) -> Result<Url, HttpFailure> {
        self.base_url.join(path).map_err(|error| HttpFailure {
            kind: FailureKind::Rejected,
            message: format!("invalid endpoint path {path}: {error}"),
        })
    }

    /// Request carrying the project key and, when given, a user token.
    pub(super) fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let token = bearer.unwrap_or(self.anon_key.as_str());
        self.client
            .request(method, url)
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Send `request` and return the body of a successful response.
    pub(super) async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, HttpFailure> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            debug!(status = status.as_u16(), "supabase request failed");
            return Err(map_status_error(status, body.as_ref()));
        }
        Ok(body.to_vec())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn map_transport_error(error: reqwest::Error) -> HttpFailure {
    let kind = if error.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Transport
    };
    HttpFailure {
        kind,
        message: error.to_string(),
    }
}

pub(super) fn map_status_error(status: StatusCode, body: &[u8]) -> HttpFailure {
    let message = ErrorBodyDto::message(body).unwrap_or_else(|| {
        let preview = body_preview(body);
        if preview.is_empty() {
            format!("status {}", status.as_u16())
        } else {
            format!("status {}: {preview}", status.as_u16())
        }
    });

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Unauthorized,
        StatusCode::NOT_FOUND => FailureKind::NotFound,
        StatusCode::CONFLICT => FailureKind::Conflict,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => FailureKind::Timeout,
        _ if status.is_client_error() => FailureKind::Rejected,
        _ => FailureKind::Transport,
    };
    HttpFailure { kind, message }
}

fn body_preview(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for non-network HTTP helpers.

    use super::*;
    use rstest::rstest;

    fn endpoint(base: &str) -> SupabaseEndpoint {
        SupabaseEndpoint::new(Url::parse(base).expect("valid url"), "anon")
    }

    #[rstest]
    #[case("https://demo.supabase.co")]
    #[case("https://demo.supabase.co/")]
    fn builds_service_urls_regardless_of_trailing_slash(#[case] base: &str) {
        let http = SupabaseHttp::new(&endpoint(base)).expect("client");
        assert_eq!(
            http.auth_url("token").expect("auth url").as_str(),
            "https://demo.supabase.co/auth/v1/token"
        );
        assert_eq!(
            http.rest_url("lists").expect("rest url").as_str(),
            "https://demo.supabase.co/rest/v1/lists"
        );
    }

    #[rstest]
    fn keeps_path_prefix_of_self_hosted_base() {
        let http = SupabaseHttp::new(&endpoint("http://localhost:8000/supabase")).expect("client");
        assert_eq!(
            http.rest_url("items").expect("rest url").as_str(),
            "http://localhost:8000/supabase/rest/v1/items"
        );
    }

    #[rstest]
    #[case::unauthorized(StatusCode::UNAUTHORIZED, FailureKind::Unauthorized)]
    #[case::forbidden(StatusCode::FORBIDDEN, FailureKind::Unauthorized)]
    #[case::not_found(StatusCode::NOT_FOUND, FailureKind::NotFound)]
    #[case::conflict(StatusCode::CONFLICT, FailureKind::Conflict)]
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT, FailureKind::Timeout)]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, FailureKind::Timeout)]
    #[case::bad_request(StatusCode::BAD_REQUEST, FailureKind::Rejected)]
    #[case::unprocessable(StatusCode::UNPROCESSABLE_ENTITY, FailureKind::Rejected)]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR, FailureKind::Transport)]
    #[case::bad_gateway(StatusCode::BAD_GATEWAY, FailureKind::Transport)]
    fn maps_http_statuses_to_failure_kinds(#[case] status: StatusCode, #[case] kind: FailureKind) {
        assert_eq!(map_status_error(status, b"").kind, kind);
    }

    #[rstest]
    fn status_message_prefers_body_message() {
        let failure = map_status_error(
            StatusCode::BAD_REQUEST,
            br#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(failure.message, "Invalid login credentials");
    }

    #[rstest]
    fn status_message_previews_unstructured_body() {
        let body = format!("<html>{}</html>", "x".repeat(400));
        let failure = map_status_error(StatusCode::BAD_GATEWAY, body.as_bytes());
        assert!(failure.message.starts_with("status 502: <html>"));
        assert!(failure.message.ends_with("..."));
    }

    #[rstest]
    fn empty_body_reports_status_code() {
        let failure = map_status_error(StatusCode::SERVICE_UNAVAILABLE, b"");
        assert_eq!(failure.message, "status 503");
    }
}
