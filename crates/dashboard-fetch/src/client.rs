//! API client: resolves addresses, attaches auth, classifies failures.

use std::sync::Arc;

use dashboard_core::{DashboardConfig, Notification, Notifier, SessionStore};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    FetchError,
    transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody},
};

/// Notice shown when the backend rejects the token.
pub const AUTH_EXPIRED_MESSAGE: &str = "Invalid or expired token. Please login again.";

/// Notice shown for any other failed request.
pub const REQUEST_FAILED_MESSAGE: &str = "API request failed.";

/// Longest error body kept in `FetchError::Status`.
const MAX_ERROR_BODY: usize = 512;

struct Inner {
    config: DashboardConfig,
    session: SessionStore,
    transport: Arc<dyn HttpTransport>,
    notifier: Arc<dyn Notifier>,
}

/// Shared REST client.
///
/// Reads the token from the session store on every call, so callers never
/// pass it explicitly.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    #[must_use]
    pub fn new(
        config: DashboardConfig,
        session: SessionStore,
        transport: Arc<dyn HttpTransport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                session,
                transport,
                notifier,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Publish a notice through the configured notifier.
    pub fn notify(&self, notification: Notification) {
        self.inner.notifier.notify(notification);
    }

    /// Issue a JSON request and return the parsed body.
    ///
    /// # Errors
    /// Returns the classified failure; a 401 has already evicted the token.
    pub async fn request(
        &self,
        method: Method,
        address: &str,
        body: Option<Value>,
    ) -> Result<Value, FetchError> {
        let body = body.map_or(RequestBody::Empty, RequestBody::Json);
        self.send(method, address, body).await
    }

    /// Issue a JSON request and decode the body into `T`.
    ///
    /// # Errors
    /// Returns the classified failure, or `Decode` if the body does not fit `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        address: &str,
        body: Option<Value>,
    ) -> Result<T, FetchError> {
        let value = self.request(method, address, body).await?;
        serde_json::from_value(value)
            .map_err(|e| self.fail(FetchError::Decode(e.to_string()), None))
    }

    /// Issue a request with an arbitrary body.
    ///
    /// # Errors
    /// Returns the classified failure.
    pub async fn send(
        &self,
        method: Method,
        address: &str,
        body: RequestBody,
    ) -> Result<Value, FetchError> {
        let url = self.inner.config.resolve_url(address);

        let mut headers = Vec::with_capacity(2);
        if !body.is_multipart() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        let token = self.inner.session.token();
        if let Some(token) = &token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        tracing::debug!(%method, %url, "request");
        let request = HttpRequest {
            method,
            url,
            headers,
            body,
        };

        let response = match self.inner.transport.send(request).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(FetchError::Network(e.to_string()), token.as_deref())),
        };

        parse_response(&response).map_err(|e| self.fail(e, token.as_deref()))
    }

    /// Apply the failure policy and hand the error back.
    ///
    /// `sent_token` is the token the failed request carried; only that token
    /// is evicted.
    fn fail(&self, error: FetchError, sent_token: Option<&str>) -> FetchError {
        if error.is_auth_failure() {
            tracing::warn!("Authentication failure: {error}");
            if let Some(token) = sent_token {
                self.inner.session.evict_token_if(token);
            }
            self.notify(Notification::warning(AUTH_EXPIRED_MESSAGE));
        } else {
            tracing::warn!("Request failed: {error}");
            self.notify(Notification::error(REQUEST_FAILED_MESSAGE));
        }
        error
    }
}

fn parse_response(response: &HttpResponse) -> Result<Value, FetchError> {
    if response.status == 401 {
        return Err(FetchError::Unauthorized);
    }
    if !response.is_success() {
        let mut message = String::from_utf8_lossy(&response.body).into_owned();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        return Err(FetchError::Status {
            status: response.status,
            message,
        });
    }
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&response.body).map_err(|e| FetchError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dashboard_core::{Level, NotificationCenter};
    use serde_json::json;

    use super::*;
    use crate::mock::{MockReply, MockTransport};

    fn setup() -> (ApiClient, Arc<MockTransport>, Arc<NotificationCenter>) {
        let transport = Arc::new(MockTransport::new());
        let notices = Arc::new(NotificationCenter::default());
        let config = DashboardConfig {
            api_base_url: "http://api.test".to_string(),
            ..DashboardConfig::default()
        };
        let client = ApiClient::new(
            config,
            SessionStore::in_memory(),
            transport.clone(),
            notices.clone(),
        );
        (client, transport, notices)
    }

    #[tokio::test]
    async fn test_attaches_headers() {
        let (client, transport, _) = setup();
        client.session().login("tok", None).unwrap();
        transport.push(MockReply::json(200, &json!({"ok": true})));

        let body = client
            .request(Method::Post, "/api/department/create", Some(json!({"department_name": "Ops"})))
            .await
            .unwrap();
        assert_eq!(body, json!({"ok": true}));

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "http://api.test/api/department/create");
        assert_eq!(sent.header("authorization"), Some("Bearer tok"));
        assert_eq!(sent.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_no_auth_header_without_token() {
        let (client, transport, _) = setup();
        client.request(Method::Get, "/api/profile", None).await.unwrap();
        assert_eq!(transport.requests()[0].header("Authorization"), None);
    }

    #[tokio::test]
    async fn test_401_evicts_token_whatever_the_body() {
        let (client, transport, notices) = setup();
        client.session().login("tok", None).unwrap();
        transport.push(MockReply::raw(401, "<html>nope</html>"));

        let err = client.request(Method::Get, "/api/profile", None).await.unwrap_err();
        assert_eq!(err, FetchError::Unauthorized);
        assert!(client.session().token().is_none());

        let history = notices.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].level, Level::Warning);
        assert_eq!(history[0].message, AUTH_EXPIRED_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_401_keeps_newer_token() {
        let (client, transport, notices) = setup();
        client.session().login("old", None).unwrap();
        transport.push(MockReply::raw(401, "").delayed(Duration::from_millis(100)));

        let pending = tokio::spawn({
            let client = client.clone();
            async move { client.request(Method::Get, "/api/profile", None).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.session().login("fresh", None).unwrap();

        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err, FetchError::Unauthorized);
        assert_eq!(client.session().token().as_deref(), Some("fresh"));
        assert_eq!(notices.get_history()[0].message, AUTH_EXPIRED_MESSAGE);
    }

    #[tokio::test]
    async fn test_network_error_mentioning_401_keeps_token() {
        let (client, transport, notices) = setup();
        client.session().login("tok", None).unwrap();
        transport.push(MockReply::network_error(
            "error sending request for url (http://api.test/api/profile/promotion/401)",
        ));

        let err = client
            .request(Method::Put, "/api/profile/promotion/401", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
        assert_eq!(client.session().token().as_deref(), Some("tok"));
        assert_eq!(notices.get_history()[0].message, REQUEST_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_other_failures_keep_token() {
        let (client, transport, notices) = setup();
        client.session().login("tok", None).unwrap();
        transport.push(MockReply::raw(500, "boom"));
        transport.push(MockReply::network_error("connection refused"));

        let err = client.request(Method::Get, "/a", None).await.unwrap_err();
        assert_eq!(err, FetchError::Status { status: 500, message: "boom".to_string() });
        let err = client.request(Method::Get, "/a", None).await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));

        assert_eq!(client.session().token().as_deref(), Some("tok"));
        assert!(notices.get_history().iter().all(|n| n.message == REQUEST_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn test_empty_and_malformed_bodies() {
        let (client, transport, _) = setup();
        transport.push(MockReply::raw(204, ""));
        transport.push(MockReply::raw(200, "{not json"));

        assert_eq!(client.request(Method::Delete, "/x", None).await.unwrap(), Value::Null);
        let err = client.request(Method::Get, "/x", None).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
