use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::transport::{HttpTransport, PendingRequest};
use super::types::SignedIdSet;
use crate::config::{Endpoint, HostConfig, SubmitOptions};
use crate::error::{FailureCause, TransportError, UploadError};

/// `{ model: { attribute: ids } }`, with the model lower-cased.
///
/// `multiple` alone picks an array over a bare id. An empty set yields
/// `null` in the bare form.
pub fn build_submission_body(endpoint: &Endpoint, ids: &SignedIdSet, multiple: bool) -> Value {
    let value = if multiple {
        json!(ids.as_slice())
    } else {
        ids.first().map_or(Value::Null, |id| Value::String(id.to_string()))
    };

    let mut attributes = Map::new();
    attributes.insert(endpoint.attribute.clone(), value);
    let mut body = Map::new();
    body.insert(endpoint.model.to_lowercase(), Value::Object(attributes));
    Value::Object(body)
}

/// Reports signed ids to the application endpoint.
#[derive(Clone)]
pub struct SubmissionClient {
    transport: Arc<dyn HttpTransport>,
    host: Arc<HostConfig>,
}

impl SubmissionClient {
    pub fn new(transport: Arc<dyn HttpTransport>, host: Arc<HostConfig>) -> Self {
        Self { transport, host }
    }

    pub async fn submit(
        &self,
        endpoint: &Endpoint,
        ids: &SignedIdSet,
        options: &SubmitOptions,
    ) -> Result<Value, UploadError> {
        let fail = UploadError::Submission;

        let method = endpoint.http_method().map_err(|e| fail(e.into()))?;
        let url = self.host.resolve(&endpoint.path).map_err(|e| fail(e.into()))?;

        let mut headers = self.host.json_headers();
        if let Some(token) = &options.token {
            let value = HeaderValue::from_str(token).map_err(|_| {
                fail(TransportError::InvalidRequest("token is not a valid header value".into()).into())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let body = build_submission_body(endpoint, ids, options.multiple);
        let request = PendingRequest::new(method, url)
            .with_headers(headers)
            .with_body(body.to_string());

        debug!(url = %request.url, files = ids.len(), "submitting signed ids");
        let response = self
            .transport
            .execute(request, None)
            .await
            .map_err(|e| fail(e.into()))?;

        if !response.is_success() {
            warn!(status = response.status().as_u16(), "submission rejected");
            return Err(fail(FailureCause::Rejected(response)));
        }
        if response.body().iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        response
            .json()
            .map_err(|e| fail(FailureCause::Malformed(format!("submission response: {e}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CSRF_HEADER;
    use crate::upload::test_support::{empty_response, json_response, MockTransport};
    use reqwest::header::{ACCEPT, CONTENT_TYPE};
    use reqwest::Method;

    fn ids(values: &[&str]) -> SignedIdSet {
        SignedIdSet::new(values.iter().map(|v| v.to_string()).collect())
    }

    fn client(transport: Arc<MockTransport>) -> SubmissionClient {
        let host = HostConfig::new("https://app.test").with_csrf_token("csrf-tok");
        SubmissionClient::new(transport, Arc::new(host))
    }

    #[test]
    fn single_id_is_bare_and_multiple_is_an_array() {
        let endpoint = Endpoint::new("/posts/1", "PATCH", "avatar", "Post");
        assert_eq!(
            build_submission_body(&endpoint, &ids(&["abc123"]), false),
            json!({"post": {"avatar": "abc123"}})
        );

        let endpoint = Endpoint::new("/albums", "POST", "photos", "PhotoAlbum");
        assert_eq!(
            build_submission_body(&endpoint, &ids(&["a", "b", "c"]), true),
            json!({"photoalbum": {"photos": ["a", "b", "c"]}})
        );
        assert_eq!(
            build_submission_body(&endpoint, &ids(&["a"]), true),
            json!({"photoalbum": {"photos": ["a"]}})
        );
    }

    #[tokio::test]
    async fn sends_body_and_headers_and_parses_reply() {
        let transport = Arc::new(MockTransport::new(|_| Ok(json_response(200, json!({"id": 1})))));
        let endpoint = Endpoint::new("/posts/1", "patch", "avatar", "Post");
        let options = SubmitOptions {
            multiple: false,
            token: Some("Bearer secret".into()),
        };

        let reply = client(transport.clone())
            .submit(&endpoint, &ids(&["abc123"]), &options)
            .await
            .unwrap();
        assert_eq!(reply, json!({"id": 1}));

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::PATCH);
        assert_eq!(sent.url.as_str(), "https://app.test/posts/1");
        assert_eq!(sent.headers[ACCEPT], "application/json");
        assert_eq!(sent.headers[CONTENT_TYPE], "application/json");
        assert_eq!(sent.headers[AUTHORIZATION], "Bearer secret");
        assert_eq!(sent.headers[CSRF_HEADER], "csrf-tok");
        let body: Value = serde_json::from_slice(&sent.body).unwrap();
        assert_eq!(body, json!({"post": {"avatar": "abc123"}}));
    }

    #[tokio::test]
    async fn no_token_means_no_authorization_header() {
        let transport = Arc::new(MockTransport::new(|_| Ok(empty_response(204))));
        let endpoint = Endpoint::new("/uploads", "POST", "files", "Upload");

        let reply = client(transport.clone())
            .submit(&endpoint, &ids(&["a"]), &SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(reply, Value::Null);
        assert!(transport.requests()[0].headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn rejection_carries_unparsed_response() {
        let transport = Arc::new(MockTransport::new(|_| {
            Ok(json_response(422, json!({"errors": ["avatar is invalid"]})))
        }));
        let endpoint = Endpoint::new("/posts/1", "PATCH", "avatar", "Post");

        let err = client(transport)
            .submit(&endpoint, &ids(&["abc123"]), &SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Submission(FailureCause::Rejected(_))));
        let response = err.response().unwrap();
        assert_eq!(response.status(), 422);
        assert!(response.text().contains("avatar is invalid"));
    }
}
