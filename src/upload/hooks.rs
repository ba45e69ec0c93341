use reqwest::header::HeaderMap;
use tracing::debug;

use super::transport::PendingRequest;
use super::types::SelectedFile;

/// What a hook gets to see: the file being uploaded and its outgoing request.
pub struct RequestContext<'a> {
    pub id: &'a str,
    pub file: &'a SelectedFile,
    pub request: &'a mut PendingRequest,
}

/// Extension points invoked right before a request leaves.
///
/// Both methods default to doing nothing, so implementors only override the
/// one they need.
pub trait UploadHooks: Send + Sync {
    /// Called before the blob metadata request to the application backend.
    fn before_blob_request(&self, _ctx: RequestContext<'_>) {}

    /// Called before the direct transfer request to the storage service.
    fn before_storage_request(&self, _ctx: RequestContext<'_>) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl UploadHooks for NoHooks {}

/// Which requests a [`HeaderInjector`] decorates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookScope {
    #[default]
    BlobRequests,
    StorageRequests,
    Both,
}

/// Adds a fixed set of headers, e.g. a non-default `Authorization`.
#[derive(Debug, Clone, Default)]
pub struct HeaderInjector {
    headers: HeaderMap,
    scope: HookScope,
}

impl HeaderInjector {
    pub fn new(headers: HeaderMap, scope: HookScope) -> Self {
        Self { headers, scope }
    }

    fn inject(&self, ctx: RequestContext<'_>) {
        // Injected names replace what the request carried. Repeated names
        // (e.g. two Cookie lines) are all sent.
        for name in self.headers.keys() {
            ctx.request.headers.remove(name);
        }
        for (name, value) in &self.headers {
            ctx.request.headers.append(name.clone(), value.clone());
        }
        debug!(id = ctx.id, headers = self.headers.len(), "injected headers");
    }
}

impl UploadHooks for HeaderInjector {
    fn before_blob_request(&self, ctx: RequestContext<'_>) {
        if matches!(self.scope, HookScope::BlobRequests | HookScope::Both) {
            self.inject(ctx);
        }
    }

    fn before_storage_request(&self, ctx: RequestContext<'_>) {
        if matches!(self.scope, HookScope::StorageRequests | HookScope::Both) {
            self.inject(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::header_parser::parse_header_lines;
    use reqwest::header::{HeaderValue, AUTHORIZATION, COOKIE};
    use reqwest::{Method, Url};

    fn request() -> PendingRequest {
        PendingRequest::new(Method::POST, Url::parse("https://app.test/blobs").unwrap())
    }

    #[test]
    fn injector_respects_scope() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        let injector = HeaderInjector::new(headers, HookScope::BlobRequests);
        let file = SelectedFile::new("a.txt", "text/plain", "a");

        let mut blob = request();
        injector.before_blob_request(RequestContext {
            id: "1",
            file: &file,
            request: &mut blob,
        });
        assert_eq!(blob.headers[AUTHORIZATION], "Bearer t");

        let mut storage = request();
        injector.before_storage_request(RequestContext {
            id: "1",
            file: &file,
            request: &mut storage,
        });
        assert!(storage.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn repeated_header_lines_are_all_sent() {
        let headers = parse_header_lines("Cookie: a=1\nCookie: b=2\nAuthorization: Bearer new");
        let injector = HeaderInjector::new(headers, HookScope::Both);
        let file = SelectedFile::new("a.txt", "text/plain", "a");

        let mut blob = request();
        blob.headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer old"));
        blob.headers.insert(COOKIE, HeaderValue::from_static("stale=1"));
        injector.before_blob_request(RequestContext {
            id: "1",
            file: &file,
            request: &mut blob,
        });

        let cookies: Vec<_> = blob.headers.get_all(COOKIE).iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        let auth: Vec<_> = blob.headers.get_all(AUTHORIZATION).iter().collect();
        assert_eq!(auth, ["Bearer new"]);
    }
}
