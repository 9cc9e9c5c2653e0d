//! The transport seam.

use async_trait::async_trait;
use bytes::Bytes;
use http_body::Body as HttpBody;

use crate::error::TransportError;

/// A request flowing through the cache.
///
/// Request bodies are buffered [`Bytes`]: the conditional-request and
/// unconditional-retry paths re-issue requests, which requires cheap
/// duplication of the payload.
pub type CacheRequest = http::Request<Bytes>;

/// The HTTP transport underneath the cache.
///
/// One call maps to one backend exchange. The implementation may block; it
/// must not interpret caching semantics — that is the caller's job.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Response body type produced by this transport.
    type Body: HttpBody<Data = Bytes> + Send + Unpin + 'static;

    /// Dispatches the request and returns the backend's response.
    async fn execute(
        &self,
        request: CacheRequest,
    ) -> Result<http::Response<Self::Body>, TransportError>;
}

/// Duplicates a request: method, URI, version, headers and buffered body.
///
/// Extensions are not carried over; they belong to the original caller.
pub fn clone_request(request: &CacheRequest) -> CacheRequest {
    let mut builder = http::Request::builder()
        .method(request.method().clone())
        .uri(request.uri().clone())
        .version(request.version());
    if let Some(headers) = builder.headers_mut() {
        *headers = request.headers().clone();
    }
    builder
        .body(request.body().clone())
        .expect("request rebuilt from valid parts")
}
