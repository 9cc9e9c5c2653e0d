//! Response body states for transparent caching.
//!
//! The cache serves three kinds of bodies and a single type must cover all
//! of them without losing transparency for the caller:
//!
//! - **`Complete`**: the body was materialized from a stored resource (or
//!   fully buffered before storing) and replays from [`Bytes`].
//! - **`Partial`**: the body was partially buffered — typically because it
//!   grew past the configured object size limit while being read for
//!   storage, or because the stream failed mid-read. The buffered prefix is
//!   replayed first, then the untouched remainder (or the pending error).
//! - **`Passthrough`**: the body was never inspected and streams straight
//!   from the backend.
//!
//! Since bytes consumed from a stream cannot be "un-read", the `Partial`
//! state is what keeps an oversized response byte-identical for the caller:
//! prefix plus remainder add up to exactly the original stream.

use bytes::{Buf, Bytes, BytesMut};
use http_body::{Body as HttpBody, Frame};
use pin_project::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// An HTTP response whose body is managed by the cache.
pub type CacheResponse<B> = http::Response<CacheBody<B>>;

/// Remainder of a partially consumed body.
#[pin_project(project = RemainingProj)]
pub enum Remaining<B>
where
    B: HttpBody,
{
    /// The stream continues where buffering stopped.
    Body(#[pin] B),
    /// An error was hit while buffering. Yielded once, then end of stream.
    Error(Option<B::Error>),
}

impl<B> fmt::Debug for Remaining<B>
where
    B: HttpBody,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Body(_) => f.debug_tuple("Body").field(&"...").finish(),
            Remaining::Error(Some(_)) => f.debug_tuple("Error").field(&"some").finish(),
            Remaining::Error(None) => f.debug_tuple("Error").field(&"none").finish(),
        }
    }
}

/// A buffered prefix plus the unconsumed remainder of a body.
///
/// Implements [`HttpBody`] by yielding the prefix first, then delegating to
/// the remainder.
#[pin_project]
pub struct PartialBody<B>
where
    B: HttpBody,
{
    prefix: Option<Bytes>,
    #[pin]
    remaining: Remaining<B>,
}

impl<B> fmt::Debug for PartialBody<B>
where
    B: HttpBody,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialBody")
            .field("prefix", &self.prefix)
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl<B> PartialBody<B>
where
    B: HttpBody,
{
    /// Builds a partial body from an optional prefix and a remainder.
    pub fn new(prefix: Option<Bytes>, remaining: Remaining<B>) -> Self {
        Self { prefix, remaining }
    }

    /// Returns the buffered prefix, if any bytes were consumed.
    pub fn prefix(&self) -> Option<&Bytes> {
        self.prefix.as_ref()
    }
}

impl<B: HttpBody> HttpBody for PartialBody<B> {
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();

        if let Some(prefix) = this.prefix.take() {
            return Poll::Ready(Some(Ok(Frame::data(prefix))));
        }

        match this.remaining.project() {
            RemainingProj::Body(body) => match body.poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                    Poll::Ready(Some(Ok(frame)))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
            RemainingProj::Error(error) => match error.take() {
                Some(err) => Poll::Ready(Some(Err(err))),
                None => Poll::Ready(None),
            },
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        let prefix_len = self.prefix.as_ref().map(|b| b.len() as u64).unwrap_or(0);
        match &self.remaining {
            Remaining::Body(body) => {
                let hint = body.size_hint();
                let lower = hint.lower().saturating_add(prefix_len);
                let mut result = http_body::SizeHint::new();
                result.set_lower(lower);
                if let Some(upper) = hint.upper() {
                    // The inner hint may not account for the bytes already
                    // consumed into the prefix; keep lower <= upper.
                    result.set_upper(upper.saturating_add(prefix_len).max(lower));
                }
                result
            }
            Remaining::Error(_) => http_body::SizeHint::with_exact(prefix_len),
        }
    }

    fn is_end_stream(&self) -> bool {
        if self.prefix.is_some() {
            return false;
        }
        match &self.remaining {
            Remaining::Body(body) => body.is_end_stream(),
            Remaining::Error(err) => err.is_none(),
        }
    }
}

/// A response body in one of the three cache-managed states.
#[pin_project(project = CacheBodyProj)]
pub enum CacheBody<B>
where
    B: HttpBody,
{
    /// Fully buffered bytes, yielded once. `None` once consumed (or empty).
    Complete(Option<Bytes>),
    /// Buffered prefix plus unconsumed remainder.
    Partial(#[pin] PartialBody<B>),
    /// Untouched backend stream.
    Passthrough(#[pin] B),
}

impl<B> CacheBody<B>
where
    B: HttpBody,
{
    /// A body replaying the given bytes.
    pub fn full(bytes: Bytes) -> Self {
        CacheBody::Complete(Some(bytes))
    }

    /// An empty body.
    pub fn empty() -> Self {
        CacheBody::Complete(None)
    }
}

impl<B> HttpBody for CacheBody<B>
where
    B: HttpBody,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project() {
            CacheBodyProj::Complete(data) => match data.take() {
                Some(bytes) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                None => Poll::Ready(None),
            },
            CacheBodyProj::Partial(partial) => partial.poll_frame(cx),
            CacheBodyProj::Passthrough(body) => match body.poll_frame(cx) {
                Poll::Ready(Some(Ok(frame))) => {
                    let frame = frame.map_data(|mut data| data.copy_to_bytes(data.remaining()));
                    Poll::Ready(Some(Ok(frame)))
                }
                Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => Poll::Ready(None),
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            CacheBody::Complete(Some(bytes)) => http_body::SizeHint::with_exact(bytes.len() as u64),
            CacheBody::Complete(None) => http_body::SizeHint::with_exact(0),
            CacheBody::Partial(partial) => partial.size_hint(),
            CacheBody::Passthrough(body) => body.size_hint(),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            CacheBody::Complete(data) => data.is_none(),
            CacheBody::Partial(partial) => partial.is_end_stream(),
            CacheBody::Passthrough(body) => body.is_end_stream(),
        }
    }
}

impl<B> fmt::Debug for CacheBody<B>
where
    B: HttpBody,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBody::Complete(Some(bytes)) => f
                .debug_tuple("Complete")
                .field(&format!("{} bytes", bytes.len()))
                .finish(),
            CacheBody::Complete(None) => f.debug_tuple("Complete").field(&"consumed").finish(),
            CacheBody::Partial(partial) => {
                let prefix_len = partial.prefix().map(|b| b.len()).unwrap_or(0);
                f.debug_struct("Partial")
                    .field("prefix_len", &prefix_len)
                    .finish()
            }
            CacheBody::Passthrough(_) => f.debug_tuple("Passthrough").field(&"...").finish(),
        }
    }
}

/// Outcome of buffering a body under a byte limit.
#[derive(Debug)]
pub enum ReadLimit<B>
where
    B: HttpBody,
{
    /// The entire body fit within the limit.
    Complete(Bytes),
    /// The limit was exceeded; the prefix plus the unread remainder.
    Exceeded(PartialBody<B>),
    /// The stream failed mid-read; the prefix plus the pending error.
    Failed(PartialBody<B>),
}

/// Buffers `body` until it ends or more than `limit` bytes have been read.
///
/// On [`ReadLimit::Exceeded`] and [`ReadLimit::Failed`] the returned
/// [`PartialBody`] replays everything consumed so far before continuing the
/// stream, so the caller still observes the original body byte for byte.
pub async fn read_up_to<B>(mut body: B, limit: usize) -> ReadLimit<B>
where
    B: HttpBody + Unpin,
{
    use http_body_util::BodyExt;

    let mut buffer = BytesMut::new();
    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                if let Ok(mut data) = frame.into_data() {
                    buffer.extend_from_slice(&data.copy_to_bytes(data.remaining()));
                }
                if buffer.len() > limit {
                    return ReadLimit::Exceeded(PartialBody::new(
                        Some(buffer.freeze()),
                        Remaining::Body(body),
                    ));
                }
            }
            Some(Err(error)) => {
                let prefix = if buffer.is_empty() {
                    None
                } else {
                    Some(buffer.freeze())
                };
                return ReadLimit::Failed(PartialBody::new(prefix, Remaining::Error(Some(error))));
            }
            None => return ReadLimit::Complete(buffer.freeze()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt, Full};
    use std::convert::Infallible;

    fn full(data: &'static [u8]) -> Full<Bytes> {
        Full::new(Bytes::from_static(data))
    }

    #[tokio::test]
    async fn read_within_limit_returns_complete() {
        match read_up_to(full(b"hello"), 16).await {
            ReadLimit::Complete(bytes) => assert_eq!(bytes.as_ref(), b"hello"),
            other => panic!("expected Complete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn read_over_limit_replays_full_body() {
        let body = full(b"hello world");
        let partial = match read_up_to(body, 4).await {
            ReadLimit::Exceeded(partial) => partial,
            other => panic!("expected Exceeded, got {:?}", other),
        };
        let replayed = CacheBody::Partial(partial).collect().await.unwrap();
        assert_eq!(replayed.to_bytes().as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn complete_body_yields_once() {
        let body: CacheBody<Full<Bytes>> = CacheBody::full(Bytes::from_static(b"abc"));
        let collected = body.collect().await.unwrap();
        assert_eq!(collected.to_bytes().as_ref(), b"abc");

        let empty: CacheBody<Full<Bytes>> = CacheBody::empty();
        assert!(empty.is_end_stream());
    }

    #[tokio::test]
    async fn partial_error_yields_prefix_then_error() {
        #[derive(Debug)]
        struct Failing(Option<Bytes>);

        impl HttpBody for Failing {
            type Data = Bytes;
            type Error = &'static str;

            fn poll_frame(
                mut self: Pin<&mut Self>,
                _cx: &mut Context<'_>,
            ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
                match self.0.take() {
                    Some(bytes) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                    None => Poll::Ready(Some(Err("boom"))),
                }
            }
        }

        let body = Failing(Some(Bytes::from_static(b"prefix")));
        let mut partial = match read_up_to(body, 64).await {
            ReadLimit::Failed(partial) => partial,
            other => panic!("expected Failed, got {:?}", other),
        };
        let frame = partial.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap().as_ref(), b"prefix");
        assert_eq!(partial.frame().await.unwrap().unwrap_err(), "boom");
        assert!(partial.frame().await.is_none());
    }

    #[tokio::test]
    async fn passthrough_preserves_stream() {
        let body = CacheBody::Passthrough(full(b"streamed"));
        let collected = body.collect().await;
        let collected: Result<_, Infallible> = collected;
        assert_eq!(collected.unwrap().to_bytes().as_ref(), b"streamed");
    }
}
