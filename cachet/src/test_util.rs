//! Shared helpers for unit tests.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Version};

use cachet_core::resource::Resource;
use cachet_core::{CacheEntry, CacheRequest};

#[derive(Debug)]
pub(crate) struct TestResource(pub Bytes);

impl Resource for TestResource {
    fn bytes(&self) -> Bytes {
        self.0.clone()
    }
}

pub(crate) struct EntryBuilder {
    request_date: DateTime<Utc>,
    response_date: DateTime<Utc>,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    method: Method,
    selecting: Vec<(HeaderName, Option<HeaderValue>)>,
}

impl EntryBuilder {
    pub(crate) fn new() -> Self {
        let now = Utc::now();
        Self {
            request_date: now,
            response_date: now,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"body"),
            method: Method::GET,
            selecting: Vec::new(),
        }
    }

    pub(crate) fn dates(mut self, request: DateTime<Utc>, response: DateTime<Utc>) -> Self {
        self.request_date = request;
        self.response_date = response;
        self
    }

    pub(crate) fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(
            name.parse::<HeaderName>().unwrap(),
            value.parse::<HeaderValue>().unwrap(),
        );
        self
    }

    pub(crate) fn body(mut self, body: &'static [u8]) -> Self {
        self.body = Bytes::from_static(body);
        self
    }

    pub(crate) fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub(crate) fn selecting(mut self, name: &str, value: Option<&str>) -> Self {
        self.selecting.push((
            name.parse::<HeaderName>().unwrap(),
            value.map(|v| v.parse::<HeaderValue>().unwrap()),
        ));
        self
    }

    pub(crate) fn build(self) -> CacheEntry {
        CacheEntry::new(
            self.request_date,
            self.response_date,
            self.status,
            Version::HTTP_11,
            self.headers,
            Arc::new(TestResource(self.body)),
            self.method,
            self.selecting,
        )
    }
}

pub(crate) fn get_request(uri: &str) -> CacheRequest {
    http::Request::builder()
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}
