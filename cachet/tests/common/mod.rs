//! Scripted mock backend for orchestrator tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};

use cachet_core::{clone_request, Backend, CacheRequest, TransportError};

pub type BodyError = Box<dyn std::error::Error + Send + Sync>;
pub type TestBody = BoxBody<Bytes, BodyError>;

/// One scripted backend exchange.
pub struct ScriptedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Bytes,
    delay: Option<Duration>,
    fail: bool,
}

impl ScriptedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            delay: None,
            fail: false,
        }
    }

    /// A scripted transport failure.
    pub fn error() -> Self {
        Self {
            fail: true,
            ..Self::new(0)
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = Bytes::from(body.to_owned());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Default)]
struct MockBackendInner {
    script: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<CacheRequest>>,
}

/// Backend replaying a scripted sequence of responses and recording every
/// request it receives.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<MockBackendInner>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.inner.script.lock().unwrap().push_back(response);
    }

    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    /// Copy of the `index`-th request the backend received.
    pub fn request(&self, index: usize) -> CacheRequest {
        let requests = self.inner.requests.lock().unwrap();
        clone_request(&requests[index])
    }
}

#[async_trait]
impl Backend for MockBackend {
    type Body = TestBody;

    async fn execute(
        &self,
        request: CacheRequest,
    ) -> Result<http::Response<TestBody>, TransportError> {
        let scripted = self
            .inner
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("backend called with no scripted response left");
        self.inner.requests.lock().unwrap().push(request);

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }
        if scripted.fail {
            return Err(TransportError::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "scripted transport failure",
            )));
        }

        let mut builder = http::Response::builder().status(scripted.status);
        for (name, value) in &scripted.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let body = Full::new(scripted.body.clone())
            .map_err(|never| -> BodyError { match never {} })
            .boxed();
        Ok(builder.body(body).expect("scripted response is well-formed"))
    }
}
