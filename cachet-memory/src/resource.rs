//! Heap-backed resource allocation.

use std::sync::Arc;

use bytes::Bytes;

use cachet_core::resource::{AllocationError, Resource, ResourceFactory, SharedResource};

/// Response body bytes held on the heap.
///
/// [`Bytes`] is reference-counted, so cloning the handle or serving the
/// body repeatedly never copies the payload.
#[derive(Debug, Clone)]
pub struct HeapResource {
    data: Bytes,
}

impl HeapResource {
    /// Wraps the given payload.
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }
}

impl Resource for HeapResource {
    fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

/// Allocates [`HeapResource`] handles, optionally refusing bodies over a
/// size cap.
#[derive(Debug, Clone, Default)]
pub struct HeapResourceFactory {
    max_object_size: Option<u64>,
}

impl HeapResourceFactory {
    /// Factory without a size cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory refusing bodies larger than `bytes`.
    pub fn with_max_object_size(bytes: u64) -> Self {
        Self {
            max_object_size: Some(bytes),
        }
    }
}

impl ResourceFactory for HeapResourceFactory {
    fn generate(&self, _source: &str, body: Bytes) -> Result<SharedResource, AllocationError> {
        if let Some(limit) = self.max_object_size {
            if body.len() as u64 > limit {
                return Err(AllocationError {
                    requested: body.len() as u64,
                    limit,
                });
            }
        }
        Ok(Arc::new(HeapResource::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_factory_accepts_anything() {
        let factory = HeapResourceFactory::new();
        let resource = factory
            .generate("http://example.com/a", Bytes::from_static(b"payload"))
            .unwrap();
        assert_eq!(resource.bytes().as_ref(), b"payload");
        assert_eq!(resource.len(), 7);
    }

    #[test]
    fn capped_factory_refuses_oversized_bodies() {
        let factory = HeapResourceFactory::with_max_object_size(4);
        let error = factory
            .generate("http://example.com/a", Bytes::from_static(b"too big"))
            .unwrap_err();
        assert_eq!(error.requested, 7);
        assert_eq!(error.limit, 4);
    }
}
