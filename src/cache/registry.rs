//! Registry-backed layer cache
//!
//! Dependency images are pushed to `<repository>:<cache tag>`. There is no
//! locking across build processes: two builders racing on the same key both
//! resolve and push, and because the layer bytes for a checksum are
//! deterministic the last push stores the same content as the first.

use crate::cache::key::{CacheKey, Checksum};
use crate::cache::LayerCache;
use crate::deadline::Deadline;
use crate::error::LaminaResult;
use crate::image::{Image, ImageAppender};
use crate::registry::Registry;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Cache storing dependency images as tags in one registry repository
pub struct RegistryCache {
    repository: String,
    registry: Arc<dyn Registry>,
    appender: Arc<dyn ImageAppender>,
}

impl RegistryCache {
    /// Create a cache rooted at `repository` (a reference without tag)
    pub fn new(
        repository: impl Into<String>,
        registry: Arc<dyn Registry>,
        appender: Arc<dyn ImageAppender>,
    ) -> Self {
        Self {
            repository: repository.into(),
            registry,
            appender,
        }
    }

    /// Repository holding the cache tags
    pub fn repository(&self) -> &str {
        &self.repository
    }

    fn location(&self, base: &Image, namespace: &str, checksum: &Checksum) -> LaminaResult<String> {
        let key = CacheKey::new(base.identity(), namespace, checksum.clone())?;
        Ok(key.location(&self.repository))
    }
}

#[async_trait]
impl LayerCache for RegistryCache {
    async fn get(
        &self,
        base: &Image,
        namespace: &str,
        checksum: &Checksum,
        deadline: Deadline,
    ) -> LaminaResult<Option<Image>> {
        let location = self.location(base, namespace, checksum)?;
        let found = self.registry.pull_if_exists(&location, deadline).await?;
        match &found {
            Some(_) => info!("Cache hit: {}", location),
            None => info!("Cache miss: {}", location),
        }
        Ok(found)
    }

    async fn store(
        &self,
        base: &Image,
        namespace: &str,
        checksum: &Checksum,
        layer: &[u8],
        deadline: Deadline,
    ) -> LaminaResult<Image> {
        let location = self.location(base, namespace, checksum)?;
        let image = self.appender.append(base, layer)?;
        debug!("Storing dependency image at {}", location);
        self.registry.push(&location, &image, deadline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::PYTHON_NAMESPACE;
    use crate::error::LaminaError;
    use crate::image::OciAppender;
    use crate::layer::{build_layer, LayerEntry};
    use crate::registry::MemoryRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Registry answering every call with a transport failure
    #[derive(Default)]
    struct FailingRegistry {
        pushes: AtomicUsize,
    }

    #[async_trait]
    impl Registry for FailingRegistry {
        async fn push(
            &self,
            location: &str,
            _image: &Image,
            _deadline: Deadline,
        ) -> LaminaResult<Image> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            Err(LaminaError::registry(location, "401 Unauthorized"))
        }

        async fn pull_if_exists(
            &self,
            location: &str,
            _deadline: Deadline,
        ) -> LaminaResult<Option<Image>> {
            Err(LaminaError::registry(location, "500 Internal Server Error"))
        }

        fn registry_name(&self) -> &'static str {
            "failing"
        }
    }

    fn setup() -> (Arc<MemoryRegistry>, RegistryCache) {
        let registry = Arc::new(MemoryRegistry::new());
        let cache = RegistryCache::new(
            "registry.local/app",
            registry.clone(),
            Arc::new(OciAppender::default()),
        );
        (registry, cache)
    }

    fn layer() -> Vec<u8> {
        build_layer(&[LayerEntry::file(
            "usr/local/lib/python3/site-packages/flask/__init__.py",
            "",
        )])
        .unwrap()
    }

    #[tokio::test]
    async fn empty_cache_misses() {
        let (_, cache) = setup();
        let base = Image::scratch("base");
        let found = cache
            .get(&base, PYTHON_NAMESPACE, &Checksum::of(b"flask==1.0"), Deadline::none())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn store_then_get_returns_appended_image() {
        let (_, cache) = setup();
        let base = Image::scratch("base");
        let checksum = Checksum::of(b"flask==1.0");

        let stored = cache
            .store(&base, PYTHON_NAMESPACE, &checksum, &layer(), Deadline::none())
            .await
            .unwrap();
        let found = cache
            .get(&base, PYTHON_NAMESPACE, &checksum, Deadline::none())
            .await
            .unwrap()
            .unwrap();

        let expected = OciAppender::default().append(&base, &layer()).unwrap();
        assert_eq!(found.identity(), expected.identity());
        assert_eq!(found.layers, expected.layers);
        assert_eq!(found, stored);
        assert!(base.layers.is_empty());
    }

    #[tokio::test]
    async fn location_is_derived_from_key() {
        let (registry, cache) = setup();
        let base = Image::scratch("base");
        let checksum = Checksum::of(b"flask==1.0");

        cache
            .store(&base, PYTHON_NAMESPACE, &checksum, &layer(), Deadline::none())
            .await
            .unwrap();

        let key = CacheKey::new(base.identity(), PYTHON_NAMESPACE, checksum).unwrap();
        assert_eq!(
            registry.locations(),
            vec![key.location("registry.local/app")]
        );
    }

    #[tokio::test]
    async fn repeated_store_is_idempotent() {
        let (registry, cache) = setup();
        let base = Image::scratch("base");
        let checksum = Checksum::of(b"flask==1.0");

        let first = cache
            .store(&base, PYTHON_NAMESPACE, &checksum, &layer(), Deadline::none())
            .await
            .unwrap();
        let second = cache
            .store(&base, PYTHON_NAMESPACE, &checksum, &layer(), Deadline::none())
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.locations().len(), 1);
        assert_eq!(registry.push_count(), 2);
    }

    #[tokio::test]
    async fn different_base_misses() {
        let (_, cache) = setup();
        let checksum = Checksum::of(b"flask==1.0");
        cache
            .store(
                &Image::scratch("base"),
                PYTHON_NAMESPACE,
                &checksum,
                &layer(),
                Deadline::none(),
            )
            .await
            .unwrap();

        let other_base = Image::new("other", br#"{"os":"linux","architecture":"arm64"}"#.to_vec(), vec![]);
        let found = cache
            .get(&other_base, PYTHON_NAMESPACE, &checksum, Deadline::none())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn transport_failure_is_not_a_miss() {
        let registry = Arc::new(FailingRegistry::default());
        let cache = RegistryCache::new(
            "registry.local/app",
            registry.clone(),
            Arc::new(OciAppender::default()),
        );
        let base = Image::scratch("base");
        let checksum = Checksum::of(b"flask==1.0");

        let found = cache
            .get(&base, PYTHON_NAMESPACE, &checksum, Deadline::none())
            .await;
        assert!(matches!(found, Err(LaminaError::RegistryTransport { .. })));

        let stored = cache
            .store(&base, PYTHON_NAMESPACE, &checksum, &layer(), Deadline::none())
            .await;
        assert!(matches!(stored, Err(LaminaError::RegistryTransport { .. })));
        assert_eq!(registry.pushes.load(Ordering::SeqCst), 1);
    }
}
