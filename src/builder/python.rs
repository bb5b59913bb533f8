//! Python builder
//!
//! The dependency layer is keyed on the checksum of `requirements.txt` and
//! the base image. On a miss, the resolver fetches wheels into a scoped work
//! directory and the layer is assembled from them:
//!
//! 1. wheel contents, wheel by wheel in resolver order
//! 2. entry point shims, merged across wheels and ordered by script name
//!
//! The application layer is the same passthrough layer [`AppBuilder`]
//! produces.

use crate::builder::scripts::shim_entries;
use crate::builder::{AppBuilder, BuilderStrategy, StrategyKind, WorkDir};
use crate::cache::{Checksum, LayerCache, PYTHON_NAMESPACE};
use crate::context::SourceContext;
use crate::deadline::Deadline;
use crate::error::{LaminaError, LaminaResult};
use crate::image::Image;
use crate::layer::build_layer;
use crate::resolver::wheel::{InstallLayout, Wheel};
use crate::resolver::PackageResolver;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Dependency descriptor at the context root
pub const REQUIREMENTS: &str = "requirements.txt";

pub struct PythonBuilder {
    app: AppBuilder,
    resolver: Arc<dyn PackageResolver>,
    layout: InstallLayout,
    work_root: PathBuf,
    work_dir: Option<WorkDir>,
}

impl PythonBuilder {
    pub fn new(
        context: Arc<dyn SourceContext>,
        prefix: impl Into<String>,
        resolver: Arc<dyn PackageResolver>,
        layout: InstallLayout,
        work_root: PathBuf,
    ) -> Self {
        Self {
            app: AppBuilder::new(context, prefix),
            resolver,
            layout,
            work_root,
            work_dir: None,
        }
    }
}

/// Assemble the dependency layer from resolved wheels
fn dependency_layer(wheels: &[PathBuf], layout: &InstallLayout) -> LaminaResult<Vec<u8>> {
    let mut entries = Vec::new();
    let mut scripts = BTreeMap::new();
    for path in wheels {
        let wheel = Wheel::open(path)?;
        debug!("Installing {}", wheel.path().display());
        entries.extend(wheel.install_entries(layout));
        for (name, target) in wheel.entry_points() {
            scripts.entry(name).or_insert(target);
        }
    }
    entries.extend(shim_entries(&scripts, layout));
    debug!(
        "Dependency layer: {} file(s), {} script(s)",
        entries.len(),
        scripts.len()
    );
    build_layer(&entries)
}

#[async_trait]
impl BuilderStrategy for PythonBuilder {
    async fn open(&mut self) -> LaminaResult<()> {
        if self.work_dir.is_none() {
            self.work_dir = Some(WorkDir::create(&self.work_root).await?);
        }
        Ok(())
    }

    async fn close(&mut self) -> LaminaResult<()> {
        match self.work_dir.take() {
            Some(work_dir) => work_dir.remove().await,
            None => Ok(()),
        }
    }

    async fn create_package_base(
        &self,
        base: &Image,
        cache: &dyn LayerCache,
        deadline: Deadline,
    ) -> LaminaResult<Image> {
        let descriptor = self.app.context().get_file(REQUIREMENTS)?;
        let checksum = Checksum::of(&descriptor);
        debug!("{} checksum {}", REQUIREMENTS, checksum);

        if let Some(image) = cache
            .get(base, PYTHON_NAMESPACE, &checksum, deadline)
            .await?
        {
            return Ok(image);
        }

        let work_dir = self
            .work_dir
            .as_ref()
            .ok_or_else(|| LaminaError::Internal("python builder used before open".to_string()))?;

        info!(
            "Installing Python dependencies with {}",
            self.resolver.resolver_name()
        );
        let wheels = self
            .resolver
            .resolve(&descriptor, work_dir.path(), deadline)
            .await?;

        let layout = self.layout.clone();
        let layer = tokio::task::spawn_blocking(move || dependency_layer(&wheels, &layout))
            .await
            .map_err(|e| LaminaError::Internal(format!("dependency layer task failed: {}", e)))??;

        cache
            .store(base, PYTHON_NAMESPACE, &checksum, &layer, deadline)
            .await
    }

    fn build_app_layer(&self) -> LaminaResult<Vec<u8>> {
        self.app.passthrough_layer()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Python
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DisabledCache, RegistryCache};
    use crate::context::MemoryContext;
    use crate::image::OciAppender;
    use crate::registry::{MemoryRegistry, Registry};
    use crate::resolver::wheel::tests::write_wheel;
    use flate2::read::GzDecoder;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Resolver writing a fixed set of wheels and counting invocations
    #[derive(Default)]
    struct FakeResolver {
        calls: AtomicUsize,
        work_dirs: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl PackageResolver for FakeResolver {
        async fn resolve(
            &self,
            _descriptor: &[u8],
            work_dir: &Path,
            _deadline: Deadline,
        ) -> LaminaResult<Vec<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.work_dirs.lock().unwrap().push(work_dir.to_path_buf());
            let flask = work_dir.join("flask-1.0-py2.py3-none-any.whl");
            write_wheel(
                &flask,
                &[
                    ("flask/__init__.py", "__version__ = '1.0'\n", 0o644),
                    (
                        "flask-1.0.dist-info/entry_points.txt",
                        "[console_scripts]\nflask = flask.cli:main\n",
                        0o644,
                    ),
                ],
            );
            let click = work_dir.join("click-7.0-py2.py3-none-any.whl");
            write_wheel(
                &click,
                &[
                    ("click/__init__.py", "", 0o644),
                    (
                        "click-7.0.dist-info/entry_points.txt",
                        "[console_scripts]\nflask = other:main\nclick-demo = click.demo:run\n",
                        0o644,
                    ),
                ],
            );
            Ok(vec![click, flask])
        }

        fn resolver_name(&self) -> &'static str {
            "fake"
        }
    }

    /// Resolver that resolves to nothing
    struct EmptyResolver;

    #[async_trait]
    impl PackageResolver for EmptyResolver {
        async fn resolve(
            &self,
            _descriptor: &[u8],
            _work_dir: &Path,
            _deadline: Deadline,
        ) -> LaminaResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }

        fn resolver_name(&self) -> &'static str {
            "empty"
        }
    }

    /// Resolver whose tool always fails
    struct FailingResolver;

    #[async_trait]
    impl PackageResolver for FailingResolver {
        async fn resolve(
            &self,
            _descriptor: &[u8],
            _work_dir: &Path,
            _deadline: Deadline,
        ) -> LaminaResult<Vec<PathBuf>> {
            Err(LaminaError::ResolverFailure {
                tool: "fake".to_string(),
                reason: "No matching distribution found for flask==1.0".to_string(),
            })
        }

        fn resolver_name(&self) -> &'static str {
            "failing"
        }
    }

    /// Resolver producing a wheel that is not a zip archive
    struct CorruptWheelResolver;

    #[async_trait]
    impl PackageResolver for CorruptWheelResolver {
        async fn resolve(
            &self,
            _descriptor: &[u8],
            work_dir: &Path,
            _deadline: Deadline,
        ) -> LaminaResult<Vec<PathBuf>> {
            let path = work_dir.join("flask-1.0-py3-none-any.whl");
            std::fs::write(&path, b"truncated download").unwrap();
            Ok(vec![path])
        }

        fn resolver_name(&self) -> &'static str {
            "corrupt"
        }
    }

    /// Registry that cannot be reached
    #[derive(Default)]
    struct UnreachableRegistry {
        pushes: AtomicUsize,
    }

    #[async_trait]
    impl Registry for UnreachableRegistry {
        async fn push(
            &self,
            location: &str,
            _image: &Image,
            _deadline: Deadline,
        ) -> LaminaResult<Image> {
            self.pushes.fetch_add(1, Ordering::SeqCst);
            Err(LaminaError::registry(location, "connection refused"))
        }

        async fn pull_if_exists(
            &self,
            location: &str,
            _deadline: Deadline,
        ) -> LaminaResult<Option<Image>> {
            Err(LaminaError::registry(location, "connection refused"))
        }

        fn registry_name(&self) -> &'static str {
            "unreachable"
        }
    }

    fn memory_cache(registry: &Arc<MemoryRegistry>) -> RegistryCache {
        RegistryCache::new(
            "registry.local/app",
            registry.clone(),
            Arc::new(OciAppender::default()),
        )
    }

    fn context(requirements: &str) -> Arc<dyn SourceContext> {
        Arc::new(
            MemoryContext::new()
                .with_file(REQUIREMENTS, requirements)
                .with_file("main.py", "import flask\n"),
        )
    }

    fn builder(
        context: Arc<dyn SourceContext>,
        resolver: Arc<dyn PackageResolver>,
        root: &TempDir,
    ) -> PythonBuilder {
        PythonBuilder::new(
            context,
            "app",
            resolver,
            InstallLayout::default(),
            root.path().to_path_buf(),
        )
    }

    fn layer_paths(layer: &[u8]) -> Vec<String> {
        tar::Archive::new(GzDecoder::new(layer))
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn second_build_hits_cache() {
        let root = TempDir::new().unwrap();
        let resolver = Arc::new(FakeResolver::default());
        let registry = Arc::new(MemoryRegistry::new());
        let cache = RegistryCache::new(
            "registry.local/app",
            registry.clone(),
            Arc::new(OciAppender::default()),
        );
        let base = Image::scratch("registry.local/python:3");

        let mut first = builder(context("flask==1.0\n"), resolver.clone(), &root);
        first.open().await.unwrap();
        let built = first
            .create_package_base(&base, &cache, Deadline::none())
            .await
            .unwrap();
        first.close().await.unwrap();
        assert_eq!(built.layers.len(), base.layers.len() + 1);

        let mut second = builder(context("flask==1.0\n"), resolver.clone(), &root);
        second.open().await.unwrap();
        let cached = second
            .create_package_base(&base, &cache, Deadline::none())
            .await
            .unwrap();
        second.close().await.unwrap();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.identity(), built.identity());
        assert_eq!(cached.layers, built.layers);
        assert_eq!(registry.push_count(), 1);
    }

    #[tokio::test]
    async fn changed_requirements_miss() {
        let root = TempDir::new().unwrap();
        let resolver = Arc::new(FakeResolver::default());
        let registry = Arc::new(MemoryRegistry::new());
        let cache = RegistryCache::new(
            "registry.local/app",
            registry.clone(),
            Arc::new(OciAppender::default()),
        );
        let base = Image::scratch("registry.local/python:3");

        for requirements in ["flask==1.0\n", "flask==1.0\nclick\n"] {
            let mut b = builder(context(requirements), resolver.clone(), &root);
            b.open().await.unwrap();
            b.create_package_base(&base, &cache, Deadline::none())
                .await
                .unwrap();
            b.close().await.unwrap();
        }

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.locations().len(), 2);
    }

    #[tokio::test]
    async fn layer_has_wheels_then_sorted_shims() {
        let root = TempDir::new().unwrap();
        let cache = DisabledCache::new(Arc::new(OciAppender::default()));
        let mut b = builder(context("flask==1.0\n"), Arc::new(FakeResolver::default()), &root);
        b.open().await.unwrap();
        let image = b
            .create_package_base(&Image::scratch("base:1"), &cache, Deadline::none())
            .await
            .unwrap();
        b.close().await.unwrap();

        let layer = image.layers.last().unwrap();
        let paths = layer_paths(&layer.data);
        assert_eq!(
            paths,
            vec![
                "usr/local/lib/python3/site-packages/click-7.0.dist-info/entry_points.txt",
                "usr/local/lib/python3/site-packages/click/__init__.py",
                "usr/local/lib/python3/site-packages/flask-1.0.dist-info/entry_points.txt",
                "usr/local/lib/python3/site-packages/flask/__init__.py",
                "usr/local/bin/click-demo",
                "usr/local/bin/flask",
            ]
        );
    }

    #[tokio::test]
    async fn first_wheel_owns_script_name() {
        let dir = TempDir::new().unwrap();
        let resolver = FakeResolver::default();
        let wheels = resolver
            .resolve(b"", dir.path(), Deadline::none())
            .await
            .unwrap();
        let layer = dependency_layer(&wheels, &InstallLayout::default()).unwrap();

        let mut archive = tar::Archive::new(GzDecoder::new(layer.as_slice()));
        let mut shim = String::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            if entry.path().unwrap().to_string_lossy() == "usr/local/bin/flask" {
                std::io::Read::read_to_string(&mut entry, &mut shim).unwrap();
            }
        }
        assert!(shim.contains("from other import main"));
    }

    #[tokio::test]
    async fn zero_packages_still_adds_layer() {
        let root = TempDir::new().unwrap();
        let cache = DisabledCache::new(Arc::new(OciAppender::default()));
        let mut b = builder(context(""), Arc::new(EmptyResolver), &root);
        b.open().await.unwrap();
        let base = Image::scratch("base:1");
        let image = b
            .create_package_base(&base, &cache, Deadline::none())
            .await
            .unwrap();
        b.close().await.unwrap();

        assert_eq!(image.layers.len(), base.layers.len() + 1);
        assert!(layer_paths(&image.layers[0].data).is_empty());
    }

    #[tokio::test]
    async fn close_removes_work_dir() {
        let root = TempDir::new().unwrap();
        let resolver = Arc::new(FakeResolver::default());
        let cache = DisabledCache::new(Arc::new(OciAppender::default()));
        let mut b = builder(context("flask==1.0\n"), resolver.clone(), &root);
        b.open().await.unwrap();
        b.create_package_base(&Image::scratch("base:1"), &cache, Deadline::none())
            .await
            .unwrap();
        b.close().await.unwrap();

        let used = resolver.work_dirs.lock().unwrap()[0].clone();
        assert!(used.starts_with(root.path()));
        assert!(!used.exists());
    }

    #[tokio::test]
    async fn package_base_before_open_fails_on_miss() {
        let root = TempDir::new().unwrap();
        let cache = DisabledCache::new(Arc::new(OciAppender::default()));
        let b = builder(context("flask\n"), Arc::new(FakeResolver::default()), &root);
        let result = b
            .create_package_base(&Image::scratch("base:1"), &cache, Deadline::none())
            .await;
        assert!(matches!(result, Err(LaminaError::Internal(_))));
    }

    #[tokio::test]
    async fn registry_failure_on_lookup_propagates() {
        let root = TempDir::new().unwrap();
        let resolver = Arc::new(FakeResolver::default());
        let registry = Arc::new(UnreachableRegistry::default());
        let cache = RegistryCache::new(
            "registry.local/app",
            registry.clone(),
            Arc::new(OciAppender::default()),
        );
        let mut b = builder(context("flask==1.0\n"), resolver.clone(), &root);
        b.open().await.unwrap();
        let result = b
            .create_package_base(&Image::scratch("base:1"), &cache, Deadline::none())
            .await;
        b.close().await.unwrap();

        assert!(matches!(result, Err(LaminaError::RegistryTransport { .. })));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.pushes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn resolver_failure_never_stores() {
        let root = TempDir::new().unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let cache = memory_cache(&registry);
        let mut b = builder(context("flask==1.0\n"), Arc::new(FailingResolver), &root);
        b.open().await.unwrap();
        let result = b
            .create_package_base(&Image::scratch("base:1"), &cache, Deadline::none())
            .await;
        b.close().await.unwrap();

        assert!(matches!(result, Err(LaminaError::ResolverFailure { .. })));
        assert_eq!(registry.push_count(), 0);
        assert!(registry.locations().is_empty());
    }

    #[tokio::test]
    async fn corrupt_wheel_never_stores() {
        let root = TempDir::new().unwrap();
        let registry = Arc::new(MemoryRegistry::new());
        let cache = memory_cache(&registry);
        let mut b = builder(context("flask==1.0\n"), Arc::new(CorruptWheelResolver), &root);
        b.open().await.unwrap();
        let result = b
            .create_package_base(&Image::scratch("base:1"), &cache, Deadline::none())
            .await;
        b.close().await.unwrap();

        assert!(matches!(result, Err(LaminaError::Wheel { .. })));
        assert_eq!(registry.push_count(), 0);
        assert!(registry.locations().is_empty());
    }

    #[test]
    fn app_layer_is_passthrough() {
        let root = TempDir::new().unwrap();
        let ctx = context("flask\n");
        let b = builder(ctx.clone(), Arc::new(EmptyResolver), &root);
        let app = AppBuilder::new(ctx, "app");
        assert_eq!(b.build_app_layer().unwrap(), app.build_app_layer().unwrap());
    }
}
