//! Provider registry: named factories for item sources

use crate::config::NarrowSettings;
use crate::error::{Result, SourceError};
use crate::host::{HostBuffer, ProjectResolver, ProjectSet};
use crate::refresh::RefreshController;
use crate::source::{
    BufferScanSource, ExternalSearchSource, FileScanSource, ItemSource, SymbolSource,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// What a factory may need to build its source
#[derive(Clone)]
pub struct SourceFactoryContext {
    pub buffer: Option<Arc<dyn HostBuffer>>,
    pub file_path: Option<PathBuf>,
    pub resolver: Arc<dyn ProjectResolver>,
    pub settings: NarrowSettings,
}

impl SourceFactoryContext {
    pub fn new(resolver: Arc<dyn ProjectResolver>, settings: NarrowSettings) -> Self {
        Self {
            buffer: None,
            file_path: None,
            resolver,
            settings,
        }
    }

    pub fn with_buffer(mut self, buffer: Arc<dyn HostBuffer>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn with_file_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.file_path = Some(path.into());
        self
    }

    fn require_buffer(&self, provider: &str) -> Result<Arc<dyn HostBuffer>> {
        self.buffer.clone().ok_or_else(|| {
            SourceError::MissingContext {
                provider: provider.to_string(),
                what: "a buffer".to_string(),
            }
            .into()
        })
    }

    fn require_file_path(&self, provider: &str) -> Result<PathBuf> {
        self.file_path.clone().ok_or_else(|| {
            SourceError::MissingContext {
                provider: provider.to_string(),
                what: "a file path".to_string(),
            }
            .into()
        })
    }
}

impl Default for SourceFactoryContext {
    fn default() -> Self {
        Self::new(Arc::new(ProjectSet::default()), NarrowSettings::default())
    }
}

/// Factory trait for creating item sources
pub trait SourceFactory: Send + Sync {
    fn create(&self, context: &SourceFactoryContext) -> Result<Arc<dyn ItemSource>>;

    fn provider_name(&self) -> &str;

    fn provider_description(&self) -> &str;
}

macro_rules! impl_source_factory {
    ($factory:ident, $name:expr, $description:expr, |$context:ident| $create:expr) => {
        pub struct $factory;

        impl SourceFactory for $factory {
            fn create(&self, $context: &SourceFactoryContext) -> Result<Arc<dyn ItemSource>> {
                $create
            }

            fn provider_name(&self) -> &str {
                $name
            }

            fn provider_description(&self) -> &str {
                $description
            }
        }
    };
}

impl_source_factory!(ScanFactory, "scan", "Lines or matches of the current buffer", |context| {
    let buffer = context.require_buffer("scan")?;
    Ok(Arc::new(BufferScanSource::new(buffer)))
});

impl_source_factory!(FileFactory, "file", "Lines or matches of a file on disk", |context| {
    let path = context.require_file_path("file")?;
    Ok(Arc::new(FileScanSource::new(path)))
});

impl_source_factory!(SearchFactory, "search", "Project-wide search with rg or ag", |context| {
    Ok(Arc::new(ExternalSearchSource::new(
        context.resolver.clone(),
        context.settings.search.clone(),
    )))
});

impl_source_factory!(SymbolsFactory, "symbols", "Definitions in the current buffer", |context| {
    let buffer = context.require_buffer("symbols")?;
    Ok(Arc::new(SymbolSource::new(buffer)?))
});

/// Registry for providers by name
pub struct ProviderRegistry {
    factories: HashMap<String, Box<dyn SourceFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register_factory(&mut self, factory: Box<dyn SourceFactory>) {
        self.factories
            .insert(factory.provider_name().to_string(), factory);
    }

    pub fn create_source(
        &self,
        name: &str,
        context: &SourceFactoryContext,
    ) -> Result<Arc<dyn ItemSource>> {
        let factory = self.factories.get(name).ok_or_else(|| SourceError::NotFound {
            name: name.to_string(),
        })?;
        factory.create(context)
    }

    /// Build a controller around the named provider
    pub fn create_controller(
        &self,
        name: &str,
        context: &SourceFactoryContext,
    ) -> Result<RefreshController> {
        let source = self.create_source(name, context)?;
        RefreshController::new(source, context.resolver.clone(), context.settings.clone())
    }

    /// Provider names, sorted
    pub fn list_providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn get_provider_info(&self, name: &str) -> Option<(&str, &str)> {
        self.factories
            .get(name)
            .map(|factory| (factory.provider_name(), factory.provider_description()))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register_factory(Box::new(ScanFactory));
        registry.register_factory(Box::new(FileFactory));
        registry.register_factory(Box::new(SearchFactory));
        registry.register_factory(Box::new(SymbolsFactory));
        registry
    }
}
