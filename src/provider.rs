//! Provider descriptors and lazily instantiated provider factories.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::config::{split_ids, ProviderConfig};
use crate::factory::{Adapter, AdapterFactory, AdapterType, Factory, NoopFactory};
use crate::{Catalog, FactoryError};

/// Identifies a provider across add and remove notifications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderKey {
    pub contributor: String,
    pub class: String,
}

impl fmt::Display for ProviderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.contributor, self.class)
    }
}

/// Describes a provider: who contributes it, which catalog class implements it
/// and which identifiers it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub contributor: String,
    pub class: String,
    pub ids: Vec<String>,
}

impl ProviderDescriptor {
    /// Creates a descriptor from a comma-separated identifier list.
    pub fn new(contributor: impl Into<String>, class: impl Into<String>, ids: &str) -> Self {
        Self {
            contributor: contributor.into(),
            class: class.into(),
            ids: split_ids(ids),
        }
    }

    /// The key add and remove notifications refer to this provider by.
    pub fn key(&self) -> ProviderKey {
        ProviderKey {
            contributor: self.contributor.clone(),
            class: self.class.clone(),
        }
    }
}

impl From<&ProviderConfig> for ProviderDescriptor {
    fn from(config: &ProviderConfig) -> Self {
        Self::new(config.contributor.clone(), config.class.clone(), &config.ids)
    }
}

/// A kind of factory the provider machinery can work with.
///
/// Implemented for `dyn Factory<C, Output = T>` and `dyn AdapterFactory<C>`.
pub trait FactoryKind: Send + Sync + 'static {
    /// A factory of this kind that declines everything.
    fn noop() -> Arc<Self>;

    fn from_lazy(lazy: LazyFactory<Self>) -> Arc<Self>;
}

impl<C: ?Sized + 'static, T: 'static> FactoryKind for dyn Factory<C, Output = T> {
    fn noop() -> Arc<Self> {
        Arc::new(NoopFactory::<T>::new())
    }

    fn from_lazy(lazy: LazyFactory<Self>) -> Arc<Self> {
        Arc::new(lazy)
    }
}

impl<C: ?Sized + 'static> FactoryKind for dyn AdapterFactory<C> {
    fn noop() -> Arc<Self> {
        Arc::new(NoopFactory::<()>::new())
    }

    fn from_lazy(lazy: LazyFactory<Self>) -> Arc<Self> {
        Arc::new(lazy)
    }
}

/// A provider factory created on first use.
///
/// The implementation named by the descriptor's class is built from the catalog
/// the first time an instance is requested. If that fails, the failure is logged
/// and the lazy factory declines every identifier from then on.
pub struct LazyFactory<F: ?Sized> {
    descriptor: ProviderDescriptor,
    catalog: Arc<Catalog<F>>,
    instance: OnceLock<Arc<F>>,
}

impl<F: FactoryKind + ?Sized> LazyFactory<F> {
    /// Wraps the provider; nothing is instantiated until the first lookup.
    pub fn new(descriptor: ProviderDescriptor, catalog: Arc<Catalog<F>>) -> Self {
        Self {
            descriptor,
            catalog,
            instance: OnceLock::new(),
        }
    }

    /// The provider this factory stands for.
    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    /// Returns true once instantiation has been attempted, successful or not.
    pub fn is_instantiated(&self) -> bool {
        self.instance.get().is_some()
    }

    fn instance(&self) -> &Arc<F> {
        self.instance.get_or_init(|| {
            match self.catalog.instantiate(&self.descriptor.class) {
                Ok(factory) => {
                    debug!(
                        class = %self.descriptor.class,
                        contributor = %self.descriptor.contributor,
                        "provider factory instantiated"
                    );
                    factory
                }
                Err(err) => {
                    warn!(
                        class = %self.descriptor.class,
                        contributor = %self.descriptor.contributor,
                        error = %err,
                        "unable to instantiate provider factory"
                    );
                    F::noop()
                }
            }
        })
    }
}

impl<F: ?Sized> fmt::Debug for LazyFactory<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFactory")
            .field("descriptor", &self.descriptor)
            .field("instantiated", &self.instance.get().is_some())
            .finish()
    }
}

impl<C: ?Sized + 'static, T: 'static> Factory<C> for LazyFactory<dyn Factory<C, Output = T>> {
    type Output = T;

    fn create(&self, id: &str, context: &C) -> Result<Option<T>, FactoryError> {
        self.instance().create(id, context)
    }
}

impl<C: ?Sized + 'static> AdapterFactory<C> for LazyFactory<dyn AdapterFactory<C>> {
    fn adapter(
        &self,
        widget_id: &str,
        adapter_type: AdapterType,
        environment: &C,
    ) -> Result<Option<Adapter>, FactoryError> {
        self.instance().adapter(widget_id, adapter_type, environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, FnFactory};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    type WidgetFactory = dyn Factory<Environment, Output = String>;

    fn descriptor(class: &str) -> ProviderDescriptor {
        ProviderDescriptor::new("org.example.widgets", class, "a, b")
    }

    #[test]
    fn test_descriptor_parses_ids() {
        let d = ProviderDescriptor::new("c", "k", " one,two ,, three ");
        assert_eq!(d.ids, vec!["one", "two", "three"]);
        assert_eq!(d.key().to_string(), "c/k");
    }

    #[test]
    fn test_descriptor_from_config() {
        let config = ProviderConfig {
            contributor: "org.example".into(),
            class: "wizard".into(),
            ids: "w1,w2".into(),
        };
        let d = ProviderDescriptor::from(&config);
        assert_eq!(d.ids, vec!["w1", "w2"]);
        assert_eq!(
            d.key(),
            ProviderKey {
                contributor: "org.example".into(),
                class: "wizard".into()
            }
        );
    }

    #[test]
    fn test_instantiates_once_on_first_use() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        let catalog: Arc<Catalog<WidgetFactory>> = Arc::new(Catalog::new().with("echo", || {
            BUILT.fetch_add(1, Ordering::SeqCst);
            let factory: Arc<WidgetFactory> =
                Arc::new(FnFactory::new(|id: &str, _env: &Environment| Ok(Some(id.to_uppercase()))));
            Ok(factory)
        }));

        let lazy = LazyFactory::new(descriptor("echo"), catalog);
        assert!(!lazy.is_instantiated());
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);

        let env = Environment::new();
        assert_eq!(lazy.create("a", &env).unwrap(), Some("A".to_string()));
        assert_eq!(lazy.create("b", &env).unwrap(), Some("B".to_string()));

        assert!(lazy.is_instantiated());
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_failed_instantiation_degrades_to_noop() {
        let catalog: Arc<Catalog<WidgetFactory>> = Arc::new(Catalog::new());
        let lazy = LazyFactory::new(descriptor("ghost"), catalog);

        assert_eq!(lazy.create("a", &Environment::new()).unwrap(), None);
        assert!(lazy.is_instantiated());
        assert!(logs_contain("unable to instantiate provider factory"));
        assert!(logs_contain("unknown factory class 'ghost'"));
    }

    #[test]
    fn test_adapter_kind_noop_declines() {
        let catalog: Arc<Catalog<dyn AdapterFactory<Environment>>> = Arc::new(Catalog::new());
        let lazy = LazyFactory::new(descriptor("ghost"), catalog);

        let adapter = lazy
            .adapter("a", AdapterType::of::<String>(), &Environment::new())
            .unwrap();
        assert!(adapter.is_none());
    }
}
