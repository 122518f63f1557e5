//! Keeps a registry in sync with providers appearing and disappearing.
//!
//! The hosting environment reports provider lifecycle changes through
//! [`ProviderTracker::added`] and [`ProviderTracker::removed`]. Each provider is
//! wrapped in a [`LazyFactory`] and registered for the identifiers it declares.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::provider::{FactoryKind, LazyFactory, ProviderDescriptor, ProviderKey};
use crate::{Catalog, Registry, RegistryConfig, RegistryError};

/// Registers and unregisters provider factories as providers come and go.
///
/// A provider whose identifiers were all taken over by another provider (under
/// [`ConflictPolicy::Replace`](crate::ConflictPolicy::Replace)) is no longer
/// tracked and may be added again.
///
/// # Examples
///
/// ```rust
/// use factory_registry::{
///     Catalog, Environment, Factory, FnFactory, ProviderDescriptor, ProviderTracker, Registry,
/// };
/// use std::sync::Arc;
///
/// type WidgetFactory = dyn Factory<Environment, Output = String>;
///
/// let catalog: Arc<Catalog<WidgetFactory>> = Arc::new(Catalog::new().with("echo", || {
///     let factory: Arc<WidgetFactory> =
///         Arc::new(FnFactory::new(|id: &str, _env: &Environment| Ok(Some(id.to_string()))));
///     Ok(factory)
/// }));
/// let tracker = ProviderTracker::new(Arc::new(Registry::new()), catalog);
///
/// let provider = ProviderDescriptor::new("org.example", "echo", "home, about");
/// assert!(tracker.added(provider.clone()).unwrap());
/// assert!(tracker.registry().contains("about"));
///
/// tracker.removed(&provider.key());
/// assert!(tracker.registry().is_empty());
/// ```
pub struct ProviderTracker<F: ?Sized> {
    registry: Arc<Registry<F>>,
    catalog: Arc<Catalog<F>>,
    factories: Mutex<HashMap<ProviderKey, Arc<F>>>,
}

impl<F: FactoryKind + ?Sized> ProviderTracker<F> {
    /// Creates a tracker feeding `registry` with factories built from `catalog`.
    pub fn new(registry: Arc<Registry<F>>, catalog: Arc<Catalog<F>>) -> Self {
        Self {
            registry,
            catalog,
            factories: Mutex::new(HashMap::new()),
        }
    }

    /// The registry this tracker keeps in sync.
    pub fn registry(&self) -> &Arc<Registry<F>> {
        &self.registry
    }

    /// Registers a newly available provider.
    ///
    /// Returns `Ok(false)` if the provider declares no identifiers or is already
    /// tracked. A failed registration is logged and returned; the provider is
    /// not tracked afterwards, so a later `added` may retry it.
    ///
    /// No tracker lock is held while the registry runs its trace callback.
    pub fn added(&self, descriptor: ProviderDescriptor) -> Result<bool, RegistryError> {
        if descriptor.ids.is_empty() {
            debug!(provider = %descriptor.key(), "provider declares no identifiers");
            return Ok(false);
        }

        let key = descriptor.key();
        if self.is_tracked(&key) {
            return Ok(false);
        }

        let ids = descriptor.ids.clone();
        let factory = F::from_lazy(LazyFactory::new(descriptor, Arc::clone(&self.catalog)));
        if let Err(err) = self.registry.register_factory(Arc::clone(&factory), &ids) {
            warn!(provider = %key, error = %err, "failed to register provider factory");
            return Err(err);
        }
        debug!(provider = %key, ids = ?ids, "provider added");

        let previous = {
            let mut factories = self.lock_factories();
            let previous = factories.insert(key.clone(), factory);
            self.prune(&mut factories);
            previous
        };
        // another `added` for the same provider finished first; keep ours bound
        if let Some(previous) = previous {
            let released = self.registry.unregister_factory(&previous);
            debug!(provider = %key, ids = ?released, "superseded provider factory released");
        }

        Ok(true)
    }

    /// Returns true if `key` is tracked and its factory is still registered.
    /// Entries whose factory was displaced are dropped.
    fn is_tracked(&self, key: &ProviderKey) -> bool {
        let mut factories = self.lock_factories();
        match factories.get(key) {
            Some(factory) if self.registry.is_registered(factory) => true,
            Some(_) => {
                debug!(provider = %key, "provider was displaced, forgetting it");
                factories.remove(key);
                false
            }
            None => false,
        }
    }

    /// Drops providers whose factory no longer owns any identifier.
    fn prune(&self, factories: &mut HashMap<ProviderKey, Arc<F>>) {
        factories.retain(|key, factory| {
            let registered = self.registry.is_registered(factory);
            if !registered {
                debug!(provider = %key, "provider was displaced, forgetting it");
            }
            registered
        });
    }

    fn lock_factories(&self) -> MutexGuard<'_, HashMap<ProviderKey, Arc<F>>> {
        self.factories.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Unregisters a provider that went away. Returns the released identifiers.
    ///
    /// Does nothing for providers this tracker does not know.
    pub fn removed(&self, key: &ProviderKey) -> Vec<String> {
        let factory = self.lock_factories().remove(key);

        match factory {
            Some(factory) => {
                let released = self.registry.unregister_factory(&factory);
                debug!(provider = %key, ids = ?released, "provider removed");
                released
            }
            None => Vec::new(),
        }
    }

    /// Adds every provider declared in `config`. Returns how many were registered.
    ///
    /// Providers that fail to register are logged and skipped.
    pub fn load(&self, config: &RegistryConfig) -> usize {
        let mut registered = 0;
        for provider in &config.providers {
            if let Ok(true) = self.added(ProviderDescriptor::from(provider)) {
                registered += 1;
            }
        }
        registered
    }

    /// Keys of the tracked providers, sorted. Displaced providers are not listed.
    pub fn tracked(&self) -> Vec<ProviderKey> {
        let mut factories = self.lock_factories();
        self.prune(&mut factories);
        let mut keys: Vec<ProviderKey> = factories.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Unregisters every tracked provider.
    pub fn close(&self) {
        let factories: Vec<(ProviderKey, Arc<F>)> = self.lock_factories().drain().collect();

        for (key, factory) in factories {
            let released = self.registry.unregister_factory(&factory);
            debug!(provider = %key, ids = ?released, "provider closed");
        }
    }
}
