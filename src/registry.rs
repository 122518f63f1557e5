//! A thread-safe registry binding string identifiers to factories.
//!
//! Bindings are held in an immutable snapshot. Lookups clone the current snapshot
//! pointer and release the lock before any factory code runs; registrations build
//! a new snapshot and swap it in. A lookup therefore always observes either the
//! state before or after a concurrent update, never a mix of both.
//!
//! # Examples
//!
//! ```
//! use factory_registry::{Environment, FactoryRegistry, FnFactory, Factory};
//! use std::sync::Arc;
//!
//! let registry: FactoryRegistry<Environment, String> = FactoryRegistry::new();
//!
//! let greeter: Arc<dyn Factory<Environment, Output = String>> =
//!     Arc::new(FnFactory::new(|id: &str, _env: &Environment| Ok(Some(format!("widget:{id}")))));
//! registry.register_factory(greeter.clone(), ["a", "b"]).unwrap();
//!
//! let env = Environment::new();
//! assert_eq!(registry.lookup("a", &env).unwrap(), Some("widget:a".to_string()));
//! assert_eq!(registry.lookup("c", &env).unwrap(), None);
//!
//! registry.unregister_factory(&greeter);
//! assert_eq!(registry.lookup("a", &env).unwrap(), None);
//! ```

use std::cell::Cell;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::factory::{Adapter, AdapterFactory, AdapterType, Factory};
use crate::{FactoryError, RegistryConfig, RegistryError, RegistryEvent};

/// Type alias for the user-supplied tracing callback.
///
/// The callback receives every [`RegistryEvent`] emitted by the registry it is
/// installed on. It runs after the storage lock has been released.
pub type TraceCallback = dyn Fn(&RegistryEvent<'_>) + Send + Sync + 'static;

/// A registry of [`Factory`] implementations producing `T` from context `C`.
pub type FactoryRegistry<C, T> = Registry<dyn Factory<C, Output = T>>;

/// A registry of [`AdapterFactory`] implementations working on environment `C`.
pub type AdapterRegistry<C> = Registry<dyn AdapterFactory<C>>;

/// What happens when an identifier is registered while bound to another factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Fail with [`RegistryError::RegistrationConflict`], leaving the registry unchanged.
    #[default]
    Reject,
    /// Move the identifier to the new factory.
    Replace,
}

/// How many registries a single lookup may pass through via default factories.
pub const MAX_CHAIN_DEPTH: usize = 32;

thread_local! {
    static CHAIN_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts one registry hop of a chained lookup on the current thread.
struct ChainHop;

impl ChainHop {
    fn enter() -> Result<Self, FactoryError> {
        let depth = CHAIN_DEPTH.with(|depth| {
            let next = depth.get() + 1;
            depth.set(next);
            next
        });
        let hop = ChainHop;
        if depth > MAX_CHAIN_DEPTH {
            return Err(FactoryError::new(format!(
                "default factory chain deeper than {MAX_CHAIN_DEPTH} registries"
            )));
        }
        Ok(hop)
    }
}

impl Drop for ChainHop {
    fn drop(&mut self) {
        CHAIN_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Identity of a registered factory: the address of its shared allocation.
///
/// Stable for as long as the registry holds the `Arc`.
fn factory_key<F: ?Sized>(factory: &Arc<F>) -> usize {
    Arc::as_ptr(factory) as *const () as usize
}

struct Bindings<F: ?Sized> {
    by_id: HashMap<String, Arc<F>>,
    // never holds an empty set
    by_factory: HashMap<usize, BTreeSet<String>>,
    default_factory: Option<Arc<F>>,
}

impl<F: ?Sized> Default for Bindings<F> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_factory: HashMap::new(),
            default_factory: None,
        }
    }
}

impl<F: ?Sized> Clone for Bindings<F> {
    fn clone(&self) -> Self {
        Self {
            by_id: self.by_id.clone(),
            by_factory: self.by_factory.clone(),
            default_factory: self.default_factory.clone(),
        }
    }
}

/// Maps identifiers to factories of kind `F`.
///
/// `F` is usually a trait object such as `dyn Factory<C, Output = T>` (see
/// [`FactoryRegistry`]) or `dyn AdapterFactory<C>` (see [`AdapterRegistry`]).
/// A factory may be bound to many identifiers; an identifier is bound to at most
/// one factory. An optional default factory answers identifiers nobody claimed.
pub struct Registry<F: ?Sized> {
    bindings: Mutex<Arc<Bindings<F>>>,
    policy: ConflictPolicy,
    trace: Mutex<Option<Arc<TraceCallback>>>,
}

impl<F: ?Sized> Registry<F> {
    /// Creates an empty registry that rejects conflicting registrations.
    pub fn new() -> Self {
        Self::with_policy(ConflictPolicy::default())
    }

    /// Creates an empty registry handling conflicting registrations per `policy`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use factory_registry::{ConflictPolicy, FactoryRegistry};
    ///
    /// let registry: FactoryRegistry<(), u32> = FactoryRegistry::with_policy(ConflictPolicy::Replace);
    /// assert_eq!(registry.policy(), ConflictPolicy::Replace);
    /// ```
    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self {
            bindings: Mutex::new(Arc::new(Bindings::default())),
            policy,
            trace: Mutex::new(None),
        }
    }

    /// Creates an empty registry configured by `config`.
    ///
    /// Providers listed in the configuration are not registered here; hand the
    /// registry to a [`ProviderTracker`](crate::ProviderTracker) for that.
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::with_policy(config.conflict_policy)
    }

    /// The conflict policy chosen at construction.
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    // ---------------------------------------------------------------------------------------------
    // Tracing
    // ---------------------------------------------------------------------------------------------

    /// Sets a tracing callback invoked for every operation on this registry.
    ///
    /// The callback may call back into the registry; no registry lock is held
    /// while it runs.
    pub fn set_trace_callback(&self, callback: impl Fn(&RegistryEvent<'_>) + Send + Sync + 'static) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = Some(Arc::new(callback));
    }

    /// Clears the tracing callback.
    pub fn clear_trace_callback(&self) {
        let mut guard = self.trace.lock().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    fn emit_event(&self, event: &RegistryEvent<'_>) {
        let callback = self
            .trace
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------------------------------

    fn snapshot(&self) -> Arc<Bindings<F>> {
        // Snapshots are replaced whole, so a poisoned lock still guards a consistent value.
        self.bindings
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Applies `change` to a copy of the current bindings and publishes the copy
    /// if `change` succeeds. Writers are serialized by the lock.
    fn update<R>(
        &self,
        change: impl FnOnce(&mut Bindings<F>) -> Result<R, RegistryError>,
    ) -> Result<R, RegistryError> {
        let mut guard = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        let mut next = Bindings::clone(&guard);
        let result = change(&mut next)?;
        *guard = Arc::new(next);
        Ok(result)
    }

    /// Applies `change` to a copy of the current bindings and publishes the copy.
    fn replace_with<R>(&self, change: impl FnOnce(&mut Bindings<F>) -> R) -> R {
        let mut guard = self.bindings.lock().unwrap_or_else(|p| p.into_inner());
        let mut next = Bindings::clone(&guard);
        let result = change(&mut next);
        *guard = Arc::new(next);
        result
    }

    // ---------------------------------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------------------------------

    /// Binds `factory` to every identifier in `ids`.
    ///
    /// If the factory is already registered its identifier set is replaced by
    /// `ids`; identifiers no longer listed are released. An identifier bound to a
    /// different factory is handled according to the registry's
    /// [`ConflictPolicy`]. Under [`ConflictPolicy::Reject`] nothing changes when
    /// any identifier conflicts.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NoIdentifiers`] if `ids` is empty
    /// - [`RegistryError::InvalidIdentifier`] if an identifier is the empty string
    /// - [`RegistryError::RegistrationConflict`] on conflict under `Reject`
    pub fn register_factory<I>(&self, factory: Arc<F>, ids: I) -> Result<(), RegistryError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut wanted = BTreeSet::new();
        for id in ids {
            let id = id.as_ref();
            if id.is_empty() {
                return Err(RegistryError::InvalidIdentifier { id: id.to_string() });
            }
            wanted.insert(id.to_string());
        }
        if wanted.is_empty() {
            return Err(RegistryError::NoIdentifiers);
        }

        let key = factory_key(&factory);
        let policy = self.policy;

        let replaced = self.update(|bindings| {
            let mut replaced = Vec::new();
            for id in &wanted {
                if let Some(owner) = bindings.by_id.get(id) {
                    if factory_key(owner) != key {
                        match policy {
                            ConflictPolicy::Reject => {
                                return Err(RegistryError::RegistrationConflict { id: id.clone() })
                            }
                            ConflictPolicy::Replace => replaced.push(id.clone()),
                        }
                    }
                }
            }

            if let Some(previous) = bindings.by_factory.remove(&key) {
                for id in previous.difference(&wanted) {
                    bindings.by_id.remove(id);
                }
            }

            for id in &replaced {
                let Some(owner) = bindings.by_id.get(id).map(factory_key) else {
                    continue;
                };
                if let Some(owned) = bindings.by_factory.get_mut(&owner) {
                    owned.remove(id);
                    if owned.is_empty() {
                        bindings.by_factory.remove(&owner);
                    }
                }
            }

            for id in &wanted {
                bindings.by_id.insert(id.clone(), Arc::clone(&factory));
            }
            bindings.by_factory.insert(key, wanted.clone());

            Ok(replaced)
        })?;

        let ids: Vec<String> = wanted.into_iter().collect();
        debug!(ids = ?ids, replaced = ?replaced, "factory registered");
        self.emit_event(&RegistryEvent::Register {
            ids: &ids,
            replaced: &replaced,
        });

        Ok(())
    }

    /// Removes every binding pointing to `factory` and returns the released
    /// identifiers, sorted.
    ///
    /// Does nothing if the factory was never registered with this registry.
    pub fn unregister_factory(&self, factory: &Arc<F>) -> Vec<String> {
        let key = factory_key(factory);

        let released = if self.snapshot().by_factory.contains_key(&key) {
            self.replace_with(|bindings| {
                let Some(ids) = bindings.by_factory.remove(&key) else {
                    return Vec::new();
                };
                for id in &ids {
                    bindings.by_id.remove(id);
                }
                ids.into_iter().collect()
            })
        } else {
            Vec::new()
        };

        if !released.is_empty() {
            debug!(ids = ?released, "factory unregistered");
        }
        self.emit_event(&RegistryEvent::Unregister { ids: &released });

        released
    }

    /// Sets (or with `None`, removes) the factory consulted for identifiers no
    /// factory is bound to.
    ///
    /// The default may be another registry. Chains are not checked for cycles
    /// here; a lookup that passes through more than [`MAX_CHAIN_DEPTH`]
    /// registries fails with [`RegistryError::Factory`] instead.
    pub fn set_default_factory(&self, factory: Option<Arc<F>>) {
        let set = factory.is_some();
        self.replace_with(|bindings| bindings.default_factory = factory);
        debug!(set, "default factory changed");
        self.emit_event(&RegistryEvent::DefaultFactory { set });
    }

    /// The current fallback factory, if any.
    pub fn default_factory(&self) -> Option<Arc<F>> {
        self.snapshot().default_factory.clone()
    }

    /// Removes all bindings. The default factory is kept.
    pub fn clear(&self) {
        self.emit_event(&RegistryEvent::Clear {});

        self.replace_with(|bindings| {
            bindings.by_id.clear();
            bindings.by_factory.clear();
        });
    }

    // ---------------------------------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------------------------------

    /// Returns the factory bound to `id`, falling back to the default factory.
    pub fn lookup_factory(&self, id: &str) -> Option<Arc<F>> {
        let bindings = self.snapshot();

        let (factory, fallback) = match bindings.by_id.get(id) {
            Some(factory) => (Some(Arc::clone(factory)), false),
            None => (bindings.default_factory.clone(), true),
        };
        let found = factory.is_some();
        let fallback = found && fallback;

        self.emit_event(&RegistryEvent::Lookup {
            id,
            found,
            fallback,
        });

        factory
    }

    /// Returns true if a factory is bound to `id`. The default factory is not considered.
    pub fn contains(&self, id: &str) -> bool {
        let found = self.snapshot().by_id.contains_key(id);
        self.emit_event(&RegistryEvent::Contains { id, found });
        found
    }

    /// Returns true if `factory` is bound to at least one identifier.
    pub fn is_registered(&self, factory: &Arc<F>) -> bool {
        self.snapshot()
            .by_factory
            .contains_key(&factory_key(factory))
    }

    /// All bound identifiers, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshot().by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The identifiers bound to `factory`, sorted.
    pub fn ids_of(&self, factory: &Arc<F>) -> Vec<String> {
        self.snapshot()
            .by_factory
            .get(&factory_key(factory))
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct registered factories.
    pub fn factory_count(&self) -> usize {
        self.snapshot().by_factory.len()
    }

    /// Number of bound identifiers.
    pub fn len(&self) -> usize {
        self.snapshot().by_id.len()
    }

    /// Returns true if no identifier is bound.
    pub fn is_empty(&self) -> bool {
        self.snapshot().by_id.is_empty()
    }
}

impl<F: ?Sized> Default for Registry<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings = self.snapshot();
        f.debug_struct("Registry")
            .field("policy", &self.policy)
            .field("ids", &bindings.by_id.len())
            .field("factories", &bindings.by_factory.len())
            .field("default_factory", &bindings.default_factory.is_some())
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------
// Factory lookup
// -------------------------------------------------------------------------------------------------

impl<C: ?Sized, T> Registry<dyn Factory<C, Output = T>> {
    /// Resolves `id` and asks the resolved factory for an instance.
    ///
    /// Returns `Ok(None)` when no factory resolves or the factory has nothing for
    /// `id`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::Factory`] if the factory fails. The failure is not retried.
    pub fn lookup(&self, id: &str, context: &C) -> Result<Option<T>, RegistryError> {
        let Some(factory) = self.lookup_factory(id) else {
            return Ok(None);
        };

        factory.create(id, context).map_err(|source| {
            debug!(id, error = %source, "factory failed");
            RegistryError::Factory {
                id: id.to_string(),
                source,
            }
        })
    }
}

/// A registry is itself a factory, so it can be the default factory of another
/// registry.
impl<C: ?Sized, T> Factory<C> for Registry<dyn Factory<C, Output = T>> {
    type Output = T;

    fn create(&self, id: &str, context: &C) -> Result<Option<T>, FactoryError> {
        let _hop = ChainHop::enter()?;
        self.lookup(id, context).map_err(|err| match err {
            RegistryError::Factory { source, .. } => source,
            other => FactoryError::from_source(other),
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Adapter lookup
// -------------------------------------------------------------------------------------------------

impl<C: ?Sized> Registry<dyn AdapterFactory<C>> {
    /// Resolves `widget_id` and asks the resolved factory for an adapter of
    /// `adapter_type`.
    pub fn adapter(
        &self,
        widget_id: &str,
        adapter_type: AdapterType,
        environment: &C,
    ) -> Result<Option<Adapter>, RegistryError> {
        let Some(factory) = self.lookup_factory(widget_id) else {
            return Ok(None);
        };

        factory
            .adapter(widget_id, adapter_type, environment)
            .map_err(|source| {
                debug!(widget_id, adapter = %adapter_type, error = %source, "adapter factory failed");
                RegistryError::Factory {
                    id: widget_id.to_string(),
                    source,
                }
            })
    }

    /// Returns the adapter of type `A` for `widget_id`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Factory`] if the adapter factory fails
    /// - [`RegistryError::TypeMismatch`] if the factory answered with another type
    pub fn get_adapter<A: Send + Sync + 'static>(
        &self,
        widget_id: &str,
        environment: &C,
    ) -> Result<Option<Arc<A>>, RegistryError> {
        let Some(adapter) = self.adapter(widget_id, AdapterType::of::<A>(), environment)? else {
            return Ok(None);
        };

        adapter
            .downcast::<A>()
            .map(Some)
            .map_err(|_| RegistryError::TypeMismatch {
                id: widget_id.to_string(),
                type_name: std::any::type_name::<A>(),
            })
    }
}

impl<C: ?Sized> AdapterFactory<C> for Registry<dyn AdapterFactory<C>> {
    fn adapter(
        &self,
        widget_id: &str,
        adapter_type: AdapterType,
        environment: &C,
    ) -> Result<Option<Adapter>, FactoryError> {
        let _hop = ChainHop::enter()?;
        Registry::adapter(self, widget_id, adapter_type, environment).map_err(|err| match err {
            RegistryError::Factory { source, .. } => source,
            other => FactoryError::from_source(other),
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Environment, FnFactory};
    use std::sync::Mutex as StdMutex;

    type WidgetFactory = dyn Factory<Environment, Output = String>;

    fn labeled(label: &'static str) -> Arc<WidgetFactory> {
        Arc::new(FnFactory::new(move |id: &str, _env: &Environment| {
            Ok(Some(format!("{label}:{id}")))
        }))
    }

    fn failing() -> Arc<WidgetFactory> {
        Arc::new(FnFactory::new(|_id: &str, _env: &Environment| {
            Err(FactoryError::new("template missing"))
        }))
    }

    #[test]
    fn test_register_and_lookup() -> Result<(), RegistryError> {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let env = Environment::new();

        registry.register_factory(labeled("f1"), ["a", "b"])?;

        assert_eq!(registry.lookup("a", &env)?, Some("f1:a".to_string()));
        assert_eq!(registry.lookup("b", &env)?, Some("f1:b".to_string()));
        assert_eq!(registry.lookup("c", &env)?, None);

        Ok(())
    }

    #[test]
    fn test_unregister_releases_all_ids() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let env = Environment::new();
        let f1 = labeled("f1");

        registry.register_factory(f1.clone(), ["a", "b"]).unwrap();
        let released = registry.unregister_factory(&f1);

        assert_eq!(released, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.lookup("a", &env).unwrap(), None);
        assert_eq!(registry.lookup("b", &env).unwrap(), None);
        assert!(registry.is_empty());
        assert_eq!(registry.factory_count(), 0);
    }

    #[test]
    fn test_unregister_unknown_factory_is_noop() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let f1 = labeled("f1");
        registry.register_factory(f1.clone(), ["a"]).unwrap();

        let released = registry.unregister_factory(&labeled("stranger"));

        assert!(released.is_empty());
        assert!(registry.contains("a"));
        assert!(registry.is_registered(&f1));
    }

    #[test]
    fn test_conflict_rejected_without_partial_update() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let env = Environment::new();

        registry.register_factory(labeled("f1"), ["b"]).unwrap();
        let f2 = labeled("f2");
        let err = registry
            .register_factory(f2.clone(), ["a", "b", "c"])
            .unwrap_err();

        assert!(matches!(err, RegistryError::RegistrationConflict { ref id } if id == "b"));
        assert!(!registry.contains("a"));
        assert!(!registry.contains("c"));
        assert!(!registry.is_registered(&f2));
        assert_eq!(registry.lookup("b", &env).unwrap(), Some("f1:b".to_string()));
    }

    #[test]
    fn test_conflict_replaced_moves_ids() {
        let registry: FactoryRegistry<Environment, String> =
            Registry::with_policy(ConflictPolicy::Replace);
        let env = Environment::new();
        let f1 = labeled("f1");
        let f2 = labeled("f2");

        registry.register_factory(f1.clone(), ["a", "b"]).unwrap();
        registry.register_factory(f2.clone(), ["b", "c"]).unwrap();

        assert_eq!(registry.lookup("a", &env).unwrap(), Some("f1:a".to_string()));
        assert_eq!(registry.lookup("b", &env).unwrap(), Some("f2:b".to_string()));
        assert_eq!(registry.ids_of(&f1), vec!["a".to_string()]);
        assert_eq!(registry.ids_of(&f2), vec!["b".to_string(), "c".to_string()]);

        // unregistering the old owner must not release the moved id
        registry.unregister_factory(&f1);
        assert_eq!(registry.lookup("b", &env).unwrap(), Some("f2:b".to_string()));
    }

    #[test]
    fn test_replaced_owner_without_ids_is_dropped() {
        let registry: FactoryRegistry<Environment, String> =
            Registry::with_policy(ConflictPolicy::Replace);
        let f1 = labeled("f1");

        registry.register_factory(f1.clone(), ["a"]).unwrap();
        registry.register_factory(labeled("f2"), ["a"]).unwrap();

        assert!(!registry.is_registered(&f1));
        assert_eq!(registry.factory_count(), 1);
    }

    #[test]
    fn test_reregistration_replaces_id_set() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let f1 = labeled("f1");

        registry.register_factory(f1.clone(), ["a", "b"]).unwrap();
        registry.register_factory(f1.clone(), ["b", "c"]).unwrap();

        assert_eq!(registry.ids(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(registry.factory_count(), 1);
    }

    #[test]
    fn test_invalid_registrations() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();

        let none: [&str; 0] = [];
        assert!(matches!(
            registry.register_factory(labeled("f"), none),
            Err(RegistryError::NoIdentifiers)
        ));
        assert!(matches!(
            registry.register_factory(labeled("f"), ["ok", ""]),
            Err(RegistryError::InvalidIdentifier { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_identifiers_are_opaque() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let env = Environment::new();

        registry.register_factory(labeled("f"), [" ", " padded "]).unwrap();

        assert_eq!(registry.lookup(" ", &env).unwrap(), Some("f: ".to_string()));
        assert_eq!(registry.lookup("padded", &env).unwrap(), None);
        assert!(registry.contains(" padded "));
    }

    #[test]
    fn test_factory_error_surfaces() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        registry.register_factory(failing(), ["broken"]).unwrap();

        let err = registry.lookup("broken", &Environment::new()).unwrap_err();
        match err {
            RegistryError::Factory { id, source } => {
                assert_eq!(id, "broken");
                assert_eq!(source.message(), "template missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_factory_may_decline() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let picky: Arc<WidgetFactory> = Arc::new(FnFactory::new(|id: &str, _env: &Environment| {
            Ok((id == "known").then(|| "yes".to_string()))
        }));
        registry.register_factory(picky, ["known", "other"]).unwrap();

        let env = Environment::new();
        assert_eq!(registry.lookup("known", &env).unwrap(), Some("yes".to_string()));
        assert_eq!(registry.lookup("other", &env).unwrap(), None);
    }

    #[test]
    fn test_default_factory_serves_unbound_ids_only() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let env = Environment::new();

        registry.register_factory(labeled("bound"), ["a"]).unwrap();
        registry.set_default_factory(Some(labeled("default")));

        assert_eq!(registry.lookup("a", &env).unwrap(), Some("bound:a".to_string()));
        assert_eq!(registry.lookup("zzz", &env).unwrap(), Some("default:zzz".to_string()));
        assert!(!registry.contains("zzz"));

        registry.set_default_factory(None);
        assert_eq!(registry.lookup("zzz", &env).unwrap(), None);
    }

    #[test]
    fn test_registry_chains_to_parent() {
        let parent: Arc<FactoryRegistry<Environment, String>> = Arc::new(Registry::new());
        parent.register_factory(labeled("parent"), ["shared"]).unwrap();

        let child: FactoryRegistry<Environment, String> = Registry::new();
        child.register_factory(labeled("child"), ["local"]).unwrap();
        child.set_default_factory(Some(parent.clone() as Arc<WidgetFactory>));

        let env = Environment::new();
        assert_eq!(child.lookup("local", &env).unwrap(), Some("child:local".to_string()));
        assert_eq!(child.lookup("shared", &env).unwrap(), Some("parent:shared".to_string()));
        assert_eq!(child.lookup("nowhere", &env).unwrap(), None);
    }

    #[test]
    fn test_chained_factory_error_keeps_original_cause() {
        let parent: Arc<FactoryRegistry<Environment, String>> = Arc::new(Registry::new());
        parent.register_factory(failing(), ["broken"]).unwrap();

        let child: FactoryRegistry<Environment, String> = Registry::new();
        child.set_default_factory(Some(parent as Arc<WidgetFactory>));

        let err = child.lookup("broken", &Environment::new()).unwrap_err();
        assert!(matches!(err, RegistryError::Factory { ref source, .. } if source.message() == "template missing"));
    }

    #[test]
    fn test_cyclic_default_chain_fails_lookup() {
        let first: Arc<FactoryRegistry<Environment, String>> = Arc::new(Registry::new());
        let second: Arc<FactoryRegistry<Environment, String>> = Arc::new(Registry::new());
        first.register_factory(labeled("first"), ["bound"]).unwrap();
        first.set_default_factory(Some(second.clone() as Arc<WidgetFactory>));
        second.set_default_factory(Some(first.clone() as Arc<WidgetFactory>));

        let env = Environment::new();
        assert_eq!(first.lookup("bound", &env).unwrap(), Some("first:bound".to_string()));

        let err = first.lookup("unbound", &env).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Factory { ref source, .. } if source.message().contains("chain deeper than")
        ));

        // the hop counter unwinds after a failed lookup
        assert_eq!(second.lookup("bound", &env).unwrap(), Some("first:bound".to_string()));

        first.set_default_factory(None);
        second.set_default_factory(None);
    }

    #[test]
    fn test_factory_receives_environment() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let localized: Arc<WidgetFactory> = Arc::new(FnFactory::new(|id: &str, env: &Environment| {
            Ok(Some(format!("{id}@{}", env.locale().unwrap_or("en"))))
        }));
        registry.register_factory(localized, ["home"]).unwrap();

        let env = Environment::new().with_locale("fr");
        assert_eq!(registry.lookup("home", &env).unwrap(), Some("home@fr".to_string()));
    }

    #[test]
    fn test_clear_keeps_default_factory() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        registry.register_factory(labeled("f"), ["a", "b"]).unwrap();
        registry.set_default_factory(Some(labeled("default")));

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.factory_count(), 0);
        assert!(registry.default_factory().is_some());
    }

    #[test]
    fn test_adapter_lookup_and_downcast() {
        struct LabelProvider(&'static str);

        let registry: AdapterRegistry<Environment> = Registry::new();
        let factory: Arc<dyn AdapterFactory<Environment>> = Arc::new(LabelAdapters);
        registry.register_factory(factory, ["button"]).unwrap();

        struct LabelAdapters;
        impl AdapterFactory<Environment> for LabelAdapters {
            fn adapter(
                &self,
                _widget_id: &str,
                adapter_type: AdapterType,
                _environment: &Environment,
            ) -> Result<Option<Adapter>, FactoryError> {
                if adapter_type.is::<LabelProvider>() {
                    Ok(Some(Arc::new(LabelProvider("OK"))))
                } else if adapter_type.is::<u32>() {
                    // deliberately wrong type
                    Ok(Some(Arc::new("not a number")))
                } else {
                    Ok(None)
                }
            }
        }

        let env = Environment::new();
        let label = registry
            .get_adapter::<LabelProvider>("button", &env)
            .unwrap()
            .unwrap();
        assert_eq!(label.0, "OK");

        assert!(registry.get_adapter::<String>("button", &env).unwrap().is_none());
        assert!(registry
            .get_adapter::<LabelProvider>("unknown", &env)
            .unwrap()
            .is_none());
        assert!(matches!(
            registry.get_adapter::<u32>("button", &env),
            Err(RegistryError::TypeMismatch { type_name: "u32", .. })
        ));
    }

    #[test]
    fn test_thread_safety() {
        use std::thread;

        let registry: Arc<FactoryRegistry<Environment, String>> = Arc::new(Registry::new());
        let stable = labeled("stable");
        registry.register_factory(stable, ["a", "b"]).unwrap();

        let writers: Vec<_> = (0..4)
            .map(|n| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for round in 0..50 {
                        let factory = labeled("churn");
                        let id = format!("t{n}-{round}");
                        registry.register_factory(factory.clone(), [id.as_str()]).unwrap();
                        registry.unregister_factory(&factory);
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let env = Environment::new();
                    for _ in 0..200 {
                        assert_eq!(registry.lookup("a", &env).unwrap(), Some("stable:a".to_string()));
                        assert_eq!(registry.lookup("b", &env).unwrap(), Some("stable:b".to_string()));
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }

        assert_eq!(registry.ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.factory_count(), 1);
    }

    #[test]
    fn test_trace_callback_events() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let events = Arc::new(StdMutex::new(Vec::new()));
        let events_clone = events.clone();

        registry.set_trace_callback(move |e| {
            events_clone.lock().unwrap().push(e.to_string());
        });

        let f1 = labeled("f1");
        registry.register_factory(f1.clone(), ["b", "a"]).unwrap();
        let _ = registry.lookup("a", &Environment::new());
        let _ = registry.contains("z");
        registry.unregister_factory(&f1);
        registry.clear();

        let captured = events.lock().unwrap();
        assert_eq!(
            *captured,
            vec![
                "register { ids: [a, b], replaced: [] }",
                "lookup { id: a, found: true, fallback: false }",
                "contains { id: z, found: false }",
                "unregister { ids: [a, b] }",
                "Clearing the Registry",
            ]
        );
    }

    #[test]
    fn test_clear_trace_callback_stops_events() {
        let registry: FactoryRegistry<Environment, String> = Registry::new();
        let events = Arc::new(StdMutex::new(Vec::new()));
        let events_clone = events.clone();

        registry.set_trace_callback(move |e| {
            events_clone.lock().unwrap().push(e.to_string());
        });
        let _ = registry.contains("a");
        registry.clear_trace_callback();
        let _ = registry.contains("a");

        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_trace_callback_may_reenter() {
        let registry: Arc<FactoryRegistry<Environment, String>> = Arc::new(Registry::new());
        let inner = Arc::downgrade(&registry);
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();

        registry.set_trace_callback(move |e| {
            if let RegistryEvent::Register { .. } = e {
                if let Some(registry) = inner.upgrade() {
                    seen_clone.lock().unwrap().push(registry.len());
                }
            }
        });
        registry.register_factory(labeled("f"), ["a", "b"]).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_config_sets_policy() {
        let config = RegistryConfig {
            conflict_policy: ConflictPolicy::Replace,
            ..RegistryConfig::default()
        };
        let registry: FactoryRegistry<Environment, String> = Registry::from_config(&config);
        assert_eq!(registry.policy(), ConflictPolicy::Replace);
    }
}
