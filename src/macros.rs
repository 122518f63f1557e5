//! Macros for declaring process-wide registries.

/// Declares a module holding a process-wide [`Registry`](crate::Registry).
///
/// The macro generates a module containing:
/// - the registry static, created on first use (hidden)
/// - `registry()` returning the static, for lookups and queries
/// - free functions for registration and tracing
///
/// The factory type and policy are resolved inside the generated module, which
/// glob-imports its parent module. Inside function bodies (doc tests included)
/// use absolute paths.
/// An optional third argument sets the [`ConflictPolicy`](crate::ConflictPolicy).
///
/// # Examples
///
/// ```rust
/// use factory_registry::{define_registry, Environment, Factory, FnFactory};
/// use std::sync::Arc;
///
/// define_registry!(
///     widgets,
///     dyn factory_registry::Factory<factory_registry::Environment, Output = String>
/// );
///
/// let factory: Arc<dyn Factory<Environment, Output = String>> =
///     Arc::new(FnFactory::new(|id: &str, _env: &Environment| Ok(Some(id.to_string()))));
/// widgets::register_factory(factory.clone(), ["home"]).unwrap();
///
/// let widget = widgets::registry().lookup("home", &Environment::new()).unwrap();
/// assert_eq!(widget.as_deref(), Some("home"));
///
/// widgets::unregister_factory(&factory);
/// assert!(!widgets::contains("home"));
/// ```
///
/// # Multiple Registries
///
/// Each invocation creates an isolated registry:
///
/// ```rust
/// use factory_registry::{define_registry, ConflictPolicy, Factory, FnFactory};
/// use std::sync::Arc;
///
/// define_registry!(jobs, dyn factory_registry::Factory<(), Output = u32>);
/// define_registry!(
///     appenders,
///     dyn factory_registry::Factory<(), Output = u32>,
///     factory_registry::ConflictPolicy::Replace
/// );
///
/// let one: Arc<dyn Factory<(), Output = u32>> =
///     Arc::new(FnFactory::new(|_id: &str, _ctx: &()| Ok(Some(1))));
/// jobs::register_factory(one, ["cleanup"]).unwrap();
///
/// assert!(jobs::contains("cleanup"));
/// assert!(!appenders::contains("cleanup"));
/// assert_eq!(appenders::registry().policy(), ConflictPolicy::Replace);
/// ```
#[macro_export]
macro_rules! define_registry {
    ($name:ident, $factory:ty) => {
        $crate::define_registry!($name, $factory, $crate::ConflictPolicy::Reject);
    };
    ($name:ident, $factory:ty, $policy:expr) => {
        pub mod $name {
            #[allow(unused_imports)]
            use super::*;
            use std::sync::{Arc, LazyLock};

            // Registry storage (module-private)
            static REGISTRY: LazyLock<$crate::Registry<$factory>> =
                LazyLock::new(|| $crate::Registry::with_policy($policy));

            /// The registry behind this module.
            pub fn registry() -> &'static $crate::Registry<$factory> {
                &REGISTRY
            }

            /// Bind a factory to identifiers.
            pub fn register_factory<I>(
                factory: Arc<$factory>,
                ids: I,
            ) -> Result<(), $crate::RegistryError>
            where
                I: IntoIterator,
                I::Item: AsRef<str>,
            {
                REGISTRY.register_factory(factory, ids)
            }

            /// Remove every binding of a factory.
            pub fn unregister_factory(factory: &Arc<$factory>) -> Vec<String> {
                REGISTRY.unregister_factory(factory)
            }

            /// Resolve the factory for an identifier.
            pub fn lookup_factory(id: &str) -> Option<Arc<$factory>> {
                REGISTRY.lookup_factory(id)
            }

            /// Check if a factory is bound to an identifier.
            pub fn contains(id: &str) -> bool {
                REGISTRY.contains(id)
            }

            /// Set or remove the fallback factory.
            pub fn set_default_factory(factory: Option<Arc<$factory>>) {
                REGISTRY.set_default_factory(factory)
            }

            /// Set a tracing callback for registry operations.
            pub fn set_trace_callback(
                callback: impl Fn(&$crate::RegistryEvent<'_>) + Send + Sync + 'static,
            ) {
                REGISTRY.set_trace_callback(callback)
            }

            /// Clear the tracing callback.
            pub fn clear_trace_callback() {
                REGISTRY.clear_trace_callback()
            }
        }
    };
}
