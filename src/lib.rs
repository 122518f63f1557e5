//! # Factory Registry
//!
//! A thread-safe registry mapping string identifiers to pluggable factories.
//! Providers attach and detach at runtime; lookups resolve an identifier to a
//! factory and ask it for an instance in a caller-supplied context.
//!
//! ## Quick Start
//!
//! ```rust
//! use factory_registry::{Environment, Factory, FactoryRegistry, FnFactory};
//! use std::sync::Arc;
//!
//! let registry: FactoryRegistry<Environment, String> = FactoryRegistry::new();
//!
//! let factory: Arc<dyn Factory<Environment, Output = String>> =
//!     Arc::new(FnFactory::new(|id: &str, env: &Environment| {
//!         Ok(Some(format!("{id} for {}", env.principal().unwrap_or("guest"))))
//!     }));
//! registry.register_factory(factory, ["dashboard"]).unwrap();
//!
//! let env = Environment::new().with_principal("admin");
//! let widget = registry.lookup("dashboard", &env).unwrap();
//! assert_eq!(widget.as_deref(), Some("dashboard for admin"));
//! ```
//!
//! ## Features
//!
//! - **Thread-safe**: lookups read an immutable snapshot; updates swap it whole
//! - **Conflict policy**: reject or replace identifiers claimed by another factory
//! - **Fallback chaining**: a default factory, which may itself be a registry
//! - **Adapters**: typed adapter lookup over type-erased adapter factories
//! - **Providers**: lazily instantiated factories kept in sync by a tracker
//! - **Tracing support**: `tracing` logs plus an optional per-registry callback
//!
//! ## Main Types
//!
//! - [`Registry`] - identifier to factory bindings, with [`FactoryRegistry`] and
//!   [`AdapterRegistry`] aliases
//! - [`Factory`] / [`AdapterFactory`] - what providers implement
//! - [`ProviderTracker`] - turns provider add/remove notifications into registry calls
//! - [`RegistryConfig`] - TOML configuration
//! - [`define_registry!`] - process-wide registries

mod catalog;
mod config;
mod environment;
mod factory;
mod macros;
mod provider;
mod registry;
mod registry_error;
mod registry_event;
mod tracker;

// Re-export the main public API
pub use catalog::{Catalog, Constructor};
pub use config::{split_ids, ConfigError, ProviderConfig, RegistryConfig};
pub use environment::Environment;
pub use factory::{Adapter, AdapterFactory, AdapterType, Factory, FnFactory, NoopFactory};
pub use provider::{FactoryKind, LazyFactory, ProviderDescriptor, ProviderKey};
pub use registry::{
    AdapterRegistry, ConflictPolicy, FactoryRegistry, Registry, TraceCallback, MAX_CHAIN_DEPTH,
};
pub use registry_error::{FactoryError, RegistryError};
pub use registry_event::RegistryEvent;
pub use tracker::ProviderTracker;
