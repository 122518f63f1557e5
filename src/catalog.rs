//! Named constructors for provider factories.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::FactoryError;

/// Builds a factory instance of kind `F`.
pub type Constructor<F> = dyn Fn() -> Result<Arc<F>, FactoryError> + Send + Sync;

/// Maps implementation class names to constructors.
///
/// A provider descriptor only names its implementation; the catalog turns that
/// name into a live factory when the provider is first used.
///
/// # Examples
///
/// ```rust
/// use factory_registry::{Catalog, Environment, Factory, FnFactory};
/// use std::sync::Arc;
///
/// type WidgetFactory = dyn Factory<Environment, Output = String>;
///
/// let catalog: Catalog<WidgetFactory> = Catalog::new().with("echo", || {
///     let factory: Arc<WidgetFactory> =
///         Arc::new(FnFactory::new(|id: &str, _env: &Environment| Ok(Some(id.to_string()))));
///     Ok(factory)
/// });
///
/// assert!(catalog.contains("echo"));
/// assert!(catalog.instantiate("missing").is_err());
/// ```
pub struct Catalog<F: ?Sized> {
    constructors: HashMap<String, Box<Constructor<F>>>,
}

impl<F: ?Sized> Catalog<F> {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Adds a constructor, builder style.
    pub fn with(
        mut self,
        class: impl Into<String>,
        constructor: impl Fn() -> Result<Arc<F>, FactoryError> + Send + Sync + 'static,
    ) -> Self {
        self.insert(class, constructor);
        self
    }

    /// Adds a constructor. Returns true if one was already present for `class`.
    pub fn insert(
        &mut self,
        class: impl Into<String>,
        constructor: impl Fn() -> Result<Arc<F>, FactoryError> + Send + Sync + 'static,
    ) -> bool {
        self.constructors
            .insert(class.into(), Box::new(constructor))
            .is_some()
    }

    /// Returns true if a constructor is known for `class`.
    pub fn contains(&self, class: &str) -> bool {
        self.constructors.contains_key(class)
    }

    /// Known class names, sorted.
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }

    /// Runs the constructor registered for `class`.
    pub fn instantiate(&self, class: &str) -> Result<Arc<F>, FactoryError> {
        let constructor = self
            .constructors
            .get(class)
            .ok_or_else(|| FactoryError::new(format!("unknown factory class '{class}'")))?;
        constructor()
    }
}

impl<F: ?Sized> Default for Catalog<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Catalog<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("classes", &self.classes())
            .finish()
    }
}
