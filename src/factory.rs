//! Factory traits and the small factory implementations shipped with the crate.
//!
//! A [`Factory`] produces an instance for an identifier in some context. An
//! [`AdapterFactory`] produces a type-erased adapter for an identifier; the caller
//! names the adapter type it wants and the registry downcasts the result.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::FactoryError;

/// Produces instances for identifiers.
///
/// Returning `Ok(None)` means the factory has nothing for that identifier. This is
/// not an error; the registry reports it to the caller as "not found".
pub trait Factory<C: ?Sized>: Send + Sync {
    type Output;

    fn create(&self, id: &str, context: &C) -> Result<Option<Self::Output>, FactoryError>;
}

/// A type-erased adapter produced by an [`AdapterFactory`].
pub type Adapter = Arc<dyn Any + Send + Sync>;

/// The adapter type requested from an [`AdapterFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdapterType {
    id: TypeId,
    name: &'static str,
}

impl AdapterType {
    /// The adapter type `A`.
    ///
    /// ```rust
    /// use factory_registry::AdapterType;
    ///
    /// let ty = AdapterType::of::<String>();
    /// assert!(ty.is::<String>());
    /// ```
    pub fn of<A: Any>() -> Self {
        Self {
            id: TypeId::of::<A>(),
            name: std::any::type_name::<A>(),
        }
    }

    /// The `TypeId` of the requested type.
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if this is the adapter type `A`.
    pub fn is<A: Any>(&self) -> bool {
        self.id == TypeId::of::<A>()
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Produces adapters of a requested type for widget identifiers.
pub trait AdapterFactory<C: ?Sized>: Send + Sync {
    fn adapter(
        &self,
        widget_id: &str,
        adapter_type: AdapterType,
        environment: &C,
    ) -> Result<Option<Adapter>, FactoryError>;
}

/// Adapts a closure into a [`Factory`].
///
/// # Examples
///
/// ```rust
/// use factory_registry::{Factory, FnFactory};
///
/// let factory = FnFactory::new(|id: &str, _ctx: &()| Ok(Some(id.len())));
/// assert_eq!(factory.create("abc", &()).unwrap(), Some(3));
/// ```
pub struct FnFactory<F, T> {
    func: F,
    _output: PhantomData<fn() -> T>,
}

impl<F, T> FnFactory<F, T> {
    /// Wraps `func`, called with the identifier and the lookup context.
    pub fn new<C>(func: F) -> Self
    where
        C: ?Sized,
        F: Fn(&str, &C) -> Result<Option<T>, FactoryError> + Send + Sync,
    {
        Self {
            func,
            _output: PhantomData,
        }
    }
}

impl<C, T, F> Factory<C> for FnFactory<F, T>
where
    C: ?Sized,
    F: Fn(&str, &C) -> Result<Option<T>, FactoryError> + Send + Sync,
{
    type Output = T;

    fn create(&self, id: &str, context: &C) -> Result<Option<T>, FactoryError> {
        (self.func)(id, context)
    }
}

impl<F, T> fmt::Debug for FnFactory<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFactory")
            .field("output", &std::any::type_name::<T>())
            .finish()
    }
}

/// A factory that declines every identifier.
///
/// Used in place of a provider factory that could not be instantiated.
#[derive(Debug, Clone, Copy)]
pub struct NoopFactory<T> {
    _output: PhantomData<fn() -> T>,
}

impl<T> NoopFactory<T> {
    /// Creates the factory.
    pub fn new() -> Self {
        Self {
            _output: PhantomData,
        }
    }
}

impl<T> Default for NoopFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized, T> Factory<C> for NoopFactory<T> {
    type Output = T;

    fn create(&self, _id: &str, _context: &C) -> Result<Option<T>, FactoryError> {
        Ok(None)
    }
}

impl<C: ?Sized, T> AdapterFactory<C> for NoopFactory<T> {
    fn adapter(
        &self,
        _widget_id: &str,
        _adapter_type: AdapterType,
        _environment: &C,
    ) -> Result<Option<Adapter>, FactoryError> {
        Ok(None)
    }
}
