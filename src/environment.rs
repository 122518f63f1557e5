//! The lookup context handed to factories.

use std::collections::HashMap;

/// Describes where a looked-up instance is going to be used.
///
/// The rendering or execution layer fills in what it knows: the locale, the
/// authenticated principal and free-form attributes. Everything is optional.
///
/// # Examples
///
/// ```rust
/// use factory_registry::Environment;
///
/// let env = Environment::new()
///     .with_locale("de_CH")
///     .with_principal("admin")
///     .with_attribute("theme", "dark");
///
/// assert_eq!(env.locale(), Some("de_CH"));
/// assert_eq!(env.attribute("theme"), Some("dark"));
/// assert_eq!(env.attribute("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    locale: Option<String>,
    principal: Option<String>,
    attributes: HashMap<String, String>,
}

impl Environment {
    /// Creates an environment with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the locale, e.g. `de_CH`.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the authenticated user.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Adds a free-form attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets an attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.attributes.insert(name.into(), value.into())
    }

    /// The locale the instance is rendered for, if known.
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// The authenticated user, if the target system provided one.
    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// Looks up a free-form attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
