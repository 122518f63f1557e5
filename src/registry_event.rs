//! Events reported to a registry's trace callback.

/// Events emitted by a registry during operations.
///
/// These events are passed to the tracing callback set via
/// [`Registry::set_trace_callback`](crate::Registry::set_trace_callback). They borrow
/// from the operation that produced them; callbacks that need to keep an event
/// should format it.
///
/// # Examples
///
/// ```rust
/// use factory_registry::RegistryEvent;
///
/// let ids = vec!["login".to_string()];
/// let event = RegistryEvent::Register { ids: &ids, replaced: &[] };
/// assert_eq!(event.to_string(), "register { ids: [login], replaced: [] }");
/// ```
#[derive(Debug, Clone)]
pub enum RegistryEvent<'a> {
    /// A factory was bound to identifiers.
    Register {
        /// Identifiers now bound to the factory.
        ids: &'a [String],
        /// Identifiers taken over from another factory.
        replaced: &'a [String],
    },

    /// A factory was removed.
    Unregister {
        /// Identifiers released by the removal (empty if the factory was unknown).
        ids: &'a [String],
    },

    /// A factory was resolved for an identifier.
    Lookup {
        id: &'a str,
        /// Whether any factory (bound or default) was found.
        found: bool,
        /// Whether the default factory answered.
        fallback: bool,
    },

    /// An identifier existence check was performed.
    Contains { id: &'a str, found: bool },

    /// The default factory was set or removed.
    DefaultFactory { set: bool },

    /// The registry was cleared.
    Clear {},
}

impl std::fmt::Display for RegistryEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::Register { ids, replaced } => {
                write!(
                    f,
                    "register {{ ids: [{}], replaced: [{}] }}",
                    ids.join(", "),
                    replaced.join(", ")
                )
            }
            RegistryEvent::Unregister { ids } => {
                write!(f, "unregister {{ ids: [{}] }}", ids.join(", "))
            }
            RegistryEvent::Lookup {
                id,
                found,
                fallback,
            } => write!(
                f,
                "lookup {{ id: {id}, found: {found}, fallback: {fallback} }}"
            ),
            RegistryEvent::Contains { id, found } => {
                write!(f, "contains {{ id: {id}, found: {found} }}")
            }
            RegistryEvent::DefaultFactory { set } => {
                write!(f, "default factory {{ set: {set} }}")
            }
            RegistryEvent::Clear {} => write!(f, "Clearing the Registry"),
        }
    }
}
