//! Service definitions and the process-wide definition cache.
//!
//! A [`ServiceDefinition`] is the dispatch table of one declared interface:
//! its method descriptors keyed by method name. Definitions are built once
//! per interface and published in a [`ServiceRegistry`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::{ArgType, Error, MethodDescriptor, Result};

/// The descriptors of one interface.
#[derive(Debug, Clone, Default)]
pub struct ServiceDefinition {
    name: String,
    methods: HashMap<String, Vec<Arc<MethodDescriptor>>>,
}

impl ServiceDefinition {
    /// An empty definition for the interface `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: HashMap::new(),
        }
    }

    /// Add a method; overloads share a name.
    #[must_use]
    pub fn method(mut self, descriptor: MethodDescriptor) -> Self {
        self.methods
            .entry(descriptor.name().to_owned())
            .or_default()
            .push(Arc::new(descriptor));
        self
    }

    /// Interface name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All descriptors, overloads included.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values().flatten().map(AsRef::as_ref)
    }

    /// Find the descriptor for `name` called with arguments of `types`.
    ///
    /// Without `types` the name must be unique. With `types`, an overload of
    /// that arity is chosen; if several share it, the positional types must
    /// match exactly.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownMethod`] if no method has that name,
    /// - [`Error::AmbiguousMethod`] if the name is overloaded and `types` is `None`,
    /// - [`Error::ArityMismatch`] if no overload has that arity,
    /// - [`Error::NoMatchingOverload`] if several share the arity and none matches exactly.
    pub fn resolve(&self, name: &str, types: Option<&[ArgType]>) -> Result<&MethodDescriptor> {
        let candidates = self
            .methods
            .get(name)
            .filter(|candidates| !candidates.is_empty())
            .ok_or_else(|| Error::UnknownMethod(name.to_owned()))?;

        let Some(types) = types else {
            return match candidates.as_slice() {
                [only] => Ok(Arc::as_ref(only)),
                _ => Err(Error::AmbiguousMethod(name.to_owned())),
            };
        };

        let same_arity = candidates
            .iter()
            .filter(|candidate| candidate.arity() == types.len())
            .collect::<Vec<_>>();

        match same_arity.as_slice() {
            [] => Err(Error::ArityMismatch {
                method: name.to_owned(),
                arity: types.len(),
            }),
            [only] => Ok(Arc::as_ref(only)),
            many => many
                .iter()
                .copied()
                .find(|candidate| candidate.accepts(types))
                .map(Arc::as_ref)
                .ok_or_else(|| Error::NoMatchingOverload {
                    method: name.to_owned(),
                    types: types
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                }),
        }
    }
}

/// A declared REST interface.
///
/// ```
/// use grapnel_core::{ArgType, Method, MethodDescriptor, RestInterface, Result, ServiceDefinition};
///
/// struct GitHub;
///
/// impl RestInterface for GitHub {
///     const NAME: &'static str = "github";
///
///     fn definition() -> Result<ServiceDefinition> {
///         Ok(ServiceDefinition::new(Self::NAME).method(
///             MethodDescriptor::builder("user", Method::Get, "/users/{login}")
///                 .path("login", ArgType::Text)
///                 .build()?,
///         ))
///     }
/// }
/// ```
pub trait RestInterface {
    /// Stable interface identity, the registry key.
    const NAME: &'static str;

    /// Build the interface's definition.
    ///
    /// # Errors
    ///
    /// Returns an error if a descriptor is invalid.
    fn definition() -> Result<ServiceDefinition>;
}

/// Thread-safe cache of service definitions; the first published definition wins.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<ServiceDefinition>>>,
}

impl ServiceRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<ServiceRegistry> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// The published definition for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ServiceDefinition>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Publish `definition`, unless one with the same name already exists.
    ///
    /// Returns the published definition.
    pub fn register(&self, definition: ServiceDefinition) -> Arc<ServiceDefinition> {
        let mut services = self
            .services
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let published = services
            .entry(definition.name().to_owned())
            .or_insert_with(|| {
                debug!(service = definition.name(), "registered service definition");
                Arc::new(definition)
            });
        Arc::clone(published)
    }

    /// The definition of `T`, built and published on first use.
    ///
    /// # Errors
    ///
    /// Returns the error of [`RestInterface::definition`].
    pub fn register_interface<T: RestInterface>(&self) -> Result<Arc<ServiceDefinition>> {
        if let Some(existing) = self.get(T::NAME) {
            return Ok(existing);
        }
        let mut definition = T::definition()?;
        T::NAME.clone_into(&mut definition.name);
        Ok(self.register(definition))
    }
}
