//! Error types for the resolution engine.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::service_type::ServiceType;

/// Boxed error returned by activators and factories.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dependency resolution errors.
///
/// Every variant carries the types involved so a registration mistake can be
/// diagnosed from the message alone.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{DiError, Resolver, ServiceCollection, ServiceType};
///
/// let provider = ServiceCollection::new().build().unwrap();
/// match provider.resolve_required(&ServiceType::named("Missing")) {
///     Err(DiError::NotFound(service)) => assert_eq!(service.to_string(), "Missing"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Nothing is registered for the requested type.
    #[error("No service for type '{0}' has been registered.")]
    NotFound(ServiceType),

    /// A resolved value could not be downcast to the requested Rust type.
    #[error("Resolved value for '{service}' is not a '{expected}'.")]
    TypeMismatch { service: ServiceType, expected: &'static str },

    /// A descriptor was rejected while the container was being built.
    #[error("Invalid registration for '{service}': {reason}")]
    InvalidRegistration { service: ServiceType, reason: String },

    /// A constructor parameter has no registration and no default value.
    #[error("Unable to resolve service for type '{parameter}' while attempting to activate '{implementation}'.")]
    Unresolvable { parameter: ServiceType, implementation: ServiceType },

    /// Two viable constructors could each be used and neither subsumes the other.
    #[error("Unable to activate type '{implementation}'. The following constructors are ambiguous:\n{first}\n{second}")]
    AmbiguousConstructor { implementation: ServiceType, first: String, second: String },

    /// The implementation type exposes no constructor at all.
    #[error("A suitable constructor for type '{implementation}' could not be located.")]
    NoConstructor { implementation: ServiceType },

    /// Re-entrant construction of the same service type.
    #[error("{0}")]
    Circular(CircularDependency),

    /// A singleton graph captures a scoped service.
    #[error("Cannot consume scoped service '{scoped}' from singleton '{singleton}'.")]
    ScopedInSingleton { scoped: ServiceType, singleton: ServiceType },

    /// A scoped service was requested directly from the root scope.
    #[error("Cannot resolve scoped service '{service}' from root provider.")]
    ScopedFromRoot { service: ServiceType },

    /// A service depending on a scoped service was requested from the root scope.
    #[error("Cannot resolve '{service}' from root provider because it requires scoped service '{scoped}'.")]
    ScopedDependencyFromRoot { service: ServiceType, scoped: ServiceType },

    /// The scope or provider has already been disposed.
    #[error("Cannot access a disposed {0}.")]
    Disposed(&'static str),

    /// Maximum recursion depth exceeded.
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),

    /// The constructor or factory itself failed; the original error is kept as is.
    #[error(transparent)]
    Construction(Arc<dyn std::error::Error + Send + Sync>),

    /// Aggregate of every failure found while validating on build.
    #[error("Some services are not able to be constructed:\n{}", join_lines(.0))]
    Build(Vec<DiError>),
}

impl DiError {
    /// Converts an activator or factory error into a `DiError`.
    ///
    /// A `DiError` raised by a nested resolution inside a factory passes
    /// through unchanged; anything else becomes [`DiError::Construction`].
    pub fn construction(err: BoxError) -> Self {
        match err.downcast::<DiError>() {
            Ok(di) => *di,
            Err(other) => DiError::Construction(Arc::from(other)),
        }
    }

    /// Recovers the original error of a failed construction.
    ///
    /// ```rust
    /// use ferrous_resolve::DiError;
    ///
    /// #[derive(Debug)]
    /// struct Boom;
    /// impl std::fmt::Display for Boom {
    ///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("boom") }
    /// }
    /// impl std::error::Error for Boom {}
    ///
    /// let err = DiError::construction(Box::new(Boom));
    /// assert_eq!(err.to_string(), "boom");
    /// assert!(err.downcast_construction_ref::<Boom>().is_some());
    /// ```
    pub fn downcast_construction_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            DiError::Construction(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

fn join_lines(errors: &[DiError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
}

/// How one hop of a dependency chain would have been produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainVia {
    /// Not yet known when the cycle was detected.
    Unknown,
    /// Registered instance.
    Instance,
    /// Activating an implementation type.
    Constructor(ServiceType),
    /// Running a registered factory.
    Factory,
    /// Creating a collection of the element implementation.
    Enumerable(ServiceType),
}

/// One service type on a circular dependency chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHop {
    /// Service type requested at this hop.
    pub service_type: ServiceType,
    /// How the hop would have been produced.
    pub via: ChainVia,
}

/// Full trace of a circular dependency, in resolution order.
///
/// The last hop repeats the type that closed the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularDependency {
    /// Type whose re-entrant construction was detected.
    pub service: ServiceType,
    /// Chain from the outermost request down to the repeated type.
    pub chain: Vec<ChainHop>,
}

impl CircularDependency {
    /// Renders the chain as `"A -> B -> A"`.
    pub fn path(&self) -> String {
        self.chain
            .iter()
            .map(|hop| hop.service_type.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Display for CircularDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A circular dependency was detected for the service of type '{}'.\n{}",
            self.service,
            self.path()
        )?;
        for hop in &self.chain {
            match &hop.via {
                ChainVia::Unknown => {}
                ChainVia::Instance => {
                    write!(f, "\n  '{}' by using the registered instance", hop.service_type)?
                }
                ChainVia::Constructor(implementation) => {
                    write!(f, "\n  '{}' by activating '{}'", hop.service_type, implementation)?
                }
                ChainVia::Factory => write!(f, "\n  '{}' by running factory", hop.service_type)?,
                ChainVia::Enumerable(element) => {
                    write!(f, "\n  '{}' by creating collection '{}[]'", hop.service_type, element)?
                }
            }
        }
        Ok(())
    }
}

/// Result type for resolution operations.
pub type DiResult<T> = Result<T, DiError>;
