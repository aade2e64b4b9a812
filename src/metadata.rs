//! Type metadata: constructors, parameters and generic shapes of implementations.
//!
//! The graph builder never constructs values itself. It asks a
//! [`TypeMetadataProvider`] for the public constructors of an implementation
//! type, picks one, and later hands the resolved arguments to that
//! constructor's activator. [`TypeCatalog`] is the in-memory provider used by
//! [`ServiceCollection`](crate::ServiceCollection).
//!
//! # Examples
//!
//! ```rust
//! use ferrous_resolve::{ConstructorInfo, ImplementationType, ParameterInfo, ServiceType};
//! use std::sync::Arc;
//!
//! struct Clock;
//! struct Greeter { clock: Arc<Clock> }
//!
//! let greeter = ImplementationType::of::<Greeter>()
//!     .constructor(ConstructorInfo::new(
//!         [ParameterInfo::of::<Clock>("clock")],
//!         |args| Ok(Arc::new(Greeter { clock: args.arg::<Clock>(0)? })),
//!     ));
//! assert_eq!(greeter.constructors().len(), 1);
//! assert_eq!(greeter.service_type(), &ServiceType::of::<Greeter>());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, DiError, DiResult};
use crate::service_type::ServiceType;
use crate::traits::Dispose;

/// Type-erased shared value produced by the container.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Invokes a constructor with fully resolved arguments.
pub type Activator = Arc<dyn Fn(ActivationArgs) -> Result<AnyArc, BoxError> + Send + Sync>;

/// Extracts the disposal contract from a produced value, if it has one.
pub type DisposeProbe = Arc<dyn Fn(&AnyArc) -> Option<Arc<dyn Dispose>> + Send + Sync>;

/// Builds a probe that treats values of type `T` as disposable.
pub fn dispose_probe<T: Dispose>() -> DisposeProbe {
    Arc::new(|value: &AnyArc| {
        value
            .clone()
            .downcast::<T>()
            .ok()
            .map(|typed| typed as Arc<dyn Dispose>)
    })
}

/// A constructor parameter: declared type plus optional default value.
#[derive(Clone)]
pub struct ParameterInfo {
    name: Arc<str>,
    service_type: ServiceType,
    default: Option<AnyArc>,
}

impl ParameterInfo {
    pub fn new(name: impl Into<Arc<str>>, service_type: ServiceType) -> Self {
        Self { name: name.into(), service_type, default: None }
    }

    /// Parameter whose declared type is the Rust type `T`.
    pub fn of<T: ?Sized + 'static>(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, ServiceType::of::<T>())
    }

    /// Declares the value used when the parameter type cannot be resolved.
    pub fn with_default(mut self, value: AnyArc) -> Self {
        self.default = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn default_value(&self) -> Option<&AnyArc> {
        self.default.as_ref()
    }

    fn substitute(&self, bindings: &[ServiceType]) -> Self {
        Self {
            name: self.name.clone(),
            service_type: self.service_type.substitute(bindings),
            default: self.default.clone(),
        }
    }
}

impl fmt::Debug for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterInfo")
            .field("name", &self.name)
            .field("service_type", &self.service_type)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// A public constructor of an implementation type.
#[derive(Clone)]
pub struct ConstructorInfo {
    parameters: Arc<[ParameterInfo]>,
    activator: Activator,
}

impl ConstructorInfo {
    pub fn new<F>(parameters: impl IntoIterator<Item = ParameterInfo>, activator: F) -> Self
    where
        F: Fn(ActivationArgs) -> Result<AnyArc, BoxError> + Send + Sync + 'static,
    {
        Self {
            parameters: parameters.into_iter().collect(),
            activator: Arc::new(activator),
        }
    }

    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub(crate) fn activator(&self) -> &Activator {
        &self.activator
    }

    /// Human-readable signature, e.g. `Greeter(clock: Clock)`.
    pub fn signature(&self, implementation: &ServiceType) -> String {
        let params = self
            .parameters
            .iter()
            .map(|p| format!("{}: {}", p.name, p.service_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", implementation, params)
    }

    fn substitute(&self, bindings: &[ServiceType]) -> Self {
        Self {
            parameters: self.parameters.iter().map(|p| p.substitute(bindings)).collect(),
            activator: self.activator.clone(),
        }
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo").field("parameters", &self.parameters).finish()
    }
}

/// Arguments handed to an [`Activator`], in declared parameter order.
pub struct ActivationArgs {
    implementation: ServiceType,
    values: Vec<AnyArc>,
}

impl ActivationArgs {
    pub(crate) fn new(implementation: ServiceType, values: Vec<AnyArc>) -> Self {
        Self { implementation, values }
    }

    /// The closed implementation type being activated.
    ///
    /// Activators registered for open generic definitions use this to learn
    /// which type arguments they were closed over.
    pub fn implementation_type(&self) -> &ServiceType {
        &self.implementation
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AnyArc> {
        self.values.get(index)
    }

    /// Downcasts the argument at `index`.
    pub fn arg<T: Any + Send + Sync>(&self, index: usize) -> DiResult<Arc<T>> {
        self.values
            .get(index)
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
            .ok_or_else(|| DiError::TypeMismatch {
                service: self.implementation.clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    pub fn into_values(self) -> Vec<AnyArc> {
        self.values
    }
}

/// Whether an implementation type can be instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Concrete type with constructors.
    Class,
    /// Abstract base, never instantiated.
    Abstract,
    /// Interface / trait, never instantiated.
    Interface,
}

/// A generic parameter of an open implementation definition.
#[derive(Debug, Clone)]
pub struct GenericParameter {
    name: Arc<str>,
    constraints: Vec<ServiceType>,
}

impl GenericParameter {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into(), constraints: Vec::new() }
    }

    /// Requires the type argument to implement `constraint`.
    ///
    /// The constraint may refer to other parameters with [`ServiceType::param`].
    pub fn constrained_to(mut self, constraint: ServiceType) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constraints(&self) -> &[ServiceType] {
        &self.constraints
    }
}

/// Metadata for one implementation type.
///
/// Non-generic implementations are identified by a closed [`ServiceType`].
/// Open generic implementations use a [`ServiceType::definition`] and
/// declare their parameters; their constructors and `implements` patterns
/// refer to those parameters through [`ServiceType::param`].
#[derive(Clone)]
pub struct ImplementationType {
    service_type: ServiceType,
    kind: TypeKind,
    generic_parameters: Vec<GenericParameter>,
    implements: Vec<ServiceType>,
    constructors: Vec<ConstructorInfo>,
    disposer: Option<DisposeProbe>,
}

impl ImplementationType {
    /// A concrete implementation type.
    pub fn class(service_type: ServiceType) -> Self {
        Self::with_kind(service_type, TypeKind::Class)
    }

    /// A concrete implementation identified by the Rust type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::class(ServiceType::of::<T>())
    }

    /// An abstract type; rejected as an implementation at registration.
    pub fn abstract_type(service_type: ServiceType) -> Self {
        Self::with_kind(service_type, TypeKind::Abstract)
    }

    /// An interface; rejected as an implementation at registration.
    pub fn interface(service_type: ServiceType) -> Self {
        Self::with_kind(service_type, TypeKind::Interface)
    }

    fn with_kind(service_type: ServiceType, kind: TypeKind) -> Self {
        let generic_parameters = (0..service_type.arity())
            .filter(|_| service_type.is_open_definition())
            .map(|i| GenericParameter::new(format!("T{}", i)))
            .collect();
        Self {
            service_type,
            kind,
            generic_parameters,
            implements: Vec::new(),
            constructors: Vec::new(),
            disposer: None,
        }
    }

    /// Replaces the description of the generic parameter at its position.
    pub fn generic_parameter(mut self, index: usize, parameter: GenericParameter) -> Self {
        if let Some(slot) = self.generic_parameters.get_mut(index) {
            *slot = parameter;
        }
        self
    }

    /// Declares a service type (or pattern) this implementation provides.
    pub fn implements(mut self, service: ServiceType) -> Self {
        self.implements.push(service);
        self
    }

    /// Adds a public constructor.
    pub fn constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Marks produced values as disposable through the Rust type `T`.
    pub fn disposable<T: Dispose>(mut self) -> Self {
        self.disposer = Some(dispose_probe::<T>());
        self
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn generic_parameters(&self) -> &[GenericParameter] {
        &self.generic_parameters
    }

    pub fn constructors(&self) -> &[ConstructorInfo] {
        &self.constructors
    }

    pub(crate) fn disposer(&self) -> Option<&DisposeProbe> {
        self.disposer.as_ref()
    }

    /// Whether the (closed) implementation provides `service`.
    pub fn provides(&self, service: &ServiceType) -> bool {
        &self.service_type == service || self.implements.iter().any(|p| p == service)
    }

    /// Whether this open definition could ever be closed for requests of the
    /// open `service_definition`.
    pub fn can_close_definition(&self, service_definition: &ServiceType) -> bool {
        if self.implements.is_empty() {
            return self.service_type.arity() == service_definition.arity();
        }
        self.implements
            .iter()
            .any(|pattern| pattern.generic_definition().as_ref() == Some(service_definition))
    }

    /// Closes an open definition so that it provides the closed `service`.
    ///
    /// The declared `implements` patterns are matched against `service`; when
    /// none is declared the implementation's parameters map one-to-one onto
    /// the service's type arguments. Every implementation parameter must be
    /// bound by the match and satisfy its constraints, otherwise `None` is
    /// returned and the descriptor is skipped for this request.
    pub fn close_for(&self, service: &ServiceType, types: &dyn TypeMetadataProvider) -> Option<ImplementationType> {
        if !self.service_type.is_open_definition() {
            return Some(self.clone());
        }
        let arity = self.service_type.arity();
        let identity;
        let patterns: &[ServiceType] = if self.implements.is_empty() {
            let name = service.name()?;
            identity = [ServiceType::generic(name, (0..arity).map(ServiceType::param))];
            &identity
        } else {
            &self.implements
        };

        patterns.iter().find_map(|pattern| {
            let mut bindings = vec![None; arity];
            if !ServiceType::bind(pattern, service, &mut bindings) {
                return None;
            }
            let bound: Vec<ServiceType> = bindings.into_iter().collect::<Option<_>>()?;
            self.satisfies_constraints(&bound, types).then(|| self.substitute(&bound))
        })
    }

    /// Closes an open definition positionally with `type_args`.
    pub fn close_with(&self, type_args: &[ServiceType], types: &dyn TypeMetadataProvider) -> Option<ImplementationType> {
        if type_args.len() != self.service_type.arity() || !self.service_type.is_open_definition() {
            return None;
        }
        self.satisfies_constraints(type_args, types).then(|| self.substitute(type_args))
    }

    fn satisfies_constraints(&self, bound: &[ServiceType], types: &dyn TypeMetadataProvider) -> bool {
        self.generic_parameters.iter().zip(bound).all(|(param, arg)| {
            param.constraints.iter().all(|constraint| {
                let constraint = constraint.substitute(bound);
                arg == &constraint
                    || types
                        .describe(arg)
                        .map_or(false, |meta| meta.provides(&constraint))
            })
        })
    }

    fn substitute(&self, bound: &[ServiceType]) -> ImplementationType {
        let name = self.service_type.name().unwrap_or_default().to_string();
        ImplementationType {
            service_type: ServiceType::generic(name, bound.iter().cloned()),
            kind: self.kind,
            generic_parameters: Vec::new(),
            implements: self.implements.iter().map(|p| p.substitute(bound)).collect(),
            constructors: self.constructors.iter().map(|c| c.substitute(bound)).collect(),
            disposer: self.disposer.clone(),
        }
    }
}

impl fmt::Debug for ImplementationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImplementationType")
            .field("service_type", &self.service_type)
            .field("kind", &self.kind)
            .field("implements", &self.implements)
            .field("constructors", &self.constructors.len())
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

/// Injected capability that describes implementation types.
pub trait TypeMetadataProvider: Send + Sync {
    /// Metadata for `implementation`, or `None` if the type is unknown.
    ///
    /// Constructed generics such as `Repository<User>` may be answered by
    /// closing the registered definition.
    fn describe(&self, implementation: &ServiceType) -> Option<Arc<ImplementationType>>;
}

/// In-memory [`TypeMetadataProvider`] keyed by implementation type.
#[derive(Default, Clone)]
pub struct TypeCatalog {
    types: HashMap<ServiceType, Arc<ImplementationType>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the metadata of an implementation type.
    pub fn register(&mut self, implementation: ImplementationType) -> &mut Self {
        self.types.insert(implementation.service_type.clone(), Arc::new(implementation));
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeMetadataProvider for TypeCatalog {
    fn describe(&self, implementation: &ServiceType) -> Option<Arc<ImplementationType>> {
        if let Some(found) = self.types.get(implementation) {
            return Some(found.clone());
        }
        let definition = implementation.generic_definition()?;
        let open = self.types.get(&definition)?;
        open.close_with(implementation.type_args(), self).map(Arc::new)
    }
}
