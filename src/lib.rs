//! # ferrous-resolve
//!
//! Runtime dependency resolution modelled on Microsoft.Extensions.DependencyInjection.
//!
//! Registrations are turned into **call sites**: trees that describe how to
//! produce one service value, annotated with where the value is cached. Call
//! sites are built lazily, once per service type, checked for cycles and
//! lifetime captivity, and then executed by one of several interchangeable
//! engines.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton (root cache), Scoped (per-scope cache) and
//!   Transient (no cache, disposal still tracked)
//! - **Constructor selection**: longest viable constructor, with defaults and
//!   ambiguity detection
//! - **Open generics**: `Repository<>` closes on demand, including
//!   constraint-checked partial closure
//! - **Enumerables**: `[T]` resolves every registration of `T`, oldest first
//! - **Diagnostics**: cycles report the full chain; captivity errors name
//!   both services
//! - **Engines**: interpreter, compiled closure tree, emitted instruction
//!   stream and an adaptive mode that promotes hot services
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_resolve::{Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton(Database {
//!     connection_string: "postgres://localhost".to_string(),
//! });
//! services.add_transient_factory::<UserService, _>(|resolver| UserService {
//!     db: resolver.get_required::<Database>(),
//! });
//!
//! let provider = services.build().unwrap();
//! let user_service = provider.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Constructors and open generics
//!
//! Type-based registrations are described through a [`TypeCatalog`]: each
//! implementation lists its constructors, their parameter types and an
//! activator that builds the value from resolved arguments.
//!
//! ```rust
//! use ferrous_resolve::{
//!     ConstructorInfo, ImplementationType, Lifetime, ParameterInfo, Resolver,
//!     ServiceCollection, ServiceType,
//! };
//! use std::sync::Arc;
//!
//! struct Repository { entity: String }
//!
//! let mut services = ServiceCollection::new();
//! services.register_type(
//!     ImplementationType::class(ServiceType::definition("SqlRepository", 1))
//!         .implements(ServiceType::generic("Repository", [ServiceType::param(0)]))
//!         .constructor(ConstructorInfo::new([], |args| {
//!             let entity = args.implementation_type().type_args()[0].to_string();
//!             Ok(Arc::new(Repository { entity }))
//!         })),
//! );
//! services.add_type(
//!     ServiceType::definition("Repository", 1),
//!     ServiceType::definition("SqlRepository", 1),
//!     Lifetime::Scoped,
//! );
//!
//! let provider = services.build().unwrap();
//! let scope = provider.create_scope();
//! let users = ServiceType::generic("Repository", [ServiceType::named("User")]);
//! assert_eq!(scope.get_as::<Repository>(&users).unwrap().entity, "User");
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once and shared across the entire container
//! - **Scoped**: Created once per scope
//! - **Transient**: Created fresh on every resolution
//!
//! Resolving a scoped service from the root provider, or capturing one in a
//! singleton, is rejected when [`ProviderOptions::validate_scopes`] is set.

pub mod call_site;
pub mod collection;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod metadata;
pub mod observer;
pub mod options;
pub mod provider;
pub mod service_type;
pub mod traits;

mod engine;
mod internal;

pub use call_site::{CallSite, CallSiteKind, CallSiteVisitor, ConstructorCallSite, EnumerableCallSite, FactoryCallSite};
#[cfg(feature = "diagnostics")]
pub use call_site::CallSiteFormatter;
pub use collection::ServiceCollection;
pub use descriptors::{Implementation, ServiceDescriptor, ServiceFactory};
pub use error::{BoxError, ChainHop, ChainVia, CircularDependency, DiError, DiResult};
pub use key::{CacheKey, CacheLocation, ResultCache};
pub use lifetime::Lifetime;
pub use metadata::{
    dispose_probe, ActivationArgs, Activator, AnyArc, ConstructorInfo, DisposeProbe, GenericParameter,
    ImplementationType, ParameterInfo, TypeCatalog, TypeKind, TypeMetadataProvider,
};
pub use observer::{DiObserver, TracingObserver};
pub use options::{ExecutionMode, ProviderOptions};
pub use provider::{ResolverContext, Scope, ScopeFactory, ServiceProvider};
pub use service_type::ServiceType;
pub use traits::{Dispose, Resolver, ResolverCore};
