//! Disposal trait for resource cleanup.

/// Synchronous disposal contract.
///
/// Values produced by the container whose implementation (or factory) is
/// marked disposable are captured by the owning scope and disposed, in the
/// order they were created, when that scope is disposed.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{
///     ConstructorInfo, Dispose, ImplementationType, Lifetime, Resolver, ServiceCollection,
///     ServiceType,
/// };
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// struct Connection {
///     closed: AtomicBool,
/// }
///
/// impl Dispose for Connection {
///     fn dispose(&self) {
///         self.closed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.register_type(
///     ImplementationType::of::<Connection>()
///         .disposable::<Connection>()
///         .constructor(ConstructorInfo::new([], |_| {
///             Ok(Arc::new(Connection { closed: AtomicBool::new(false) }))
///         })),
/// );
/// services.add_type(ServiceType::of::<Connection>(), ServiceType::of::<Connection>(), Lifetime::Scoped);
///
/// let provider = services.build().unwrap();
/// let scope = provider.create_scope();
/// let connection = scope.get::<Connection>().unwrap();
/// scope.dispose();
/// assert!(connection.closed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Releases resources held by the service.
    fn dispose(&self);
}
