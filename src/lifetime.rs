//! Service lifetime definitions.

use std::fmt;

/// Service lifetimes controlling where resolved instances are cached.
///
/// The lifetime of a descriptor decides the [`CacheLocation`](crate::CacheLocation)
/// of every call site built from it:
///
/// | Lifetime    | Cache location | Shared by                       |
/// |-------------|----------------|---------------------------------|
/// | `Singleton` | `Root`         | the whole container             |
/// | `Scoped`    | `Scope`        | one scope                       |
/// | `Transient` | `Dispose`      | nobody (disposal still tracked) |
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{CacheLocation, Lifetime};
///
/// assert_eq!(CacheLocation::from(Lifetime::Singleton), CacheLocation::Root);
/// assert_eq!(CacheLocation::from(Lifetime::Scoped), CacheLocation::Scope);
/// assert_eq!(CacheLocation::from(Lifetime::Transient), CacheLocation::Dispose);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per container, cached in the root scope.
    ///
    /// Resolved against the root scope's cache even when first requested
    /// from a child scope.
    Singleton,
    /// Single instance per scope, cached for the scope's lifetime.
    Scoped,
    /// New instance per resolution, never cached.
    ///
    /// Disposable transients are still captured by the resolving scope and
    /// disposed with it.
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::Transient => "Transient",
        })
    }
}
