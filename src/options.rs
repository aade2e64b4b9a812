//! Provider construction options.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Strategy used to execute call sites.
///
/// All modes produce observably identical results; they differ only in
/// warm-up cost and steady-state overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum ExecutionMode {
    /// Walk the call-site tree on every resolution.
    Interpreted,
    /// Lower each call site once into composed closures.
    CompiledTree,
    /// Emit an instruction sequence once and run it on a small stack machine.
    BytecodeEmit,
    /// Interpret first; promote to the compiled tree after the second resolution.
    #[default]
    Adaptive,
}

/// Options recognized when building a [`ServiceProvider`](crate::ServiceProvider).
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::{ExecutionMode, ProviderOptions};
///
/// let options = ProviderOptions::new()
///     .execution_mode(ExecutionMode::CompiledTree)
///     .validate_scopes(true);
/// assert_eq!(options.execution_mode, ExecutionMode::CompiledTree);
/// assert!(options.validate_scopes);
/// assert!(!options.validate_on_build);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ProviderOptions {
    /// Engine used to execute call sites.
    pub execution_mode: ExecutionMode,
    /// Reject scoped services captured by singletons or resolved from the root scope.
    pub validate_scopes: bool,
    /// Build and validate every registration when the provider is built.
    pub validate_on_build: bool,
}

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    pub fn validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    pub fn validate_on_build(mut self, enabled: bool) -> Self {
        self.validate_on_build = enabled;
        self
    }
}
