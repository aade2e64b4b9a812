//! Core traits for the resolution engine.

pub mod dispose;
pub mod resolver;

pub use dispose::Dispose;
pub use resolver::{Resolver, ResolverCore};
