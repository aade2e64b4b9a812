//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod dispose_bag;

pub(crate) use circular::{ResolutionGuard, MAX_DEPTH};
pub(crate) use dispose_bag::DisposeBag;
