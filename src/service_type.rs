//! Runtime type identity for services and implementations.
//!
//! Rust erases generics at compile time, so the container models the types it
//! reasons about as runtime values. A [`ServiceType`] is one of:
//!
//! - a **closed** type such as `Database` or `Repository<User>`,
//! - an **open generic definition** such as `Repository<>` (name plus arity),
//! - a **generic parameter** placeholder (`T0`, `T1`, ...) used inside the
//!   patterns an implementation declares,
//! - an **enumerable** wrapper, `[T]`, meaning "every registration of `T`".
//!
//! # Examples
//!
//! ```rust
//! use ferrous_resolve::ServiceType;
//!
//! let user = ServiceType::named("User");
//! let repo = ServiceType::generic("Repository", [user.clone()]);
//! assert_eq!(repo.to_string(), "Repository<User>");
//! assert_eq!(repo.generic_definition(), Some(ServiceType::definition("Repository", 1)));
//!
//! let all_repos = ServiceType::enumerable(repo.clone());
//! assert_eq!(all_repos.element_type(), Some(&repo));
//! ```

use std::fmt;
use std::sync::Arc;

/// Runtime identity of a service or implementation type.
///
/// Cheap to clone (one `Arc` bump) and hashable, so it doubles as the lookup
/// key for descriptors, memoized call sites and cached instances.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceType(Arc<Repr>);

#[derive(PartialEq, Eq, Hash)]
enum Repr {
    Named { name: Arc<str>, args: Box<[ServiceType]> },
    Definition { name: Arc<str>, arity: usize },
    Param(usize),
    Enumerable(ServiceType),
}

impl ServiceType {
    /// A non-generic type identified by name.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self(Arc::new(Repr::Named { name: name.into(), args: Box::new([]) }))
    }

    /// A non-generic type identified by its Rust type name.
    ///
    /// ```rust
    /// use ferrous_resolve::ServiceType;
    ///
    /// struct Clock;
    /// assert!(ServiceType::of::<Clock>().to_string().ends_with("Clock"));
    /// ```
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    /// A constructed generic type, e.g. `Repository<User>`.
    ///
    /// An empty argument list yields the same value as [`ServiceType::named`].
    pub fn generic(name: impl Into<Arc<str>>, args: impl IntoIterator<Item = ServiceType>) -> Self {
        let args: Box<[ServiceType]> = args.into_iter().collect();
        Self(Arc::new(Repr::Named { name: name.into(), args }))
    }

    /// An open generic definition, e.g. `Repository<>` with arity 1.
    pub fn definition(name: impl Into<Arc<str>>, arity: usize) -> Self {
        Self(Arc::new(Repr::Definition { name: name.into(), arity }))
    }

    /// Placeholder for the `index`-th generic parameter of an open definition.
    pub fn param(index: usize) -> Self {
        Self(Arc::new(Repr::Param(index)))
    }

    /// "All registrations of `element`", resolved in registration order.
    pub fn enumerable(element: ServiceType) -> Self {
        Self(Arc::new(Repr::Enumerable(element)))
    }

    /// Base name of a named type or definition.
    pub fn name(&self) -> Option<&str> {
        match &*self.0 {
            Repr::Named { name, .. } | Repr::Definition { name, .. } => Some(name),
            Repr::Param(_) | Repr::Enumerable(_) => None,
        }
    }

    /// Type arguments of a constructed generic (empty otherwise).
    pub fn type_args(&self) -> &[ServiceType] {
        match &*self.0 {
            Repr::Named { args, .. } => args,
            _ => &[],
        }
    }

    /// Number of generic parameters for definitions and constructed generics.
    pub fn arity(&self) -> usize {
        match &*self.0 {
            Repr::Named { args, .. } => args.len(),
            Repr::Definition { arity, .. } => *arity,
            Repr::Param(_) | Repr::Enumerable(_) => 0,
        }
    }

    /// `true` for `Repository<>`-style definitions.
    pub fn is_open_definition(&self) -> bool {
        matches!(&*self.0, Repr::Definition { .. })
    }

    /// `true` for a generic parameter placeholder.
    pub fn is_param(&self) -> bool {
        matches!(&*self.0, Repr::Param(_))
    }

    /// `true` when the type can be instantiated as-is: no definitions and no
    /// parameter placeholders anywhere inside it.
    pub fn is_closed(&self) -> bool {
        match &*self.0 {
            Repr::Named { args, .. } => args.iter().all(ServiceType::is_closed),
            Repr::Definition { .. } | Repr::Param(_) => false,
            Repr::Enumerable(element) => element.is_closed(),
        }
    }

    /// The open definition a constructed generic was built from.
    ///
    /// Definitions return themselves; non-generic types return `None`.
    pub fn generic_definition(&self) -> Option<ServiceType> {
        match &*self.0 {
            Repr::Named { name, args } if !args.is_empty() => {
                Some(ServiceType::definition(name.clone(), args.len()))
            }
            Repr::Definition { .. } => Some(self.clone()),
            _ => None,
        }
    }

    /// Element type of an enumerable request.
    pub fn element_type(&self) -> Option<&ServiceType> {
        match &*self.0 {
            Repr::Enumerable(element) => Some(element),
            _ => None,
        }
    }

    /// Replaces every parameter placeholder with the matching binding.
    ///
    /// Placeholders without a binding are left untouched.
    pub fn substitute(&self, bindings: &[ServiceType]) -> ServiceType {
        match &*self.0 {
            Repr::Param(index) => bindings.get(*index).cloned().unwrap_or_else(|| self.clone()),
            Repr::Named { name, args } if !args.is_empty() => ServiceType::generic(
                name.clone(),
                args.iter().map(|arg| arg.substitute(bindings)),
            ),
            Repr::Enumerable(element) => ServiceType::enumerable(element.substitute(bindings)),
            _ => self.clone(),
        }
    }

    /// Structurally matches `pattern` against a closed `concrete` type,
    /// recording parameter bindings.
    ///
    /// Returns `false` when the shapes differ or a parameter would be bound to
    /// two different types. Bindings made before a failure are left in place;
    /// callers discard the slice on failure.
    pub fn bind(pattern: &ServiceType, concrete: &ServiceType, bindings: &mut [Option<ServiceType>]) -> bool {
        match (&*pattern.0, &*concrete.0) {
            (Repr::Param(index), _) => match bindings.get_mut(*index) {
                Some(slot) => {
                    if let Some(bound) = slot.as_ref() {
                        return bound == concrete;
                    }
                    *slot = Some(concrete.clone());
                    true
                }
                None => false,
            },
            (Repr::Named { name: pn, args: pa }, Repr::Named { name: cn, args: ca }) => {
                pn == cn
                    && pa.len() == ca.len()
                    && pa.iter().zip(ca.iter()).all(|(p, c)| ServiceType::bind(p, c, bindings))
            }
            (Repr::Enumerable(p), Repr::Enumerable(c)) => ServiceType::bind(p, c, bindings),
            (Repr::Definition { .. }, _) => pattern == concrete,
            _ => false,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            Repr::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Repr::Definition { name, arity } => {
                write!(f, "{}<{}>", name, ",".repeat(arity.saturating_sub(1)))
            }
            Repr::Param(index) => write!(f, "T{}", index),
            Repr::Enumerable(element) => write!(f, "[{}]", element),
        }
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
