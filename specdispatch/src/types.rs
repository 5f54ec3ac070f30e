//! Collaborator traits and the implementation type.
//!
//! The dispatch core never looks inside a constraint or a descriptor. It
//! asks a constraint whether a descriptor satisfies it, and it asks a
//! receiver for its descriptor. Everything else is supplied by the caller.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A predicate over descriptors, used as the key of a dispatch entry.
///
/// Constraints are compared with `Eq`/`Hash` when stored in a table and
/// rendered with `Display` in diagnostics. They are never re-parsed.
pub trait Constraint: fmt::Display + fmt::Debug + Eq + Hash {
    /// The descriptor type this constraint is tested against.
    type Descriptor: fmt::Display + ?Sized;

    /// Returns true if this constraint matches the descriptor.
    fn is_satisfied_by(&self, descriptor: &Self::Descriptor) -> bool;
}

/// A receiver that carries a descriptor.
pub trait Described {
    /// The descriptor attached to the receiver.
    type Descriptor: fmt::Display + ?Sized;

    /// The receiver's current descriptor.
    fn descriptor(&self) -> &Self::Descriptor;

    /// Name of the receiver's type, used in diagnostics.
    ///
    /// Defaults to the Rust type name without its module path.
    fn type_name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Strip the module path from a type name, keeping generic arguments as is.
fn short_type_name(full: &str) -> &str {
    let path = full.find('<').map_or(full, |generics| &full[..generics]);
    match path.rfind("::") {
        Some(sep) => &full[sep + 2..],
        None => full,
    }
}

/// Signature shared by every method implementation.
pub type MethodFn<R, A, O> = dyn Fn(&R, A) -> O + Send + Sync;

/// A named method implementation.
///
/// `A` is the whole argument list (a tuple, or a struct when arguments are
/// named). `O` is handed back to the caller untouched, so an implementation
/// that can fail returns a `Result` of its own.
pub struct Implementation<R: ?Sized, A, O> {
    name: Arc<str>,
    func: Arc<MethodFn<R, A, O>>,
}

impl<R: ?Sized, A, O> Implementation<R, A, O> {
    /// Create a new implementation named `name`.
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&R, A) -> O + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// The method name this implementation is defined under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call the implementation on `receiver`.
    pub fn call(&self, receiver: &R, args: A) -> O {
        (self.func)(receiver, args)
    }

    /// Returns true if both handles refer to the same implementation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl<R: ?Sized, A, O> Clone for Implementation<R, A, O> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            func: Arc::clone(&self.func),
        }
    }
}

impl<R: ?Sized, A, O> fmt::Debug for Implementation<R, A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<R: ?Sized, A, O> fmt::Display for Implementation<R, A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
