//! Dispatch tables.
//!
//! A dispatch table holds every constrained implementation of one method
//! name, plus an optional default. Resolution happens on each call:
//!
//! 1. **Describe**: ask the receiver for its descriptor
//! 2. **Filter**: keep the constraints the descriptor satisfies
//! 3. **Select**: one match wins, no match falls back to the default,
//!    several matches are an ambiguity error
//! 4. **Call**: run the selected implementation and hand back its output
//!
//! Results are never cached; a receiver whose descriptor changes between
//! calls may dispatch differently.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace};

use crate::error::{DispatchError, DispatchResult};
use crate::types::{Constraint, Described, Implementation};

const UNNAMED: &str = "<unnamed>";

/// Per-method table of constrained implementations.
pub struct DispatchTable<C, R: ?Sized, A, O> {
    /// Method name, taken from the first implementation seen.
    name: Option<String>,
    /// Registered entries in registration order.
    entries: IndexMap<C, Implementation<R, A, O>, FxBuildHasher>,
    /// Called when no constraint matches.
    default: Option<Implementation<R, A, O>>,
}

/// The implementation chosen for a receiver.
#[derive(Debug)]
pub enum Selected<'a, C, R: ?Sized, A, O> {
    /// Exactly one constraint matched.
    Constrained {
        constraint: &'a C,
        implementation: &'a Implementation<R, A, O>,
    },
    /// Nothing matched; the default applies.
    Default(&'a Implementation<R, A, O>),
}

impl<'a, C, R: ?Sized, A, O> Selected<'a, C, R, A, O> {
    /// The implementation to call.
    pub fn implementation(&self) -> &'a Implementation<R, A, O> {
        match self {
            Selected::Constrained { implementation, .. } => *implementation,
            Selected::Default(implementation) => *implementation,
        }
    }

    /// The matching constraint, if a constrained entry was chosen.
    pub fn constraint(&self) -> Option<&'a C> {
        match self {
            Selected::Constrained { constraint, .. } => Some(*constraint),
            Selected::Default(_) => None,
        }
    }
}

impl<C, R: ?Sized, A, O> DispatchTable<C, R, A, O>
where
    C: Constraint,
{
    /// Create a table, optionally wrapping an existing definition as the default.
    pub fn new(default: Option<Implementation<R, A, O>>) -> Self {
        Self {
            name: default.as_ref().map(|d| d.name().to_string()),
            entries: IndexMap::default(),
            default,
        }
    }

    /// Register `implementation` for `constraint`.
    ///
    /// Registering a constraint that is already present replaces its
    /// implementation in place. The table is left untouched if the
    /// implementation's name differs from the table's method name.
    pub fn register(
        &mut self,
        constraint: C,
        implementation: Implementation<R, A, O>,
    ) -> DispatchResult<()> {
        match &self.name {
            Some(name) if name != implementation.name() => {
                return Err(DispatchError::InconsistentRegistration {
                    expected: name.clone(),
                    found: implementation.name().to_string(),
                });
            }
            Some(_) => {}
            None => self.name = Some(implementation.name().to_string()),
        }

        debug!(method = implementation.name(), %constraint, "registering constrained implementation");
        if let Some(previous) = self.entries.insert(constraint, implementation) {
            debug!(method = previous.name(), "replaced implementation for existing constraint");
        }
        Ok(())
    }

    /// The method name, once known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The default implementation, if any.
    pub fn default(&self) -> Option<&Implementation<R, A, O>> {
        self.default.as_ref()
    }

    /// Registered constraints in registration order.
    pub fn constraints(&self) -> impl Iterator<Item = &C> + '_ {
        self.entries.keys()
    }

    /// The implementation registered for `constraint`.
    pub fn get(&self, constraint: &C) -> Option<&Implementation<R, A, O>> {
        self.entries.get(constraint)
    }

    /// Number of constrained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no constrained entry has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn method_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED)
    }

    fn render_constraints<'c>(constraints: impl Iterator<Item = &'c C>) -> Vec<String>
    where
        C: 'c,
    {
        constraints.map(ToString::to_string).collect()
    }
}

impl<C, R, A, O> DispatchTable<C, R, A, O>
where
    C: Constraint,
    R: Described<Descriptor = C::Descriptor> + ?Sized,
{
    /// Select the implementation for `receiver` without calling it.
    pub fn resolve(&self, receiver: &R) -> DispatchResult<Selected<'_, C, R, A, O>> {
        let descriptor = receiver.descriptor();

        // Step 1: Filter to satisfied constraints
        let matching: Vec<(&C, &Implementation<R, A, O>)> = self
            .entries
            .iter()
            .filter(|(constraint, _)| constraint.is_satisfied_by(descriptor))
            .collect();

        trace!(
            method = self.method_name(),
            %descriptor,
            matches = matching.len(),
            "resolving constrained method"
        );

        match matching.as_slice() {
            // Step 2: Nothing matched, fall back to the default
            [] => match &self.default {
                Some(default) => Ok(Selected::Default(default)),
                None => Err(DispatchError::NoMatchingMethod {
                    type_name: receiver.type_name().to_string(),
                    method: self.method_name().to_string(),
                    descriptor: descriptor.to_string(),
                    candidates: Self::render_constraints(self.entries.keys()),
                }),
            },

            // Step 3: Unique match
            [(constraint, implementation)] => Ok(Selected::Constrained {
                constraint: *constraint,
                implementation: *implementation,
            }),

            // Step 4: Ambiguity error
            _ => Err(DispatchError::AmbiguousMethod {
                type_name: receiver.type_name().to_string(),
                method: self.method_name().to_string(),
                descriptor: descriptor.to_string(),
                matching: Self::render_constraints(matching.iter().map(|(c, _)| *c)),
            }),
        }
    }

    /// Select the implementation for `receiver` and call it with `args`.
    ///
    /// The implementation's output is returned unchanged.
    pub fn resolve_and_call(&self, receiver: &R, args: A) -> DispatchResult<O> {
        let selected = self.resolve(receiver)?;
        Ok(selected.implementation().call(receiver, args))
    }

    /// Bind the table to `receiver`, producing a callable method.
    pub fn bind<'a>(&'a self, receiver: &'a R) -> BoundMethod<'a, C, R, A, O> {
        BoundMethod {
            callee: Callee::Dispatch(self),
            receiver,
        }
    }
}

impl<C: Clone, R: ?Sized, A, O> Clone for DispatchTable<C, R, A, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            entries: self.entries.clone(),
            default: self.default.clone(),
        }
    }
}

impl<C: fmt::Debug, R: ?Sized, A, O> fmt::Debug for DispatchTable<C, R, A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("name", &self.name)
            .field("constraints", &self.entries.keys().collect::<Vec<_>>())
            .field("default", &self.default)
            .finish()
    }
}

impl<C: fmt::Display, R: ?Sized, A, O> fmt::Display for DispatchTable<C, R, A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "DispatchTable `{}` {{",
            self.name.as_deref().unwrap_or(UNNAMED)
        )?;
        match &self.default {
            Some(default) => writeln!(f, "    default: {},", default)?,
            None => writeln!(f, "    default: none,")?,
        }
        write!(f, "    constraints: [")?;
        for (i, constraint) in self.entries.keys().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", constraint)?;
        }
        writeln!(f, "]")?;
        write!(f, "}}")
    }
}

/// What a bound method calls into.
pub(crate) enum Callee<'a, C, R: ?Sized, A, O> {
    Plain(&'a Implementation<R, A, O>),
    Dispatch(&'a DispatchTable<C, R, A, O>),
}

/// A method bound to its receiver.
///
/// `table.bind(&x).call(args)` behaves exactly like
/// `table.resolve_and_call(&x, args)`.
pub struct BoundMethod<'a, C, R: ?Sized, A, O> {
    pub(crate) callee: Callee<'a, C, R, A, O>,
    pub(crate) receiver: &'a R,
}

impl<'a, C, R, A, O> BoundMethod<'a, C, R, A, O>
where
    C: Constraint,
    R: Described<Descriptor = C::Descriptor> + ?Sized,
{
    /// Call the method with `args`.
    pub fn call(&self, args: A) -> DispatchResult<O> {
        match self.callee {
            Callee::Plain(implementation) => Ok(implementation.call(self.receiver, args)),
            Callee::Dispatch(table) => table.resolve_and_call(self.receiver, args),
        }
    }

    /// The receiver this method is bound to.
    pub fn receiver(&self) -> &'a R {
        self.receiver
    }
}
