//! Registration of constrained definitions.
//!
//! [`When`] plays the role of a `@when("...")` annotation on a method
//! definition: it looks up what the scope currently binds under the method
//! name, turns it into a dispatch table if needed, registers the new
//! variant and rebinds the name to the table.

use thiserror::Error;
use tracing::debug;

use crate::error::DispatchError;
use crate::scope::{Definition, DefinitionScope};
use crate::table::DispatchTable;
use crate::types::{Constraint, Implementation};

/// Turns constraint text into a constraint value.
///
/// `context` is the name of the type the constraint is written in.
pub trait ConstraintParser {
    /// The constraint produced.
    type Constraint: Constraint;
    /// Parse failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse `text` in the scope of the type named `context`.
    fn parse_constraint(&self, text: &str, context: &str) -> Result<Self::Constraint, Self::Error>;
}

/// Errors raised while registering a constrained definition.
#[derive(Debug, Error)]
pub enum RegistrationError<E: std::error::Error + 'static> {
    /// The constraint text could not be parsed.
    #[error("invalid constraint `{text}`: {source}")]
    Parse { text: String, source: E },

    /// The registration itself was rejected.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// A pending constrained registration.
#[derive(Debug, Clone)]
pub struct When<C> {
    constraint: C,
}

impl<C: Constraint + Clone> When<C> {
    /// Wrap an already built constraint.
    pub fn new(constraint: C) -> Self {
        Self { constraint }
    }

    /// Parse `text` with `parser` in the scope of type `context`.
    pub fn parse<P>(parser: &P, text: &str, context: &str) -> Result<Self, RegistrationError<P::Error>>
    where
        P: ConstraintParser<Constraint = C>,
    {
        parser
            .parse_constraint(text, context)
            .map(Self::new)
            .map_err(|source| RegistrationError::Parse {
                text: text.to_string(),
                source,
            })
    }

    /// The constraint this registration uses.
    pub fn constraint(&self) -> &C {
        &self.constraint
    }

    /// Register `implementation` in `scope` under this constraint.
    ///
    /// Whatever `scope` binds under the implementation's name is reused if
    /// it is already a dispatch table, otherwise it becomes the default of a
    /// new table. The name is rebound only if registration succeeds.
    pub fn apply<S, R, A, O>(
        self,
        scope: &mut S,
        implementation: Implementation<R, A, O>,
    ) -> Result<(), DispatchError>
    where
        S: DefinitionScope<C, R, A, O> + ?Sized,
        R: ?Sized,
    {
        let name = implementation.name().to_string();

        // An existing table is extended in place; `register` leaves it
        // untouched on error.
        if let Some(Definition::Dispatch(table)) = scope.get_mut(&name) {
            return table.register(self.constraint, implementation);
        }

        let default = match scope.get(&name) {
            Some(Definition::Plain(previous)) => {
                debug!(type_name = scope.type_name(), method = %name, "wrapping existing definition as default");
                Some(previous.clone())
            }
            _ => {
                debug!(type_name = scope.type_name(), method = %name, "creating dispatch table without default");
                None
            }
        };

        let mut table = DispatchTable::new(default);
        table.register(self.constraint, implementation)?;
        scope.set(&name, Definition::Dispatch(table));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::TypeBuilder;
    use crate::types::Described;
    use pretty_assertions::assert_eq;
    use std::fmt;

    /// Descriptor: a version number.
    struct Version(u32);

    impl fmt::Display for Version {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "@{}", self.0)
        }
    }

    /// Constraint: version at least `min`, recorded with its owning type.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct AtLeast {
        min: u32,
        owner: String,
    }

    impl fmt::Display for AtLeast {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "@{}:", self.min)
        }
    }

    impl Constraint for AtLeast {
        type Descriptor = Version;

        fn is_satisfied_by(&self, descriptor: &Version) -> bool {
            descriptor.0 >= self.min
        }
    }

    #[derive(Debug, Error, PartialEq)]
    #[error("expected `@N:`")]
    struct BadRange;

    struct RangeParser;

    impl ConstraintParser for RangeParser {
        type Constraint = AtLeast;
        type Error = BadRange;

        fn parse_constraint(&self, text: &str, context: &str) -> Result<AtLeast, BadRange> {
            let min = text
                .strip_prefix('@')
                .and_then(|rest| rest.strip_suffix(':'))
                .and_then(|n| n.parse().ok())
                .ok_or(BadRange)?;
            Ok(AtLeast {
                min,
                owner: context.to_string(),
            })
        }
    }

    struct Zlib(Version);

    impl Described for Zlib {
        type Descriptor = Version;

        fn descriptor(&self) -> &Version {
            &self.0
        }
    }

    type Impl = Implementation<Zlib, (), u32>;

    fn imp(name: &str, out: u32) -> Impl {
        Implementation::new(name, move |_: &Zlib, ()| out)
    }

    #[test]
    fn test_parse_records_context() {
        let when = When::parse(&RangeParser, "@3:", "Zlib").unwrap();
        assert_eq!(when.constraint().owner, "Zlib");
        assert_eq!(when.constraint().min, 3);
    }

    #[test]
    fn test_parse_error_is_not_dispatch_error() {
        let err = When::parse(&RangeParser, "3+", "Zlib").unwrap_err();
        assert!(matches!(err, RegistrationError::Parse { ref text, .. } if text == "3+"));
        assert_eq!(err.to_string(), "invalid constraint `3+`: expected `@N:`");
    }

    #[test]
    fn test_apply_wraps_previous_definition() {
        let mut builder: TypeBuilder<AtLeast, Zlib, (), u32> = TypeBuilder::new("Zlib");
        let default = imp("configure", 0);
        builder.define(default.clone()).unwrap();

        When::parse(&RangeParser, "@2:", "Zlib")
            .unwrap()
            .apply(&mut builder, imp("configure", 2))
            .unwrap();

        let table = builder.get("configure").and_then(Definition::as_table).unwrap();
        assert!(table.default().unwrap().ptr_eq(&default));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_apply_extends_existing_table() {
        let mut builder: TypeBuilder<AtLeast, Zlib, (), u32> = TypeBuilder::new("Zlib");
        builder.when(&RangeParser, "@2:", imp("configure", 2)).unwrap();
        builder.when(&RangeParser, "@5:", imp("configure", 5)).unwrap();

        let table = builder.get("configure").and_then(Definition::as_table).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.default().is_none());
    }

    #[test]
    fn test_failed_registration_keeps_binding() {
        let mut builder: TypeBuilder<AtLeast, Zlib, (), u32> = TypeBuilder::new("Zlib");
        builder.when(&RangeParser, "@2:", imp("configure", 2)).unwrap();

        // Registering a differently named implementation under the same
        // binding is an authoring error.
        let when = When::parse(&RangeParser, "@5:", "Zlib").unwrap();
        let mut scope = ForcedName {
            inner: &mut builder,
            name: "configure",
        };
        let err = when.apply(&mut scope, imp("build", 5)).unwrap_err();
        assert!(matches!(err, DispatchError::InconsistentRegistration { .. }));

        let table = builder.get("configure").and_then(Definition::as_table).unwrap();
        assert_eq!(table.len(), 1);
    }

    /// A scope that resolves every lookup to one name, simulating a table
    /// bound under a name its implementations do not carry.
    struct ForcedName<'a> {
        inner: &'a mut TypeBuilder<AtLeast, Zlib, (), u32>,
        name: &'static str,
    }

    impl DefinitionScope<AtLeast, Zlib, (), u32> for ForcedName<'_> {
        fn type_name(&self) -> &str {
            self.inner.type_name()
        }

        fn get(&self, _name: &str) -> Option<&Definition<AtLeast, Zlib, (), u32>> {
            self.inner.get(self.name)
        }

        fn get_mut(&mut self, _name: &str) -> Option<&mut Definition<AtLeast, Zlib, (), u32>> {
            self.inner.get_mut(self.name)
        }

        fn set(&mut self, _name: &str, definition: Definition<AtLeast, Zlib, (), u32>) {
            self.inner.set(self.name, definition);
        }
    }

    /// Counts rebinds made through it.
    struct CountingSets<'a> {
        inner: &'a mut TypeBuilder<AtLeast, Zlib, (), u32>,
        sets: usize,
    }

    impl DefinitionScope<AtLeast, Zlib, (), u32> for CountingSets<'_> {
        fn type_name(&self) -> &str {
            self.inner.type_name()
        }

        fn get(&self, name: &str) -> Option<&Definition<AtLeast, Zlib, (), u32>> {
            self.inner.get(name)
        }

        fn get_mut(&mut self, name: &str) -> Option<&mut Definition<AtLeast, Zlib, (), u32>> {
            self.inner.get_mut(name)
        }

        fn set(&mut self, name: &str, definition: Definition<AtLeast, Zlib, (), u32>) {
            self.sets += 1;
            self.inner.set(name, definition);
        }
    }

    #[test]
    fn test_existing_table_is_extended_in_place() {
        let mut builder: TypeBuilder<AtLeast, Zlib, (), u32> = TypeBuilder::new("Zlib");
        builder.define(imp("configure", 0)).unwrap();
        let mut scope = CountingSets {
            inner: &mut builder,
            sets: 0,
        };

        for min in 1..=4 {
            When::new(AtLeast {
                min,
                owner: "Zlib".to_string(),
            })
            .apply(&mut scope, imp("configure", min))
            .unwrap();
        }
        // Only the first variant creates and binds the table.
        assert_eq!(scope.sets, 1);

        let table = builder.get("configure").and_then(Definition::as_table).unwrap();
        assert_eq!(table.len(), 4);
        assert!(table.default().is_some());
    }
}
