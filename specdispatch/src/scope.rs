//! Definition scopes and finished method sets.
//!
//! A type body is built by feeding definitions, in source order, into a
//! [`TypeBuilder`]. Unconstrained definitions bind a plain implementation;
//! constrained ones go through [`When`](crate::When) and bind a
//! [`DispatchTable`]. Once every definition is in, [`TypeBuilder::finish`]
//! freezes the bindings into a [`MethodSet`].
//!
//! # Ordering
//!
//! The unconstrained default of a method must come *before* its constrained
//! variants. The first constrained variant captures whatever is bound under
//! the name at that moment as the table's default. An unconstrained
//! definition that comes later replaces the whole table, discarding every
//! variant registered so far; [`ShadowPolicy`] controls whether that is
//! silent, logged, or refused.

use std::fmt;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use tracing::{debug, warn};

use crate::config::{DispatchConfig, ShadowPolicy};
use crate::error::{DispatchError, DispatchResult};
use crate::table::{BoundMethod, Callee, DispatchTable};
use crate::types::{Constraint, Described, Implementation};
use crate::when::{ConstraintParser, RegistrationError, When};

/// What a method name is bound to.
pub enum Definition<C, R: ?Sized, A, O> {
    /// An unconstrained implementation.
    Plain(Implementation<R, A, O>),
    /// A dispatch table of constrained implementations.
    Dispatch(DispatchTable<C, R, A, O>),
}

impl<C, R: ?Sized, A, O> Definition<C, R, A, O>
where
    C: Constraint,
{
    /// The method name, if known.
    pub fn name(&self) -> Option<&str> {
        match self {
            Definition::Plain(implementation) => Some(implementation.name()),
            Definition::Dispatch(table) => table.name(),
        }
    }

    /// The dispatch table, if this definition is one.
    pub fn as_table(&self) -> Option<&DispatchTable<C, R, A, O>> {
        match self {
            Definition::Dispatch(table) => Some(table),
            Definition::Plain(_) => None,
        }
    }

    /// The plain implementation, if this definition is one.
    pub fn as_plain(&self) -> Option<&Implementation<R, A, O>> {
        match self {
            Definition::Plain(implementation) => Some(implementation),
            Definition::Dispatch(_) => None,
        }
    }
}

impl<C, R, A, O> Definition<C, R, A, O>
where
    C: Constraint,
    R: Described<Descriptor = C::Descriptor> + ?Sized,
{
    /// Call the definition on `receiver`.
    pub fn invoke(&self, receiver: &R, args: A) -> DispatchResult<O> {
        self.bind(receiver).call(args)
    }

    /// Bind the definition to `receiver`.
    pub fn bind<'a>(&'a self, receiver: &'a R) -> BoundMethod<'a, C, R, A, O> {
        let callee = match self {
            Definition::Plain(implementation) => Callee::Plain(implementation),
            Definition::Dispatch(table) => Callee::Dispatch(table),
        };
        BoundMethod { callee, receiver }
    }
}

impl<C: Clone, R: ?Sized, A, O> Clone for Definition<C, R, A, O> {
    fn clone(&self) -> Self {
        match self {
            Definition::Plain(implementation) => Definition::Plain(implementation.clone()),
            Definition::Dispatch(table) => Definition::Dispatch(table.clone()),
        }
    }
}

impl<C: fmt::Debug, R: ?Sized, A, O> fmt::Debug for Definition<C, R, A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Plain(implementation) => f.debug_tuple("Plain").field(implementation).finish(),
            Definition::Dispatch(table) => f.debug_tuple("Dispatch").field(table).finish(),
        }
    }
}

impl<C: fmt::Display, R: ?Sized, A, O> fmt::Display for Definition<C, R, A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Definition::Plain(implementation) => write!(f, "{}", implementation),
            Definition::Dispatch(table) => write!(f, "{}", table),
        }
    }
}

/// Name bindings of a type body under construction.
pub trait DefinitionScope<C, R: ?Sized, A, O> {
    /// Name of the type being defined.
    fn type_name(&self) -> &str;

    /// The definition currently bound to `name`.
    fn get(&self, name: &str) -> Option<&Definition<C, R, A, O>>;

    /// Mutable access to the definition bound to `name`.
    fn get_mut(&mut self, name: &str) -> Option<&mut Definition<C, R, A, O>>;

    /// Bind `name` to `definition`, replacing any previous binding.
    fn set(&mut self, name: &str, definition: Definition<C, R, A, O>);
}

type Bindings<C, R, A, O> = IndexMap<String, Definition<C, R, A, O>, FxBuildHasher>;

/// Builder for the methods of one type.
pub struct TypeBuilder<C, R: ?Sized, A, O> {
    type_name: String,
    definitions: Bindings<C, R, A, O>,
    config: DispatchConfig,
}

impl<C, R: ?Sized, A, O> TypeBuilder<C, R, A, O>
where
    C: Constraint + Clone,
{
    /// Create a builder for the type named `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self::with_config(type_name, DispatchConfig::default())
    }

    /// Create a builder with explicit configuration.
    pub fn with_config(type_name: impl Into<String>, config: DispatchConfig) -> Self {
        Self {
            type_name: type_name.into(),
            definitions: IndexMap::default(),
            config,
        }
    }

    /// Bind an unconstrained definition.
    ///
    /// Any previous binding under the same name is replaced. When that
    /// binding is a dispatch table with constrained variants, the configured
    /// [`ShadowPolicy`] decides whether this is allowed.
    pub fn define(&mut self, implementation: Implementation<R, A, O>) -> DispatchResult<()> {
        let name = implementation.name().to_string();

        if let Some(Definition::Dispatch(table)) = self.definitions.get(&name) {
            if !table.is_empty() {
                let constraints: Vec<String> = table.constraints().map(ToString::to_string).collect();
                match self.config.shadowing {
                    ShadowPolicy::Allow => {}
                    ShadowPolicy::Warn => warn!(
                        type_name = %self.type_name,
                        method = %name,
                        discarded = %constraints.join(", "),
                        "unconstrained definition replaces constrained variants"
                    ),
                    ShadowPolicy::Deny => {
                        return Err(DispatchError::DiscardedVariants {
                            type_name: self.type_name.clone(),
                            method: name,
                            constraints,
                        });
                    }
                }
            }
        }

        self.set(&name, Definition::Plain(implementation));
        Ok(())
    }

    /// Parse `constraint` and register `implementation` under it.
    pub fn when<P>(
        &mut self,
        parser: &P,
        constraint: &str,
        implementation: Implementation<R, A, O>,
    ) -> Result<(), RegistrationError<P::Error>>
    where
        P: ConstraintParser<Constraint = C>,
    {
        let when = When::parse(parser, constraint, &self.type_name)?;
        when.apply(self, implementation)?;
        Ok(())
    }

    /// The configuration in effect.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Freeze the bindings into a method set.
    pub fn finish(self) -> MethodSet<C, R, A, O> {
        debug!(
            type_name = %self.type_name,
            methods = self.definitions.len(),
            "finished type definition"
        );
        MethodSet {
            type_name: self.type_name,
            definitions: self.definitions,
        }
    }
}

impl<C, R: ?Sized, A, O> DefinitionScope<C, R, A, O> for TypeBuilder<C, R, A, O> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get(&self, name: &str) -> Option<&Definition<C, R, A, O>> {
        self.definitions.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Definition<C, R, A, O>> {
        self.definitions.get_mut(name)
    }

    fn set(&mut self, name: &str, definition: Definition<C, R, A, O>) {
        self.definitions.insert(name.to_string(), definition);
    }
}

/// The methods of a fully defined type.
///
/// Bindings are read-only, so a method set can be shared between threads
/// and called concurrently.
pub struct MethodSet<C, R: ?Sized, A, O> {
    type_name: String,
    definitions: Bindings<C, R, A, O>,
}

impl<C, R: ?Sized, A, O> MethodSet<C, R, A, O>
where
    C: Constraint,
{
    /// Name of the type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The definition bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Definition<C, R, A, O>> {
        self.definitions.get(name)
    }

    /// Method names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.definitions.keys().map(String::as_str)
    }

    /// All bindings in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Definition<C, R, A, O>)> + '_ {
        self.definitions.iter().map(|(name, def)| (name.as_str(), def))
    }
}

impl<C, R, A, O> MethodSet<C, R, A, O>
where
    C: Constraint,
    R: Described<Descriptor = C::Descriptor> + ?Sized,
{
    /// Call method `name` on `receiver`.
    pub fn invoke(&self, receiver: &R, name: &str, args: A) -> DispatchResult<O> {
        match self.definitions.get(name) {
            Some(definition) => definition.invoke(receiver, args),
            None => Err(DispatchError::UndefinedMethod {
                type_name: self.type_name.clone(),
                method: name.to_string(),
            }),
        }
    }

    /// Look up method `name` bound to `receiver`.
    pub fn method<'a>(&'a self, receiver: &'a R, name: &str) -> Option<BoundMethod<'a, C, R, A, O>> {
        self.definitions.get(name).map(|definition| definition.bind(receiver))
    }
}

impl<C: fmt::Debug, R: ?Sized, A, O> fmt::Debug for MethodSet<C, R, A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSet")
            .field("type_name", &self.type_name)
            .field("definitions", &self.definitions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Descriptor: the platform name.
    struct Platform(&'static str);

    impl fmt::Display for Platform {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    /// Constraint: the platform equals the given name.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct On(&'static str);

    impl fmt::Display for On {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "={}", self.0)
        }
    }

    impl Constraint for On {
        type Descriptor = Platform;

        fn is_satisfied_by(&self, descriptor: &Platform) -> bool {
            self.0 == descriptor.0
        }
    }

    struct Pkg(Platform);

    impl Described for Pkg {
        type Descriptor = Platform;

        fn descriptor(&self) -> &Platform {
            &self.0
        }
    }

    type Builder = TypeBuilder<On, Pkg, (), String>;
    type Impl = Implementation<Pkg, (), String>;

    fn imp(name: &str, label: &'static str) -> Impl {
        Implementation::new(name, move |_: &Pkg, ()| label.to_string())
    }

    fn register(builder: &mut Builder, on: &'static str, implementation: Impl) {
        When::new(On(on)).apply(builder, implementation).unwrap();
    }

    #[test]
    fn test_default_then_variants() {
        let mut builder = Builder::new("Pkg");
        builder.define(imp("install", "default")).unwrap();
        register(&mut builder, "linux", imp("install", "linux"));
        register(&mut builder, "darwin", imp("install", "darwin"));
        let methods = builder.finish();

        let table = methods.get("install").and_then(Definition::as_table).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.default().is_some());

        let linux = Pkg(Platform("linux"));
        let bgq = Pkg(Platform("bgq"));
        assert_eq!(methods.invoke(&linux, "install", ()), Ok("linux".to_string()));
        assert_eq!(methods.invoke(&bgq, "install", ()), Ok("default".to_string()));
    }

    #[test]
    fn test_variants_without_default() {
        let mut builder = Builder::new("Pkg");
        register(&mut builder, "linux", imp("setup", "linux"));
        let methods = builder.finish();

        let bgq = Pkg(Platform("bgq"));
        let err = methods.invoke(&bgq, "setup", ()).unwrap_err();
        assert!(matches!(err, DispatchError::NoMatchingMethod { .. }));
    }

    #[test]
    fn test_later_default_replaces_table() {
        let mut builder = Builder::with_config(
            "Pkg",
            DispatchConfig::default().with_shadowing(ShadowPolicy::Allow),
        );
        register(&mut builder, "linux", imp("install", "linux"));
        let late = imp("install", "late");
        builder.define(late.clone()).unwrap();
        let methods = builder.finish();

        let plain = methods.get("install").and_then(Definition::as_plain).unwrap();
        assert!(plain.ptr_eq(&late));
        for platform in ["linux", "darwin", "bgq"] {
            let pkg = Pkg(Platform(platform));
            assert_eq!(methods.invoke(&pkg, "install", ()), Ok("late".to_string()));
        }
    }

    #[test]
    fn test_deny_policy_refuses_late_default() {
        let mut builder = Builder::with_config(
            "Pkg",
            DispatchConfig::default().with_shadowing(ShadowPolicy::Deny),
        );
        register(&mut builder, "linux", imp("install", "linux"));

        let err = builder.define(imp("install", "late")).unwrap_err();
        assert_eq!(
            err,
            DispatchError::DiscardedVariants {
                type_name: "Pkg".to_string(),
                method: "install".to_string(),
                constraints: vec!["=linux".to_string()],
            }
        );
        assert!(builder.get("install").and_then(Definition::as_table).is_some());
    }

    #[test]
    fn test_redefining_plain_method_is_not_shadowing() {
        let mut builder = Builder::with_config(
            "Pkg",
            DispatchConfig::default().with_shadowing(ShadowPolicy::Deny),
        );
        builder.define(imp("install", "first")).unwrap();
        builder.define(imp("install", "second")).unwrap();
        let methods = builder.finish();

        let pkg = Pkg(Platform("linux"));
        assert_eq!(methods.invoke(&pkg, "install", ()), Ok("second".to_string()));
    }

    #[test]
    fn test_undefined_method() {
        let methods = Builder::new("Pkg").finish();
        let pkg = Pkg(Platform("linux"));
        assert_eq!(
            methods.invoke(&pkg, "install", ()),
            Err(DispatchError::UndefinedMethod {
                type_name: "Pkg".to_string(),
                method: "install".to_string(),
            })
        );
        assert!(methods.method(&pkg, "install").is_none());
    }

    #[test]
    fn test_bound_method_matches_invoke() {
        let mut builder = Builder::new("Pkg");
        builder.define(imp("install", "default")).unwrap();
        register(&mut builder, "linux", imp("install", "linux"));
        builder.define(imp("check", "checked")).unwrap();
        let methods = builder.finish();

        let pkg = Pkg(Platform("linux"));
        for name in ["install", "check"] {
            let bound = methods.method(&pkg, name).unwrap();
            assert_eq!(bound.call(()), methods.invoke(&pkg, name, ()));
        }
        assert_eq!(methods.names().collect::<Vec<_>>(), vec!["install", "check"]);
    }
}
