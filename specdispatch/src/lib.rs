//! Constraint-based method dispatch.
//!
//! A type may define several versions of a method, each guarded by a
//! constraint over the receiver's descriptor. At call time exactly one
//! version is chosen:
//!
//! - one constraint satisfied: that version runs
//! - none satisfied: the default runs, or [`DispatchError::NoMatchingMethod`]
//! - several satisfied: [`DispatchError::AmbiguousMethod`]
//!
//! Constraints, descriptors and constraint parsing are supplied by the
//! caller through [`Constraint`], [`Described`] and [`ConstraintParser`].
//!
//! # Example
//!
//! ```
//! use std::convert::Infallible;
//! use std::fmt;
//!
//! use specdispatch::{Constraint, ConstraintParser, Described, Implementation, TypeBuilder};
//!
//! /// Requires a dependency by name.
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct DependsOn(String);
//!
//! impl fmt::Display for DependsOn {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         write!(f, "^{}", self.0)
//!     }
//! }
//!
//! impl Constraint for DependsOn {
//!     type Descriptor = str;
//!
//!     fn is_satisfied_by(&self, deps: &str) -> bool {
//!         deps.split_whitespace().any(|dep| dep == self.0)
//!     }
//! }
//!
//! struct DepParser;
//!
//! impl ConstraintParser for DepParser {
//!     type Constraint = DependsOn;
//!     type Error = Infallible;
//!
//!     fn parse_constraint(&self, text: &str, _context: &str) -> Result<DependsOn, Infallible> {
//!         Ok(DependsOn(text.trim_start_matches('^').to_string()))
//!     }
//! }
//!
//! struct Mpileaks {
//!     deps: String,
//! }
//!
//! impl Described for Mpileaks {
//!     type Descriptor = str;
//!
//!     fn descriptor(&self) -> &str {
//!         &self.deps
//!     }
//! }
//!
//! let mut builder = TypeBuilder::new("Mpileaks");
//! builder.define(Implementation::new("install", |_: &Mpileaks, ()| "make install"))?;
//! let openmpi = Implementation::new("install", |_: &Mpileaks, ()| "mpirun install");
//! builder.when(&DepParser, "^openmpi", openmpi)?;
//! let methods = builder.finish();
//!
//! let pkg = Mpileaks { deps: "openmpi zlib".to_string() };
//! assert_eq!(methods.invoke(&pkg, "install", ())?, "mpirun install");
//!
//! let pkg = Mpileaks { deps: "mpich".to_string() };
//! assert_eq!(methods.invoke(&pkg, "install", ())?, "make install");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The default of a method must be defined before its constrained versions;
//! see [`scope`] for the ordering rules.

pub mod config;
pub mod error;
pub mod scope;
pub mod table;
pub mod types;
pub mod when;

pub use config::{DispatchConfig, ShadowPolicy};
pub use error::{DispatchError, DispatchResult};
pub use scope::{Definition, DefinitionScope, MethodSet, TypeBuilder};
pub use table::{BoundMethod, DispatchTable, Selected};
pub use types::{Constraint, Described, Implementation, MethodFn};
pub use when::{ConstraintParser, RegistrationError, When};
