//! Dispatch errors.
//!
//! All variants describe authoring defects: the method definitions of a type
//! disagree with the descriptors it is used with. None of them are retried
//! and none are raised by implementations themselves.

use thiserror::Error;

/// Errors raised while registering or resolving constrained methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// No constraint matched and the table has no default.
    #[error(
        "type `{type_name}` does not support `{method}` called with `{descriptor}`. Options are: {}",
        .candidates.join(", ")
    )]
    NoMatchingMethod {
        type_name: String,
        method: String,
        descriptor: String,
        candidates: Vec<String>,
    },

    /// More than one constraint matched.
    #[error(
        "type `{type_name}` has multiple versions of `{method}` that match `{descriptor}`: {}",
        .matching.join(", ")
    )]
    AmbiguousMethod {
        type_name: String,
        method: String,
        descriptor: String,
        matching: Vec<String>,
    },

    /// An implementation was registered into a table bound to another name.
    #[error("cannot register `{found}` into the dispatch table for `{expected}`")]
    InconsistentRegistration { expected: String, found: String },

    /// The type defines nothing under the requested name.
    #[error("type `{type_name}` has no method `{method}`")]
    UndefinedMethod { type_name: String, method: String },

    /// An unconstrained definition would discard constrained variants.
    #[error(
        "unconstrained `{method}` on `{type_name}` would discard variants for: {}; \
         define the default before any constrained variant",
        .constraints.join(", ")
    )]
    DiscardedVariants {
        type_name: String,
        method: String,
        constraints: Vec<String>,
    },
}

impl DispatchError {
    /// The method name the error refers to.
    pub fn method(&self) -> &str {
        match self {
            DispatchError::NoMatchingMethod { method, .. }
            | DispatchError::AmbiguousMethod { method, .. }
            | DispatchError::UndefinedMethod { method, .. }
            | DispatchError::DiscardedVariants { method, .. } => method,
            DispatchError::InconsistentRegistration { expected, .. } => expected,
        }
    }

    /// Returns true for errors raised while a type is being defined.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            DispatchError::InconsistentRegistration { .. } | DispatchError::DiscardedVariants { .. }
        )
    }
}

/// Dispatch result type.
pub type DispatchResult<T> = Result<T, DispatchError>;
