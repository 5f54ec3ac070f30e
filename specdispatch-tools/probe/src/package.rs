//! Packages as dispatch receivers.

use specdispatch::{
    Definition, Described, DispatchError, DispatchResult, Implementation, MethodSet, TypeBuilder,
};

use crate::anon::{AnonSpec, PackageSpec};

/// Methods of a package: no arguments, a rendered string as output.
pub type PackageMethods = MethodSet<AnonSpec, Package, (), String>;

/// Builder for [`PackageMethods`].
pub type PackageBuilder = TypeBuilder<AnonSpec, Package, (), String>;

/// One method implementation of a package.
pub type PackageMethod = Implementation<Package, (), String>;

/// A package instance, described by its concrete spec.
#[derive(Debug, Clone)]
pub struct Package {
    spec: PackageSpec,
}

impl Package {
    /// Create a package built as `spec`.
    pub fn new(spec: PackageSpec) -> Self {
        Self { spec }
    }

    /// The package name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// The concrete spec.
    pub fn spec(&self) -> &PackageSpec {
        &self.spec
    }
}

impl Described for Package {
    type Descriptor = PackageSpec;

    fn descriptor(&self) -> &PackageSpec {
        &self.spec
    }

    fn type_name(&self) -> &str {
        &self.spec.name
    }
}

/// Result of calling a method through the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The method called.
    pub method: String,
    /// The constraint that selected the implementation, if any.
    pub constraint: Option<String>,
    /// What the implementation returned.
    pub output: String,
}

/// Call `method` on `package`, reporting which version was chosen.
pub fn select(methods: &PackageMethods, package: &Package, method: &str) -> DispatchResult<Selection> {
    let (constraint, implementation) = match methods.get(method) {
        Some(Definition::Plain(implementation)) => (None, implementation),
        Some(Definition::Dispatch(table)) => {
            let selected = table.resolve(package)?;
            (
                selected.constraint().map(ToString::to_string),
                selected.implementation(),
            )
        }
        None => {
            return Err(DispatchError::UndefinedMethod {
                type_name: methods.type_name().to_string(),
                method: method.to_string(),
            })
        }
    };

    Ok(Selection {
        method: method.to_string(),
        constraint,
        output: implementation.call(package, ()),
    })
}
