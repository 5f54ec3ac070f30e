//! Package manifests.
//!
//! A manifest declares a package, the spec it is built with, and its
//! methods in definition order:
//!
//! ```toml
//! [package]
//! name = "mpileaks"
//! spec = "mpileaks@1.2.3+debug ^openmpi"
//!
//! [config]
//! shadowing = "warn"
//!
//! [[methods]]
//! name = "install"
//! returns = "generic install of {spec}"
//!
//! [[methods]]
//! name = "install"
//! when = "^openmpi"
//! returns = "openmpi install of {name}"
//! ```
//!
//! `returns` may mention `{name}` and `{spec}`; they are filled in from the
//! package at call time.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use specdispatch::{DispatchConfig, DispatchError, RegistrationError};
use thiserror::Error;
use tracing::debug;

use crate::anon::{AnonSpecParser, PackageSpec, SpecParseError};
use crate::package::{Package, PackageBuilder, PackageMethod, PackageMethods};

/// Errors raised while loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid package spec `{text}`: {source}")]
    Spec {
        text: String,
        source: SpecParseError,
    },

    #[error("spec `{spec}` does not describe package `{package}`")]
    NameMismatch { package: String, spec: String },

    #[error("method `{method}`: {source}")]
    Registration {
        method: String,
        source: RegistrationError<SpecParseError>,
    },

    #[error(transparent)]
    Definition(#[from] DispatchError),
}

/// The `[package]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    pub name: String,
    pub spec: String,
}

/// One `[[methods]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodEntry {
    pub name: String,
    /// Anonymous spec guarding this version; absent for the default.
    #[serde(default)]
    pub when: Option<String>,
    pub returns: String,
}

/// A parsed manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub package: PackageSection,
    #[serde(default)]
    pub config: DispatchConfig,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
}

/// A package instance together with its methods.
#[derive(Debug)]
pub struct LoadedPackage {
    pub package: Package,
    pub methods: PackageMethods,
}

impl Manifest {
    /// Parse manifest text.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse the manifest at `path`.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Build the package and its methods.
    ///
    /// `spec_override` replaces the manifest's spec, which is how the same
    /// package is probed under different builds.
    pub fn build(&self, spec_override: Option<&str>) -> Result<LoadedPackage, ManifestError> {
        let text = spec_override.unwrap_or(&self.package.spec);
        let spec = PackageSpec::parse(text).map_err(|source| ManifestError::Spec {
            text: text.to_string(),
            source,
        })?;
        if spec.name != self.package.name {
            return Err(ManifestError::NameMismatch {
                package: self.package.name.clone(),
                spec: text.to_string(),
            });
        }

        let mut builder = PackageBuilder::with_config(&self.package.name, self.config.clone());
        for entry in &self.methods {
            let implementation = render_method(entry);
            match &entry.when {
                Some(constraint) => builder
                    .when(&AnonSpecParser, constraint, implementation)
                    .map_err(|source| ManifestError::Registration {
                        method: entry.name.clone(),
                        source,
                    })?,
                None => builder.define(implementation)?,
            }
            debug!(method = %entry.name, when = ?entry.when, "defined method");
        }

        Ok(LoadedPackage {
            package: Package::new(spec),
            methods: builder.finish(),
        })
    }
}

fn render_method(entry: &MethodEntry) -> PackageMethod {
    let template = entry.returns.clone();
    PackageMethod::new(entry.name.as_str(), move |package: &Package, ()| {
        template
            .replace("{name}", package.name())
            .replace("{spec}", &package.spec().to_string())
    })
}
