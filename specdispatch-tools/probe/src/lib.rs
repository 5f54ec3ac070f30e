//! Probe for constraint dispatch tables.
//!
//! Loads a package manifest, builds the package's methods with
//! [`specdispatch`], and calls them against the package's spec. The crate
//! also provides the spec language the manifests are written in:
//!
//! - [`anon`]: concrete package specs and anonymous spec constraints
//! - [`manifest`]: TOML manifests
//! - [`package`]: packages as dispatch receivers

pub mod anon;
pub mod manifest;
pub mod package;

pub use anon::{AnonSpec, AnonSpecParser, PackageSpec, SpecParseError, Version, VersionRange};
pub use manifest::{LoadedPackage, Manifest, ManifestError, MethodEntry, PackageSection};
pub use package::{select, Package, PackageBuilder, PackageMethod, PackageMethods, Selection};
