//! Package specs and anonymous spec constraints.
//!
//! A concrete spec describes one build of a package:
//!
//! ```text
//! mpileaks@1.2.3+debug~shared=x86_64 ^openmpi ^zlib
//! ```
//!
//! An anonymous spec is the same syntax without the package name, written
//! inside a package to constrain its builds:
//!
//! ```text
//! @1.2:1.4 +debug ^openmpi
//! ```
//!
//! Clauses:
//! - `@1.2` / `@1.2:` / `@:1.4` / `@1.2:1.4`: version range, inclusive, with
//!   the upper bound matched as a prefix (`@:1.4` admits `1.4.7`)
//! - `+name` / `~name`: variant enabled / disabled
//! - `=arch`: target architecture
//! - `^name`: dependency

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Range;

use logos::Logos;
use specdispatch::{Constraint, ConstraintParser};
use thiserror::Error;

/// Token kinds for spec text.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    #[token("@")]
    At,
    #[token(":")]
    Colon,
    #[token("+")]
    Plus,
    #[token("~")]
    Tilde,
    #[token("^")]
    Caret,
    #[token("=")]
    Equals,
    #[regex(r"[A-Za-z0-9_][A-Za-z0-9_.\-]*")]
    Ident,
}

/// Errors produced while parsing spec text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecParseError {
    #[error("unexpected character `{found}` at offset {offset}")]
    UnexpectedChar { offset: usize, found: String },

    #[error("expected {expected} at offset {offset}, found {found}")]
    Expected {
        offset: usize,
        expected: &'static str,
        found: String,
    },

    #[error("invalid version `{text}` at offset {offset}")]
    InvalidVersion { offset: usize, text: String },

    #[error("{what} given more than once at offset {offset}")]
    Duplicate { offset: usize, what: String },
}

/// A dotted numeric version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(Vec<u64>);

impl Version {
    /// Parse `text` as a version; `offset` is used in errors.
    fn parse(text: &str, offset: usize) -> Result<Self, SpecParseError> {
        text.split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map(Version)
            .map_err(|_| SpecParseError::InvalidVersion {
                offset,
                text: text.to_string(),
            })
    }

    /// The first `len` components.
    fn truncated(&self, len: usize) -> &[u64] {
        &self.0[..self.0.len().min(len)]
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// An inclusive version range with optional ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub lo: Option<Version>,
    pub hi: Option<Version>,
}

impl VersionRange {
    /// Returns true if `version` lies in the range.
    pub fn contains(&self, version: &Version) -> bool {
        let above = self.lo.as_ref().map_or(true, |lo| version >= lo);
        let below = self
            .hi
            .as_ref()
            .map_or(true, |hi| version.truncated(hi.0.len()) <= hi.0.as_slice());
        above && below
    }

    /// The single version this range names, if it names one.
    fn exact(&self) -> Option<&Version> {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(version) = self.exact() {
            return write!(f, "{}", version);
        }
        if let Some(lo) = &self.lo {
            write!(f, "{}", lo)?;
        }
        write!(f, ":")?;
        if let Some(hi) = &self.hi {
            write!(f, "{}", hi)?;
        }
        Ok(())
    }
}

/// A concrete package spec, used as the dispatch descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: Option<Version>,
    pub variants: BTreeMap<String, bool>,
    pub arch: Option<String>,
    pub deps: BTreeSet<String>,
}

impl PackageSpec {
    /// Parse a concrete spec such as `zlib@1.2.13+shared=x86_64`.
    pub fn parse(text: &str) -> Result<Self, SpecParseError> {
        let mut parser = Parser::new(text)?;
        let name = parser.expect_ident("package name")?.to_string();
        let clauses = parser.parse_clauses()?;

        let version = match clauses.version {
            Some((range, offset)) => match range.exact() {
                Some(version) => Some(version.clone()),
                None => {
                    return Err(SpecParseError::Expected {
                        offset,
                        expected: "an exact version",
                        found: format!("range `{}`", range),
                    })
                }
            },
            None => None,
        };

        Ok(Self {
            name,
            version,
            variants: clauses.variants,
            arch: clauses.arch,
            deps: clauses.deps,
        })
    }
}

fn write_variants(f: &mut fmt::Formatter<'_>, variants: &BTreeMap<String, bool>) -> fmt::Result {
    for (name, enabled) in variants {
        write!(f, "{}{}", if *enabled { '+' } else { '~' }, name)?;
    }
    Ok(())
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "@{}", version)?;
        }
        write_variants(f, &self.variants)?;
        if let Some(arch) = &self.arch {
            write!(f, "={}", arch)?;
        }
        for dep in &self.deps {
            write!(f, " ^{}", dep)?;
        }
        Ok(())
    }
}

/// A constraint written inside a package, matched against its spec.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnonSpec {
    /// The package the constraint was written in.
    pub package: String,
    pub version: Option<VersionRange>,
    pub variants: BTreeMap<String, bool>,
    pub arch: Option<String>,
    pub deps: BTreeSet<String>,
}

impl AnonSpec {
    /// Parse anonymous spec text written inside `package`.
    pub fn parse(text: &str, package: &str) -> Result<Self, SpecParseError> {
        let mut parser = Parser::new(text)?;
        let clauses = parser.parse_clauses()?;
        Ok(Self {
            package: package.to_string(),
            version: clauses.version.map(|(range, _)| range),
            variants: clauses.variants,
            arch: clauses.arch,
            deps: clauses.deps,
        })
    }
}

impl fmt::Display for AnonSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(range) = &self.version {
            parts.push(format!("@{}", range));
        }
        for (name, enabled) in &self.variants {
            parts.push(format!("{}{}", if *enabled { '+' } else { '~' }, name));
        }
        if let Some(arch) = &self.arch {
            parts.push(format!("={}", arch));
        }
        for dep in &self.deps {
            parts.push(format!("^{}", dep));
        }
        if parts.is_empty() {
            write!(f, "{}", self.package)
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

impl Constraint for AnonSpec {
    type Descriptor = PackageSpec;

    fn is_satisfied_by(&self, spec: &PackageSpec) -> bool {
        if spec.name != self.package {
            return false;
        }

        let version_ok = match (&self.version, &spec.version) {
            (None, _) => true,
            (Some(range), Some(version)) => range.contains(version),
            (Some(_), None) => false,
        };

        let variants_ok = self
            .variants
            .iter()
            .all(|(name, wanted)| spec.variants.get(name).copied().unwrap_or(false) == *wanted);

        let arch_ok = self.arch.is_none() || self.arch == spec.arch;

        version_ok && variants_ok && arch_ok && self.deps.is_subset(&spec.deps)
    }
}

/// Parses anonymous specs in the scope of the package being defined.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonSpecParser;

impl ConstraintParser for AnonSpecParser {
    type Constraint = AnonSpec;
    type Error = SpecParseError;

    fn parse_constraint(&self, text: &str, context: &str) -> Result<AnonSpec, SpecParseError> {
        AnonSpec::parse(text, context)
    }
}

/// A token with its byte span.
#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    span: Range<usize>,
}

/// Clauses shared by concrete and anonymous specs.
#[derive(Default)]
struct Clauses {
    version: Option<(VersionRange, usize)>,
    variants: BTreeMap<String, bool>,
    arch: Option<String>,
    deps: BTreeSet<String>,
}

struct Parser<'src> {
    src: &'src str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'src> Parser<'src> {
    fn new(src: &'src str) -> Result<Self, SpecParseError> {
        let mut lexer = TokenKind::lexer(src);
        let mut tokens = Vec::new();
        while let Some(kind) = lexer.next() {
            let span = lexer.span();
            match kind {
                Ok(kind) => tokens.push(Token { kind, span }),
                Err(()) => {
                    return Err(SpecParseError::UnexpectedChar {
                        offset: span.start,
                        found: lexer.slice().to_string(),
                    })
                }
            }
        }
        Ok(Self { src, tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn try_consume(&mut self, kind: TokenKind) -> bool {
        if self.peek().map(|t| t.kind) == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn offset(&self) -> usize {
        self.peek().map_or(self.src.len(), |t| t.span.start)
    }

    fn describe(&self, token: Option<&Token>) -> String {
        match token {
            Some(token) => format!("`{}`", &self.src[token.span.clone()]),
            None => "end of input".to_string(),
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<&'src str, SpecParseError> {
        let src = self.src;
        match self.peek() {
            Some(token) if token.kind == TokenKind::Ident => {
                let text = &src[token.span.clone()];
                self.pos += 1;
                Ok(text)
            }
            other => Err(SpecParseError::Expected {
                offset: self.offset(),
                expected,
                found: self.describe(other),
            }),
        }
    }

    fn parse_version(&mut self) -> Result<Option<Version>, SpecParseError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Ident => {
                let offset = token.span.start;
                let text = self.expect_ident("version")?;
                Version::parse(text, offset).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Parse the text after `@`.
    fn parse_range(&mut self) -> Result<VersionRange, SpecParseError> {
        let offset = self.offset();
        let lo = self.parse_version()?;

        if self.try_consume(TokenKind::Colon) {
            let hi = self.parse_version()?;
            return Ok(VersionRange { lo, hi });
        }

        match lo {
            Some(version) => Ok(VersionRange {
                lo: Some(version.clone()),
                hi: Some(version),
            }),
            None => Err(SpecParseError::Expected {
                offset,
                expected: "version",
                found: self.describe(self.peek()),
            }),
        }
    }

    fn parse_clauses(&mut self) -> Result<Clauses, SpecParseError> {
        let mut clauses = Clauses::default();

        while let Some(token) = self.advance() {
            let offset = token.span.start;
            match token.kind {
                TokenKind::At => {
                    if clauses.version.is_some() {
                        return Err(duplicate(offset, "version"));
                    }
                    clauses.version = Some((self.parse_range()?, offset));
                }
                TokenKind::Plus | TokenKind::Tilde => {
                    let name = self.expect_ident("variant name")?;
                    let enabled = token.kind == TokenKind::Plus;
                    if clauses.variants.insert(name.to_string(), enabled).is_some() {
                        return Err(duplicate(offset, &format!("variant `{}`", name)));
                    }
                }
                TokenKind::Equals => {
                    if clauses.arch.is_some() {
                        return Err(duplicate(offset, "architecture"));
                    }
                    clauses.arch = Some(self.expect_ident("architecture")?.to_string());
                }
                TokenKind::Caret => {
                    let dep = self.expect_ident("dependency name")?;
                    clauses.deps.insert(dep.to_string());
                }
                TokenKind::Ident | TokenKind::Colon => {
                    return Err(SpecParseError::Expected {
                        offset,
                        expected: "`@`, `+`, `~`, `=` or `^`",
                        found: self.describe(Some(&token)),
                    });
                }
            }
        }

        Ok(clauses)
    }
}

fn duplicate(offset: usize, what: &str) -> SpecParseError {
    SpecParseError::Duplicate {
        offset,
        what: what.to_string(),
    }
}
