//! YM-001: Cookbook data types.
//!
//! Defines the value model shared by the template engine and the recipe
//! layer, the serde schema of cookbook files, existence checks and the
//! lenient version type used by the `$globals.version` guard.

use super::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// Values
// ============================================================================

/// A cookbook value: scalar, list or mapping.
///
/// Templates evaluate to values of the same shape, and function calls may
/// return any of them, so every evaluator matches on this enum instead of
/// probing types at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Short shape name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
        }
    }

    /// Truthiness used by `ternary_if`.
    pub fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
        }
    }

    /// Ordering between comparable scalars; `None` for mixed or compound shapes.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Convert into a list of strings, stringifying scalars.
    pub fn into_string_list(self) -> Vec<String> {
        match self {
            Self::List(items) => items.into_iter().map(|v| v.to_string()).collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Substitution stringification: lists join their elements with a space.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Self::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

/// One raw block of variables (`key: value`), keys possibly `[option]`-prefixed.
pub type VarBlock = IndexMap<String, Value>;

/// Variables may be written as a mapping or as a list of mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarSpec {
    Map(VarBlock),
    List(Vec<VarBlock>),
}

impl Default for VarSpec {
    fn default() -> Self {
        Self::Map(VarBlock::new())
    }
}

impl VarSpec {
    /// Merge into a single ordered block.
    pub fn into_block(self) -> VarBlock {
        match self {
            Self::Map(block) => block,
            Self::List(blocks) => blocks.into_iter().flatten().collect(),
        }
    }
}

// ============================================================================
// Cookbook schema
// ============================================================================

/// A parsed cookbook: `$globals` plus recipes keyed by target (or pattern).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cookbook {
    /// Cookbook-wide settings
    #[serde(rename = "$globals", default)]
    pub globals: Globals,

    /// Recipes in definition order
    #[serde(flatten)]
    pub recipes: IndexMap<String, RawRecipe>,
}

/// The reserved `$globals` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Globals {
    /// File-level variables (the `global` tier)
    #[serde(default)]
    pub vars: VarSpec,

    /// Shell used for every command
    #[serde(default)]
    pub shell: Option<String>,

    /// Minimum compatible tool version
    #[serde(default)]
    pub version: Option<String>,

    /// Legacy variable-precedence toggle, accepted but ignored
    #[serde(default)]
    pub new_order: Option<bool>,
}

/// A recipe block exactly as written in the cookbook.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecipe {
    /// Target is not a file
    #[serde(default)]
    pub phony: bool,

    /// Target is a regular expression
    #[serde(default)]
    pub regex: bool,

    /// Redirect to another target
    #[serde(default)]
    pub alias: Option<String>,

    /// Requirements in declaration order
    #[serde(default)]
    pub requires: Vec<Value>,

    /// Shell commands, each optionally `[option,...]`-prefixed
    #[serde(default)]
    pub commands: Vec<Value>,

    /// Echo every command
    #[serde(default)]
    pub echo: bool,

    /// Non-zero exits do not abort the build
    #[serde(default)]
    pub allow_failures: bool,

    /// Existence alone satisfies the target
    #[serde(default)]
    pub exists_only: bool,

    /// Keep a timestamp marker for a phony target
    #[serde(default)]
    pub keep_ts: bool,

    /// Target mtime is the latest mtime in its directory tree
    #[serde(default)]
    pub recursive: bool,

    /// Touch the target file after building it
    #[serde(default)]
    pub update: bool,

    /// Local variables (the `local` tier)
    #[serde(default)]
    pub vars: VarSpec,

    /// Structured existence check for phony targets
    #[serde(default)]
    pub existence_check: Option<IndexMap<String, Value>>,

    /// Shorthand for `existence_check.command`
    #[serde(default)]
    pub existence_command: Option<String>,
}

impl RawRecipe {
    /// The raw existence check, with `existence_command` folded in.
    /// An empty mapping counts as no check.
    pub fn raw_existence_check(&self) -> Option<Value> {
        let mut check = self.existence_check.clone().filter(|c| !c.is_empty());
        if let Some(ref command) = self.existence_command {
            check
                .get_or_insert_with(IndexMap::new)
                .insert("command".to_string(), Value::from(command.as_str()));
        }
        check.map(Value::Map)
    }
}

// ============================================================================
// Existence checks
// ============================================================================

/// A command whose outcome decides whether a phony target exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceCheck {
    pub command: String,
    /// Expected stdout, `None` means don't care
    pub stdout: Option<String>,
    /// Expected stderr, `None` means don't care
    pub stderr: Option<String>,
    pub returncode: i32,
}

impl ExistenceCheck {
    /// Build from an evaluated mapping.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Map(mut map) = value else {
            return Err(Error::Type(format!(
                "existence_check must be a mapping, got {}",
                value.type_name()
            )));
        };
        let command = match map.shift_remove("command") {
            Some(Value::Str(s)) => s,
            Some(other) => other.to_string(),
            None => return Err(Error::Config("existence_check needs a command".to_string())),
        };
        let text = |v: Option<Value>| match v {
            None | Some(Value::Null) => None,
            Some(Value::Str(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };
        let stdout = text(map.shift_remove("stdout"));
        let stderr = text(map.shift_remove("stderr"));
        let returncode = match map.shift_remove("returncode") {
            None | Some(Value::Null) => 0,
            Some(Value::Int(i)) => i32::try_from(i)
                .map_err(|_| Error::Type(format!("returncode {} out of range", i)))?,
            Some(Value::Str(s)) => s
                .trim()
                .parse()
                .map_err(|_| Error::Type(format!("returncode `{}` is not an integer", s)))?,
            Some(other) => {
                return Err(Error::Type(format!(
                    "returncode must be an integer, got {}",
                    other.type_name()
                )))
            }
        };
        Ok(Self {
            command,
            stdout,
            stderr,
            returncode,
        })
    }
}

// ============================================================================
// Versions
// ============================================================================

/// `major.minor.patch`, parsed leniently (`"1.2"`, `"5.1.0dev1"`, `"1.1-a1"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn from_string(version: &str) -> Result<Self> {
        let end = version
            .find(|c: char| c != '.' && !c.is_ascii_digit())
            .unwrap_or(version.len());
        let mut numeric = version[..end].to_string();
        if numeric.ends_with('.') {
            numeric.push('0');
        }
        while numeric.matches('.').count() < 2 {
            numeric.push_str(".0");
        }
        let parts = numeric
            .split('.')
            .take(3)
            .map(|p| p.parse::<u64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::Config(format!("invalid version `{}`", version)))?;
        Ok(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
        })
    }

    /// Version of the running crate.
    pub fn current() -> Result<Self> {
        Self::from_string(env!("CARGO_PKG_VERSION"))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
