//! Type-name identification keys.
//!
//! [`TypeName`] identifies a type within the container. Type names are
//! case-insensitive and may carry leading namespace separators
//! (`\App\Logger`, `::app::Logger`); both forms denote the same type.
//!
//! The display form keeps the caller's casing (minus the leading
//! separators), while equality and hashing use the canonical form.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer};

/// Strips leading namespace separators (`\` and `::`) from a type name.
///
/// # Examples
/// ```
/// use tarkib_container::key::strip_separators;
///
/// assert_eq!(strip_separators("\\App\\Logger"), "App\\Logger");
/// assert_eq!(strip_separators("::app::Logger"), "app::Logger");
/// ```
pub fn strip_separators(name: &str) -> &str {
    let mut rest = name;
    loop {
        if let Some(stripped) = rest.strip_prefix('\\') {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("::") {
            rest = stripped;
        } else {
            return rest;
        }
    }
}

/// Canonical storage form of a type name: separators stripped, lowercased.
///
/// Every registry boundary (insert, lookup, alias) goes through this.
///
/// # Examples
/// ```
/// use tarkib_container::key::canonicalize;
///
/// assert_eq!(canonicalize("\\App\\Logger"), "app\\logger");
/// assert_eq!(canonicalize("*"), "*");
/// ```
pub fn canonicalize(name: &str) -> String {
    strip_separators(name).to_lowercase()
}

/// A type name that compares by its canonical form.
///
/// # Examples
/// ```
/// use tarkib_container::key::TypeName;
///
/// let a = TypeName::new("\\App\\Logger");
/// let b = TypeName::new("app\\logger");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "App\\Logger");
/// assert_eq!(a.canonical(), "app\\logger");
/// ```
#[derive(Clone)]
pub struct TypeName {
    display: String,
    canonical: String,
}

impl TypeName {
    /// Creates a type name, stripping leading separators.
    pub fn new(name: impl AsRef<str>) -> Self {
        let display = strip_separators(name.as_ref()).to_string();
        let canonical = display.to_lowercase();
        Self { display, canonical }
    }

    /// Returns the name as written (without leading separators).
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// Returns the canonical (lowercase) form used for lookups.
    #[inline]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Returns `true` if the name is empty or whitespace only.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.display.trim().is_empty()
    }

    /// Returns `true` for the wildcard (`*`) rule key.
    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.canonical == "*"
    }
}

impl PartialEq for TypeName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for TypeName {}

impl Hash for TypeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

// HashMap<TypeName, _> lookups by canonical &str
impl Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.canonical
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl<'de> Deserialize<'de> for TypeName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(TypeName::new)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeName({})", self.display)
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}
