//! Simple and fully-qualified names
//!
//! `FqName` is the dot-separated name of a package or class. The root package
//! is the empty name.

use std::fmt;

/// A single identifier segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(String);

impl Name {
    /// Create a name from an identifier.
    pub fn identifier(text: impl Into<String>) -> Self {
        Name(text.into())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::identifier(text)
    }
}

/// Fully-qualified, dot-separated name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FqName(String);

impl FqName {
    /// The root package.
    pub fn root() -> Self {
        FqName(String::new())
    }

    /// Parse a dot-separated name. Empty segments are dropped.
    pub fn new(text: &str) -> Self {
        let segments: Vec<&str> = text.split('.').filter(|s| !s.is_empty()).collect();
        FqName(segments.join("."))
    }

    /// Build a name from its segments.
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a Name>) -> Self {
        let mut fq = FqName::root();
        for segment in segments {
            fq = fq.child(segment);
        }
        fq
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The enclosing name, or `None` for the root.
    pub fn parent(&self) -> Option<FqName> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('.') {
            Some(dot) => Some(FqName(self.0[..dot].to_string())),
            None => Some(FqName::root()),
        }
    }

    /// The last segment. The root has an empty short name.
    pub fn short_name(&self) -> Name {
        match self.0.rfind('.') {
            Some(dot) => Name::identifier(&self.0[dot + 1..]),
            None => Name::identifier(self.0.as_str()),
        }
    }

    pub fn child(&self, name: &Name) -> FqName {
        if self.is_root() {
            FqName(name.as_str().to_string())
        } else {
            FqName(format!("{}.{}", self.0, name))
        }
    }

    pub fn segments(&self) -> Vec<Name> {
        if self.is_root() {
            return Vec::new();
        }
        self.0.split('.').map(Name::identifier).collect()
    }

    /// Whether the last segment equals `name`.
    pub fn last_segment_is(&self, name: &str) -> bool {
        !self.is_root() && self.short_name().as_str() == name
    }

    /// Whether `self` equals `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &FqName) -> bool {
        prefix.is_root()
            || self.0 == prefix.0
            || (self.0.starts_with(prefix.as_str())
                && self.0.as_bytes().get(prefix.0.len()) == Some(&b'.'))
    }

    /// This name with dots replaced by slashes (`a/b/C`).
    pub fn internal_name(&self) -> String {
        self.0.replace('.', "/")
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for FqName {
    fn from(text: &str) -> Self {
        FqName::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_chain_reaches_root() {
        let name = FqName::new("a.b.c");
        assert_eq!(name.parent(), Some(FqName::new("a.b")));
        assert_eq!(FqName::new("a").parent(), Some(FqName::root()));
        assert_eq!(FqName::root().parent(), None);
    }

    #[test]
    fn test_child_and_short_name() {
        let pkg = FqName::new("foo");
        let child = pkg.child(&Name::identifier("bar"));
        assert_eq!(child.as_str(), "foo.bar");
        assert_eq!(child.short_name().as_str(), "bar");
        assert_eq!(FqName::root().child(&Name::identifier("x")).as_str(), "x");
    }

    #[test]
    fn test_starts_with_respects_segments() {
        let name = FqName::new("foo.bar.Baz");
        assert!(name.starts_with(&FqName::new("foo")));
        assert!(name.starts_with(&FqName::new("foo.bar")));
        assert!(!name.starts_with(&FqName::new("foo.ba")));
        assert!(name.starts_with(&FqName::root()));
    }

    #[test]
    fn test_internal_name() {
        assert_eq!(FqName::new("java.lang.String").internal_name(), "java/lang/String");
    }
}
