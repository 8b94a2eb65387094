use std::fmt;

/// Prefix bound in generated queries when the name carries none.
const QUERY_PREFIX: &str = "q";

/// A (namespace URI, local name) pair identifying an element regardless of
/// prefix.
///
/// An empty namespace URI means "no namespace". The prefix is cosmetic: it
/// names the namespace binding of the generated query and never takes part
/// in matching, so any prefix works, including one the searched document
/// binds to a different namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    namespace_uri: String,
    local_part: String,
    prefix: Option<String>,
}

impl QualifiedName {
    /// # Panics
    ///
    /// Panics if `local_part` is empty or not an NCName.
    pub fn new(namespace_uri: impl Into<String>, local_part: impl Into<String>) -> Self {
        let local_part = local_part.into();
        assert!(
            !local_part.is_empty(),
            "qualified name requires a local part"
        );
        assert!(
            is_ncname(&local_part),
            "local part '{}' is not an NCName",
            local_part
        );
        QualifiedName {
            namespace_uri: namespace_uri.into(),
            local_part,
            prefix: None,
        }
    }

    /// Same name, with a prefix used only to build query expressions.
    /// An empty prefix clears it.
    ///
    /// # Panics
    ///
    /// Panics if a non-empty `prefix` is not an NCName.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        assert!(
            prefix.is_empty() || is_ncname(&prefix),
            "prefix '{}' is not an NCName",
            prefix
        );
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    pub fn namespace_uri(&self) -> &str {
        &self.namespace_uri
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Whole-tree XPath query for this name, with the namespace binding it
    /// needs (none when the name is unqualified).
    pub(crate) fn descendant_query(&self) -> (String, Option<(&str, &str)>) {
        if self.namespace_uri.is_empty() {
            return (format!("//{}", self.local_part), None);
        }
        let prefix = self.prefix.as_deref().unwrap_or(QUERY_PREFIX);
        (
            format!("//{}:{}", prefix, self.local_part),
            Some((prefix, self.namespace_uri.as_str())),
        )
    }
}

/// XML name without colons: a letter or underscore, then letters, digits,
/// `.`, `-` or `_`. Non-ASCII letters and marks are accepted.
fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let start = |c: char| c == '_' || c.is_alphabetic() || (!c.is_ascii() && !c.is_whitespace());
    start(first)
        && chars.all(|c| start(c) || c.is_alphanumeric() || matches!(c, '.' | '-'))
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            f.write_str(&self.local_part)
        } else {
            write!(f, "{{{}}}{}", self.namespace_uri, self.local_part)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_binds_generated_prefix() {
        let name = QualifiedName::new("urn:a", "item");
        let (query, binding) = name.descendant_query();
        assert_eq!(query, "//q:item");
        assert_eq!(binding, Some(("q", "urn:a")));
    }

    #[test]
    fn test_query_uses_given_prefix() {
        let name = QualifiedName::new("urn:a", "item").with_prefix("xa");
        let (query, binding) = name.descendant_query();
        assert_eq!(query, "//xa:item");
        assert_eq!(binding, Some(("xa", "urn:a")));
    }

    #[test]
    fn test_unqualified_query_has_no_binding() {
        let name = QualifiedName::new("", "a").with_prefix("ignored");
        let (query, binding) = name.descendant_query();
        assert_eq!(query, "//a");
        assert!(binding.is_none());
    }

    #[test]
    fn test_prefix_does_not_affect_equality_of_display() {
        let plain = QualifiedName::new("urn:a", "item");
        let prefixed = plain.clone().with_prefix("p");
        assert_eq!(plain.to_string(), prefixed.to_string());
        assert_eq!(plain.to_string(), "{urn:a}item");
    }

    #[test]
    #[should_panic(expected = "local part")]
    fn test_empty_local_part_is_rejected() {
        let _ = QualifiedName::new("urn:a", "");
    }

    #[test]
    #[should_panic(expected = "not an NCName")]
    fn test_wildcard_local_part_is_rejected() {
        let _ = QualifiedName::new("urn:a", "*");
    }

    #[test]
    #[should_panic(expected = "not an NCName")]
    fn test_query_syntax_in_local_part_is_rejected() {
        let _ = QualifiedName::new("", "a|//b");
    }

    #[test]
    #[should_panic(expected = "not an NCName")]
    fn test_colon_in_prefix_is_rejected() {
        let _ = QualifiedName::new("urn:a", "item").with_prefix("p:q");
    }

    #[test]
    fn test_ncname_rules() {
        for name in ["item", "_x", "a-b.c_1", "été", "数据"] {
            assert!(is_ncname(name), "{} should be accepted", name);
        }
        for name in ["", "1a", "-a", ".a", "a b", "a:b", "a/b", "a[1]", "*"] {
            assert!(!is_ncname(name), "{} should be rejected", name);
        }
    }
}
