//! Project properties and `${...}` expansion
//!
//! Properties are immutable once set: the first writer wins. User properties
//! (given on the command line) are stored separately and shadow everything,
//! including later attempts to override them.

use crate::error::{BuildError, BuildResult};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Property storage for a project
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    values: HashMap<String, String>,
    user: HashMap<String, String>,
}

impl PropertySet {
    /// Create an empty property set
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a property, user properties first
    pub fn get(&self, name: &str) -> Option<&str> {
        self.user
            .get(name)
            .or_else(|| self.values.get(name))
            .map(String::as_str)
    }

    /// Whether a property is set
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a property unless it already has a value.
    ///
    /// Returns `true` when the value was stored.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.is_set(&name) {
            return false;
        }
        self.values.insert(name, value.into());
        true
    }

    /// Set a property even if it exists. User properties still win.
    pub fn set_override(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.user.contains_key(&name) {
            return false;
        }
        self.values.insert(name, value.into());
        true
    }

    /// Set a user property (always stored, never overwritten by the build file)
    pub fn set_user(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.user.insert(name.into(), value.into());
    }

    /// Whether the property was supplied by the user
    pub fn is_user_property(&self, name: &str) -> bool {
        self.user.contains_key(name)
    }

    /// Remove a non-user property
    pub fn unset(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// User properties, used when handing properties to a called target
    pub fn user_properties(&self) -> &HashMap<String, String> {
        &self.user
    }

    /// All visible properties, sorted by name
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut all: BTreeMap<String, String> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in &self.user {
            all.insert(k.clone(), v.clone());
        }
        all
    }

    /// Number of visible properties
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Check if no properties are set
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.user.is_empty()
    }

    /// Replace `${name}` references with property values.
    ///
    /// Unknown references are kept verbatim and `$$` collapses to `$`.
    pub fn expand(&self, text: &str) -> String {
        if !text.contains('$') {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("$$") {
                out.push('$');
                rest = &tail[2..];
            } else if let Some(body) = tail.strip_prefix("${") {
                match body.find('}') {
                    Some(end) => {
                        let name = &body[..end];
                        match self.get(name) {
                            Some(value) => out.push_str(value),
                            None => {
                                out.push_str("${");
                                out.push_str(name);
                                out.push('}');
                            }
                        }
                        rest = &body[end + 1..];
                    }
                    None => {
                        out.push_str(tail);
                        rest = "";
                    }
                }
            } else {
                out.push('$');
                rest = &tail[1..];
            }
        }

        out.push_str(rest);
        out
    }
}

/// Parse the contents of a `.properties` file.
///
/// Supports `key=value` and `key: value` lines, `#`, `!` and `;` comments,
/// and trailing-backslash continuation lines. Order is preserved.
pub fn parse_properties(content: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut logical = String::new();

    for raw in content.lines() {
        let line = if logical.is_empty() {
            raw.trim_start()
        } else {
            raw.trim()
        };

        if logical.is_empty() && (line.is_empty() || line.starts_with(&['#', '!', ';'][..])) {
            continue;
        }

        if let Some(stripped) = line.strip_suffix('\\') {
            logical.push_str(stripped);
            continue;
        }

        logical.push_str(line);
        if let Some(entry) = split_entry(&logical) {
            entries.push(entry);
        }
        logical.clear();
    }

    if !logical.is_empty() {
        if let Some(entry) = split_entry(&logical) {
            entries.push(entry);
        }
    }

    entries
}

fn split_entry(line: &str) -> Option<(String, String)> {
    let sep = line.find(&['=', ':'][..])?;
    let key = line[..sep].trim();
    if key.is_empty() {
        return None;
    }
    let value = line[sep + 1..].trim();
    Some((key.to_string(), value.to_string()))
}

/// Read and parse a `.properties` file
pub fn load_properties_file(path: &Path) -> BuildResult<Vec<(String, String)>> {
    let content = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
    Ok(parse_properties(&content))
}

/// Interpret a property-style boolean (`true`, `yes`, `on`, `1`)
pub fn to_boolean(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_writer_wins() {
        let mut props = PropertySet::new();
        assert!(props.set("name", "first"));
        assert!(!props.set("name", "second"));
        assert_eq!(props.get("name"), Some("first"));
    }

    #[test]
    fn test_user_property_shadows_override() {
        let mut props = PropertySet::new();
        props.set_user("env", "prod");
        assert!(!props.set("env", "dev"));
        assert!(!props.set_override("env", "dev"));
        assert_eq!(props.get("env"), Some("prod"));
        assert!(props.is_user_property("env"));
    }

    #[test]
    fn test_override_replaces_regular_property() {
        let mut props = PropertySet::new();
        props.set("count", "1");
        assert!(props.set_override("count", "2"));
        assert_eq!(props.get("count"), Some("2"));
    }

    #[test]
    fn test_expand_known_and_unknown() {
        let mut props = PropertySet::new();
        props.set("version", "1.2");
        assert_eq!(
            props.expand("v${version} of ${missing}"),
            "v1.2 of ${missing}"
        );
    }

    #[test]
    fn test_expand_escapes_and_unterminated() {
        let props = PropertySet::new();
        assert_eq!(props.expand("cost: $$5"), "cost: $5");
        assert_eq!(props.expand("open ${brace"), "open ${brace");
        assert_eq!(props.expand("lone $ sign"), "lone $ sign");
    }

    #[test]
    fn test_parse_properties() {
        let content = "# comment\n! also comment\nname = demo\npath: /tmp/x\nlong = a \\\n   b\n\nempty=\n";
        let entries = parse_properties(content);
        assert_eq!(
            entries,
            vec![
                ("name".to_string(), "demo".to_string()),
                ("path".to_string(), "/tmp/x".to_string()),
                ("long".to_string(), "a b".to_string()),
                ("empty".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_to_boolean() {
        assert!(to_boolean("true"));
        assert!(to_boolean(" Yes "));
        assert!(to_boolean("on"));
        assert!(!to_boolean("false"));
        assert!(!to_boolean("maybe"));
    }
}
