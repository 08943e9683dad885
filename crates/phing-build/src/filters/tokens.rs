//! Token and property substitution filters

use super::{Filter, FilterContext, Params};
use crate::error::BuildResult;
use crate::properties::{load_properties_file, PropertySet};
use std::collections::HashMap;

/// Replaces `@key@` style tokens with configured values
#[derive(Debug, Clone)]
pub struct ReplaceTokens {
    begin: String,
    end: String,
    tokens: HashMap<String, String>,
}

impl ReplaceTokens {
    /// Create a new filter with the given delimiters
    pub fn new(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
            tokens: HashMap::new(),
        }
    }

    /// Add a token
    pub fn with_token(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(key.into(), value.into());
        self
    }

    pub(super) fn configure(params: &Params, context: &FilterContext) -> BuildResult<Self> {
        let begin = params.get("begintoken").unwrap_or("@");
        let end = params.get("endtoken").unwrap_or("@");
        if begin.is_empty() || end.is_empty() {
            return Err(crate::error::BuildError::invalid_attribute(
                "replacetokens",
                "begintoken",
                "token delimiters cannot be empty",
            ));
        }

        let mut filter = Self::new(begin, end);
        for file in params.all("tokenfile") {
            for (key, value) in load_properties_file(&context.resolve(file))? {
                filter.tokens.insert(key, value);
            }
        }
        for (key, value) in params.typed("token") {
            if !key.is_empty() {
                filter.tokens.insert(key.to_string(), value.to_string());
            }
        }
        Ok(filter)
    }

    fn is_key_char(c: char) -> bool {
        c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | ':' | '/')
    }

    /// Replace every known token in `text`
    pub fn replace(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(&self.begin) {
            out.push_str(&rest[..start]);
            let after = &rest[start + self.begin.len()..];

            let replaced = after.find(&self.end).and_then(|end| {
                let key = &after[..end];
                if key.is_empty() || !key.chars().all(Self::is_key_char) {
                    return None;
                }
                self.tokens
                    .get(key)
                    .map(|value| (value, end + self.end.len()))
            });

            match replaced {
                Some((value, consumed)) => {
                    out.push_str(value);
                    rest = &after[consumed..];
                }
                None => {
                    // Not a token: emit the delimiter and rescan after it,
                    // so `@@name@` still finds `@name@`.
                    out.push_str(&self.begin);
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl Filter for ReplaceTokens {
    fn apply(&mut self, unit: String) -> Option<String> {
        Some(self.replace(&unit))
    }
}

/// Expands `${name}` references with project properties
#[derive(Debug, Clone)]
pub struct ExpandProperties {
    properties: PropertySet,
}

impl ExpandProperties {
    pub fn new(properties: PropertySet) -> Self {
        Self { properties }
    }
}

impl Filter for ExpandProperties {
    fn apply(&mut self, unit: String) -> Option<String> {
        Some(self.properties.expand(&unit))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ChainReaderHelper, FilterDef, Parameter};
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_replace_known_tokens() {
        let filter = ReplaceTokens::new("@", "@")
            .with_token("version", "1.2.3")
            .with_token("app.name", "demo");
        assert_eq!(
            filter.replace("@app.name@ v@version@ by @author@"),
            "demo v1.2.3 by @author@"
        );
    }

    #[test]
    fn test_replace_with_custom_delimiters() {
        let filter = ReplaceTokens::new("%{", "}").with_token("x", "42");
        assert_eq!(filter.replace("a=%{x}, b=%{y}"), "a=42, b=%{y}");
    }

    #[test]
    fn test_email_like_text_is_untouched() {
        let filter = ReplaceTokens::new("@", "@").with_token("example.com", "nope");
        assert_eq!(filter.replace("mail me@ home"), "mail me@ home");
    }

    #[test]
    fn test_double_delimiter_rescans() {
        let filter = ReplaceTokens::new("@", "@").with_token("name", "x");
        assert_eq!(filter.replace("@@name@"), "@x");
    }

    #[test]
    fn test_tokenfile_and_token_params() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("tokens.properties"), "greeting=hello\nname=file\n").unwrap();

        let def = FilterDef::new("replacetokens")
            .with_param(Parameter::new("tokenfile", "tokens.properties"))
            .with_param(Parameter::typed("token", Some("name"), "param"));
        let helper = ChainReaderHelper::new(
            vec![def],
            FilterContext::new(PropertySet::new(), temp.path()),
        );

        assert_eq!(
            helper.filter_string("@greeting@, @name@!\n").unwrap(),
            "hello, param!\n"
        );
    }

    #[test]
    fn test_expand_properties_filter() {
        let mut props = PropertySet::new();
        props.set("who", "world");
        let helper = ChainReaderHelper::new(
            vec![FilterDef::new("expandproperties")],
            FilterContext::new(props, "."),
        );
        assert_eq!(
            helper.filter_string("hello ${who} ${unknown}\n").unwrap(),
            "hello world ${unknown}\n"
        );
    }
}
