//! Regular-expression substitution over a whole document

use super::{Filter, Params, Scope};
use crate::error::{BuildError, BuildResult};
use regex::{Regex, RegexBuilder};

/// Applies each `(pattern, replacement)` pair in order to the document
#[derive(Debug, Clone)]
pub struct ReplaceRegexp {
    rules: Vec<(Regex, String)>,
}

impl ReplaceRegexp {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        let ignore_case = params.flag("ignorecase", false);
        let multiline = params.flag("multiline", false);

        let mut sources: Vec<(&str, &str)> = params.typed("regexp");
        if let Some(pattern) = params.get("pattern") {
            sources.push((pattern, params.get("replace").unwrap_or_default()));
        }
        if sources.is_empty() {
            return Err(BuildError::missing_attribute("replaceregexp", "pattern"));
        }

        let rules = sources
            .into_iter()
            .map(|(pattern, replace)| {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(ignore_case)
                    .multi_line(multiline)
                    .build()
                    .map_err(|e| BuildError::regex(pattern, e))?;
                Ok((re, convert_replacement(replace)))
            })
            .collect::<BuildResult<Vec<_>>>()?;

        Ok(Self { rules })
    }
}

/// Rewrite `\1` and `$1` group references into the unambiguous `${1}` form.
/// Every other `$` is literal.
fn convert_replacement(replace: &str) -> String {
    let mut out = String::with_capacity(replace.len());
    let mut chars = replace.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' | '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                let mut group = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    group.push(d);
                    chars.next();
                }
                out.push_str("${");
                out.push_str(&group);
                out.push('}');
            }
            '\\' if chars.peek() == Some(&'\\') => {
                chars.next();
                out.push('\\');
            }
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    out
}

impl Filter for ReplaceRegexp {
    fn scope(&self) -> Scope {
        Scope::Document
    }

    fn apply(&mut self, unit: String) -> Option<String> {
        let result = self
            .rules
            .iter()
            .fold(unit, |text, (re, replace)| re.replace_all(&text, replace.as_str()).into_owned());
        Some(result)
    }
}
