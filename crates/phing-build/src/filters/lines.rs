//! Line-oriented filters

use super::{split_terminator, Filter, Params, Scope};
use crate::error::{BuildError, BuildResult};
use regex::{Regex, RegexBuilder};
use std::collections::VecDeque;

/// Keeps lines containing the configured substrings
#[derive(Debug, Clone)]
pub struct LineContains {
    contains: Vec<String>,
    negate: bool,
    match_any: bool,
}

impl LineContains {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        let contains: Vec<String> = params.all("contains").into_iter().map(str::to_string).collect();
        if contains.is_empty() {
            return Err(BuildError::missing_attribute("linecontains", "contains"));
        }
        Ok(Self {
            contains,
            negate: params.flag("negate", false),
            match_any: params.flag("matchany", false),
        })
    }

    fn keep(&self, content: &str) -> bool {
        let matched = if self.match_any {
            self.contains.iter().any(|c| content.contains(c.as_str()))
        } else {
            self.contains.iter().all(|c| content.contains(c.as_str()))
        };
        matched != self.negate
    }
}

impl Filter for LineContains {
    fn apply(&mut self, unit: String) -> Option<String> {
        let (content, _) = split_terminator(&unit);
        self.keep(content).then_some(unit)
    }
}

/// Keeps lines matching all configured regular expressions
#[derive(Debug, Clone)]
pub struct LineContainsRegexp {
    patterns: Vec<Regex>,
    negate: bool,
}

impl LineContainsRegexp {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        let sources = params.all("regexp");
        if sources.is_empty() {
            return Err(BuildError::missing_attribute("linecontainsregexp", "regexp"));
        }
        let case_sensitive = params.flag("casesensitive", true);
        let patterns = sources
            .into_iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| BuildError::regex(p, e))
            })
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(Self {
            patterns,
            negate: params.flag("negate", false),
        })
    }
}

impl Filter for LineContainsRegexp {
    fn apply(&mut self, unit: String) -> Option<String> {
        let (content, _) = split_terminator(&unit);
        let matched = self.patterns.iter().all(|re| re.is_match(content));
        (matched != self.negate).then_some(unit)
    }
}

/// Adds a prefix to every line
#[derive(Debug, Clone)]
pub struct PrefixLines {
    prefix: String,
}

impl PrefixLines {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        Ok(Self {
            prefix: params.require("prefix")?.to_string(),
        })
    }
}

impl Filter for PrefixLines {
    fn apply(&mut self, unit: String) -> Option<String> {
        Some(format!("{}{}", self.prefix, unit))
    }
}

/// Adds a suffix before every line terminator
#[derive(Debug, Clone)]
pub struct SuffixLines {
    suffix: String,
}

impl SuffixLines {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        Ok(Self {
            suffix: params.require("suffix")?.to_string(),
        })
    }
}

impl Filter for SuffixLines {
    fn apply(&mut self, unit: String) -> Option<String> {
        let (content, terminator) = split_terminator(&unit);
        Some(format!("{}{}{}", content, self.suffix, terminator))
    }
}

/// Removes line-break characters
#[derive(Debug, Clone)]
pub struct StripLineBreaks {
    chars: Vec<char>,
}

impl StripLineBreaks {
    pub(super) fn configure(params: &Params) -> Self {
        let chars = params
            .get("linebreaks")
            .map(unescape)
            .unwrap_or_else(|| "\r\n".to_string());
        Self {
            chars: chars.chars().collect(),
        }
    }
}

/// Interpret `\n`, `\r` and `\t` escapes written literally in a build file
fn unescape(s: &str) -> String {
    s.replace("\\r", "\r").replace("\\n", "\n").replace("\\t", "\t")
}

impl Filter for StripLineBreaks {
    fn apply(&mut self, unit: String) -> Option<String> {
        Some(unit.chars().filter(|c| !self.chars.contains(c)).collect())
    }
}

/// Drops comment lines
#[derive(Debug, Clone)]
pub struct StripLineComments {
    prefixes: Vec<String>,
}

impl StripLineComments {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        let prefixes: Vec<String> = params
            .all("comment")
            .into_iter()
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if prefixes.is_empty() {
            return Err(BuildError::missing_attribute("striplinecomments", "comment"));
        }
        Ok(Self { prefixes })
    }
}

impl Filter for StripLineComments {
    fn apply(&mut self, unit: String) -> Option<String> {
        let trimmed = unit.trim_start();
        let comment = self.prefixes.iter().any(|p| trimmed.starts_with(p.as_str()));
        (!comment).then_some(unit)
    }
}

/// Replaces tabs with spaces
#[derive(Debug, Clone)]
pub struct TabToSpaces {
    spaces: String,
}

impl TabToSpaces {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        let width = params.number("tablength", 8)?;
        Ok(Self {
            spaces: " ".repeat(width),
        })
    }
}

impl Filter for TabToSpaces {
    fn apply(&mut self, unit: String) -> Option<String> {
        Some(unit.replace('\t', &self.spaces))
    }
}

/// Keeps the first `lines` lines after skipping `skip`
#[derive(Debug, Clone)]
pub struct HeadFilter {
    lines: usize,
    skip: usize,
    seen: usize,
}

impl HeadFilter {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        Ok(Self {
            lines: params.number("lines", 10)?,
            skip: params.number("skip", 0)?,
            seen: 0,
        })
    }
}

impl Filter for HeadFilter {
    fn apply(&mut self, unit: String) -> Option<String> {
        self.seen += 1;
        (self.seen > self.skip && self.seen <= self.skip.saturating_add(self.lines)).then_some(unit)
    }

    fn is_done(&self) -> bool {
        self.seen >= self.skip.saturating_add(self.lines)
    }
}

/// Keeps the last `lines` lines, ignoring the final `skip`
#[derive(Debug, Clone)]
pub struct TailFilter {
    lines: usize,
    skip: usize,
    window: VecDeque<String>,
}

impl TailFilter {
    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        Ok(Self {
            lines: params.number("lines", 10)?,
            skip: params.number("skip", 0)?,
            window: VecDeque::new(),
        })
    }
}

impl Filter for TailFilter {
    fn apply(&mut self, unit: String) -> Option<String> {
        self.window.push_back(unit);
        if self.window.len() > self.lines.saturating_add(self.skip) {
            self.window.pop_front();
        }
        None
    }

    fn finish(&mut self) -> Option<String> {
        let keep = self.window.len().saturating_sub(self.skip);
        let out: String = self.window.drain(..).take(keep).collect();
        (!out.is_empty()).then_some(out)
    }
}

/// Escapes non-ASCII characters as `\uXXXX`
#[derive(Debug, Clone, Copy)]
pub struct EscapeUnicode;

impl Filter for EscapeUnicode {
    fn apply(&mut self, unit: String) -> Option<String> {
        if unit.is_ascii() {
            return Some(unit);
        }
        let mut out = String::with_capacity(unit.len() + 8);
        let mut units = [0u16; 2];
        for c in unit.chars() {
            if c.is_ascii() {
                out.push(c);
            } else {
                for u in c.encode_utf16(&mut units).iter() {
                    out.push_str(&format!("\\u{:04x}", u));
                }
            }
        }
        Some(out)
    }
}

/// Sorts the lines of the document
#[derive(Debug, Clone)]
pub struct SortFilter {
    reverse: bool,
}

impl SortFilter {
    pub(super) fn configure(params: &Params) -> Self {
        Self {
            reverse: params.flag("reverse", false),
        }
    }
}

impl Filter for SortFilter {
    fn scope(&self) -> Scope {
        Scope::Document
    }

    fn apply(&mut self, unit: String) -> Option<String> {
        let mut lines: Vec<&str> = unit.lines().collect();
        lines.sort_unstable();
        if self.reverse {
            lines.reverse();
        }
        if lines.is_empty() {
            return None;
        }
        let mut out = lines.join("\n");
        out.push('\n');
        Some(out)
    }
}

/// Drops consecutive duplicate lines
#[derive(Debug, Clone, Default)]
pub struct UniqFilter {
    last: Option<String>,
}

impl Filter for UniqFilter {
    fn apply(&mut self, unit: String) -> Option<String> {
        let (content, _) = split_terminator(&unit);
        if self.last.as_deref() == Some(content) {
            return None;
        }
        self.last = Some(content.to_string());
        Some(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ChainReaderHelper, FilterContext, FilterDef, FilterReader, Parameter};
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::io::{self, Read};

    fn run(def: FilterDef, input: &str) -> String {
        ChainReaderHelper::new(vec![def], FilterContext::default())
            .filter_string(input)
            .unwrap()
    }

    fn def(name: &str, params: &[(&str, &str)]) -> FilterDef {
        params.iter().fold(FilterDef::new(name), |d, (k, v)| {
            d.with_param(Parameter::new(*k, *v))
        })
    }

    #[rstest]
    #[case(&[("contains", "foo")], "foo\nbar\nfoobar\n", "foo\nfoobar\n")]
    #[case(&[("contains", "foo"), ("contains", "bar")], "foo\nbar\nfoobar\n", "foobar\n")]
    #[case(&[("contains", "foo"), ("contains", "bar"), ("matchany", "true")], "foo\nbaz\nbar\n", "foo\nbar\n")]
    #[case(&[("contains", "foo"), ("negate", "true")], "foo\nbar\n", "bar\n")]
    fn test_linecontains(#[case] params: &[(&str, &str)], #[case] input: &str, #[case] expected: &str) {
        assert_eq!(run(def("linecontains", params), input), expected);
    }

    #[test]
    fn test_linecontains_requires_contains() {
        let result = ChainReaderHelper::new(vec![FilterDef::new("linecontains")], FilterContext::default())
            .assemble(Box::new(io::empty()));
        assert!(matches!(result, Err(BuildError::MissingAttribute { .. })));
    }

    #[test]
    fn test_linecontainsregexp_case_insensitive() {
        let d = def(
            "linecontainsregexp",
            &[("regexp", "^err(or)?:"), ("casesensitive", "false")],
        );
        assert_eq!(run(d, "ERROR: a\nwarn: b\nerr: c\n"), "ERROR: a\nerr: c\n");
    }

    #[test]
    fn test_linecontainsregexp_invalid_pattern() {
        let result = ChainReaderHelper::new(
            vec![def("linecontainsregexp", &[("regexp", "(")])],
            FilterContext::default(),
        )
        .assemble(Box::new(io::empty()));
        assert!(matches!(result, Err(BuildError::InvalidRegex { .. })));
    }

    #[test]
    fn test_prefix_and_suffix_lines() {
        assert_eq!(run(def("prefixlines", &[("prefix", "// ")]), "a\nb"), "// a\n// b");
        assert_eq!(run(def("suffixlines", &[("suffix", ";")]), "a\r\nb\n"), "a;\r\nb;\n");
    }

    #[test]
    fn test_prefixlines_requires_prefix() {
        let result = ChainReaderHelper::new(vec![FilterDef::new("prefixlines")], FilterContext::default())
            .assemble(Box::new(io::empty()));
        match result {
            Err(err) => assert_eq!(err.to_string(), "prefixlines requires the 'prefix' attribute"),
            Ok(_) => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_striplinebreaks() {
        assert_eq!(run(FilterDef::new("striplinebreaks"), "a\r\nb\nc"), "abc");
        assert_eq!(
            run(def("striplinebreaks", &[("linebreaks", "\\n;")]), "a;b\nc\n"),
            "abc"
        );
    }

    #[test]
    fn test_striplinecomments() {
        let d = def("striplinecomments", &[("comment", "#"), ("comment", "//")]);
        assert_eq!(
            run(d, "# header\ncode\n  // note\nmore # inline\n"),
            "code\nmore # inline\n"
        );
    }

    #[test]
    fn test_tabtospaces() {
        assert_eq!(run(def("tabtospaces", &[("tablength", "2")]), "\tx\n"), "  x\n");
        assert_eq!(run(FilterDef::new("tabtospaces"), "\t|\n"), "        |\n");
    }

    #[test]
    fn test_tabtospaces_rejects_non_numeric_length() {
        let result = ChainReaderHelper::new(
            vec![def("tabtospaces", &[("tablength", "wide")])],
            FilterContext::default(),
        )
        .assemble(Box::new(io::empty()));
        assert!(matches!(result, Err(BuildError::InvalidAttribute { .. })));
    }

    #[rstest]
    #[case(&[("lines", "2")], "1\n2\n3\n4\n", "1\n2\n")]
    #[case(&[("lines", "2"), ("skip", "1")], "1\n2\n3\n4\n", "2\n3\n")]
    #[case(&[("lines", "5")], "1\n2\n", "1\n2\n")]
    fn test_headfilter(#[case] params: &[(&str, &str)], #[case] input: &str, #[case] expected: &str) {
        assert_eq!(run(def("headfilter", params), input), expected);
    }

    #[rstest]
    #[case(&[("lines", "2")], "1\n2\n3\n4\n", "3\n4\n")]
    #[case(&[("lines", "2"), ("skip", "1")], "1\n2\n3\n4\n", "2\n3\n")]
    #[case(&[("lines", "5")], "1\n2\n", "1\n2\n")]
    #[case(&[("lines", "1")], "", "")]
    fn test_tailfilter(#[case] params: &[(&str, &str)], #[case] input: &str, #[case] expected: &str) {
        assert_eq!(run(def("tailfilter", params), input), expected);
    }

    #[test]
    fn test_head_and_tail_accept_huge_counts() {
        let max = usize::MAX.to_string();
        let params = [("lines", max.as_str()), ("skip", "1")];
        assert_eq!(run(def("headfilter", &params), "1\n2\n3\n"), "2\n3\n");
        assert_eq!(run(def("tailfilter", &params), "1\n2\n3\n"), "1\n2\n");
    }

    /// Yields `line\n` forever
    struct Endless;

    impl Read for Endless {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = if i % 5 == 4 { b'\n' } else { b"line"[i % 5] };
            }
            Ok(buf.len() - buf.len() % 5)
        }
    }

    #[test]
    fn test_headfilter_stops_pulling_upstream() {
        let mut reader = FilterReader::new(
            Box::new(Endless),
            def("headfilter", &[("lines", "3")]),
            FilterContext::default(),
        )
        .unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "line\nline\nline\n");
    }

    #[test]
    fn test_escapeunicode() {
        assert_eq!(run(FilterDef::new("escapeunicode"), "caf\u{e9}\n"), "caf\\u00e9\n");
        assert_eq!(run(FilterDef::new("escapeunicode"), "\u{1F600}"), "\\ud83d\\ude00");
    }

    #[test]
    fn test_sortfilter() {
        assert_eq!(run(FilterDef::new("sortfilter"), "b\nc\na\n"), "a\nb\nc\n");
        assert_eq!(
            run(def("sortfilter", &[("reverse", "yes")]), "b\nc\na"),
            "c\nb\na\n"
        );
    }

    #[test]
    fn test_uniqfilter() {
        assert_eq!(
            run(FilterDef::new("uniqfilter"), "a\na\nb\na\nb\nb"),
            "a\nb\na\nb\n"
        );
    }
}
