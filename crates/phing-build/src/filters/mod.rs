//! Chained stream filters
//!
//! Each [`FilterReader`] wraps an upstream reader and exposes `std::io::Read`,
//! so filters stack into a decorator chain. The consumer pulls from the
//! outermost reader; data is transformed one unit (a line, or the whole
//! document) at a time, and only as far as the consumer reads.
//!
//! Filters are configured from [`FilterDef`]s and initialised when the chain
//! is assembled, so bad configuration fails before any data is read.

mod iconv;
mod lines;
mod replace_regexp;
mod tokens;

pub use iconv::IconvFilter;
pub use lines::{
    EscapeUnicode, HeadFilter, LineContains, LineContainsRegexp, PrefixLines, SortFilter,
    StripLineBreaks, StripLineComments, SuffixLines, TabToSpaces, TailFilter, UniqFilter,
};
pub use replace_regexp::ReplaceRegexp;
pub use tokens::{ExpandProperties, ReplaceTokens};

use crate::de::opt_scalar_string;
use crate::error::{BuildError, BuildResult};
use crate::properties::{to_boolean, PropertySet};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// A filter configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "opt_scalar_string")]
    value: Option<String>,
}

impl Parameter {
    /// Create a named parameter
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            kind: None,
            value: Some(value.into()),
        }
    }

    /// Create a typed parameter such as a `token` or `contains` entry
    pub fn typed(kind: impl Into<String>, name: Option<&str>, value: impl Into<String>) -> Self {
        Self {
            name: name.map(str::to_string),
            kind: Some(kind.into()),
            value: Some(value.into()),
        }
    }

    /// Parameter value, empty when unset
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }

    fn matches(&self, key: &str) -> bool {
        match (&self.kind, &self.name) {
            (Some(kind), _) if kind == key => true,
            (None, Some(name)) => name == key,
            _ => false,
        }
    }
}

/// A configured filter in a chain: its name plus ordered parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawFilterDef")]
pub struct FilterDef {
    pub name: String,
    pub params: Vec<Parameter>,
}

#[derive(Deserialize)]
struct RawFilterDef {
    #[serde(rename = "type")]
    name: String,
    #[serde(default, rename = "param")]
    params: Vec<Parameter>,
    #[serde(flatten)]
    attributes: BTreeMap<String, toml::Value>,
}

impl TryFrom<RawFilterDef> for FilterDef {
    type Error = String;

    fn try_from(raw: RawFilterDef) -> Result<Self, Self::Error> {
        let mut params = raw.params;
        for (key, value) in raw.attributes {
            shorthand_params(&key, value, &mut params)?;
        }
        Ok(Self {
            name: raw.name.to_lowercase(),
            params,
        })
    }
}

/// `prefix = "> "` is a parameter named `prefix`; `contains = ["a", "b"]`
/// is one parameter per element; `token = { k = "v" }` is a `token`-typed
/// parameter per key.
fn shorthand_params(key: &str, value: toml::Value, out: &mut Vec<Parameter>) -> Result<(), String> {
    match value {
        toml::Value::Array(items) => {
            for item in items {
                shorthand_params(key, item, out)?;
            }
        }
        toml::Value::Table(table) => {
            for (name, value) in table {
                let value = scalar_value(&value)
                    .ok_or_else(|| format!("'{}.{}' must be a scalar value", key, name))?;
                out.push(Parameter::typed(key, Some(&name), value));
            }
        }
        other => {
            let value =
                scalar_value(&other).ok_or_else(|| format!("'{}' must be a scalar value", key))?;
            out.push(Parameter::new(key, value));
        }
    }
    Ok(())
}

fn scalar_value(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        _ => None,
    }
}

impl FilterDef {
    /// Create a filter definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    /// Instantiate and initialise the filter.
    ///
    /// Parameter values are property-expanded first.
    pub fn create(&self, context: &FilterContext) -> BuildResult<Box<dyn Filter>> {
        let expanded: Vec<Parameter> = self
            .params
            .iter()
            .map(|p| Parameter {
                name: p.name.clone(),
                kind: p.kind.clone(),
                value: p.value.as_deref().map(|v| context.properties.expand(v)),
            })
            .collect();
        let params = Params::new(&self.name, &expanded);

        let filter: Box<dyn Filter> = match self.name.as_str() {
            "replacetokens" => Box::new(ReplaceTokens::configure(&params, context)?),
            "expandproperties" => Box::new(ExpandProperties::new(context.properties.clone())),
            "linecontains" => Box::new(LineContains::configure(&params)?),
            "linecontainsregexp" => Box::new(LineContainsRegexp::configure(&params)?),
            "prefixlines" => Box::new(PrefixLines::configure(&params)?),
            "suffixlines" => Box::new(SuffixLines::configure(&params)?),
            "striplinebreaks" => Box::new(StripLineBreaks::configure(&params)),
            "striplinecomments" => Box::new(StripLineComments::configure(&params)?),
            "tabtospaces" => Box::new(TabToSpaces::configure(&params)?),
            "headfilter" => Box::new(HeadFilter::configure(&params)?),
            "tailfilter" => Box::new(TailFilter::configure(&params)?),
            "escapeunicode" => Box::new(EscapeUnicode),
            "sortfilter" => Box::new(SortFilter::configure(&params)),
            "uniqfilter" => Box::new(UniqFilter::default()),
            "replaceregexp" => Box::new(ReplaceRegexp::configure(&params)?),
            "iconvfilter" => Box::new(IconvFilter::configure(&params)?),
            other => return Err(BuildError::UnknownFilter(other.to_string())),
        };
        tracing::trace!(filter = %self.name, params = expanded.len(), "filter initialised");
        Ok(filter)
    }
}

/// Lookup helper over a filter's expanded parameters
pub struct Params<'a> {
    filter: &'a str,
    params: &'a [Parameter],
}

impl<'a> Params<'a> {
    pub fn new(filter: &'a str, params: &'a [Parameter]) -> Self {
        Self { filter, params }
    }

    /// Last value given for `key`
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.params
            .iter()
            .rev()
            .find(|p| p.matches(key))
            .map(Parameter::value)
    }

    /// Value for `key`, or a missing-attribute error
    pub fn require(&self, key: &str) -> BuildResult<&'a str> {
        self.get(key)
            .ok_or_else(|| BuildError::missing_attribute(self.filter, key))
    }

    /// Every value given for `key`, in order
    pub fn all(&self, key: &str) -> Vec<&'a str> {
        self.params
            .iter()
            .filter(|p| p.matches(key))
            .map(Parameter::value)
            .collect()
    }

    /// `(name, value)` of every parameter typed `kind`
    pub fn typed(&self, kind: &str) -> Vec<(&'a str, &'a str)> {
        self.params
            .iter()
            .filter(|p| p.kind.as_deref() == Some(kind))
            .map(|p| (p.name.as_deref().unwrap_or_default(), p.value()))
            .collect()
    }

    pub fn flag(&self, key: &str, default: bool) -> bool {
        self.get(key).map(to_boolean).unwrap_or(default)
    }

    pub fn number(&self, key: &str, default: usize) -> BuildResult<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| BuildError::invalid_attribute(self.filter, key, e)),
        }
    }
}

/// Unit a filter transforms at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One line, terminator included
    Line,
    /// The whole remaining input
    Document,
}

/// A stream transformation
pub trait Filter {
    fn scope(&self) -> Scope {
        Scope::Line
    }

    /// Transform one unit; `None` drops it
    fn apply(&mut self, unit: String) -> Option<String>;

    /// Emit anything held back once the input is exhausted
    fn finish(&mut self) -> Option<String> {
        None
    }

    /// True once the filter will drop all further input
    fn is_done(&self) -> bool {
        false
    }

    /// Byte-level hook; text filters decode lossily as UTF-8
    fn apply_bytes(&mut self, unit: Vec<u8>) -> Option<Vec<u8>> {
        let text = match String::from_utf8(unit) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        self.apply(text).map(String::into_bytes)
    }
}

/// Shared state filters may consult while being configured
#[derive(Debug, Clone, Default)]
pub struct FilterContext {
    pub properties: PropertySet,
    pub basedir: PathBuf,
}

impl FilterContext {
    /// Create a new filter context
    pub fn new(properties: PropertySet, basedir: impl Into<PathBuf>) -> Self {
        Self {
            properties,
            basedir: basedir.into(),
        }
    }

    /// Resolve a path against the base directory
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.basedir.join(path)
        }
    }
}

/// A reader applying one filter to an upstream reader
pub struct FilterReader {
    source: BufReader<Box<dyn Read>>,
    filter: Box<dyn Filter>,
    def: FilterDef,
    context: FilterContext,
    buffer: Vec<u8>,
    pos: usize,
    exhausted: bool,
}

impl FilterReader {
    /// Wrap `source` with the filter described by `def`
    pub fn new(source: Box<dyn Read>, def: FilterDef, context: FilterContext) -> BuildResult<Self> {
        let filter = def.create(&context)?;
        Ok(Self {
            source: BufReader::new(source),
            filter,
            def,
            context,
            buffer: Vec::new(),
            pos: 0,
            exhausted: false,
        })
    }

    /// A fresh reader with this filter's configuration over another source
    pub fn chain(&self, source: Box<dyn Read>) -> BuildResult<FilterReader> {
        FilterReader::new(source, self.def.clone(), self.context.clone())
    }

    /// Name of the wrapped filter
    pub fn filter_name(&self) -> &str {
        &self.def.name
    }

    fn fill(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.pos = 0;

        if self.filter.is_done() {
            self.exhausted = true;
            return Ok(());
        }

        match self.filter.scope() {
            Scope::Line => {
                let mut line = Vec::new();
                if self.source.read_until(b'\n', &mut line)? == 0 {
                    self.exhausted = true;
                    if let Some(rest) = self.filter.finish() {
                        self.buffer = rest.into_bytes();
                    }
                } else if let Some(out) = self.filter.apply_bytes(line) {
                    self.buffer = out;
                }
            }
            Scope::Document => {
                let mut document = Vec::new();
                self.source.read_to_end(&mut document)?;
                self.exhausted = true;
                if let Some(out) = self.filter.apply_bytes(document) {
                    self.buffer = out;
                }
                if let Some(rest) = self.filter.finish() {
                    self.buffer.extend_from_slice(rest.as_bytes());
                }
            }
        }
        Ok(())
    }
}

impl Read for FilterReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.buffer.len() {
            if self.exhausted {
                return Ok(0);
            }
            self.fill()?;
        }
        let n = buf.len().min(self.buffer.len() - self.pos);
        buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl fmt::Debug for FilterReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterReader")
            .field("filter", &self.def.name)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

/// Assembles a filter chain over a primary reader
#[derive(Debug, Clone, Default)]
pub struct ChainReaderHelper {
    filters: Vec<FilterDef>,
    context: FilterContext,
}

impl ChainReaderHelper {
    /// Create a new helper for the given filters, in declaration order
    pub fn new(filters: Vec<FilterDef>, context: FilterContext) -> Self {
        Self { filters, context }
    }

    /// Whether any filter is configured
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Wrap `primary` so the first declared filter reads it and the last
    /// declared filter is read by the caller
    pub fn assemble(&self, primary: Box<dyn Read>) -> BuildResult<Box<dyn Read>> {
        let mut reader = primary;
        for def in &self.filters {
            reader = Box::new(FilterReader::new(reader, def.clone(), self.context.clone())?);
        }
        Ok(reader)
    }

    /// Run `input` through the chain and collect the output as text
    pub fn filter_string(&self, input: &str) -> BuildResult<String> {
        let mut reader = self.assemble(Box::new(io::Cursor::new(input.as_bytes().to_vec())))?;
        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Split a line into its content and terminator (`\n`, `\r\n`, `\r` or none)
pub(crate) fn split_terminator(line: &str) -> (&str, &str) {
    let content = line.trim_end_matches(['\r', '\n']);
    (content, &line[content.len()..])
}
