//! Character-set conversion

use super::{Filter, Params, Scope};
use crate::error::{BuildError, BuildResult};
use encoding_rs::Encoding;

/// Transcodes the document from one encoding to another
#[derive(Debug, Clone, Copy)]
pub struct IconvFilter {
    input: &'static Encoding,
    output: &'static Encoding,
}

impl IconvFilter {
    /// Create a converter from WHATWG encoding labels (`latin1`, `utf-8`, ...)
    pub fn new(input: &str, output: &str) -> BuildResult<Self> {
        Ok(Self {
            input: lookup(input)?,
            output: lookup(output)?,
        })
    }

    pub(super) fn configure(params: &Params) -> BuildResult<Self> {
        Self::new(
            params.require("inputencoding")?,
            params.require("outputencoding")?,
        )
    }

    /// Convert a buffer; unmappable input decodes to U+FFFD
    pub fn convert(&self, bytes: &[u8]) -> Vec<u8> {
        if self.input == self.output {
            return bytes.to_vec();
        }
        let (decoded, _, decode_errors) = self.input.decode(bytes);
        if decode_errors {
            tracing::warn!(encoding = self.input.name(), "malformed input replaced during conversion");
        }
        let (encoded, used, encode_errors) = self.output.encode(&decoded);
        if encode_errors {
            tracing::warn!(encoding = used.name(), "unmappable characters replaced during conversion");
        }
        encoded.into_owned()
    }
}

fn lookup(label: &str) -> BuildResult<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| BuildError::UnsupportedEncoding(label.to_string()))
}

impl Filter for IconvFilter {
    fn scope(&self) -> Scope {
        Scope::Document
    }

    fn apply(&mut self, unit: String) -> Option<String> {
        Some(String::from_utf8_lossy(&self.convert(unit.as_bytes())).into_owned())
    }

    fn apply_bytes(&mut self, unit: Vec<u8>) -> Option<Vec<u8>> {
        Some(self.convert(&unit))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{ChainReaderHelper, FilterContext, FilterDef, Parameter};
    use super::*;
    use std::io::Read;

    #[test]
    fn test_latin1_to_utf8() {
        let filter = IconvFilter::new("latin1", "utf-8").unwrap();
        assert_eq!(filter.convert(&[b'c', b'a', b'f', 0xE9]), "café".as_bytes());
    }

    #[test]
    fn test_utf8_to_latin1() {
        let filter = IconvFilter::new("UTF-8", "iso-8859-1").unwrap();
        assert_eq!(filter.convert("café".as_bytes()), vec![b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_unknown_encoding_fails_at_assembly() {
        let def = FilterDef::new("iconvfilter")
            .with_param(Parameter::new("inputencoding", "klingon"))
            .with_param(Parameter::new("outputencoding", "utf-8"));
        let result = ChainReaderHelper::new(vec![def], FilterContext::default())
            .assemble(Box::new(std::io::empty()));
        assert!(matches!(result, Err(BuildError::UnsupportedEncoding(label)) if label == "klingon"));
    }

    #[test]
    fn test_chain_operates_on_bytes() {
        let def = FilterDef::new("iconvfilter")
            .with_param(Parameter::new("inputencoding", "windows-1252"))
            .with_param(Parameter::new("outputencoding", "utf-8"));
        let mut reader = ChainReaderHelper::new(vec![def], FilterContext::default())
            .assemble(Box::new(std::io::Cursor::new(vec![0x80, b'5'])))
            .unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "€5");
    }
}
