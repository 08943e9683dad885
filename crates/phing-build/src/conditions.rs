//! Boolean predicates used by control-flow tasks
use crate::de::{default_true, one_or_many, opt_scalar_string, scalar_string};
use crate::error::{BuildError, BuildResult};
use crate::project::Project;
use crate::properties::to_boolean;
use regex::RegexBuilder;
use serde::Deserialize;
use std::cmp::Ordering;
use std::fs;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

/// A condition definition; attributes are property-expanded on evaluation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    And {
        #[serde(default, alias = "condition", deserialize_with = "one_or_many")]
        conditions: Vec<Condition>,
    },
    Or {
        #[serde(default, alias = "condition", deserialize_with = "one_or_many")]
        conditions: Vec<Condition>,
    },
    Xor {
        #[serde(default, alias = "condition", deserialize_with = "one_or_many")]
        conditions: Vec<Condition>,
    },
    Not {
        #[serde(default, alias = "condition", deserialize_with = "one_or_many")]
        conditions: Vec<Condition>,
    },
    Equals {
        #[serde(deserialize_with = "scalar_string")]
        arg1: String,
        #[serde(deserialize_with = "scalar_string")]
        arg2: String,
        #[serde(default = "default_true")]
        casesensitive: bool,
        #[serde(default)]
        trim: bool,
    },
    IsSet {
        property: String,
    },
    IsTrue {
        #[serde(deserialize_with = "scalar_string")]
        value: String,
    },
    IsFalse {
        #[serde(deserialize_with = "scalar_string")]
        value: String,
    },
    Contains {
        string: String,
        substring: String,
        #[serde(default = "default_true")]
        casesensitive: bool,
    },
    Matches {
        string: String,
        pattern: String,
        #[serde(default = "default_true")]
        casesensitive: bool,
        #[serde(default)]
        multiline: bool,
    },
    Available {
        #[serde(default)]
        file: Option<String>,
        /// `file` or `dir`
        #[serde(default)]
        filetype: Option<String>,
        #[serde(default)]
        property: Option<String>,
    },
    Os {
        family: String,
    },
    FilesMatch {
        file1: String,
        file2: String,
    },
    VersionCompare {
        #[serde(deserialize_with = "scalar_string")]
        version: String,
        #[serde(deserialize_with = "scalar_string")]
        desiredversion: String,
        #[serde(default, deserialize_with = "opt_scalar_string")]
        operator: Option<String>,
    },
    IsLessThan {
        #[serde(deserialize_with = "scalar_string")]
        arg1: String,
        #[serde(deserialize_with = "scalar_string")]
        arg2: String,
        #[serde(default)]
        orequal: bool,
    },
    IsGreaterThan {
        #[serde(deserialize_with = "scalar_string")]
        arg1: String,
        #[serde(deserialize_with = "scalar_string")]
        arg2: String,
        #[serde(default)]
        orequal: bool,
    },
    Socket {
        server: String,
        #[serde(deserialize_with = "scalar_string")]
        port: String,
        /// Connect timeout in seconds
        #[serde(default)]
        timeout: Option<u64>,
    },
    IsFailure {
        #[serde(deserialize_with = "scalar_string")]
        code: String,
    },
}

const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(1);

impl Condition {
    /// Element name as written in a build file
    pub fn name(&self) -> &'static str {
        match self {
            Self::And { .. } => "and",
            Self::Or { .. } => "or",
            Self::Xor { .. } => "xor",
            Self::Not { .. } => "not",
            Self::Equals { .. } => "equals",
            Self::IsSet { .. } => "isset",
            Self::IsTrue { .. } => "istrue",
            Self::IsFalse { .. } => "isfalse",
            Self::Contains { .. } => "contains",
            Self::Matches { .. } => "matches",
            Self::Available { .. } => "available",
            Self::Os { .. } => "os",
            Self::FilesMatch { .. } => "filesmatch",
            Self::VersionCompare { .. } => "versioncompare",
            Self::IsLessThan { .. } => "islessthan",
            Self::IsGreaterThan { .. } => "isgreaterthan",
            Self::Socket { .. } => "socket",
            Self::IsFailure { .. } => "isfailure",
        }
    }

    /// Evaluate against the project's current properties
    pub fn evaluate(&self, project: &Project) -> BuildResult<bool> {
        let x = |s: &str| project.expand(s);

        let result = match self {
            Self::And { conditions } => {
                for c in conditions {
                    if !c.evaluate(project)? {
                        return Ok(false);
                    }
                }
                true
            }
            Self::Or { conditions } => {
                for c in conditions {
                    if c.evaluate(project)? {
                        return Ok(true);
                    }
                }
                false
            }
            Self::Xor { conditions } => {
                let mut state = false;
                for c in conditions {
                    state ^= c.evaluate(project)?;
                }
                state
            }
            Self::Not { conditions } => match conditions.as_slice() {
                [only] => !only.evaluate(project)?,
                _ => {
                    return Err(BuildError::invalid_attribute(
                        "not",
                        "condition",
                        format!("expects exactly one nested condition, found {}", conditions.len()),
                    ))
                }
            },
            Self::Equals {
                arg1,
                arg2,
                casesensitive,
                trim,
            } => {
                let (mut a, mut b) = (x(arg1), x(arg2));
                if *trim {
                    a = a.trim().to_string();
                    b = b.trim().to_string();
                }
                if *casesensitive {
                    a == b
                } else {
                    a.to_lowercase() == b.to_lowercase()
                }
            }
            Self::IsSet { property } => project.properties().is_set(&x(property)),
            Self::IsTrue { value } => to_boolean(&x(value)),
            Self::IsFalse { value } => !to_boolean(&x(value)),
            Self::Contains {
                string,
                substring,
                casesensitive,
            } => {
                let (s, sub) = (x(string), x(substring));
                if *casesensitive {
                    s.contains(&sub)
                } else {
                    s.to_lowercase().contains(&sub.to_lowercase())
                }
            }
            Self::Matches {
                string,
                pattern,
                casesensitive,
                multiline,
            } => {
                let pattern = x(pattern);
                let re = RegexBuilder::new(&pattern)
                    .case_insensitive(!casesensitive)
                    .multi_line(*multiline)
                    .build()
                    .map_err(|e| BuildError::regex(&pattern, e))?;
                re.is_match(&x(string))
            }
            Self::Available {
                file,
                filetype,
                property,
            } => match (file, property) {
                (Some(file), _) => {
                    let path = project.resolve_path(&x(file));
                    match filetype.as_deref().map(|t| x(t).to_lowercase()).as_deref() {
                        None => path.exists(),
                        Some("file") => path.is_file(),
                        Some("dir") => path.is_dir(),
                        Some(other) => {
                            return Err(BuildError::invalid_attribute(
                                "available",
                                "filetype",
                                format!("expected 'file' or 'dir', got '{}'", other),
                            ))
                        }
                    }
                }
                (None, Some(property)) => project.properties().is_set(&x(property)),
                (None, None) => return Err(BuildError::missing_attribute("available", "file")),
            },
            Self::Os { family } => os_matches(&x(family))?,
            Self::FilesMatch { file1, file2 } => files_match(
                &project.resolve_path(&x(file1)),
                &project.resolve_path(&x(file2)),
            )?,
            Self::VersionCompare {
                version,
                desiredversion,
                operator,
            } => {
                let op = operator.as_deref().map(x).unwrap_or_else(|| "ge".to_string());
                compare_versions(&x(version), &x(desiredversion), &op)?
            }
            Self::IsLessThan { arg1, arg2, orequal } => {
                let (a, b) = numeric_args(self.name(), &x(arg1), &x(arg2))?;
                a < b || (*orequal && a == b)
            }
            Self::IsGreaterThan { arg1, arg2, orequal } => {
                let (a, b) = numeric_args(self.name(), &x(arg1), &x(arg2))?;
                a > b || (*orequal && a == b)
            }
            Self::Socket {
                server,
                port,
                timeout,
            } => {
                let port: u16 = x(port)
                    .trim()
                    .parse()
                    .map_err(|e| BuildError::invalid_attribute("socket", "port", e))?;
                let timeout = timeout.map(Duration::from_secs).unwrap_or(DEFAULT_SOCKET_TIMEOUT);
                socket_open(&x(server), port, timeout)
            }
            Self::IsFailure { code } => {
                let code: i64 = x(code)
                    .trim()
                    .parse()
                    .map_err(|e| BuildError::invalid_attribute("isfailure", "code", e))?;
                code != 0
            }
        };

        tracing::trace!(condition = self.name(), result, "condition evaluated");
        Ok(result)
    }
}

fn os_matches(family: &str) -> BuildResult<bool> {
    Ok(match family.trim().to_lowercase().as_str() {
        "unix" => cfg!(unix),
        "windows" => cfg!(windows),
        "mac" | "darwin" => cfg!(target_os = "macos"),
        "linux" => cfg!(target_os = "linux"),
        other => {
            return Err(BuildError::invalid_attribute(
                "os",
                "family",
                format!("unknown family '{}'", other),
            ))
        }
    })
}

fn files_match(a: &Path, b: &Path) -> BuildResult<bool> {
    if !a.is_file() || !b.is_file() {
        return Ok(false);
    }
    let (meta_a, meta_b) = (
        fs::metadata(a).map_err(|e| BuildError::io(a, e))?,
        fs::metadata(b).map_err(|e| BuildError::io(b, e))?,
    );
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut bytes_a = Vec::new();
    let mut bytes_b = Vec::new();
    fs::File::open(a)
        .and_then(|mut f| f.read_to_end(&mut bytes_a))
        .map_err(|e| BuildError::io(a, e))?;
    fs::File::open(b)
        .and_then(|mut f| f.read_to_end(&mut bytes_b))
        .map_err(|e| BuildError::io(b, e))?;
    Ok(bytes_a == bytes_b)
}

/// A dotted version with any number of numeric components and an optional
/// pre-release. Missing components compare as zero, so `1.2` equals `1.2.0.0`.
#[derive(Debug, Clone)]
pub(crate) struct DottedVersion {
    parts: Vec<u64>,
    pre: semver::Prerelease,
}

impl DottedVersion {
    fn component(&self, index: usize) -> u64 {
        self.parts.get(index).copied().unwrap_or(0)
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.pre.cmp(&other.pre))
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DottedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DottedVersion {}

/// Parse `1`, `1.2.3.4` or `v1.2.3-rc.1+build`. Build metadata is ignored.
pub(crate) fn parse_version(input: &str) -> BuildResult<DottedVersion> {
    let invalid = |reason: String| {
        BuildError::invalid_attribute("versioncompare", "version", format!("'{}': {}", input, reason))
    };

    let trimmed = input.trim().trim_start_matches('v');
    let without_build = trimmed.split('+').next().unwrap_or_default();
    let (core, pre) = without_build.split_once('-').unwrap_or((without_build, ""));

    let parts = core
        .split('.')
        .map(|part| {
            part.parse::<u64>()
                .map_err(|_| invalid(format!("'{}' is not a number", part)))
        })
        .collect::<BuildResult<Vec<_>>>()?;
    let pre = semver::Prerelease::new(pre).map_err(|e| invalid(e.to_string()))?;

    Ok(DottedVersion { parts, pre })
}

fn compare_versions(version: &str, desired: &str, operator: &str) -> BuildResult<bool> {
    let (a, b) = (parse_version(version)?, parse_version(desired)?);
    Ok(match operator.trim() {
        "lt" | "<" => a < b,
        "le" | "<=" => a <= b,
        "gt" | ">" => a > b,
        "ge" | ">=" => a >= b,
        "eq" | "==" => a == b,
        "ne" | "!=" => a != b,
        other => {
            return Err(BuildError::invalid_attribute(
                "versioncompare",
                "operator",
                format!("unknown operator '{}'", other),
            ))
        }
    })
}

fn numeric_args(element: &str, a: &str, b: &str) -> BuildResult<(f64, f64)> {
    let parse = |attr: &str, v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| BuildError::invalid_attribute(element, attr, format!("'{}': {}", v, e)))
    };
    Ok((parse("arg1", a)?, parse("arg2", b)?))
}

fn socket_open(server: &str, port: u16, timeout: Duration) -> bool {
    let Ok(addrs) = (server, port).to_socket_addrs() else {
        return false;
    };
    addrs
        .into_iter()
        .any(|addr| TcpStream::connect_timeout(&addr, timeout).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::TcpListener;
    use tempfile::TempDir;

    fn project() -> Project {
        let mut project = Project::new("conditions");
        project.set_property("flag", "yes");
        project.set_property("name", "Phing");
        project
    }

    fn cond(toml_src: &str) -> Condition {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn test_logical_conditions_with_no_children() {
        let p = project();
        assert!(cond(r#"type = "and""#).evaluate(&p).unwrap());
        assert!(!cond(r#"type = "or""#).evaluate(&p).unwrap());
        assert!(!cond(r#"type = "xor""#).evaluate(&p).unwrap());
    }

    #[test]
    fn test_not_requires_exactly_one_child() {
        let p = project();
        assert!(cond(r#"type = "not""#).evaluate(&p).is_err());

        let not = cond(
            r#"
type = "not"
condition = { type = "isset", property = "missing" }
"#,
        );
        assert!(not.evaluate(&p).unwrap());
    }

    #[test]
    fn test_nested_logic() {
        let c = cond(
            r#"
type = "and"
conditions = [
    { type = "isset", property = "flag" },
    { type = "or", conditions = [
        { type = "equals", arg1 = "${name}", arg2 = "ant" },
        { type = "istrue", value = "${flag}" },
    ] },
]
"#,
        );
        assert!(c.evaluate(&project()).unwrap());
    }

    #[rstest]
    #[case(r#"type = "equals"
arg1 = "${name}"
arg2 = "phing"
casesensitive = false"#, true)]
    #[case(r#"type = "equals"
arg1 = " a "
arg2 = "a"
trim = true"#, true)]
    #[case(r#"type = "equals"
arg1 = "a"
arg2 = "A""#, false)]
    #[case(r#"type = "isfalse"
value = "off""#, true)]
    #[case(r#"type = "contains"
string = "Hello World"
substring = "WORLD"
casesensitive = false"#, true)]
    #[case(r#"type = "matches"
string = "release-1.2"
pattern = "^release-\\d+\\.\\d+$""#, true)]
    #[case(r#"type = "islessthan"
arg1 = 2
arg2 = "10""#, true)]
    #[case(r#"type = "isgreaterthan"
arg1 = "3"
arg2 = "3"
orequal = true"#, true)]
    #[case(r#"type = "isfailure"
code = 0"#, false)]
    #[case(r#"type = "versioncompare"
version = "1.10"
desiredversion = "1.9.3"
operator = "gt""#, true)]
    #[case(r#"type = "versioncompare"
version = "2.0.0-beta"
desiredversion = "2.0.0""#, false)]
    #[case(r#"type = "available"
property = "name""#, true)]
    fn test_condition_catalogue(#[case] src: &str, #[case] expected: bool) {
        assert_eq!(cond(src).evaluate(&project()).unwrap(), expected);
    }

    #[test]
    fn test_available_file_and_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("present.txt"), "x").unwrap();
        let mut p = Project::new("avail");
        p.set_basedir(temp.path());

        let file = Condition::Available {
            file: Some("present.txt".into()),
            filetype: Some("file".into()),
            property: None,
        };
        let dir = Condition::Available {
            file: Some("present.txt".into()),
            filetype: Some("dir".into()),
            property: None,
        };
        let missing = Condition::Available {
            file: Some("absent.txt".into()),
            filetype: None,
            property: None,
        };
        assert!(file.evaluate(&p).unwrap());
        assert!(!dir.evaluate(&p).unwrap());
        assert!(!missing.evaluate(&p).unwrap());
    }

    #[test]
    fn test_filesmatch() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "same").unwrap();
        fs::write(temp.path().join("b"), "same").unwrap();
        fs::write(temp.path().join("c"), "diff").unwrap();
        let mut p = Project::new("files");
        p.set_basedir(temp.path());

        let matches = |f1: &str, f2: &str| {
            Condition::FilesMatch {
                file1: f1.into(),
                file2: f2.into(),
            }
            .evaluate(&p)
            .unwrap()
        };
        assert!(matches("a", "b"));
        assert!(!matches("a", "c"));
        assert!(!matches("a", "missing"));
    }

    #[test]
    fn test_os_family() {
        let c = Condition::Os {
            family: "unix".into(),
        };
        assert_eq!(c.evaluate(&project()).unwrap(), cfg!(unix));
        assert!(Condition::Os {
            family: "amiga".into()
        }
        .evaluate(&project())
        .is_err());
    }

    #[test]
    fn test_socket_condition() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let open = Condition::Socket {
            server: "127.0.0.1".into(),
            port: port.to_string(),
            timeout: Some(1),
        };
        assert!(open.evaluate(&project()).unwrap());

        drop(listener);
        assert!(!open.evaluate(&project()).unwrap());
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let c = Condition::Matches {
            string: "x".into(),
            pattern: "(".into(),
            casesensitive: true,
            multiline: false,
        };
        assert!(matches!(
            c.evaluate(&project()),
            Err(BuildError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_versions_compare_any_number_of_components() {
        assert_eq!(parse_version("1").unwrap(), parse_version("1.0.0").unwrap());
        assert!(compare_versions("v2.3", "2.3.0.0", "eq").unwrap());
        assert!(compare_versions("1.2.3.4", "1.2.3", "gt").unwrap());
        assert!(compare_versions("1.2.3.4", "1.2.3.10", "lt").unwrap());
        assert!(compare_versions("1.2.3.4-rc.1", "1.2.3.4", "lt").unwrap());
        assert!(compare_versions("1.0.0+build.7", "1.0.0", "eq").unwrap());
        assert!(parse_version("one.two").is_err());
        assert!(parse_version("").is_err());
    }
}
