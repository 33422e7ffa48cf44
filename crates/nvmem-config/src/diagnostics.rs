use serde::de::DeserializeOwned;

/// Everything learned while loading and validating a config.
///
/// Loading is best effort: a config that deserializes is always returned,
/// alongside these diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiagnostics {
    /// Keys in the input that the schema does not know, as `a.b[0].c` paths.
    pub unknown_keys: Vec<String>,
    pub warnings: Vec<ConfigWarning>,
    /// Inconsistencies that would make planning fail or misbehave.
    pub errors: Vec<ConfigValidationError>,
}

impl ConfigDiagnostics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unknown_keys.is_empty() && self.warnings.is_empty() && self.errors.is_empty()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn extend_validation(&mut self, validation: ValidationDiagnostics) {
        self.warnings.extend(validation.warnings);
        self.errors.extend(validation.errors);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationDiagnostics {
    pub warnings: Vec<ConfigWarning>,
    pub errors: Vec<ConfigValidationError>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    InvalidValue {
        toml_path: String,
        message: String,
    },
    LoggingLevelInvalid {
        value: String,
        normalized: String,
    },
    /// `goal.dimms` names a module the platform does not describe.
    UnknownGoalDimm {
        toml_path: String,
        uid: String,
    },
    /// `goal.sockets` names a socket with no manageable module.
    EmptyGoalSocket {
        toml_path: String,
        socket: u16,
    },
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    InvalidValue {
        toml_path: String,
        message: String,
    },
    DuplicateDimmUid {
        toml_path: String,
        uid: String,
    },
    PercentagesExceedTotal {
        memory_mode_percent: u32,
        reserved_percent: u32,
    },
}

pub(crate) fn deserialize_toml_with_unknown_keys<T: DeserializeOwned>(
    text: &str,
) -> Result<(T, Vec<String>), toml::de::Error> {
    let mut unknown = Vec::<String>::new();
    let deserializer = toml::de::Deserializer::new(text);
    let value = serde_ignored::deserialize(deserializer, |path| {
        unknown.push(render_key_path(path));
    })?;
    unknown.sort();
    unknown.dedup();
    Ok((value, unknown))
}

/// Render a `serde_ignored` path the way TOML users write it: `a.b[0].c`.
///
/// `serde_ignored` renders optional values as `?` segments; TOML has no
/// such level so they are dropped.
fn render_key_path(path: serde_ignored::Path) -> String {
    let raw = path.to_string();
    raw.trim_start_matches('.')
        .split('.')
        .filter(|segment| *segment != "?")
        .enumerate()
        .fold(String::new(), |mut out, (idx, segment)| {
            if idx > 0 && !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                out.push('[');
                out.push_str(segment);
                out.push(']');
            } else {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(segment);
            }
            out
        })
}
