//! Lowering options and the resolved per-pass configuration
//!
//! [`Options`] is what a caller writes (JSON, every field optional).
//! [`Config`] is what a pass reads: the name table plus a single strip
//! flag already resolved against the active environment. A `Config` is
//! immutable for the duration of a pass.

use std::collections::BTreeMap;
use std::path::Path;

use crate::contracts::ContractKind;
use crate::{Error, Result};

/// Source-level spellings of the contract labels and helper identifiers
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Names {
    pub precondition: String,
    pub postcondition: String,
    pub invariant: String,
    #[serde(alias = "assert")]
    pub assertion: String,
    pub old: String,
    #[serde(alias = "return")]
    pub return_subject: String,
}

impl Default for Names {
    fn default() -> Self {
        Names {
            precondition: "pre".into(),
            postcondition: "post".into(),
            invariant: "invariant".into(),
            assertion: "assert".into(),
            old: "old".into(),
            return_subject: "it".into(),
        }
    }
}

impl Names {
    /// The contract kind a label spells, if any
    pub fn kind_of(&self, label: &str) -> Option<ContractKind> {
        if label == self.precondition {
            Some(ContractKind::Precondition)
        } else if label == self.postcondition {
            Some(ContractKind::Postcondition)
        } else if label == self.invariant {
            Some(ContractKind::Invariant)
        } else if label == self.assertion {
            Some(ContractKind::Assertion)
        } else {
            None
        }
    }
}

/// Per-environment overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvOptions {
    pub strip: bool,
}

/// Caller-facing options
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub names: Names,
    pub strip: bool,
    pub env: BTreeMap<String, EnvOptions>,
}

impl Options {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::ConfigError(format!("invalid options: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

/// Immutable configuration for one lowering pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub names: Names,
    pub strip: bool,
}

impl Config {
    /// Resolve options against the active environment and validate the result
    pub fn resolve(options: &Options, active_env: Option<&str>) -> Result<Self> {
        let env_strip = active_env
            .and_then(|name| options.env.get(name))
            .map(|env| env.strip)
            .unwrap_or(false);
        let config = Config {
            names: options.names.clone(),
            strip: options.strip || env_strip,
        };
        config.validate()?;
        Ok(config)
    }

    /// Default names with stripping switched on or off
    pub fn with_strip(strip: bool) -> Self {
        Config {
            names: Names::default(),
            strip,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let names = &self.names;
        let all = [
            ("precondition", &names.precondition),
            ("postcondition", &names.postcondition),
            ("invariant", &names.invariant),
            ("assertion", &names.assertion),
            ("old", &names.old),
            ("returnSubject", &names.return_subject),
        ];
        for (field, name) in all {
            if !is_identifier(name) {
                return Err(Error::ConfigError(format!(
                    "names.{} must be an identifier, got {:?}",
                    field, name
                )));
            }
        }
        // labels and helper names share one namespace
        for (i, (field, name)) in all.iter().enumerate() {
            for (other_field, other) in &all[i + 1..] {
                if name == other {
                    return Err(Error::ConfigError(format!(
                        "names.{} and names.{} are both {:?}",
                        field, other_field, name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
