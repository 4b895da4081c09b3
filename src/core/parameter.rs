//! Launch-time parameters

use crate::core::error::{PipelineError, Result};
use crate::core::value::{ParameterType, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Check a parameter or step name against the managed-service naming rules
pub(crate) fn validate_name(name: &str) -> Result<()> {
    static NAME: OnceLock<Regex> = OnceLock::new();
    let pattern = NAME.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,63}$").expect("name pattern is valid")
    });
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(PipelineError::InvalidName(name.to_string()))
    }
}

/// A named, typed parameter with a default value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParameterType,
    pub default: Value,
}

/// Values supplied at launch in place of parameter defaults
pub type ParameterOverrides = HashMap<String, Value>;

/// Registry of a pipeline's parameters, in definition order
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    parameters: Vec<Parameter>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter
    pub fn define(
        &mut self,
        name: impl Into<String>,
        kind: ParameterType,
        default: Value,
    ) -> Result<()> {
        let name = name.into();
        validate_name(&name)?;
        if self.get(&name).is_some() {
            return Err(PipelineError::DuplicateParameter(name));
        }
        if default.kind() != kind {
            return Err(PipelineError::TypeMismatch {
                name,
                expected: kind,
                found: describe(&default),
            });
        }
        self.parameters.push(Parameter { name, kind, default });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Resolve a single parameter: the override if supplied, the default otherwise
    pub fn resolve(&self, name: &str, overrides: &ParameterOverrides) -> Result<Value> {
        let parameter = self
            .get(name)
            .ok_or_else(|| PipelineError::UnknownParameter(name.to_string()))?;

        match overrides.get(name) {
            Some(value) if value.kind() == parameter.kind => Ok(value.clone()),
            Some(value) => Err(PipelineError::TypeMismatch {
                name: name.to_string(),
                expected: parameter.kind,
                found: describe(value),
            }),
            None => Ok(parameter.default.clone()),
        }
    }

    /// Resolve every parameter, collecting all failures into one error
    ///
    /// Overrides naming a parameter that was never defined are reported as
    /// well, so typos in override files do not go unnoticed.
    pub fn resolve_all(&self, overrides: &ParameterOverrides) -> Result<BTreeMap<String, Value>> {
        let mut resolved = BTreeMap::new();
        let mut errors = Vec::new();

        for parameter in &self.parameters {
            match self.resolve(&parameter.name, overrides) {
                Ok(value) => {
                    resolved.insert(parameter.name.clone(), value);
                }
                Err(e) => errors.push(e),
            }
        }

        let mut unknown: Vec<&String> = overrides
            .keys()
            .filter(|name| self.get(name).is_none())
            .collect();
        unknown.sort();
        errors.extend(
            unknown
                .into_iter()
                .map(|name| PipelineError::UnknownParameter(name.clone())),
        );

        if errors.is_empty() {
            Ok(resolved)
        } else {
            Err(PipelineError::ParameterResolution(errors))
        }
    }

    /// Turn textual `key=value` overrides into typed values using declared types
    ///
    /// Nothing is rejected here: unknown names and text that does not parse
    /// pass through as strings, so [`resolve_all`](Self::resolve_all) reports
    /// every problem at once.
    pub fn coerce_overrides(&self, raw: &[(String, String)]) -> ParameterOverrides {
        self.coerce_values(
            raw.iter()
                .map(|(name, text)| (name.clone(), Value::String(text.clone())))
                .collect(),
        )
    }

    /// Convert overrides whose scalar form parses as the declared type
    ///
    /// `ModelVersion: 2` in an overrides file becomes the string `"2"` when
    /// `ModelVersion` is a string parameter.
    pub fn coerce_values(&self, overrides: ParameterOverrides) -> ParameterOverrides {
        overrides
            .into_iter()
            .map(|(name, value)| {
                let value = match self.get(&name) {
                    Some(parameter) if value.kind() != parameter.kind => {
                        Value::parse_as(&value.to_string(), parameter.kind).unwrap_or(value)
                    }
                    _ => value,
                };
                (name, value)
            })
            .collect()
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("string \"{}\"", s),
        Value::Integer(i) => format!("integer {}", i),
    }
}
