//! Named device parameters with explicit *given* tracking.
//!
//! Each entity declares its parameter schema (lowercase names plus defaults)
//! at construction time. Setting a parameter trims and lowercases the name,
//! checks it against the schema, and raises the *given* flag; device models
//! key conditional behaviour (such as the diode breakdown clamp) on that
//! flag. There is no runtime type inspection: values are a tagged variant
//! and a mismatched assignment is rejected up front.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::waveform::Waveform;

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Real(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    Waveform(Waveform),
}

impl ParamValue {
    fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Real(_) => "real",
            ParamValue::Int(_) => "int",
            ParamValue::Bool(_) => "bool",
            ParamValue::Str(_) => "string",
            ParamValue::Waveform(_) => "waveform",
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Real(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<Waveform> for ParamValue {
    fn from(v: Waveform) -> Self {
        ParamValue::Waveform(v)
    }
}

#[derive(Debug, Clone)]
struct Param {
    value: ParamValue,
    given: bool,
}

/// The declared parameters of one entity.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    owner: String,
    params: IndexMap<String, Param>,
}

impl ParameterSet {
    /// Create an empty set owned by the named entity.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            params: IndexMap::new(),
        }
    }

    /// Declare a parameter with its default value. Not marked as given.
    pub fn declare(&mut self, name: &str, default: impl Into<ParamValue>) -> &mut Self {
        self.params.insert(
            canonical(name),
            Param {
                value: default.into(),
                given: false,
            },
        );
        self
    }

    /// Assign a parameter, marking it as given.
    ///
    /// Fails with [`Error::BadParameter`] for undeclared names or when the
    /// value variant does not match the declared one.
    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) -> Result<()> {
        let key = canonical(name);
        let value = value.into();
        let owner = self.owner.clone();
        let param = self.params.get_mut(&key).ok_or_else(|| {
            Error::bad_parameter(owner.clone(), key.clone(), "no such parameter")
        })?;
        if std::mem::discriminant(&param.value) != std::mem::discriminant(&value) {
            return Err(Error::bad_parameter(
                owner,
                key,
                format!(
                    "expected {} value, got {}",
                    param.value.kind_name(),
                    value.kind_name()
                ),
            ));
        }
        param.value = value;
        param.given = true;
        Ok(())
    }

    /// Look up a parameter value.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(&canonical(name)).map(|p| &p.value)
    }

    /// Whether a parameter was explicitly assigned.
    pub fn given(&self, name: &str) -> bool {
        self.params
            .get(&canonical(name))
            .map(|p| p.given)
            .unwrap_or(false)
    }

    /// Real-valued parameter, falling back to the declared default.
    ///
    /// Panics if the parameter was not declared as real; schemas are fixed at
    /// construction time so that is a programmer error.
    pub fn real(&self, name: &str) -> f64 {
        match self.get(name) {
            Some(ParamValue::Real(v)) => *v,
            other => panic!(
                "parameter '{}' of {} is not real ({:?})",
                name, self.owner, other
            ),
        }
    }

    /// Integer-valued parameter.
    pub fn int(&self, name: &str) -> i64 {
        match self.get(name) {
            Some(ParamValue::Int(v)) => *v,
            other => panic!(
                "parameter '{}' of {} is not int ({:?})",
                name, self.owner, other
            ),
        }
    }

    /// Boolean parameter.
    pub fn bool(&self, name: &str) -> bool {
        match self.get(name) {
            Some(ParamValue::Bool(v)) => *v,
            other => panic!(
                "parameter '{}' of {} is not bool ({:?})",
                name, self.owner, other
            ),
        }
    }

    /// Waveform parameter.
    pub fn waveform(&self, name: &str) -> &Waveform {
        match self.get(name) {
            Some(ParamValue::Waveform(w)) => w,
            other => panic!(
                "parameter '{}' of {} is not a waveform ({:?})",
                name, self.owner, other
            ),
        }
    }

    /// The owning entity's name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Iterate over `(name, value, given)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue, bool)> {
        self.params
            .iter()
            .map(|(k, p)| (k.as_str(), &p.value, p.given))
    }
}

fn canonical(name: &str) -> String {
    name.trim().to_lowercase()
}
