//! Parameter typing, coercion and validation.
//!
//! Operation parameters arrive as an untyped JSON bag. Each operator
//! declares an ordered list of [`ParamSpec`]s; the validator enforces
//! required-presence, coerces every value to its declared type and applies
//! the declared rules. Unknown parameters are silently accepted for forward
//! compatibility.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use mflow_models::{MediaDuration, Resolution};

use crate::error::{OpError, OpResult};

/// Declared parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    Duration,
    Timecode,
    Resolution,
    Enum,
    Array,
    Object,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Duration => "duration",
            ParamType::Timecode => "timecode",
            ParamType::Resolution => "resolution",
            ParamType::Enum => "enum",
            ParamType::Array => "array",
            ParamType::Object => "object",
        };
        f.write_str(name)
    }
}

/// A coerced, typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Duration(MediaDuration),
    Resolution(Resolution),
    Array(Vec<ParamValue>),
    Object(serde_json::Map<String, Value>),
}

impl ParamValue {
    /// Numeric view for range rules. Durations compare by nanosecond count.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Duration(d) => Some(d.as_nanos() as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Str(_) => "string",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Bool(_) => "bool",
            ParamValue::Duration(_) => "duration",
            ParamValue::Resolution(_) => "resolution",
            ParamValue::Array(_) => "array",
            ParamValue::Object(_) => "object",
        }
    }
}

/// Custom validation predicate.
pub type CustomRule = Arc<dyn Fn(&ParamValue) -> Result<(), String> + Send + Sync>;

/// Declarative validation rules applied after coercion.
#[derive(Clone, Default)]
pub struct ValidationRules {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub multiple_of: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
    /// Allowed values for enum parameters
    pub allowed: Option<Vec<String>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub item_type: Option<ParamType>,
    pub custom: Option<CustomRule>,
}

impl fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRules")
            .field("min", &self.min)
            .field("max", &self.max)
            .field("multiple_of", &self.multiple_of)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("pattern", &self.pattern)
            .field("allowed", &self.allowed)
            .field("min_items", &self.min_items)
            .field("max_items", &self.max_items)
            .field("item_type", &self.item_type)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Declared schema for one parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub rules: ValidationRules,
    pub examples: Vec<&'static str>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn new(name: &'static str, param_type: ParamType) -> Self {
        Self {
            name,
            param_type,
            required: false,
            default: None,
            rules: ValidationRules::default(),
            examples: Vec::new(),
            description: "",
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn describe(mut self, text: &'static str) -> Self {
        self.description = text;
        self
    }

    pub fn examples(mut self, examples: &[&'static str]) -> Self {
        self.examples = examples.to_vec();
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.rules.min = Some(min);
        self.rules.max = Some(max);
        self
    }

    pub fn multiple_of(mut self, step: f64) -> Self {
        self.rules.multiple_of = Some(step);
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.rules.min_length = Some(min);
        self.rules.max_length = Some(max);
        self
    }

    pub fn pattern(mut self, pattern: &'static str) -> Self {
        self.rules.pattern = Some(pattern.to_string());
        self
    }

    pub fn allowed(mut self, values: &[&str]) -> Self {
        self.rules.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn items(mut self, min: usize, max: usize, item_type: ParamType) -> Self {
        self.rules.min_items = Some(min);
        self.rules.max_items = Some(max);
        self.rules.item_type = Some(item_type);
        self
    }

    pub fn custom(mut self, rule: CustomRule) -> Self {
        self.rules.custom = Some(rule);
        self
    }
}

/// The coerced parameter bag handed to operators.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: BTreeMap<String, ParamValue>,
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => Some(*v),
            Some(ParamValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ParamValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_duration(&self, name: &str) -> Option<MediaDuration> {
        match self.values.get(name) {
            Some(ParamValue::Duration(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn get_resolution(&self, name: &str) -> Option<Resolution> {
        match self.values.get(name) {
            Some(ParamValue::Resolution(r)) => Some(*r),
            _ => None,
        }
    }

    /// Required accessor for parameters the descriptor guarantees present.
    pub fn require_i64(&self, name: &str) -> OpResult<i64> {
        self.get_i64(name)
            .ok_or_else(|| OpError::parameter(name, "required"))
    }

    pub fn require_f64(&self, name: &str) -> OpResult<f64> {
        self.get_f64(name)
            .ok_or_else(|| OpError::parameter(name, "required"))
    }

    pub fn require_str(&self, name: &str) -> OpResult<&str> {
        self.get_str(name)
            .ok_or_else(|| OpError::parameter(name, "required"))
    }

    pub fn require_duration(&self, name: &str) -> OpResult<MediaDuration> {
        self.get_duration(name)
            .ok_or_else(|| OpError::parameter(name, "required"))
    }
}

/// Coerce an untyped value to a declared parameter type.
pub fn convert(value: &Value, target: ParamType) -> Result<ParamValue, String> {
    match target {
        ParamType::String | ParamType::Enum => match value {
            Value::String(s) => Ok(ParamValue::Str(s.clone())),
            other => Err(type_mismatch(other, target)),
        },
        ParamType::Int => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(ParamValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 {
                        Ok(ParamValue::Int(f as i64))
                    } else {
                        Err(format!("expected int, got fractional number {}", f))
                    }
                } else {
                    Err(type_mismatch(value, target))
                }
            }
            Value::String(s) => s
                .trim()
                .parse()
                .map(ParamValue::Int)
                .map_err(|_| format!("cannot parse '{}' as int", s)),
            other => Err(type_mismatch(other, target)),
        },
        ParamType::Float => match value {
            Value::Number(n) => n
                .as_f64()
                .map(ParamValue::Float)
                .ok_or_else(|| type_mismatch(value, target)),
            Value::String(s) => s
                .trim()
                .parse()
                .map(ParamValue::Float)
                .map_err(|_| format!("cannot parse '{}' as float", s)),
            other => Err(type_mismatch(other, target)),
        },
        ParamType::Bool => match value {
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" => Ok(ParamValue::Bool(true)),
                "false" => Ok(ParamValue::Bool(false)),
                _ => Err(format!("cannot parse '{}' as bool", s)),
            },
            other => Err(type_mismatch(other, target)),
        },
        ParamType::Duration => match value {
            Value::String(s) => MediaDuration::parse(s)
                .map(ParamValue::Duration)
                .map_err(|e| e.to_string()),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| *f >= 0.0)
                .map(|f| ParamValue::Duration(MediaDuration::from_secs_f64(f)))
                .ok_or_else(|| type_mismatch(value, target)),
            other => Err(type_mismatch(other, target)),
        },
        ParamType::Timecode => match value {
            Value::String(s) => MediaDuration::parse_timecode(s)
                .map(ParamValue::Duration)
                .map_err(|e| e.to_string()),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| *f >= 0.0)
                .map(|f| ParamValue::Duration(MediaDuration::from_secs_f64(f)))
                .ok_or_else(|| type_mismatch(value, target)),
            other => Err(type_mismatch(other, target)),
        },
        ParamType::Resolution => match value {
            Value::String(s) => Resolution::from_str(s)
                .map(ParamValue::Resolution)
                .map_err(|e| e.to_string()),
            Value::Object(_) => serde_json::from_value(value.clone())
                .map(ParamValue::Resolution)
                .map_err(|e| e.to_string()),
            other => Err(type_mismatch(other, target)),
        },
        ParamType::Array => match value {
            Value::Array(items) => items
                .iter()
                .map(infer)
                .collect::<Result<Vec<_>, _>>()
                .map(ParamValue::Array),
            other => Err(type_mismatch(other, target)),
        },
        ParamType::Object => match value {
            Value::Object(map) => Ok(ParamValue::Object(map.clone())),
            other => Err(type_mismatch(other, target)),
        },
    }
}

/// Best-effort conversion for array items without a declared item type.
fn infer(value: &Value) -> Result<ParamValue, String> {
    match value {
        Value::String(s) => Ok(ParamValue::Str(s.clone())),
        Value::Bool(b) => Ok(ParamValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ParamValue::Int(i))
            } else {
                n.as_f64()
                    .map(ParamValue::Float)
                    .ok_or_else(|| "unrepresentable number".to_string())
            }
        }
        Value::Object(map) => Ok(ParamValue::Object(map.clone())),
        other => Err(format!("unsupported array item {}", json_kind(other))),
    }
}

fn type_mismatch(value: &Value, target: ParamType) -> String {
    format!("expected {}, got {}", target, json_kind(value))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a raw parameter bag against a descriptor's param specs.
///
/// Applies, in order: required-presence, type coercion, numeric rules, enum
/// membership, array rules, then the custom predicate. Unknown parameters
/// are silently accepted.
pub fn validate_params(
    specs: &[ParamSpec],
    bag: &serde_json::Map<String, Value>,
) -> OpResult<Params> {
    let mut out = Params::default();

    for spec in specs {
        let raw = match bag.get(spec.name) {
            Some(Value::Null) | None => match &spec.default {
                Some(default) => default,
                None if spec.required => {
                    return Err(OpError::parameter(spec.name, "required"));
                }
                None => continue,
            },
            Some(value) => value,
        };

        let value = convert(raw, spec.param_type)
            .map_err(|reason| OpError::parameter(spec.name, reason))?;

        apply_rules(spec, &value)?;
        out.values.insert(spec.name.to_string(), value);
    }

    Ok(out)
}

fn apply_rules(spec: &ParamSpec, value: &ParamValue) -> OpResult<()> {
    let rules = &spec.rules;
    let fail = |reason: String| OpError::parameter(spec.name, reason);

    if let Some(n) = value.numeric() {
        if let Some(min) = rules.min {
            let bound = numeric_bound(spec.param_type, min);
            if n < bound {
                return Err(fail(format!("value {} is below minimum {}", n, min)));
            }
        }
        if let Some(max) = rules.max {
            let bound = numeric_bound(spec.param_type, max);
            if n > bound {
                return Err(fail(format!("value {} is above maximum {}", n, max)));
            }
        }
        if let Some(step) = rules.multiple_of {
            let bound = numeric_bound(spec.param_type, step);
            if bound > 0.0 && (n / bound).fract().abs() > 1e-9 {
                return Err(fail(format!("value {} is not a multiple of {}", n, step)));
            }
        }
    }

    if let ParamValue::Str(s) = value {
        if let Some(min) = rules.min_length {
            if s.chars().count() < min {
                return Err(fail(format!("length is below minimum {}", min)));
            }
        }
        if let Some(max) = rules.max_length {
            if s.chars().count() > max {
                return Err(fail(format!("length is above maximum {}", max)));
            }
        }
        if let Some(pattern) = &rules.pattern {
            let re = Regex::new(pattern)
                .map_err(|e| fail(format!("invalid pattern '{}': {}", pattern, e)))?;
            if !re.is_match(s) {
                return Err(fail(format!("'{}' does not match pattern {}", s, pattern)));
            }
        }
        if let Some(allowed) = &rules.allowed {
            if !allowed.iter().any(|a| a == s) {
                return Err(fail(format!(
                    "'{}' is not one of [{}]",
                    s,
                    allowed.join(", ")
                )));
            }
        }
    }

    if let ParamValue::Array(items) = value {
        if let Some(min) = rules.min_items {
            if items.len() < min {
                return Err(fail(format!("item count is below minimum {}", min)));
            }
        }
        if let Some(max) = rules.max_items {
            if items.len() > max {
                return Err(fail(format!("item count is above maximum {}", max)));
            }
        }
        if let Some(item_type) = rules.item_type {
            for (i, item) in items.iter().enumerate() {
                if !item_matches(item, item_type) {
                    return Err(fail(format!(
                        "item {} is {}, expected {}",
                        i,
                        item.type_name(),
                        item_type
                    )));
                }
            }
        }
    }

    if let Some(custom) = &rules.custom {
        custom(value).map_err(fail)?;
    }

    Ok(())
}

/// Range bounds on durations are declared in seconds but compared against
/// the nanosecond count.
fn numeric_bound(param_type: ParamType, declared: f64) -> f64 {
    match param_type {
        ParamType::Duration | ParamType::Timecode => declared * 1e9,
        _ => declared,
    }
}

fn item_matches(value: &ParamValue, item_type: ParamType) -> bool {
    matches!(
        (value, item_type),
        (ParamValue::Str(_), ParamType::String)
            | (ParamValue::Str(_), ParamType::Enum)
            | (ParamValue::Int(_), ParamType::Int)
            | (ParamValue::Int(_), ParamType::Float)
            | (ParamValue::Float(_), ParamType::Float)
            | (ParamValue::Bool(_), ParamType::Bool)
            | (ParamValue::Object(_), ParamType::Object)
    )
}
