use conductor_core::{ConductorError, ConductorResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON type a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// JSON `string`.
    String,
    /// JSON `integer`; integral floats such as `3.0` count.
    Integer,
    /// Any JSON number.
    Number,
    /// JSON `true` or `false`.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl ParamType {
    /// Parse a JSON-Schema `type` name.
    pub fn from_schema_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ParamType::String),
            "integer" => Some(ParamType::Integer),
            "number" => Some(ParamType::Number),
            "boolean" => Some(ParamType::Boolean),
            "array" => Some(ParamType::Array),
            "object" => Some(ParamType::Object),
            _ => None,
        }
    }

    /// Whether `value` is an instance of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value
                        .as_f64()
                        .is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        };
        f.write_str(name)
    }
}

/// One named parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Argument field name.
    pub name: String,
    /// Expected JSON type.
    pub kind: ParamType,
    /// Whether the argument must be present.
    #[serde(default)]
    pub required: bool,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

impl ParameterSpec {
    /// A required parameter with no description.
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: String::new(),
        }
    }

    /// An optional parameter with no description.
    pub fn optional(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }
}

/// Structural argument contract of a tool.
///
/// Arguments must be a JSON object whose fields are exactly drawn from the
/// declared parameters; every required parameter must be present, and
/// required strings must not be blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSchema {
    params: Vec<ParameterSpec>,
}

impl ParameterSchema {
    /// Schema over `params`.
    pub fn new(params: Vec<ParameterSpec>) -> Self {
        Self { params }
    }

    /// Declared parameters, in declaration order.
    pub fn params(&self) -> &[ParameterSpec] {
        &self.params
    }

    /// The parameter called `name`.
    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Build a schema from a JSON-Schema object description.
    ///
    /// Missing `properties` means no parameters. A list-valued `type` uses its
    /// first entry; a missing `type` means `string`.
    pub fn from_json_schema(schema: &Value) -> ConductorResult<Self> {
        let obj = schema
            .as_object()
            .ok_or_else(|| ConductorError::Catalog("parameter schema must be an object".into()))?;

        let required: Vec<&str> = match obj.get("required") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str().ok_or_else(|| {
                        ConductorError::Catalog("'required' entries must be strings".into())
                    })
                })
                .collect::<ConductorResult<_>>()?,
            Some(_) => {
                return Err(ConductorError::Catalog(
                    "'required' must be an array of names".into(),
                ))
            }
        };

        let properties = match obj.get("properties") {
            None | Some(Value::Null) => serde_json::Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(ConductorError::Catalog(
                    "'properties' must be an object".into(),
                ))
            }
        };

        if let Some(unknown) = required.iter().find(|n| !properties.contains_key(**n)) {
            return Err(ConductorError::Catalog(format!(
                "required parameter '{unknown}' is not declared in properties"
            )));
        }

        let mut params = Vec::with_capacity(properties.len());
        for (name, info) in &properties {
            let type_name = match info.get("type") {
                Some(Value::String(t)) => t.as_str(),
                Some(Value::Array(types)) => {
                    types.first().and_then(Value::as_str).unwrap_or("string")
                }
                _ => "string",
            };
            let kind = ParamType::from_schema_name(type_name).ok_or_else(|| {
                ConductorError::Catalog(format!(
                    "parameter '{name}' has unsupported type '{type_name}'"
                ))
            })?;
            params.push(ParameterSpec {
                name: name.clone(),
                kind,
                required: required.contains(&name.as_str()),
                description: info
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        Ok(Self { params })
    }

    /// Check `args` against the schema, reporting every problem in name order.
    pub fn validate(&self, args: &Value) -> ConductorResult<()> {
        let Some(fields) = args.as_object() else {
            return Err(ConductorError::Validation(format!(
                "arguments must be a JSON object, got {}",
                json_type_name(args)
            )));
        };

        let mut problems: Vec<(String, String)> = Vec::new();

        for name in fields.keys() {
            if self.get(name).is_none() {
                problems.push((name.clone(), "unknown parameter".into()));
            }
        }

        for spec in &self.params {
            match fields.get(&spec.name) {
                None => {
                    if spec.required {
                        problems.push((
                            spec.name.clone(),
                            format!("missing required parameter ({})", spec.kind),
                        ));
                    }
                }
                Some(Value::Null) if !spec.required => {}
                Some(value) if !spec.kind.accepts(value) => {
                    problems.push((
                        spec.name.clone(),
                        format!("expected {}, got {}", spec.kind, json_type_name(value)),
                    ));
                }
                Some(Value::String(s)) if spec.required && s.trim().is_empty() => {
                    problems.push((
                        spec.name.clone(),
                        "required string must not be empty".into(),
                    ));
                }
                Some(_) => {}
            }
        }

        if problems.is_empty() {
            return Ok(());
        }

        problems.sort();
        let message = problems
            .iter()
            .map(|(name, problem)| format!("{name}: {problem}"))
            .collect::<Vec<_>>()
            .join("; ");
        Err(ConductorError::Validation(message))
    }
}

/// Recursively replace string values that contain a JSON object or array with
/// the parsed structure. Strings that do not parse are kept as they are.
pub fn normalize_arguments(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_arguments(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_arguments).collect()),
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                match serde_json::from_str::<Value>(&s) {
                    Ok(parsed) => normalize_arguments(parsed),
                    Err(_) => Value::String(s),
                }
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use conductor_core::ErrorKind;
    use serde_json::json;

    fn issue_schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterSpec::required("repo", ParamType::String),
            ParameterSpec::required("title", ParamType::String),
            ParameterSpec::optional("labels", ParamType::Array),
            ParameterSpec::optional("priority", ParamType::Integer),
        ])
    }

    #[test]
    fn test_valid_arguments() {
        let schema = issue_schema();
        let args = json!({"repo": "acme/api", "title": "Crash on start", "labels": ["bug"]});
        assert!(schema.validate(&args).is_ok());
    }

    #[test]
    fn test_optional_null_is_absent() {
        let schema = issue_schema();
        let args = json!({"repo": "acme/api", "title": "x", "priority": null});
        assert!(schema.validate(&args).is_ok());
    }

    #[test]
    fn test_integer_accepts_integral_floats() {
        let schema = issue_schema();
        let args = json!({"repo": "acme/api", "title": "x", "priority": 3.0});
        assert!(schema.validate(&args).is_ok());
        assert!(ParamType::Integer.accepts(&json!(-2.0)));
        assert!(!ParamType::Integer.accepts(&json!(2.5)));
        assert!(!ParamType::Integer.accepts(&json!("3")));
    }

    #[test]
    fn test_rejects_non_object() {
        let err = issue_schema().validate(&json!(["repo"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("got array"));
    }

    #[test]
    fn test_reports_all_problems_in_name_order() {
        let schema = issue_schema();
        let args = json!({"title": "  ", "priority": 1.5, "assignee": "bob"});
        let msg = schema.validate(&args).unwrap_err().to_string();
        assert_eq!(
            msg,
            "Validation error: assignee: unknown parameter; \
             priority: expected integer, got number; \
             repo: missing required parameter (string); \
             title: required string must not be empty"
        );
    }

    #[test]
    fn test_validation_is_deterministic() {
        let schema = issue_schema();
        let args = json!({"zeta": 1, "alpha": 2});
        let first = schema.validate(&args).unwrap_err().to_string();
        let second = schema.validate(&args).unwrap_err().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_from_json_schema() {
        let schema = ParameterSchema::from_json_schema(&json!({
            "type": "object",
            "properties": {
                "project_gid": {"type": "string", "description": "Project id"},
                "limit": {"type": ["integer", "null"]},
                "notes": {}
            },
            "required": ["project_gid"]
        }))
        .unwrap();

        assert_eq!(schema.params().len(), 3);
        let gid = schema.get("project_gid").unwrap();
        assert!(gid.required);
        assert_eq!(gid.description, "Project id");
        assert_eq!(schema.get("limit").unwrap().kind, ParamType::Integer);
        assert_eq!(schema.get("notes").unwrap().kind, ParamType::String);
    }

    #[test]
    fn test_from_json_schema_rejects_undeclared_required() {
        let err = ParameterSchema::from_json_schema(&json!({
            "properties": {"a": {"type": "string"}},
            "required": ["b"]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Catalog);
    }

    #[test]
    fn test_from_json_schema_rejects_unknown_type() {
        assert!(ParameterSchema::from_json_schema(&json!({
            "properties": {"a": {"type": "date"}}
        }))
        .is_err());
    }

    #[test]
    fn test_normalize_nested_json_strings() {
        let normalized = normalize_arguments(json!({
            "data": "{\"completed\": true, \"tags\": \"[1, 2]\"}",
            "plain": "hello",
            "broken": "{not json",
            "list": ["[3]"]
        }));
        assert_eq!(normalized["data"]["completed"], json!(true));
        assert_eq!(normalized["data"]["tags"], json!([1, 2]));
        assert_eq!(normalized["plain"], json!("hello"));
        assert_eq!(normalized["broken"], json!("{not json"));
        assert_eq!(normalized["list"], json!([[3]]));
    }
}
