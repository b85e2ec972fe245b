//! 工具参数声明
//!
//! 注册时声明 参数名 -> 类型名，类型名在注册阶段解析并校验，调用阶段不再做反射检查。

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::Serialize;

use crate::tools::params::IDENTITY_KEY;
use crate::tools::RegistryError;

/// 参数类型（与 LLM 工具目录中的类型名一致）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "str" => Ok(ParamType::String),
            "integer" | "int" => Ok(ParamType::Integer),
            "number" | "float" => Ok(ParamType::Number),
            "boolean" | "bool" => Ok(ParamType::Boolean),
            "array" | "list" => Ok(ParamType::Array),
            "object" | "dict" => Ok(ParamType::Object),
            other => Err(other.to_string()),
        }
    }
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
}

/// 解析 (参数名, 类型名) 列表；身份键保留给注册表注入，不能声明
pub fn parse_schema(tool: &str, declared: &[(&str, &str)]) -> Result<Vec<ParamSpec>, RegistryError> {
    let mut specs: Vec<ParamSpec> = Vec::with_capacity(declared.len());
    for (name, type_name) in declared {
        if *name == IDENTITY_KEY {
            return Err(RegistryError::ReservedParameter {
                tool: tool.to_string(),
                param: name.to_string(),
            });
        }
        if specs.iter().any(|s| s.name == *name) {
            return Err(RegistryError::InvalidSchema {
                tool: tool.to_string(),
                reason: format!("parameter '{name}' declared twice"),
            });
        }
        let kind = type_name
            .parse::<ParamType>()
            .map_err(|bad| RegistryError::InvalidSchema {
                tool: tool.to_string(),
                reason: format!("unknown type '{bad}' for parameter '{name}'"),
            })?;
        specs.push(ParamSpec {
            name: name.to_string(),
            kind,
        });
    }
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_accepts_aliases() {
        let specs = parse_schema("t", &[("query", "string"), ("limit", "int")]).unwrap();
        assert_eq!(specs[1].kind, ParamType::Integer);
    }

    #[test]
    fn test_parse_schema_rejects_unknown_type() {
        let err = parse_schema("t", &[("when", "datetime")]).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidSchema { .. }));
    }

    #[test]
    fn test_parse_schema_rejects_identity_key() {
        let err = parse_schema("t", &[(IDENTITY_KEY, "string")]).unwrap_err();
        assert!(matches!(err, RegistryError::ReservedParameter { .. }));
    }
}
