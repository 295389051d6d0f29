use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// Statement text plus its positional parameters. Values are always bound,
/// never spliced into `text`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    #[must_use]
    pub fn new(text: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            text: text.into(),
            params,
        }
    }

    #[must_use]
    pub fn params_json(&self) -> Vec<Value> {
        self.params.iter().cloned().map(json_value_from_sql).collect()
    }
}

#[must_use]
pub fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(integer) => Value::from(integer),
        SqlValue::Real(real) => serde_json::Number::from_f64(real)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(text) => Value::String(text),
        SqlValue::Blob(bytes) => Value::String(format!("<blob:{} bytes>", bytes.len())),
    }
}

/// Maps caller-supplied JSON scalars onto SQLite values.
pub fn sql_value_from_json(value: Value) -> Result<SqlValue, String> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(flag) => Ok(SqlValue::Integer(i64::from(flag))),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(SqlValue::Integer(integer))
            } else if let Some(unsigned) = number.as_u64() {
                i64::try_from(unsigned)
                    .map(SqlValue::Integer)
                    .map_err(|_| "params integer exceeds INTEGER range".to_string())
            } else if let Some(real) = number.as_f64() {
                Ok(SqlValue::Real(real))
            } else {
                Err("unsupported numeric param value".to_string())
            }
        }
        Value::String(text) => Ok(SqlValue::Text(text)),
        Value::Array(_) | Value::Object(_) => {
            Err("params entries must be scalar JSON values".to_string())
        }
    }
}
