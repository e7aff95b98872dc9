use serde_json::Value;

use crate::error::{EtherscanError, Result};
use crate::networks;

/// A raw explorer response, decoded lazily by [`EtherscanResponse::value`].
#[derive(Debug, Clone)]
pub struct EtherscanResponse {
    pub status: u16,
    pub text: String,
    pub ecosystem: String,
    pub raise_on_exceptions: bool,
    /// Whether the request carried an API key.
    pub has_api_key: bool,
}

impl EtherscanResponse {
    pub fn new(
        status: u16,
        text: String,
        ecosystem: &str,
        raise_on_exceptions: bool,
        has_api_key: bool,
    ) -> Self {
        EtherscanResponse {
            status,
            text,
            ecosystem: ecosystem.to_string(),
            raise_on_exceptions,
            has_api_key,
        }
    }

    /// Decode the `result` field.
    ///
    /// Explorers report most failures inside a `200` response, so the error
    /// markers (`isError`, `NOTOK`, `Error!` prefixes) are interpreted here.
    pub fn value(&self) -> Result<Value> {
        // Explorers answer some lookups with an HTML page.
        let data: Value = serde_json::from_str(&self.text)
            .map_err(|_| EtherscanError::response("Resource not found"))?;

        let message = data
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let is_error = data.get("isError").map(is_truthy).unwrap_or(false) || message == "NOTOK";
        if is_error && self.raise_on_exceptions {
            return Err(self.request_error(&data, &message));
        }

        let result = match data.get("result") {
            Some(result) => result.clone(),
            None => Value::String(message),
        };

        let text = match &result {
            Value::String(text) if !text.is_empty() => text,
            _ => return Ok(result),
        };

        if let Some(rest) = text.strip_prefix("Error!") {
            let err_msg = rest.trim().to_string();
            if self.raise_on_exceptions {
                return Err(EtherscanError::response(err_msg));
            }
            return Ok(Value::String(err_msg));
        }

        // Some results are stringified JSON.
        match serde_json::from_str::<Value>(text) {
            Ok(decoded @ (Value::Object(_) | Value::Array(_))) => Ok(decoded),
            _ => Ok(result),
        }
    }

    /// Decode the result as a list, rejecting any other shape.
    pub fn list(&self) -> Result<Vec<Value>> {
        match self.value()? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(EtherscanError::UnhandledResultType(describe(&other))),
        }
    }

    /// Decode the result as text. Numbers are accepted since some ids arrive bare.
    pub fn string(&self) -> Result<String> {
        match self.value()? {
            Value::String(text) => Ok(text),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(EtherscanError::UnhandledResultType(describe(&other))),
        }
    }

    fn request_error(&self, data: &Value, message: &str) -> EtherscanError {
        if self.text.to_lowercase().contains("max rate limit reached") {
            let env = networks::api_key_env(&self.ecosystem);
            return EtherscanError::too_many_requests(env, self.has_api_key);
        }

        let detail = match data.get("result") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(v) if !v.is_null() && v.as_array().map_or(true, |a| !a.is_empty()) => v.to_string(),
            _ if !message.is_empty() => message.to_string(),
            _ => self.text.clone(),
        };
        EtherscanError::response(detail)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map_or(false, |n| n != 0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Null => false,
        _ => true,
    }
}

fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    };
    format!("{} ({})", kind, value)
}
