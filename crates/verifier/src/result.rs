use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::VerifyError;

/// The domain encoding a consumer expects the attested result to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultEncoding {
    /// A JSON string, yielded as UTF-8 text.
    #[default]
    Text,
    /// Any JSON document.
    Json,
    /// A JSON number, or a JSON string holding a decimal number.
    Float,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpretedResult {
    Text(String),
    Json(Value),
    Float(f64),
}

impl fmt::Display for InterpretedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpretedResult::Text(text) => f.write_str(text),
            InterpretedResult::Json(value) => write!(f, "{value}"),
            InterpretedResult::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Decodes raw result bytes into the expected domain value.
///
/// Never falls back to a default: bytes that are not in the requested
/// encoding are an error.
pub fn interpret(
    bytes: &[u8],
    encoding: ResultEncoding,
) -> Result<InterpretedResult, VerifyError> {
    let fail = |cause: String| VerifyError::Interpretation { encoding, cause };

    let text = std::str::from_utf8(bytes).map_err(|err| fail(format!("invalid UTF-8: {err}")))?;
    let value: Value =
        serde_json::from_str(text).map_err(|err| fail(format!("invalid JSON: {err}")))?;

    match encoding {
        ResultEncoding::Json => Ok(InterpretedResult::Json(value)),
        ResultEncoding::Text => match value {
            Value::String(text) => Ok(InterpretedResult::Text(text)),
            other => Err(fail(format!("expected a JSON string, got {other}"))),
        },
        ResultEncoding::Float => {
            let number = match &value {
                Value::Number(number) => number.as_f64(),
                Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| fail(format!("expected a number, got {value}")))?;
            if !number.is_finite() {
                return Err(fail(format!("{number} is not finite")));
            }
            Ok(InterpretedResult::Float(number))
        }
    }
}

impl fmt::Display for ResultEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResultEncoding::Text => "text",
            ResultEncoding::Json => "json",
            ResultEncoding::Float => "float",
        })
    }
}

impl FromStr for ResultEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" | "utf8" => Ok(ResultEncoding::Text),
            "json" => Ok(ResultEncoding::Json),
            "float" | "decimal" | "number" => Ok(ResultEncoding::Float),
            other => Err(format!("unknown result encoding: {other}")),
        }
    }
}
