use crate::entities::property::{PropertyError, PropertyValue};

/// A loosely typed value coming from script or console text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptValue {
    Number(i64),
    String(String),
    Ident(String),
    List(Vec<ScriptValue>),
}

/// Wire width to coerce a script value into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueHint {
    /// Numbers become u32, text becomes a string.
    Auto,
    U8,
    U16,
    U32,
    String,
}

impl ValueHint {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "auto" => Some(ValueHint::Auto),
            "u8" => Some(ValueHint::U8),
            "u16" => Some(ValueHint::U16),
            "u32" => Some(ValueHint::U32),
            "string" | "str" => Some(ValueHint::String),
            _ => None,
        }
    }
}

impl ScriptValue {
    fn kind(&self) -> &'static str {
        match self {
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Ident(_) => "ident",
            ScriptValue::List(_) => "list",
        }
    }

    /// Narrows to the closed wire set. Anything that cannot be carried in a
    /// property slot is rejected here, before it reaches an encoder.
    pub fn into_property_value(self, hint: ValueHint) -> Result<PropertyValue, PropertyError> {
        match (self, hint) {
            (ScriptValue::Number(value), ValueHint::Auto | ValueHint::U32) => u32::try_from(value)
                .map(PropertyValue::U32)
                .map_err(|_| PropertyError::OutOfRange { value, kind: "u32" }),
            (ScriptValue::Number(value), ValueHint::U16) => u16::try_from(value)
                .map(PropertyValue::U16)
                .map_err(|_| PropertyError::OutOfRange { value, kind: "u16" }),
            (ScriptValue::Number(value), ValueHint::U8) => u8::try_from(value)
                .map(PropertyValue::U8)
                .map_err(|_| PropertyError::OutOfRange { value, kind: "u8" }),
            (ScriptValue::Number(value), ValueHint::String) => {
                Ok(PropertyValue::String(value.to_string()))
            }
            (ScriptValue::String(text) | ScriptValue::Ident(text), ValueHint::Auto | ValueHint::String) => {
                Ok(PropertyValue::String(text))
            }
            (other, _) => Err(PropertyError::UnsupportedValueType(format!(
                "{} as {:?}",
                other.kind(),
                hint
            ))),
        }
    }
}

pub fn parse_value(raw: &str) -> Result<ScriptValue, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("empty value".to_string());
    }
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        return Ok(ScriptValue::String(value[1..value.len() - 1].to_string()));
    }
    if value.starts_with('[') && value.ends_with(']') {
        let inner = value[1..value.len() - 1].trim();
        if inner.is_empty() {
            return Ok(ScriptValue::List(Vec::new()));
        }
        let items = split_top_level(inner, ',')?
            .iter()
            .map(|part| parse_value(part))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ScriptValue::List(items));
    }
    if let Ok(number) = value.parse::<i64>() {
        return Ok(ScriptValue::Number(number));
    }
    if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        if let Ok(number) = i64::from_str_radix(hex, 16) {
            return Ok(ScriptValue::Number(number));
        }
    }
    Ok(ScriptValue::Ident(value.to_string()))
}

/// Splits on `delimiter` outside quotes and brackets.
pub fn split_top_level(input: &str, delimiter: char) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut prev_escape = false;

    for ch in input.chars() {
        if in_quotes {
            if ch == '"' && !prev_escape {
                in_quotes = false;
            }
            prev_escape = ch == '\\' && !prev_escape;
            current.push(ch);
            continue;
        }
        match ch {
            '"' => {
                in_quotes = true;
                prev_escape = false;
                current.push(ch);
            }
            '[' => {
                depth += 1;
                current.push(ch);
            }
            ']' => {
                depth = depth.checked_sub(1).ok_or("unbalanced ']'")?;
                current.push(ch);
            }
            _ if ch == delimiter && depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if in_quotes {
        return Err("unterminated string".to_string());
    }
    if depth != 0 {
        return Err("unbalanced delimiters".to_string());
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    Ok(parts)
}
