//! Normalizes loosely-typed JSON records into [`RawLineItem`]s before scoring.

use crate::{
    engine::Scorer,
    error::ScoringError,
    types::{BatchOutcome, RawLineItem},
};
use serde_json::{Map, Value};

const LINE_TOTAL_KEYS: [&str; 3] = ["line_total", "amount", "total"];

/// Accepts a bare array of records or an object wrapping one under `lines` / `line_items`.
pub fn parse_line_items(payload: &Value) -> Result<Vec<RawLineItem>, ScoringError> {
    let records = match payload {
        Value::Array(records) => records,
        Value::Object(obj) => match obj.get("lines").or_else(|| obj.get("line_items")) {
            Some(Value::Array(records)) => records,
            Some(other) => {
                return Err(ScoringError::MalformedBatch(format!(
                    "`lines` must be an array, found {}",
                    type_name(other)
                )))
            }
            None => {
                return Err(ScoringError::MalformedBatch(
                    "expected an array of line items or an object with `lines`".to_string(),
                ))
            }
        },
        other => {
            return Err(ScoringError::MalformedBatch(format!(
                "expected an array of line items, found {}",
                type_name(other)
            )))
        }
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_record(index, record))
        .collect()
}

pub fn score_records<S: Scorer + ?Sized>(
    scorer: &S,
    payload: &Value,
) -> Result<BatchOutcome, ScoringError> {
    let lines = parse_line_items(payload)?;
    scorer.score_batch(&lines)
}

fn parse_record(index: usize, record: &Value) -> Result<RawLineItem, ScoringError> {
    let Value::Object(obj) = record else {
        return Err(ScoringError::MalformedLine {
            index,
            detail: format!("expected an object, found {}", type_name(record)),
        });
    };

    let mut line_total = None;
    for key in LINE_TOTAL_KEYS {
        if obj.contains_key(key) {
            line_total = numeric_field(index, obj, key)?;
            if line_total.is_some() {
                break;
            }
        }
    }

    Ok(RawLineItem {
        description: text_field(index, obj, "description")?,
        hours: numeric_field(index, obj, "hours")?,
        rate: numeric_field(index, obj, "rate")?,
        line_total,
    })
}

fn numeric_field(
    index: usize,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<f64>, ScoringError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        // unparseable text is imputed, not rejected
        Some(Value::String(s)) => Ok(parse_amount(s)),
        Some(other) => Err(ScoringError::MalformedField {
            index,
            field: field.to_string(),
            detail: format!("expected a number, found {}", type_name(other)),
        }),
    }
}

fn text_field(
    index: usize,
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, ScoringError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(ScoringError::MalformedField {
            index,
            field: field.to_string(),
            detail: format!("expected a string, found {}", type_name(other)),
        }),
    }
}

/// Parses `"1200"`, `"$1,200.50"`, `" 3.5 "`; anything else is `None`.
fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
