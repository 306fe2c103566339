//! Decodes the gateway's positional field/value response shape.
//!
//! `loadRecords` answers with a metadata block naming each field and records
//! keyed `f0`, `f1`, ... with the value under `$`. A single record comes back
//! as a bare object instead of a one-element array; both shapes are
//! normalized here. Decoding is strict where it matters: records without
//! metadata cannot be named, so that case fails instead of producing
//! partially keyed objects.

use crate::errors::AppError;
use serde_json::{Map, Value};

/// Field names from the response metadata, in positional order.
fn metadata_fields(entities: &Value) -> Result<Vec<String>, AppError> {
    let field = entities
        .pointer("/metadata/fields/field")
        .ok_or_else(|| AppError::Decode("entities.metadata.fields.field missing".to_string()))?;

    // A single field also arrives as a bare object
    let items: Vec<&Value> = match field {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let name = item
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| AppError::Decode("field metadata entry missing name".to_string()))?;
        names.push(name.to_string());
    }

    if names.is_empty() {
        return Err(AppError::Decode("field metadata list is empty".to_string()));
    }

    Ok(names)
}

/// Converts a `loadRecords` response into named records.
///
/// Position `i` maps to metadata name `i`; positions absent from a record are
/// simply omitted from its output object. A response without entities (or
/// with an empty page) decodes to an empty list.
pub fn flatten_entities(response: &Value) -> Result<Vec<Map<String, Value>>, AppError> {
    let Some(entities) = response.pointer("/responseBody/entities") else {
        return Ok(Vec::new());
    };
    let Some(entity) = entities.get("entity") else {
        return Ok(Vec::new());
    };

    let field_names = metadata_fields(entities)?;

    let records: Vec<&Value> = match entity {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut flattened = Vec::with_capacity(records.len());
    for raw in records {
        let mut named = Map::new();
        for (i, name) in field_names.iter().enumerate() {
            if let Some(value) = raw.get(format!("f{}", i)).and_then(|f| f.get("$")) {
                named.insert(name.clone(), value.clone());
            }
        }
        flattened.push(named);
    }

    Ok(flattened)
}

/// Total row count reported by the gateway, falling back to the page size
/// when the response omits it.
pub fn entities_total(response: &Value, fallback: usize) -> usize {
    let total = response.pointer("/responseBody/entities/total");
    match total {
        Some(Value::String(s)) => s.parse().unwrap_or(fallback),
        Some(Value::Number(n)) => n.as_u64().map(|n| n as usize).unwrap_or(fallback),
        _ => fallback,
    }
}

/// String view of a flattened field. Numeric values are rendered as text
/// since the gateway is inconsistent about quoting.
pub fn text(record: &Map<String, Value>, name: &str) -> Option<String> {
    match record.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Numeric view of a flattened field, zero when absent or unparseable.
pub fn number(record: &Map<String, Value>, name: &str) -> f64 {
    match record.get(name) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Date part of a gateway datetime ("DD/MM/YYYY HH:MM:SS" or ISO variants).
pub fn date_part(value: &str) -> String {
    value.split(' ').next().unwrap_or("").to_string()
}

/// Decodes a `DatasetSP.save` response row by zipping it with the submitted
/// field list. Save responses return plain value arrays instead of the
/// `fN`/`$` shape.
pub fn decode_save_result(fields: &[&str], response: &Value) -> Result<Map<String, Value>, AppError> {
    let row = response
        .pointer("/responseBody/result/0")
        .and_then(|r| r.as_array());

    let Some(row) = row else {
        let detail = response
            .get("statusMessage")
            .and_then(|m| m.as_str())
            .unwrap_or("save response carried no result row");
        return Err(AppError::Decode(detail.to_string()));
    };

    let mut named = Map::new();
    for (i, name) in fields.iter().enumerate() {
        if let Some(value) = row.get(i) {
            if !value.is_null() {
                named.insert((*name).to_string(), value.clone());
            }
        }
    }

    Ok(named)
}

/// Rows of a `DbExplorerSP.executeQuery` response.
pub fn query_rows(response: &Value) -> Result<Vec<Vec<Value>>, AppError> {
    let rows = response
        .pointer("/responseBody/rows")
        .and_then(|r| r.as_array())
        .ok_or_else(|| AppError::Decode("query response carried no rows".to_string()))?;

    rows.iter()
        .map(|row| {
            row.as_array()
                .cloned()
                .ok_or_else(|| AppError::Decode("query row is not an array".to_string()))
        })
        .collect()
}
