//! Persisted snapshot format
//!
//! Wire shape, stored as one JSON document per staging key:
//!
//! ```json
//! { "updatedAt": 1718000000000,
//!   "entries": [{ "id": "...", "kind": "tare", "grossAmount": "230", ... }],
//!   "interpretation": "absolute",
//!   "direction": "add" }
//! ```
//!
//! Quantities are written as decimal strings so they read back exactly; plain
//! JSON numbers are still accepted on load.
//!
//! Decoding is a validated parse: each entry is narrowed field by field into a
//! [`ParsedEntry`], so one damaged entry does not cost the rest of the snapshot.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use crate::error::SnapshotError;
use crate::models::{
    ConversionEntry, ConversionInput, DeltaDirection, EntryKind, Interpretation, ManualEntry,
    PackageEntry, StagedEntry, StagingState, TareEntry,
};

/// Result of parsing one persisted entry
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEntry {
    Valid(StagedEntry),
    Invalid(&'static str),
}

/// A decoded snapshot before any staleness or context checks
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSnapshot {
    pub updated_at: DateTime<Utc>,
    pub entries: Vec<ParsedEntry>,
    pub interpretation: Interpretation,
    pub direction: DeltaDirection,
}

impl DecodedSnapshot {
    /// Keep the valid entries, returning the state and how many were dropped
    pub fn into_state(self) -> (StagingState, usize) {
        let total = self.entries.len();
        let entries: Vec<StagedEntry> = self
            .entries
            .into_iter()
            .filter_map(|parsed| match parsed {
                ParsedEntry::Valid(entry) => Some(entry),
                ParsedEntry::Invalid(reason) => {
                    tracing::debug!(reason, "dropping invalid staged entry");
                    None
                }
            })
            .collect();
        let dropped = total - entries.len();

        let state = StagingState {
            entries,
            interpretation: self.interpretation,
            direction: self.direction,
        };
        (state, dropped)
    }
}

fn number(value: Decimal) -> Value {
    Value::String(value.to_string())
}

/// Encode one entry in its persisted shape
pub fn encode_entry(entry: &StagedEntry) -> Value {
    match entry {
        StagedEntry::Tare(e) => json!({
            "id": e.id(),
            "kind": EntryKind::Tare.as_str(),
            "grossAmount": number(e.gross_amount()),
            "tareWeight": number(e.tare_weight()),
            "netAmount": number(e.net_amount()),
            "submissionAmount": number(e.net_amount()),
        }),
        StagedEntry::Package(e) => json!({
            "id": e.id(),
            "kind": EntryKind::Package.as_str(),
            "quantity": number(e.quantity()),
            "packageSize": number(e.package_size()),
            "submissionAmount": number(e.submission_amount()),
        }),
        StagedEntry::Manual(e) => json!({
            "id": e.id(),
            "kind": EntryKind::Manual.as_str(),
            "submissionAmount": number(e.submission_amount()),
        }),
        StagedEntry::Conversion(e) => json!({
            "id": e.id(),
            "kind": EntryKind::Conversion.as_str(),
            "grossAmount": number(e.gross_amount()),
            "fromUnit": e.from_unit(),
            "toUnit": e.to_unit(),
            "factor": number(e.factor()),
            "tareApplied": e.tare_applied(),
            "tareAmount": number(e.tare_amount()),
            "netAmount": number(e.net_amount()),
            "submissionAmount": number(e.submission_amount()),
        }),
    }
}

/// Encode a state as a snapshot written at `updated_at`
pub fn encode_snapshot(state: &StagingState, updated_at: DateTime<Utc>) -> String {
    json!({
        "updatedAt": updated_at.timestamp_millis(),
        "entries": state.entries.iter().map(encode_entry).collect::<Vec<_>>(),
        "interpretation": state.interpretation.as_str(),
        "direction": state.direction.as_str(),
    })
    .to_string()
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn decimal_field(obj: &Map<String, Value>, field: &'static str) -> Result<Decimal, &'static str> {
    obj.get(field).and_then(decimal_value).ok_or(field)
}

fn string_field<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, &'static str> {
    obj.get(field).and_then(Value::as_str).ok_or(field)
}

fn parse_entry_fields(value: &Value) -> Result<StagedEntry, &'static str> {
    let obj = value.as_object().ok_or("entry is not an object")?;

    let id = string_field(obj, "id")?.trim();
    if id.is_empty() {
        return Err("id");
    }
    let id = id.to_string();
    let kind = EntryKind::parse(string_field(obj, "kind")?).ok_or("kind")?;

    let entry = match kind {
        EntryKind::Tare => {
            let gross = decimal_field(obj, "grossAmount")?;
            let tare = decimal_field(obj, "tareWeight")?;
            TareEntry::with_id(id, gross, tare).map(StagedEntry::Tare)
        }
        EntryKind::Package => {
            let quantity = decimal_field(obj, "quantity")?;
            let size = decimal_field(obj, "packageSize")?;
            PackageEntry::with_id(id, quantity, size).map(StagedEntry::Package)
        }
        EntryKind::Manual => {
            let amount = decimal_field(obj, "submissionAmount")?;
            ManualEntry::with_id(id, amount).map(StagedEntry::Manual)
        }
        EntryKind::Conversion => {
            let tare_applied = match obj.get("tareApplied") {
                None | Some(Value::Null) => false,
                Some(Value::Bool(applied)) => *applied,
                Some(_) => return Err("tareApplied"),
            };
            let tare_amount = if tare_applied {
                decimal_field(obj, "tareAmount")?
            } else {
                Decimal::ZERO
            };
            let input = ConversionInput {
                gross_amount: decimal_field(obj, "grossAmount")?,
                from_unit: string_field(obj, "fromUnit")?.to_string(),
                to_unit: string_field(obj, "toUnit")?.to_string(),
                factor: decimal_field(obj, "factor")?,
                tare_applied,
                tare_amount,
            };
            ConversionEntry::with_id(id, input).map(StagedEntry::Conversion)
        }
    };

    entry.map_err(|_| "entry values out of range")
}

/// Narrow one persisted value into an entry
pub fn parse_entry(value: &Value) -> ParsedEntry {
    match parse_entry_fields(value) {
        Ok(entry) => ParsedEntry::Valid(entry),
        Err(reason) => ParsedEntry::Invalid(reason),
    }
}

/// Decode a snapshot document.
///
/// Fails only when the document as a whole is unusable: not JSON, not an
/// object, or lacking a timestamp or entry list. Unknown interpretation or
/// direction values fall back to their defaults.
pub fn decode_snapshot(raw: &str) -> Result<DecodedSnapshot, SnapshotError> {
    let document: Value = serde_json::from_str(raw)?;
    let obj = document
        .as_object()
        .ok_or(SnapshotError::InvalidField("snapshot"))?;

    let updated_at_ms = match obj.get("updatedAt") {
        None | Some(Value::Null) => return Err(SnapshotError::MissingField("updatedAt")),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms as i64))
            .ok_or(SnapshotError::InvalidField("updatedAt"))?,
    };
    let updated_at = Utc
        .timestamp_millis_opt(updated_at_ms)
        .single()
        .ok_or(SnapshotError::InvalidField("updatedAt"))?;

    let entries = match obj.get("entries") {
        None | Some(Value::Null) => return Err(SnapshotError::MissingField("entries")),
        Some(Value::Array(items)) => items.iter().map(parse_entry).collect(),
        Some(_) => return Err(SnapshotError::InvalidField("entries")),
    };

    let interpretation = obj
        .get("interpretation")
        .and_then(Value::as_str)
        .and_then(Interpretation::parse)
        .unwrap_or_default();
    let direction = obj
        .get("direction")
        .and_then(Value::as_str)
        .and_then(DeltaDirection::parse)
        .unwrap_or_default();

    Ok(DecodedSnapshot {
        updated_at,
        entries,
        interpretation,
        direction,
    })
}
