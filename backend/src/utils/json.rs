use std::str::FromStr;

use bson::{Bson, Decimal128, Document};
use chrono::SecondsFormat;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

/// Renders a stored document the way clients expect it: ObjectIds as hex
/// strings and dates as ISO-8601 timestamps.
pub fn document_to_json(document: Document) -> Value {
    Value::Object(
        document
            .into_iter()
            .map(|(key, value)| (key, bson_to_json(value)))
            .collect::<Map<String, Value>>(),
    )
}

pub fn documents_to_json(documents: Vec<Document>) -> Vec<Value> {
    documents.into_iter().map(document_to_json).collect()
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(at) => Value::String(
            at.to_chrono()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
        Bson::Document(document) => document_to_json(document),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Int32(number) => Value::from(number),
        Bson::Int64(number) => Value::from(number),
        Bson::Double(number) => number_value(number),
        Bson::Decimal128(number) => match decimal128_to_decimal(&number) {
            Some(amount) => decimal_value(amount),
            None => Value::String(number.to_string()),
        },
        other => other.into_relaxed_extjson(),
    }
}

/// Emits whole floats as integers so `350.0` renders as `350`.
pub fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        Number::from_f64(number).map_or(Value::Null, Value::Number)
    }
}

/// Renders an exact amount as a JSON number, as an integer when it has no
/// fractional part.
pub fn decimal_value(amount: Decimal) -> Value {
    let amount = amount.normalize();
    if amount.scale() == 0 {
        if let Some(whole) = amount.to_i64() {
            return Value::from(whole);
        }
    }
    amount
        .to_f64()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

pub fn decimal128_to_decimal(number: &Decimal128) -> Option<Decimal> {
    parse_decimal(&number.to_string())
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Reads a loosely typed money field. Numbers count as themselves, numeric
/// strings as their parsed value, anything else as zero.
pub fn lenient_number(value: Option<&Bson>) -> Decimal {
    let parsed = match value {
        Some(Bson::Int32(number)) => Some(Decimal::from(*number)),
        Some(Bson::Int64(number)) => Some(Decimal::from(*number)),
        Some(Bson::Double(number)) => Decimal::try_from(*number).ok(),
        Some(Bson::Decimal128(number)) => decimal128_to_decimal(number),
        Some(Bson::String(text)) => parse_decimal(text.trim()),
        _ => None,
    };
    parsed.unwrap_or(Decimal::ZERO)
}
