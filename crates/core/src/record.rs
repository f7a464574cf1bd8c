use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::money::Money;

/// Strip `$`, `,` and surrounding whitespace, then parse what is left as a decimal.
pub fn coerce_decimal(raw: &str) -> Option<Decimal> {
    let clean = raw.replace(['$', ','], "");
    let clean = clean.trim();
    if clean.is_empty() {
        return None;
    }
    Decimal::from_str(clean)
        .or_else(|_| Decimal::from_scientific(clean))
        .ok()
        .map(|d| d.normalize())
}

/// A quantity or monetary value. Text that does not look like a number is kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Numeric {
    Number(Decimal),
    Text(String),
}

impl Numeric {
    pub fn coerce(raw: &str) -> Self {
        match coerce_decimal(raw) {
            Some(d) => Numeric::Number(d),
            None => Numeric::Text(raw.to_string()),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Numeric::Number(d) => Some(*d),
            Numeric::Text(_) => None,
        }
    }
}

impl From<Money> for Numeric {
    fn from(m: Money) -> Self {
        Numeric::Number(m.as_decimal().normalize())
    }
}

impl From<u32> for Numeric {
    fn from(n: u32) -> Self {
        Numeric::Number(Decimal::from(n))
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Number(d) => write!(f, "{d}"),
            Numeric::Text(s) => write!(f, "{s}"),
        }
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Numeric::Number(d) if d.fract().is_zero() => match d.to_i64() {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(d.to_f64().unwrap_or(f64::MAX)),
            },
            Numeric::Number(d) => serializer.serialize_f64(d.to_f64().unwrap_or_default()),
            Numeric::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<&Value> for Numeric {
    fn from(v: &Value) -> Self {
        match v {
            Value::Number(n) => match coerce_decimal(&n.to_string()) {
                Some(d) => Numeric::Number(d),
                None => Numeric::Text(n.to_string()),
            },
            Value::String(s) => Numeric::coerce(s),
            other => Numeric::coerce(&value_text(other)),
        }
    }
}

impl<'de> Deserialize<'de> for Numeric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Numeric::from(&Value::deserialize(deserializer)?))
    }
}

/// Flatten any JSON value into display text. Objects and arrays contribute
/// their non-null leaves joined with `", "` (`{"Street": "42 Harbor Rd",
/// "City": "Seattle"}` reads `42 Harbor Rd, Seattle`).
fn value_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => join_texts(items.iter()),
        Value::Object(map) => join_texts(map.values()),
    }
}

fn join_texts<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    values
        .map(value_text)
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Any non-null JSON value is accepted where text is expected; models emit
/// bare invoice numbers and structured addresses.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        v => Some(value_text(&v)),
    })
}

fn line_item(v: Value) -> LineItem {
    match v {
        Value::Object(map) => LineItem {
            description: map.get("Description").and_then(|d| match d {
                Value::Null => None,
                d => Some(value_text(d)),
            }),
            quantity: numeric_field(&map, "Quantity"),
            unit_price: numeric_field(&map, "UnitPrice"),
            total_price: numeric_field(&map, "TotalPrice"),
        },
        other => LineItem { description: Some(value_text(&other)), ..Default::default() },
    }
}

fn numeric_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<Numeric> {
    map.get(key).filter(|v| !v.is_null()).map(Numeric::from)
}

/// `null` means no items; a lone object or scalar is treated as a single item.
fn lenient_items<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<LineItem>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter(|v| !v.is_null()).map(line_item).collect(),
        other => vec![line_item(other)],
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LineItem {
    #[serde(deserialize_with = "lenient_text")]
    pub description: Option<String>,
    pub quantity: Option<Numeric>,
    pub unit_price: Option<Numeric>,
    pub total_price: Option<Numeric>,
}

/// The fixed-shape invoice record every extraction path produces.
///
/// All keys are always serialized; unknown values are `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InvoiceRecord {
    #[serde(deserialize_with = "lenient_text")]
    pub company_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub company_address: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub customer_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub customer_address: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub invoice_number: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub due_date: Option<String>,
    pub subtotal: Option<Numeric>,
    pub tax_amount: Option<Numeric>,
    #[serde(alias = "Total")]
    pub total_amount: Option<Numeric>,
    #[serde(deserialize_with = "lenient_items")]
    pub line_items: Vec<LineItem>,
}

impl InvoiceRecord {
    /// How many of the ten scalar fields carry a value, out of ten.
    pub fn coverage(&self) -> (usize, usize) {
        let text = [
            &self.company_name,
            &self.company_address,
            &self.customer_name,
            &self.customer_address,
            &self.invoice_number,
            &self.date,
            &self.due_date,
        ];
        let numeric = [&self.subtotal, &self.tax_amount, &self.total_amount];
        let filled = text.iter().filter(|f| f.is_some()).count()
            + numeric.iter().filter(|f| f.is_some()).count();
        (filled, text.len() + numeric.len())
    }
}
