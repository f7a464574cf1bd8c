use std::sync::OnceLock;

use invex_core::InvoiceRecord;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("No JSON object found in model reply")]
    NoJson,
    #[error("Model reply is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn re_json_object() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("invalid regex"))
}

/// The span from the first `{` to the last `}` of a free-text reply.
/// Surrounding prose and markdown fences are discarded.
pub fn json_span(reply: &str) -> Option<&str> {
    re_json_object().find(reply).map(|m| m.as_str())
}

/// Parse a model reply into a record. Monetary strings are coerced while the
/// record is deserialized (`"$1,234.50"` becomes `1234.5`); values of an
/// unexpected JSON type are kept as text. Only a missing or syntactically
/// broken object is an error.
pub fn parse_reply(reply: &str) -> Result<InvoiceRecord, ReplyError> {
    let span = json_span(reply).ok_or(ReplyError::NoJson)?;
    Ok(serde_json::from_str(span)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use invex_core::Numeric;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn parses_fenced_reply_with_prose() {
        let reply = "Sure! Here is the data:\n```json\n{\n  \"CompanyName\": \"Northwind Traders\",\n  \"InvoiceNumber\": \"NW-2291\",\n  \"Subtotal\": \"$1,234.50\",\n  \"TaxAmount\": 148.14,\n  \"TotalAmount\": \"1,382.64\",\n  \"LineItems\": [{\"Description\": \"Freight\", \"Quantity\": 1, \"UnitPrice\": \"$1,234.50\", \"TotalPrice\": \"$1,234.50\"}]\n}\n```\nLet me know if you need more.";
        let r = parse_reply(reply).unwrap();
        assert_eq!(r.company_name.as_deref(), Some("Northwind Traders"));
        assert_eq!(r.invoice_number.as_deref(), Some("NW-2291"));
        assert_eq!(r.subtotal, Some(Numeric::Number(Decimal::from_str("1234.5").unwrap())));
        assert_eq!(r.total_amount, Some(Numeric::Number(Decimal::from_str("1382.64").unwrap())));
        assert_eq!(r.line_items.len(), 1);
        assert_eq!(r.customer_name, None);
    }

    #[test]
    fn no_braces_is_no_json() {
        assert!(matches!(
            parse_reply("I could not read this invoice."),
            Err(ReplyError::NoJson)
        ));
    }

    #[test]
    fn broken_json_is_malformed() {
        assert!(matches!(
            parse_reply("{\"CompanyName\": \"Acme\", }"),
            Err(ReplyError::Malformed(_))
        ));
    }

    #[test]
    fn unexpected_field_types_keep_the_reply() {
        let reply = r#"{"CompanyName": "Northwind", "CompanyAddress": {"Street": "42 Harbor Rd", "City": "Seattle"}, "CustomerAddress": ["9 Elm St", "Portland"], "LineItems": [{"Description": "Freight", "Quantity": true}]}"#;
        let r = parse_reply(reply).unwrap();
        assert_eq!(r.company_name.as_deref(), Some("Northwind"));
        assert_eq!(r.company_address.as_deref(), Some("42 Harbor Rd, Seattle"));
        assert_eq!(r.customer_address.as_deref(), Some("9 Elm St, Portland"));
        assert_eq!(r.line_items[0].quantity, Some(Numeric::Text("true".into())));
    }

    #[test]
    fn json_span_is_greedy() {
        assert_eq!(json_span("a {x} b {y} c"), Some("{x} b {y}"));
        assert_eq!(json_span("nothing here"), None);
    }
}
