use std::sync::OnceLock;

use chrono::NaiveDate;
use invex_core::{coerce_decimal, InvoiceRecord, Numeric};
use regex::Regex;
use rust_decimal::Decimal;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_legal_form,
    r"(?i)\b(?:inc|llc|corp|corporation|ltd|limited|company|co|gmbh|plc)\b\.?");
re!(re_street,
    r"(?i)^\d+\s+.*\b(?:street|st|avenue|ave|road|rd|drive|dr|lane|ln|boulevard|blvd|way|suite)\b");
re!(re_postcode,
    r"\b(?:[A-Z]{2}\s+)?\d{5}(?:-\d{4})?\b");
re!(re_customer_label,
    r"(?i)\b(?:bill(?:ed)?\s+to|sold\s+to|customer)\b\s*:?[ \t]*");
re!(re_invoice_number,
    r"(?i)\b(?:invoice|inv)\s*(?:number|no\.?|#|num)?\s*[:#]?\s*([A-Z0-9][A-Z0-9/-]*\d[A-Z0-9/-]*)");
re!(re_hash_number,
    r"#\s*([A-Z0-9-]*\d[A-Z0-9-]{2,})");
re!(re_due,
    r"(?i)\b(?:due|payable\s+by)\b");

re!(re_subtotal,
    r"(?i)\bsub\s*-?\s*total\b\s*:?\s*\$?\s*([\d,]+(?:\.\d+)?)");
re!(re_tax,
    r"(?i)\b(?:sales\s+)?(?:tax|vat|gst|hst)\b\s*(?:\([^)\n]*\))?\s*:?\s*\$?\s*([\d,]+(?:\.\d+)?)");
re!(re_total_label,
    r"(?i)\b(?:grand\s+total|total\s+due|amount\s+due|balance\s+due|final\s+amount|total)\b\s*:?\s*\$?\s*([\d,]+(?:\.\d+)?)");
re!(re_currency,
    r"\$\s*([\d,]+\.\d{2})\b");

re!(re_date_month_name,
    r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2}),?\s+(\d{4})\b");
re!(re_date_abbr_month,
    r"(?i)\b(\d{1,2})\s+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)\.?\s+(\d{4})\b");
re!(re_date_iso,
    r"\b(\d{4})-(\d{2})-(\d{2})\b");
re!(re_date_numeric,
    r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})\b");

re!(re_phone,
    r"\(?\d{3}\)?[\s\-]\d{3}[\s\-]\d{4}");
re!(re_url,
    r"(?i)(https?://|www\.)\S+");

// ── Public extraction API ─────────────────────────────────────────────────────

/// Regex heuristics over plain invoice text (a pasted invoice, a text export).
pub struct TextExtractor;

impl TextExtractor {
    pub fn extract(text: &str) -> InvoiceRecord {
        let (customer_name, customer_address) = Self::extract_customer(text);
        let (date, due_date) = Self::extract_dates(text);

        InvoiceRecord {
            company_name: Self::extract_company_name(text),
            company_address: Self::extract_company_address(text),
            customer_name,
            customer_address,
            invoice_number: Self::extract_invoice_number(text),
            date: date.map(iso),
            due_date: due_date.map(iso),
            subtotal: first_amount(re_subtotal(), text).map(Numeric::Number),
            tax_amount: first_amount(re_tax(), text).map(Numeric::Number),
            total_amount: Self::extract_total(text).map(Numeric::Number),
            line_items: vec![],
        }
    }

    // ── Issuer ────────────────────────────────────────────────────────────────

    fn extract_company_name(text: &str) -> Option<String> {
        let candidates: Vec<&str> = text
            .lines()
            .take(5)
            .map(str::trim)
            .filter(|l| l.len() > 3)
            .filter(|l| !re_phone().is_match(l) && !re_url().is_match(l))
            .filter(|l| !l.to_lowercase().starts_with("invoice"))
            .collect();

        candidates
            .iter()
            .find(|l| re_legal_form().is_match(l))
            .or_else(|| candidates.first())
            .map(|l| l.to_string())
    }

    /// First street line in the header plus the following lines up to a postcode.
    fn extract_company_address(text: &str) -> Option<String> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let header_end = lines
            .iter()
            .position(|l| re_customer_label().is_match(l))
            .unwrap_or(lines.len());
        let start = lines[..header_end].iter().position(|l| re_street().is_match(l))?;
        address_block(&lines[start..header_end])
    }

    // ── Customer ──────────────────────────────────────────────────────────────

    fn extract_customer(text: &str) -> (Option<String>, Option<String>) {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let Some(idx) = lines.iter().position(|l| re_customer_label().is_match(l)) else {
            return (None, None);
        };

        // "Bill To: Name" on one line, or "Bill To:" with the name below it.
        let inline = re_customer_label()
            .find(lines[idx])
            .map(|m| lines[idx][m.end()..].trim())
            .filter(|rest| !rest.is_empty());
        let (name, body_start) = match inline {
            Some(name) => (Some(name.to_string()), idx + 1),
            None => match lines.get(idx + 1).filter(|l| !l.is_empty()) {
                Some(next) => (Some(next.to_string()), idx + 2),
                None => (None, idx + 1),
            },
        };

        let end = (body_start + 3).min(lines.len());
        let address = lines.get(body_start..end).and_then(address_block);
        (name, address)
    }

    // ── Identifiers and dates ─────────────────────────────────────────────────

    fn extract_invoice_number(text: &str) -> Option<String> {
        [re_invoice_number(), re_hash_number()]
            .into_iter()
            .find_map(|re| re.captures(text)?.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Issue date from lines without a due marker, due date from lines with one.
    fn extract_dates(text: &str) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let mut issued = None;
        let mut due = None;
        for line in text.lines() {
            let Some(d) = find_date(line) else { continue };
            if re_due().is_match(line) {
                due = due.or(Some(d));
            } else {
                issued = issued.or(Some(d));
            }
        }
        (issued, due)
    }

    // ── Amounts ───────────────────────────────────────────────────────────────

    fn extract_total(text: &str) -> Option<Decimal> {
        // Prefer the largest labelled total over any raw dollar amount.
        let labelled = re_total_label()
            .captures_iter(text)
            .filter_map(|c| coerce_decimal(c.get(1)?.as_str()))
            .filter(|d| d.is_sign_positive() && !d.is_zero())
            .max();
        labelled.or_else(|| {
            re_currency()
                .captures_iter(text)
                .filter_map(|c| coerce_decimal(c.get(1)?.as_str()))
                .max()
        })
    }
}

fn first_amount(re: &Regex, text: &str) -> Option<Decimal> {
    re.captures(text)
        .and_then(|c| coerce_decimal(c.get(1)?.as_str()))
}

/// Join up to three lines ending at the first one carrying a postcode.
fn address_block(lines: &[&str]) -> Option<String> {
    let take = lines.iter().take(3).position(|l| re_postcode().is_match(l))? + 1;
    let parts: Vec<&str> = lines[..take].iter().copied().filter(|l| !l.is_empty()).collect();
    Some(parts.join(", "))
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// ── Date helpers ──────────────────────────────────────────────────────────────

fn find_date(text: &str) -> Option<NaiveDate> {
    try_date_month_name(text)
        .or_else(|| try_date_abbr_month(text))
        .or_else(|| try_date_iso(text))
        .or_else(|| try_date_numeric(text))
}

fn try_date_month_name(text: &str) -> Option<NaiveDate> {
    let c = re_date_month_name().captures(text)?;
    let month = month_to_num(&c.get(1)?.as_str()[..3])?;
    let day: u32 = c.get(2)?.as_str().parse().ok()?;
    let year: i32 = c.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn try_date_abbr_month(text: &str) -> Option<NaiveDate> {
    let c = re_date_abbr_month().captures(text)?;
    let day: u32 = c.get(1)?.as_str().parse().ok()?;
    let month = month_to_num(c.get(2)?.as_str())?;
    let year: i32 = c.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn try_date_iso(text: &str) -> Option<NaiveDate> {
    let c = re_date_iso().captures(text)?;
    let y: i32 = c.get(1)?.as_str().parse().ok()?;
    let m: u32 = c.get(2)?.as_str().parse().ok()?;
    let d: u32 = c.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// MM/DD/YYYY first, then DD/MM/YYYY when the month would be out of range.
fn try_date_numeric(text: &str) -> Option<NaiveDate> {
    let c = re_date_numeric().captures(text)?;
    let p1: u32 = c.get(1)?.as_str().parse().ok()?;
    let p2: u32 = c.get(2)?.as_str().parse().ok()?;
    let year = expand_year(c.get(3)?.as_str().parse().ok()?);
    NaiveDate::from_ymd_opt(year, p1, p2).or_else(|| NaiveDate::from_ymd_opt(year, p2, p1))
}

fn expand_year(y: i32) -> i32 {
    if y < 100 { 2000 + y } else { y }
}

fn month_to_num(name: &str) -> Option<u32> {
    match name.to_lowercase().as_str() {
        "jan" => Some(1), "feb" => Some(2), "mar" => Some(3), "apr" => Some(4),
        "may" => Some(5), "jun" => Some(6), "jul" => Some(7), "aug" => Some(8),
        "sep" => Some(9), "oct" => Some(10), "nov" => Some(11), "dec" => Some(12),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const SAMPLE: &str = "\
Northwind Traders LLC
42 Harbor Road
Seattle, WA 98101
(206) 555-0199

Invoice #: NW-10045
Date: 03/15/2024
Due Date: 04/14/2024

Bill To:
Contoso Pharmacy
9 Elm Street
Portland, OR 97205

Consulting      $1,000.00
Travel            $234.50
Subtotal: $1,234.50
Tax (12%): $148.14
Total: $1,382.64
";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    // ── Parties ───────────────────────────────────────────────────────────────

    #[test]
    fn extracts_company_and_address() {
        let r = TextExtractor::extract(SAMPLE);
        assert_eq!(r.company_name.as_deref(), Some("Northwind Traders LLC"));
        assert_eq!(r.company_address.as_deref(), Some("42 Harbor Road, Seattle, WA 98101"));
    }

    #[test]
    fn company_falls_back_to_first_line() {
        let r = TextExtractor::extract("Blue Heron Bakery\nReceipt\nTotal $12.00");
        assert_eq!(r.company_name.as_deref(), Some("Blue Heron Bakery"));
    }

    #[test]
    fn extracts_customer_block_below_label() {
        let r = TextExtractor::extract(SAMPLE);
        assert_eq!(r.customer_name.as_deref(), Some("Contoso Pharmacy"));
        assert_eq!(r.customer_address.as_deref(), Some("9 Elm Street, Portland, OR 97205"));
    }

    #[test]
    fn extracts_inline_customer() {
        let r = TextExtractor::extract("ACME CORP\nBill To: Wayne Enterprises\nTotal $5.00");
        assert_eq!(r.customer_name.as_deref(), Some("Wayne Enterprises"));
        assert_eq!(r.customer_address, None);
    }

    // ── Identifiers and dates ─────────────────────────────────────────────────

    #[test]
    fn extracts_invoice_number() {
        assert_eq!(TextExtractor::extract(SAMPLE).invoice_number.as_deref(), Some("NW-10045"));
        let r = TextExtractor::extract("Invoice Number: 2024-0007\nTotal $1.00");
        assert_eq!(r.invoice_number.as_deref(), Some("2024-0007"));
        let r = TextExtractor::extract("Order # A1234\nTotal $1.00");
        assert_eq!(r.invoice_number.as_deref(), Some("A1234"));
    }

    #[test]
    fn separates_issue_and_due_dates() {
        let r = TextExtractor::extract(SAMPLE);
        assert_eq!(r.date.as_deref(), Some("2024-03-15"));
        assert_eq!(r.due_date.as_deref(), Some("2024-04-14"));
    }

    #[test]
    fn day_first_dates_fall_back() {
        let r = TextExtractor::extract("Date: 25/12/2023");
        assert_eq!(r.date.as_deref(), Some("2023-12-25"));
    }

    #[test]
    fn month_name_dates() {
        let r = TextExtractor::extract("Issued March 15, 2024\nPayment due 15 Apr 2024");
        assert_eq!(r.date.as_deref(), Some("2024-03-15"));
        assert_eq!(r.due_date.as_deref(), Some("2024-04-15"));
    }

    // ── Amounts ───────────────────────────────────────────────────────────────

    #[test]
    fn extracts_amounts() {
        let r = TextExtractor::extract(SAMPLE);
        assert_eq!(r.subtotal, Some(Numeric::Number(dec("1234.5"))));
        assert_eq!(r.tax_amount, Some(Numeric::Number(dec("148.14"))));
        assert_eq!(r.total_amount, Some(Numeric::Number(dec("1382.64"))));
    }

    #[test]
    fn total_takes_largest_labelled_amount() {
        let r = TextExtractor::extract("Total: $10.00\nAmount Due: $12.50");
        assert_eq!(r.total_amount, Some(Numeric::Number(dec("12.5"))));
    }

    #[test]
    fn total_falls_back_to_largest_dollar_amount() {
        let r = TextExtractor::extract("STORE\n$5.00\n$3.00\n$8.00");
        assert_eq!(r.total_amount, Some(Numeric::Number(dec("8"))));
    }

    #[test]
    fn empty_text_yields_empty_record() {
        let r = TextExtractor::extract("");
        assert_eq!(r.coverage(), (0, 10));
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let _ = TextExtractor::extract("!@#$%^&*()\n\0\x01\x02\nBill To:");
    }
}
