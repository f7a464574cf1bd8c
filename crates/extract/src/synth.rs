use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use invex_core::{InvoiceRecord, LineItem, Money, Numeric};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash;
use crate::stats::ImageStats;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// A recipe for fabricating an invoice record from image statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyntheticProfile {
    /// Pixel-buffer size and brightness drive the amounts; 15% tax.
    PixelStats,
    /// Brightness drives the amounts, dominant colour names the company; 12% tax,
    /// jittered line items.
    Brightness,
    /// Width and height drive the amounts, the filename seeds the hash; 12% tax.
    Dimensions,
    /// Six-field record for the dataset layout; 12% tax folded into the total.
    Dataset,
    /// Header and totals from a short pixel hash, no line items; 12% tax.
    Summary,
}

impl SyntheticProfile {
    /// Fallback order used when nothing is configured.
    pub const DEFAULT_CHAIN: [SyntheticProfile; 2] =
        [SyntheticProfile::PixelStats, SyntheticProfile::Brightness];

    pub fn generate<R: Rng>(
        self,
        stats: &ImageStats,
        filename: &str,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<InvoiceRecord, SynthError> {
        if stats.is_empty() || stats.pixel_bytes == 0 {
            return Err(SynthError::EmptyImage { width: stats.width, height: stats.height });
        }
        Ok(match self {
            SyntheticProfile::PixelStats => pixel_stats(stats, today),
            SyntheticProfile::Brightness => brightness(stats, today, rng),
            SyntheticProfile::Dimensions => dimensions(stats, filename, today),
            SyntheticProfile::Dataset => dataset(stats, filename, today),
            SyntheticProfile::Summary => summary(stats, today),
        })
    }
}

impl fmt::Display for SyntheticProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntheticProfile::PixelStats => write!(f, "pixel-stats"),
            SyntheticProfile::Brightness => write!(f, "brightness"),
            SyntheticProfile::Dimensions => write!(f, "dimensions"),
            SyntheticProfile::Dataset => write!(f, "dataset"),
            SyntheticProfile::Summary => write!(f, "summary"),
        }
    }
}

impl FromStr for SyntheticProfile {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pixel-stats" => Ok(SyntheticProfile::PixelStats),
            "brightness" => Ok(SyntheticProfile::Brightness),
            "dimensions" => Ok(SyntheticProfile::Dimensions),
            "dataset" => Ok(SyntheticProfile::Dataset),
            "summary" => Ok(SyntheticProfile::Summary),
            other => Err(format!("Unknown synthetic profile: '{other}'")),
        }
    }
}

// ── Shared arithmetic ─────────────────────────────────────────────────────────

const SERVICES: [&str; 4] = ["Service", "Product", "Consultation", "Support"];

struct Amounts {
    subtotal: Money,
    tax: Money,
    total: Money,
}

/// Subtotal rounded to cents, tax on the rounded subtotal, total = subtotal + tax.
fn amounts(base: Decimal, rate_percent: i64) -> Amounts {
    let subtotal = Money::from_decimal(base);
    let tax = subtotal.scale(Decimal::new(rate_percent, 2));
    Amounts { subtotal, tax, total: subtotal + tax }
}

fn dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or_default()
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Invoice date and the net-30 due date.
fn dates(today: NaiveDate) -> (Option<String>, Option<String>) {
    let due = today.checked_add_days(Days::new(30)).unwrap_or(today);
    (Some(iso(today)), Some(iso(due)))
}

fn size_class(width: u32) -> &'static str {
    if width > 1000 {
        "Enterprise"
    } else if width > 600 {
        "Corporation"
    } else {
        "LLC"
    }
}

fn tint(stats: &ImageStats) -> &'static str {
    match stats.channel_means {
        Some([r, g, b]) if r > g && r > b => "Red",
        Some([r, g, b]) if g > r && g > b => "Green",
        Some(_) => "Blue",
        None => "Gray",
    }
}

fn item(description: String, quantity: u32, unit: Money, total: Money) -> LineItem {
    LineItem {
        description: Some(description),
        quantity: Some(Numeric::from(quantity)),
        unit_price: Some(Numeric::from(unit)),
        total_price: Some(Numeric::from(total)),
    }
}

fn with_amounts(mut record: InvoiceRecord, a: &Amounts) -> InvoiceRecord {
    record.subtotal = Some(Numeric::from(a.subtotal));
    record.tax_amount = Some(Numeric::from(a.tax));
    record.total_amount = Some(Numeric::from(a.total));
    record
}

// ── Profiles ──────────────────────────────────────────────────────────────────

fn pixel_stats(stats: &ImageStats, today: NaiveDate) -> InvoiceRecord {
    let tag = stats.prefix_tag(10_000);
    let base = Decimal::from(stats.pixel_bytes as u64) / Decimal::from(15_000)
        + dec(stats.brightness) * Decimal::from(8);
    let a = amounts(base, 15);
    let (date, due_date) = dates(today);

    let line_items = vec![
        item(
            format!("AI Service Package {}", &tag[..3]),
            (stats.brightness % 10.0) as u32 + 1,
            a.subtotal.share(3),
            a.subtotal.scale(Decimal::new(6, 1)),
        ),
        item(
            format!("Consulting Hours {}", &tag[3..6]),
            (stats.pixel_bytes % 20) as u32 + 5,
            a.subtotal.share(10),
            a.subtotal.scale(Decimal::new(4, 1)),
        ),
    ];

    let record = InvoiceRecord {
        company_name: Some(format!("AI Solutions {} Inc", &tag[..4])),
        company_address: Some(format!(
            "{} AI Boulevard, Innovation City, IC {}",
            stats.width / 5,
            &tag[4..6]
        )),
        customer_name: Some(format!("Enterprise {} Corp", &tag[2..6])),
        customer_address: Some(format!(
            "{} Client Street, Business District, BD {}",
            stats.height / 8,
            &tag[..2]
        )),
        invoice_number: Some(format!("INV-{tag}")),
        date,
        due_date,
        line_items,
        ..Default::default()
    };
    with_amounts(record, &a)
}

fn brightness<R: Rng>(stats: &ImageStats, today: NaiveDate, rng: &mut R) -> InvoiceRecord {
    let tag = stats.prefix_tag(1_000);
    let base = Decimal::from(1000) + dec(stats.brightness) / Decimal::from(2);
    let a = amounts(base, 12);
    let (date, due_date) = dates(today);

    let count = ((stats.brightness / 50.0) as u32).max(2);
    let share = a.subtotal.share(count);
    let line_items = (0..count)
        .map(|idx| {
            let price = share.scale(dec(0.8 + 0.4 * rng.gen::<f64>()));
            let quantity = ((rng.gen::<f64>() * 10.0) as u32).max(1);
            item(
                format!("Item {} - {}", idx + 1, SERVICES[idx as usize % SERVICES.len()]),
                quantity,
                price.share(quantity),
                price,
            )
        })
        .collect();

    let record = InvoiceRecord {
        company_name: Some(format!("{} Sky {}", tint(stats), size_class(stats.width))),
        company_address: Some(format!(
            "{} Technology Drive, Innovation City, TC {}",
            stats.width / 10,
            stats.height / 10
        )),
        customer_name: Some(format!("Client {} Services", &tag[..4])),
        customer_address: Some(format!(
            "{} Customer Road, Business District, BC {}",
            stats.height / 5,
            &tag[4..6]
        )),
        invoice_number: Some(format!("INV-{tag}")),
        date,
        due_date,
        line_items,
        ..Default::default()
    };
    with_amounts(record, &a)
}

fn dimensions_base(stats: &ImageStats) -> Decimal {
    let span = u64::from(stats.width) + u64::from(stats.height);
    Decimal::from(1000) + Decimal::from(span) / Decimal::from(10)
}

fn dimensions(stats: &ImageStats, filename: &str, today: NaiveDate) -> InvoiceRecord {
    let tag = hash::short_tag(filename.as_bytes());
    let a = amounts(dimensions_base(stats), 12);
    let (date, due_date) = dates(today);

    let services = Money::from_cents(100_000);
    let licence = a.subtotal - services;
    let line_items = vec![
        item("Professional Services".into(), 5, Money::from_cents(20_000), services),
        item("Software License".into(), 1, licence, licence),
    ];

    let record = InvoiceRecord {
        company_name: Some(format!("Tech {}", size_class(stats.width))),
        company_address: Some(format!(
            "{} Business Ave, Tech City, TC {}",
            stats.width / 10,
            stats.height / 100
        )),
        customer_name: Some(format!("Client {} Ltd", &tag[..4])),
        customer_address: Some(format!(
            "{} Customer St, Business District, BD {}",
            stats.height / 10,
            &tag[4..6]
        )),
        invoice_number: Some(format!("INV-{tag}")),
        date,
        due_date,
        line_items,
        ..Default::default()
    };
    with_amounts(record, &a)
}

fn dataset(stats: &ImageStats, filename: &str, today: NaiveDate) -> InvoiceRecord {
    let tag = hash::short_tag(filename.as_bytes());
    let a = amounts(dimensions_base(stats), 12);

    InvoiceRecord {
        company_name: Some(format!("Tech {}", size_class(stats.width))),
        company_address: Some(format!(
            "{} Business Ave, Tech City, TC {}",
            stats.width / 10,
            stats.height / 100
        )),
        customer_address: Some(format!(
            "{} Customer St, Business District, BD {}",
            stats.height / 10,
            &tag[4..6]
        )),
        total_amount: Some(Numeric::from(a.total)),
        invoice_number: Some(format!("INV-{tag}")),
        date: Some(iso(today)),
        ..Default::default()
    }
}

fn summary(stats: &ImageStats, today: NaiveDate) -> InvoiceRecord {
    let tag = stats.prefix_tag(5_000);
    let base = Decimal::from(stats.pixel_bytes as u64) / Decimal::from(10_000)
        + dec(stats.brightness) * Decimal::from(5);
    let a = amounts(base, 12);
    let (date, due_date) = dates(today);

    let record = InvoiceRecord {
        company_name: Some(format!("TechCorp {} Ltd", &tag[..4])),
        company_address: Some(format!(
            "{} Innovation Drive, Tech City, TC {}",
            stats.width,
            stats.height / 100
        )),
        customer_name: Some(format!("Client {} Services", &tag[4..])),
        customer_address: Some(format!(
            "{} Business Ave, Commerce City, CC {}",
            stats.height / 10,
            &tag[2..4]
        )),
        invoice_number: Some(format!("INV-{tag}")),
        date,
        due_date,
        ..Default::default()
    };
    with_amounts(record, &a)
}

/// Last-resort record used when the image cannot even be measured.
pub fn sample_record() -> InvoiceRecord {
    InvoiceRecord {
        company_name: Some("Example Company Inc.".into()),
        company_address: Some("123 Business Rd, City, Country".into()),
        customer_name: Some("Sample Customer Ltd.".into()),
        customer_address: Some("456 Client Street, Town, Country".into()),
        invoice_number: Some("INV-2023-00145".into()),
        date: Some("2023-07-15".into()),
        due_date: Some("2023-08-15".into()),
        subtotal: Some(Numeric::from(Money::from_cents(110_066))),
        tax_amount: Some(Numeric::from(Money::from_cents(15_009))),
        total_amount: Some(Numeric::from(Money::from_cents(125_075))),
        line_items: vec![
            item("Consulting Services".into(), 10, Money::from_cents(10_000), Money::from_cents(100_000)),
            item("Software License".into(), 1, Money::from_cents(10_066), Money::from_cents(10_066)),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const ALL: [SyntheticProfile; 5] = [
        SyntheticProfile::PixelStats,
        SyntheticProfile::Brightness,
        SyntheticProfile::Dimensions,
        SyntheticProfile::Dataset,
        SyntheticProfile::Summary,
    ];

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn gray(width: u32, height: u32, value: u8) -> ImageStats {
        let img: GrayImage = ImageBuffer::from_fn(width, height, |x, y| Luma([value.wrapping_add((x ^ y) as u8)]));
        ImageStats::from_image(&DynamicImage::ImageLuma8(img))
    }

    fn red(width: u32, height: u32) -> ImageStats {
        let img: RgbImage = ImageBuffer::from_fn(width, height, |_, _| Rgb([220, 40, 30]));
        ImageStats::from_image(&DynamicImage::ImageRgb8(img))
    }

    fn money(n: &Option<Numeric>) -> Decimal {
        n.as_ref().and_then(Numeric::as_decimal).unwrap()
    }

    #[test]
    fn total_is_subtotal_plus_tax_for_every_profile() {
        let mut rng = StdRng::seed_from_u64(7);
        let images = [gray(1, 1, 0), gray(37, 91, 200), gray(640, 480, 13), red(1201, 77)];
        for stats in &images {
            for profile in [
                SyntheticProfile::PixelStats,
                SyntheticProfile::Brightness,
                SyntheticProfile::Dimensions,
                SyntheticProfile::Summary,
            ] {
                let r = profile.generate(stats, "scan.png", today(), &mut rng).unwrap();
                let sum = (money(&r.subtotal) + money(&r.tax_amount)).round_dp(2);
                assert_eq!(money(&r.total_amount), sum, "{profile} on {}x{}", stats.width, stats.height);
            }
        }
    }

    #[test]
    fn tax_rates_follow_profile() {
        let mut rng = StdRng::seed_from_u64(1);
        let stats = gray(100, 100, 40);
        let r = SyntheticProfile::Dimensions.generate(&stats, "a.png", today(), &mut rng).unwrap();
        // 1000 + 200/10 = 1020.00, 12% = 122.40
        assert_eq!(money(&r.subtotal), Decimal::new(102_000, 2));
        assert_eq!(money(&r.tax_amount), Decimal::new(12_240, 2));
        assert_eq!(money(&r.total_amount), Decimal::new(114_240, 2));

        let r = SyntheticProfile::PixelStats.generate(&stats, "a.png", today(), &mut rng).unwrap();
        let expected_tax = Money::from_decimal(money(&r.subtotal)).scale(Decimal::new(15, 2));
        assert_eq!(money(&r.tax_amount), expected_tax.as_decimal());
    }

    #[test]
    fn hash_fields_are_stable_for_same_image() {
        for profile in ALL {
            let a = profile
                .generate(&gray(64, 48, 90), "inv.jpg", today(), &mut StdRng::seed_from_u64(1))
                .unwrap();
            let b = profile
                .generate(&gray(64, 48, 90), "inv.jpg", today(), &mut StdRng::seed_from_u64(99))
                .unwrap();
            assert_eq!(a.invoice_number, b.invoice_number, "{profile}");
            assert_eq!(a.company_address, b.company_address, "{profile}");
            assert_eq!(a.customer_address, b.customer_address, "{profile}");
            assert_eq!(a.customer_name, b.customer_name, "{profile}");
        }
    }

    #[test]
    fn invoice_number_is_inv_plus_eight_hex() {
        let mut rng = StdRng::seed_from_u64(3);
        for profile in ALL {
            let r = profile.generate(&gray(10, 10, 5), "x.png", today(), &mut rng).unwrap();
            let n = r.invoice_number.unwrap();
            assert!(n.starts_with("INV-"), "{n}");
            assert_eq!(n.len(), 12);
            assert!(n[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn dates_are_today_and_net_thirty() {
        let r = SyntheticProfile::Dimensions
            .generate(&gray(5, 5, 0), "d.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(r.date.as_deref(), Some("2026-10-18"));
        assert_eq!(r.due_date.as_deref(), Some("2026-11-17"));
    }

    #[test]
    fn brightness_names_company_from_colour_and_width() {
        let r = SyntheticProfile::Brightness
            .generate(&red(1201, 10), "r.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(r.company_name.as_deref(), Some("Red Sky Enterprise"));

        let r = SyntheticProfile::Brightness
            .generate(&gray(700, 10, 0), "g.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(r.company_name.as_deref(), Some("Gray Sky Corporation"));
    }

    #[test]
    fn brightness_line_item_count_tracks_brightness() {
        let white = ImageStats::from_image(&DynamicImage::ImageLuma8(ImageBuffer::from_fn(8, 8, |_, _| Luma([255u8]))));
        let r = SyntheticProfile::Brightness
            .generate(&white, "w.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(r.line_items.len(), 5);

        let dark = gray(8, 8, 0);
        let r = SyntheticProfile::Brightness
            .generate(&dark, "d.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(r.line_items.len(), 2);
        assert_eq!(r.line_items[1].description.as_deref(), Some("Item 2 - Product"));
    }

    #[test]
    fn dimensions_line_items_add_up_to_subtotal() {
        let r = SyntheticProfile::Dimensions
            .generate(&gray(850, 1100, 0), "p.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        let items: Decimal = r.line_items.iter().map(|li| money(&li.total_price)).sum();
        assert_eq!(items, money(&r.subtotal));
    }

    #[test]
    fn dataset_profile_fills_six_fields() {
        let r = SyntheticProfile::Dataset
            .generate(&gray(850, 1100, 0), "p.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(r.coverage(), (6, 10));
        assert!(r.line_items.is_empty());
        // (1000 + 195) * 1.12
        assert_eq!(money(&r.total_amount), Decimal::new(133_840, 2));
    }

    #[test]
    fn summary_profile_has_totals_but_no_items() {
        let stats = gray(100, 50, 0);
        let r = SyntheticProfile::Summary
            .generate(&stats, "s.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(r.coverage(), (10, 10));
        assert!(r.line_items.is_empty());
        assert!(r.company_name.as_deref().unwrap().starts_with("TechCorp "));
        assert_eq!(r.company_address.as_deref(), Some("100 Innovation Drive, Tech City, TC 0"));
        let tag = stats.prefix_tag(5_000);
        assert_eq!(r.invoice_number, Some(format!("INV-{tag}")));
        let base = Decimal::from(5_000u64) / Decimal::from(10_000)
            + Decimal::from_f64(stats.brightness).unwrap() * Decimal::from(5);
        assert_eq!(money(&r.subtotal), base.round_dp(2));
        assert_eq!(money(&r.tax_amount), (base.round_dp(2) * Decimal::new(12, 2)).round_dp(2));
    }

    #[test]
    fn empty_image_is_rejected() {
        let stats = ImageStats::from_image(&DynamicImage::new_luma8(0, 0));
        let err = SyntheticProfile::PixelStats
            .generate(&stats, "e.png", today(), &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, SynthError::EmptyImage { width: 0, height: 0 }));
    }

    #[test]
    fn sample_record_is_balanced() {
        let r = sample_record();
        assert_eq!(money(&r.subtotal) + money(&r.tax_amount), money(&r.total_amount));
    }

    #[test]
    fn profile_names_round_trip() {
        for profile in ALL {
            assert_eq!(profile.to_string().parse::<SyntheticProfile>().unwrap(), profile);
        }
        assert!("vibes".parse::<SyntheticProfile>().is_err());
    }
}
