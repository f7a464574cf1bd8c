use serde::{Deserialize, Serialize};

/// A labelled pixel rectangle over the invoice image. Display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub label: String,
    pub xmin: u32,
    pub ymin: u32,
    pub xmax: u32,
    pub ymax: u32,
}

impl BoundingBox {
    /// Build a box clamped to the image so that `xmin < xmax <= width` and
    /// `ymin < ymax <= height`. Both dimensions must be non-zero.
    fn clamped(label: &str, x: (u32, u32), y: (u32, u32), width: u32, height: u32) -> Self {
        let (xmin, xmax) = clamp_span(x.0, x.1, width);
        let (ymin, ymax) = clamp_span(y.0, y.1, height);
        BoundingBox { label: label.to_string(), xmin, ymin, xmax, ymax }
    }

    pub fn width(&self) -> u32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> u32 {
        self.ymax - self.ymin
    }
}

fn clamp_span(lo: u32, hi: u32, limit: u32) -> (u32, u32) {
    let lo = lo.min(limit - 1);
    (lo, hi.clamp(lo + 1, limit))
}

/// `value * permille / 1000`, truncated.
fn frac(value: u32, permille: u64) -> u32 {
    (u64::from(value) * permille / 1000) as u32
}

/// Which set of field regions to lay over the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// All ten scalar invoice fields.
    #[default]
    Full,
    /// The six fields of the dataset profile.
    Dataset,
}

impl Layout {
    pub fn boxes(self, width: u32, height: u32) -> Vec<BoundingBox> {
        if width == 0 || height == 0 {
            return Vec::new();
        }
        match self {
            Layout::Full => full_layout(width, height),
            Layout::Dataset => dataset_layout(width, height),
        }
    }
}

fn full_layout(width: u32, height: u32) -> Vec<BoundingBox> {
    // Header band, customer block and totals block, each row 4% of the height.
    let row = frac(height, 40);
    let header_y = frac(height, 50);
    let customer_y = frac(height, 250);
    let totals_y = frac(height, 650);

    let left = (frac(width, 50), frac(width, 500));
    let left_wide = (frac(width, 50), frac(width, 600));
    let right = (frac(width, 650), frac(width, 900));

    // (label, x span, y start, y extent)
    let rows: [(&str, (u32, u32), u32, u32); 10] = [
        ("CompanyName", left, header_y, row),
        ("CompanyAddress", left_wide, header_y + row + 5, row * 2 + 5),
        ("CustomerName", left, customer_y, row),
        ("CustomerAddress", left_wide, customer_y + row + 5, row * 2 + 5),
        ("InvoiceNumber", right, header_y, row),
        ("Date", right, header_y + row + 10, row),
        ("DueDate", right, header_y + row * 2 + 20, row),
        ("Subtotal", right, totals_y, row),
        ("TaxAmount", right, totals_y + row + 10, row),
        ("TotalAmount", right, totals_y + row * 2 + 20, row),
    ];

    rows.iter()
        .map(|&(label, x, y, extent)| {
            BoundingBox::clamped(label, x, (y, y.saturating_add(extent)), width, height)
        })
        .collect()
}

fn dataset_layout(width: u32, height: u32) -> Vec<BoundingBox> {
    // (label, xmin, ymin, xmax, ymax) in thousandths of the image.
    const REGIONS: [(&str, u64, u64, u64, u64); 6] = [
        ("CompanyName", 50, 50, 450, 90),
        ("CompanyAddress", 50, 100, 550, 180),
        ("CustomerAddress", 50, 250, 550, 350),
        ("InvoiceNumber", 650, 50, 900, 90),
        ("Date", 650, 100, 900, 140),
        ("TotalAmount", 650, 750, 900, 800),
    ];

    REGIONS
        .iter()
        .map(|&(label, x0, y0, x1, y1)| {
            BoundingBox::clamped(
                label,
                (frac(width, x0), frac(width, x1)),
                (frac(height, y0), frac(height, y1)),
                width,
                height,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_inside(boxes: &[BoundingBox], width: u32, height: u32) {
        for b in boxes {
            assert!(b.xmax > b.xmin, "{b:?} in {width}x{height}");
            assert!(b.ymax > b.ymin, "{b:?} in {width}x{height}");
            assert!(b.xmax <= width, "{b:?} in {width}x{height}");
            assert!(b.ymax <= height, "{b:?} in {width}x{height}");
        }
    }

    #[test]
    fn full_layout_on_letter_page() {
        let boxes = Layout::Full.boxes(850, 1100);
        assert_eq!(boxes.len(), 10);
        let company = &boxes[0];
        assert_eq!(company.label, "CompanyName");
        assert_eq!((company.xmin, company.ymin, company.xmax, company.ymax), (42, 55, 425, 99));
        let total = boxes.iter().find(|b| b.label == "TotalAmount").unwrap();
        // 715 + 44*2 + 20
        assert_eq!(total.ymin, 823);
        assert_eq!(total.height(), 44);
    }

    #[test]
    fn dataset_layout_has_six_fields() {
        let boxes = Layout::Dataset.boxes(1000, 1000);
        let labels: Vec<_> = boxes.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            ["CompanyName", "CompanyAddress", "CustomerAddress", "InvoiceNumber", "Date", "TotalAmount"]
        );
        assert_eq!(boxes[5].ymin, 750);
        assert_eq!(boxes[5].width(), 250);
    }

    #[test]
    fn boxes_stay_inside_any_positive_image() {
        let mut sizes: Vec<(u32, u32)> = Vec::new();
        for w in 1..=40 {
            for h in 1..=40 {
                sizes.push((w, h));
            }
        }
        sizes.extend([(1, 5000), (5000, 1), (120, 90), (4096, 4096), (u32::MAX, u32::MAX)]);

        for (w, h) in sizes {
            for layout in [Layout::Full, Layout::Dataset] {
                assert_inside(&layout.boxes(w, h), w, h);
            }
        }
    }

    #[test]
    fn zero_dimensions_yield_nothing() {
        assert!(Layout::Full.boxes(0, 100).is_empty());
        assert!(Layout::Dataset.boxes(100, 0).is_empty());
    }
}
