pub mod layout;
pub mod money;
pub mod record;

pub use layout::{BoundingBox, Layout};
pub use money::Money;
pub use record::{coerce_decimal, InvoiceRecord, LineItem, Numeric};
