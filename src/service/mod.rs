pub mod approval;
pub mod billing;
pub mod derivation;
pub mod ledger;
pub mod lifecycle;
pub mod numbering;
pub mod pricing;

pub use approval::recompute_quote_total;
pub use billing::BillingService;
pub use derivation::{billing_summary, derive_invoice};
pub use pricing::{quote_preview, quote_totals, QuotePreview, QuoteTotals};
