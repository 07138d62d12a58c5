pub mod billing;
pub mod expense;
pub mod invoice;
pub mod quote;

pub use billing::{BillingSummary, DerivedInvoice, InvoiceRequest, LedgerRow, RequestedInvoiceType};
pub use expense::Expense;
pub use invoice::{Invoice, InvoiceLine, InvoiceStatus, InvoiceType, PriorInvoice};
pub use quote::{
    BillingMode, Discount, DiscountType, ItemType, ItemTypes, Quote, QuoteItem, QuoteStatus,
    Section, Variant,
};
