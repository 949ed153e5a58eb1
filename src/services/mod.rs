//! Services for pricing, aggregation and output

pub mod aggregator;
pub mod atomic_write;
pub mod data_loader;
pub mod pricing;
pub mod pricing_loader;
pub mod summary;

pub use aggregator::Aggregator;
pub use data_loader::DataLoaderService;
pub use pricing::PricingService;
pub use pricing_loader::{PricingLoader, PricingSource};
pub use summary::SummaryAssembler;
