//! Kernel: tracking pipeline and shared service dependencies.

pub mod deps;
pub mod scrape;
pub mod tracking;

pub use deps::ServerDeps;
pub use scrape::SearchPageClient;
