//! External collaborators of the pipeline

pub mod catalog;
pub mod explanation;
pub mod photometry;

pub use catalog::{CatalogError, CatalogService, ExoplanetArchiveClient, StaticCatalog};
pub use explanation::{Explanation, ExplanationContext, ExplanationService};
pub use photometry::{DirectoryPhotometry, PhotometryError, PhotometryService, StaticPhotometry};
