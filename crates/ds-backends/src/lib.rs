//! ds-backends: collaborator adapters for dataselectie.
//!
//! - [`elastic::ElasticBackend`]: Elasticsearch over hyper, scroll cursors
//!   for exports.
//! - [`memory::MemoryIndex`], [`records::MemoryRecordStore`],
//!   [`geo::MemoryGeoStore`]: in-process implementations, filled from JSON
//!   with [`fixtures::Fixtures`].

pub mod elastic;
pub mod fixtures;
pub mod geo;
pub mod memory;
pub mod records;

pub use elastic::ElasticBackend;
pub use fixtures::Fixtures;
pub use geo::{GeoFeature, MemoryGeoStore};
pub use memory::MemoryIndex;
pub use records::MemoryRecordStore;
