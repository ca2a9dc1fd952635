//! Trait surfaces implemented by `catalog-core` and exercised by the
//! scanner, derivation workers, cache placement engine, scheduler, and job
//! monitor.

pub mod archive;
pub mod bus;
pub mod catalog_store;
pub mod decode;
pub mod errors;
pub mod placement;

pub use archive::{ArchiveEntry, ArchiveReader};
pub use bus::{Delivery, MessageBus};
pub use catalog_store::{CatalogResult, CatalogStore};
pub use decode::{ImageDecoder, ProbedImage};
pub use errors::{ArchiveError, BusError, CatalogError, DecodeError, PlacementError};
pub use placement::{CachePlacer, PlacedArtifact};
