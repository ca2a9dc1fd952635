//! Concrete implementations of `catalog-contracts` plus the long-running
//! components of the ingestion pipeline: scanner, derivation workers,
//! cache placement/eviction, scheduler, and job monitor.

pub mod archive;
pub mod bus;
pub mod decode;
pub mod derive;
pub mod monitor;
pub mod placement;
pub mod scan;
pub mod scheduler;
pub mod store;

pub use archive::DispatchingArchiveReader;
pub use bus::PostgresMessageBus;
pub use decode::ImageCrateDecoder;
pub use derive::{DerivationHandler, DerivationKind};
pub use monitor::JobMonitor;
pub use placement::FilesystemCachePlacer;
pub use scan::Scanner;
pub use scheduler::{JobExecutor, Scheduler};
pub use store::PostgresCatalogStore;
