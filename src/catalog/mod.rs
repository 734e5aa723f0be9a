//! # Catalog collaborator.
//!
//! The catalog lists the cameras to record and stores recording metadata.
//! The store itself lives outside this crate; it is reached through the
//! [`Catalog`] trait and always wrapped by a [`ConnectivityGuard`].
//!
//! ```text
//! Fleet::load_roster ──► ConnectivityGuard ──► Catalog (StaticCatalog, ...)
//! CatalogWriter      ──┘   (probe, reconnect with linear backoff, one retry)
//! ```

mod guard;
mod model;
mod store;

pub use guard::ConnectivityGuard;
pub use model::{CameraRecord, CameraStatus, SegmentRecord};
pub use store::{Catalog, StaticCatalog};
