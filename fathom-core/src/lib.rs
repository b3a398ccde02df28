//! FATHOM Core - Entity Types and Pure Algorithms
//!
//! Pure data structures and side-effect-free logic for the FATHOM AUV
//! control plane. The API crate depends on this; nothing here performs I/O.
//!
//! Contents:
//! - Entity structs mirroring the persisted schema
//! - Lifecycle enums (command status, vehicle state, exec status)
//! - Canonical plan hashing (SHA-256 over a canonical JSON encoding)
//! - Vehicle wire payload schemas
//! - Trajectory derivation (heartbeat stream -> GeoJSON)

mod enums;
mod entities;
mod error;
mod plan;
mod trajectory;
mod wire;

pub use enums::*;
pub use entities::*;
pub use error::*;
pub use plan::*;
pub use trajectory::*;
pub use wire::*;

/// UTC timestamp used across all entities.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
