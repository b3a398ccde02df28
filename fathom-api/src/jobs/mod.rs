//! Background jobs owned by the process lifecycle.

mod expire_sweep;

pub use expire_sweep::{spawn_expire_sweep, ExpireSweepConfig, ExpireSweepHandle};
