//! SeaORM entities for the three domain tables.
//!
//! Tables are created at startup from this metadata (see [`crate::schema`]);
//! there is no migration tooling.

pub mod subscription;
pub mod task;
pub mod user;
