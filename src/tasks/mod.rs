//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Maintenance: purges expired entries and defragments the slot file

mod maintenance;

pub use maintenance::spawn_maintenance_task;
