//! Shared utility modules.

pub mod structured;
