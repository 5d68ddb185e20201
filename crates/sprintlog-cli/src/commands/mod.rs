//! Command handlers, one module per command group

pub mod category;
pub mod config;
pub mod entry;
pub mod export;
pub mod setting;
pub mod status;
pub mod sync;
pub mod topic;
