pub mod analysis;
pub mod api;
pub mod config;
pub mod humanize;
pub mod ledger;
pub mod model;
pub mod observability;
pub mod parsing;
pub mod queue;
pub mod renderer;
pub mod storage;
pub mod workers;
