pub mod address;
pub mod api;
pub mod bank;
pub mod codec;
pub mod config;
pub mod explorer;
pub mod ledger;
pub mod mining;
pub mod models;
pub mod node;
pub mod reconstruct;
pub mod service_stats;
pub mod storage;
