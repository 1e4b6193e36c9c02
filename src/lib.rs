pub mod accounts;
pub mod api;
pub mod auth;
pub mod compactor;
pub mod config;
pub mod contacts;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod revenue;
pub mod schedule;
pub mod tenant;
pub mod wal;
