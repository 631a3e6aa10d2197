pub mod cache;
pub mod classify;
pub mod config;
pub mod dataset;
pub mod error;
pub mod files;
pub mod report;
pub mod routes;
pub mod storage;
