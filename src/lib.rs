pub mod app;
pub mod batch;
pub mod chunk;
pub mod combine;
pub mod config;
pub mod domain;
pub mod ensembl;
pub mod error;
pub mod fetcher;
pub mod output;
pub mod release;
pub mod store;
