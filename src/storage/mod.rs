//! Storage modules: on-disk client configuration

pub mod config;
