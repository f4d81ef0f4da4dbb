//! vidgrab library
//!
//! Session controller, backend client and terminal front-end for the
//! vidgrab CLI.

pub mod core;
pub mod error;
pub mod storage;
pub mod types;
pub mod ui;
pub mod utils;
