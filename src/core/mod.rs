//! Core modules: backend client, session controller, polling, file delivery

pub mod backend;
pub mod downloader;
pub mod poller;
pub mod session;

#[cfg(test)]
pub(crate) mod fakes;
