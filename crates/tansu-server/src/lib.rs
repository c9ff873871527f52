//! Tansu server library
//!
//! Plain-text HTTP adapter in front of the tansu inode store.

pub mod constants;
pub mod http;

pub use http::HttpServer;
