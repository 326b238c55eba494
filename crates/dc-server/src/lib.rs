//! HTTP surface and process bootstrap for the dispatch server.

pub mod environment;
pub mod tools;
