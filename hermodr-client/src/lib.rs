//! # hermodr-client
//!
//! Client library for hermodr.
//!
//! This crate provides:
//! - Async TCP connection with request/response correlation by frame id
//! - Pipelining: many requests may be in flight on one connection
//! - High-level API for every op

pub mod client;
pub mod connection;
pub mod error;

pub use client::{Client, WorldStatus};
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
