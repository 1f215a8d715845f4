//! HTTP request construction and transport

pub mod client;
pub mod request;

pub use client::{HttpClient, Transport, TransportError};
pub use request::Request;
