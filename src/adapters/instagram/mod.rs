//! Instagram private-API adapter. Implements InstagramGateway and AuthPort.

pub mod auth_adapter;
pub mod client;
pub mod device;
pub mod mapper;

pub use client::{ClientOptions, InstagramClient};
