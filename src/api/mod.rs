//! Backend access: the typed fetch client and the dashboard operations built on it.

pub mod backend;
pub mod client;
mod error;

pub use backend::{Backend, HttpBackend};
pub use client::ApiClient;
pub use error::ApiError;
