//! `transport` crate: the `HttpClient` trait and its implementations.
//!
//! Every task activation issues its request through [`HttpClient`].
//! The engine crate only ever sees the trait object.

pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod traits;

pub use client::ReqwestClient;
pub use config::ClientConfig;
pub use error::TransportError;
pub use mock::{MockBehaviour, MockHttpClient};
pub use traits::{HttpCall, HttpClient, HttpMethod};
