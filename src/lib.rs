//! SyntropyStack provider
//!
//! An infrastructure-as-code provider plugin for the SyntropyStack networking
//! platform. It manages virtual agents, point-to-point connections, full mesh
//! connection sets and the services and subnets enabled on a connection, and
//! exposes agent and connection service lookups as data sources.
//!
//! # Overview
//!
//! - [`SyntropyProvider`] holds the resource and data source registries and the
//!   configured API client.
//! - [`client::SyntropyClient`] talks to the platform REST API.
//! - [`server`] exposes any [`ProviderService`] over the plugin gRPC protocol.
//! - [`testing::ProviderTester`] drives a provider in tests without a server.
//!
//! # Handshake Protocol
//!
//! On startup the plugin binds a TCP listener and prints one line to stdout:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `HEMMER_PROVIDER|<protocol_version>|<address>`
//!
//! The host spawns the plugin as a subprocess, reads this line and connects
//! over gRPC. Logs go to stderr so they never interfere with the handshake.
//!
//! # Example
//!
//! ```ignore
//! use syntropystack_provider::{serve, SyntropyProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), syntropystack_provider::server::BoxError> {
//!     syntropystack_provider::init_logging();
//!     serve(SyntropyProvider::new()).await
//! }
//! ```

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod flatten;
pub mod logging;
pub mod mesh;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::SyntropyProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, BoxError, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
