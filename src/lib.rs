//! Mocktail Stub Server
//!
//! An HTTP stub server for test environments. Stubs are loaded from Mocktail
//! files and answer requests by method, path pattern and query parameters.
//! Requests no stub accepts get `501 Not Implemented`.
//!
//! # Features
//!
//! - **Request Matching**: Method, anchored case-insensitive regex paths and
//!   literal query constraints
//! - **Priority**: The first registered stub that matches wins
//! - **Stateful Stubs**: `stub-only-if` gates a stub on shared variables and
//!   `stub-set` writes them when the stub wins
//! - **Latency Simulation**: `stub-delay` (or a default) holds back the body
//!   while status and headers are sent at once
//!
//! # Example Stub File
//!
//! ```text
//! GET
//! api/users/[0-9]+\?fields=name
//! 200
//! Content-Type: application/json
//! stub-only-if: loggedIn=true
//! stub-delay: 0.2
//!
//! {"name": "Ada"}
//! ```
//!
//! # Example
//!
//! ```
//! use mocktail_stub_server::{loader, IncomingRequest, StubRegistry};
//!
//! let registry = StubRegistry::new();
//! let stub = loader::parse_stub("hello.tail", "GET\nhello\n200\n\nHello, World!").unwrap();
//! registry.register(stub);
//!
//! let response = registry.dispatch(&IncomingRequest::new("GET", "/hello"));
//! assert_eq!(response.status, 200);
//!
//! let response = registry.dispatch(&IncomingRequest::new("GET", "/other"));
//! assert_eq!(response.status, 501);
//! ```

pub mod config;
pub mod directives;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod registry;
pub mod response;
pub mod server;
pub mod state;
pub mod stub;

pub use config::StubServerConfig;
pub use error::{DefinitionError, PatternError, ServerError, StubError};
pub use matcher::IncomingRequest;
pub use registry::{DispatchStats, StubRegistry};
pub use response::{ResponseBuilder, StubResponse};
pub use server::{HttpStubServer, StubServer};
pub use state::{InMemoryStateStore, StateStore};
pub use stub::{Method, StubDefinition, StubKey};
