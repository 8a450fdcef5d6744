//! Dramatis is an HTTP gateway for a character role-play chat product.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`catalog`] owns the JSON-backed model, character, and scenario stores,
//!   model-config selection, and the role-play prompt generator.
//! - [`provider`] talks to upstream LLMs (OpenRouter streaming, Vertex AI
//!   prediction) and emits a uniform channel of stream events.
//! - [`server`] assembles the axum router that exposes the catalogs and the
//!   SSE chat relay.
//! - [`client`] is the consumer-side streaming adapter that parses the SSE
//!   frames back into text deltas for an observer.
//! - [`api`] defines the wire payloads shared by all of the above.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`cli::run`].

pub mod api;
pub mod catalog;
pub mod cli;
pub mod client;
pub mod config;
pub mod provider;
pub mod server;
pub mod utils;
