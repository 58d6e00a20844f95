//! # gcloud-rs: A Google Cloud Command-Line Client
//!
//! This crate implements the core of a `gcloud`-style command-line tool:
//! named configurations and properties, credential discovery and OAuth2
//! token exchange, resource reference resolution, REST clients for the
//! Compute Engine, Cloud Storage, and Pub/Sub APIs, and polling for
//! long-running operations.
//!
//! The binary surface lives in `src/bin/gcloud` and is a thin layer of
//! argument parsing and output formatting over the modules here.

/// Shared `reqwest` client used for every API call.
pub mod client;

/// Named configurations, properties, and the on-disk config store.
pub mod config;

/// Credential discovery and OAuth2 access token exchange.
pub mod auth;

/// Resource references: parsing, fallthrough resolution, and URL building.
pub mod resource;

/// API error envelope parsing and classification.
pub mod error;

/// Long-running operation polling.
pub mod operations;

/// REST clients for the supported services.
pub mod api;
