//! # Compute Engine client
//!
//! Instance lifecycle (list, describe, create, delete, start, stop) and the
//! operations collection that tracks the asynchronous side of every mutation.
//!
//! ## Submodules
//! - `client`: request functions for the instances and operations endpoints.
//! - `request`: builds `instances.insert` payloads from command-line values.
//! - `types`: data structures serialized to and from the API.

pub mod client;
pub mod request;
pub mod types;

pub use client::{
    aggregated_list_instances, delete_instance, get_instance, get_operation, insert_instance,
    list_instances, list_operations, start_instance, stop_instance,
};
pub use request::{InstanceSpec, build_instance_request, region_of_zone};
pub use types::*;
