//! # Cloud Storage client
//!
//! Objects and buckets over the JSON API: list, stat, download (with MD5
//! verification), one-shot upload, and bucket management.
//!
//! ## Submodules
//! - `client`: request functions and `gs://` URL handling.
//! - `types`: data structures serialized to and from the API.

pub mod client;
pub mod types;

pub use client::{
    create_bucket, delete_bucket, delete_object, download_object, get_bucket, get_object,
    list_buckets, list_objects, parse_gs_url, percent_encode, upload_object, verify_md5,
};
pub use types::*;
