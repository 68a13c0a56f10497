//! Image Upload Module
//!
//! Implements content-addressed image uploads:
//! - SHA-256 content hashing for object keys
//! - Existence check against the object store (dedup hit skips the transfer)
//! - Scoped upload grant and put for new content
//! - One ledger row per upload, deduplicated or not

pub mod hasher;
pub mod service;
pub mod types;

pub use hasher::{content_digest, object_key, OBJECT_KEY_EXTENSION};
pub use service::{generate_short_id, UploadService};
pub use types::*;
