//! imgden Server Library
//!
//! Self-hosted image hosting: authenticated users upload images that are
//! stored once per distinct content in S3-compatible object storage, with a
//! per-user upload history and short share links.
//!
//! # Modules
//!
//! - `upload`: content-addressed upload flow (hashing, dedup, recording)
//! - `storage`: object store trait with S3 and in-memory backends
//! - `db`: SQLite users, login history, sessions, and upload ledger
//! - `auth`: password hashing, cookie sessions, request extractors
//! - `routes`: HTTP surface

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod html;
pub mod routes;
pub mod state;
pub mod storage;
pub mod upload;
