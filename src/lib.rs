//! Papermill Server Library
//!
//! This crate exposes the conversion pipeline and supporting modules for
//! integration testing. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `convert`: The OCR conversion pipeline (encryption preflight,
//!   decryption, argument building, external invocation, failure
//!   classification, retry control)
//! - `routes`: HTTP surface (multipart upload, option parsing)
//! - `storage`: S3-compatible publishing of converted documents
//! - `config` / `state`: configuration loading and shared server state

pub mod config;
pub mod convert;
pub mod routes;
pub mod state;
pub mod storage;
