//! Route modules for Papermill Server

pub mod ocr;
