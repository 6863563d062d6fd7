// src/ingest/providers/mod.rs
pub mod pzt;
