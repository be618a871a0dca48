// src/matching/mod.rs
//! The matching engine and its component strategies.
//!
//! Components are independent structs that hold their collaborators
//! explicitly, so each can be exercised against a store fake. The engine in
//! [`engine`] wires them into the per-record pipeline.

pub mod cross_source;
pub mod discrepancy;
pub mod duplicate;
pub mod email;
pub mod engine;
pub mod identifier;
pub mod name;
pub mod scoring;
