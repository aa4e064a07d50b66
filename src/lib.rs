//! Regimen: staged, resumable generation of workout stores.
//!
//! A free-form training request is turned into a schema-valid store by a
//! fixed sequence of generator calls. Items are emitted concurrently against
//! placeholder ids, checked against their plan contract, assembled, repaired
//! with scoped patches and finally resolved to durable ids.

pub mod assembly;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod contract;
pub mod emission;
pub mod error;
pub mod generator;
pub mod identity;
pub mod logging;
pub mod model;
pub mod patch;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod repair;
pub mod schema;
pub mod storage;
