//! Property-based tests for id resolution and patch scoping

mod resolution;
mod scope;
