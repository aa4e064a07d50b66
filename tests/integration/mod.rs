//! Integration tests for staged workout store generation

mod checkpoint_store;
mod cli_route;
mod emission_engine;
mod pipeline_end_to_end;
mod repair_loop;
mod resume;
mod support;
