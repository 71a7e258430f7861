//! Unit and integration tests for deployd

mod test_api;
mod test_registry;
