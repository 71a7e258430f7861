//! Deployment module

pub mod fsm;
pub mod ports;
pub mod provisioner;
pub mod registry;
pub mod supervisor;
