//! hyperbridge broker
//!
//! Keeps a pool of 3x-ui panels, measures how many clients each one carries
//! and issues VLESS credentials on the least-loaded node.

pub mod api;
pub mod broker;
pub mod config;
pub mod gateway;
pub mod history;
pub mod provisioner;
pub mod registry;
pub mod scheduler;
pub mod state;

#[cfg(test)]
mod testing;
