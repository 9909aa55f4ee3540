//! Node scheduling: load aggregation and placement.
//!
//! The scheduler is responsible for:
//! - Querying the live load of every enabled node concurrently
//! - Reducing each node's inbound enumeration to a user count
//! - Choosing the node a new credential is placed on

mod aggregator;
mod selector;

pub use aggregator::{
    summarize_inbounds, AggregateLoad, InboundSummary, LoadAggregator, LoadReport, LoadSnapshot,
    NodeError, NodeLoad, NodeStatus,
};
pub use selector::{select_node, Selection, SelectionMode};
