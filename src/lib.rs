//! Recipient rewriting and forwarding for mail transfer agents
//!
//! The [`controller::Switchyard`] configuration wires a rewrite table and
//! domain list into a [`switchyard_rrt::RecipientRewriteProcessor`].

pub mod controller;

pub use switchyard_common as common;
pub use switchyard_rrt as rrt;
pub use tracing;
