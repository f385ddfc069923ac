#![forbid(unsafe_code)]

//! Incremental force-directed graph layout.
//!
//! `springbok` mirrors a client graph into a private physical model, applies change batches to it,
//! and runs a fixed number of spring-embedder iterations (grid-bounded repulsion, spring
//! attraction, linear cooling) before writing node positions back to the client.
//!
//! The client side is abstracted by [`LayoutGraph`]; [`graph::memory::Graph`] is a small
//! in-memory implementation that records its own mutations as a [`ChangeBatch`].

pub mod algo;
pub mod error;
pub mod graph;

pub use algo::fdp::{Params, RunStats, SpringEmbedder};
pub use algo::median::weighted_median;
pub use algo::Config;
pub use error::{Error, Result};
pub use graph::{ChangeBatch, LayoutGraph, ModelHandle, NodeChange, Outcome, Point, Size};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
