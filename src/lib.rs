#![allow(clippy::type_complexity)]
#![allow(clippy::needless_doctest_main)]
#![doc = include_str!("../README.md")]

//! ## Evaluation order
//!
//! A graph is ranked once, at construction: every node gets a rank such
//! that an edge's source always has a strictly lower rank than its
//! destination. Each tick, `GraphEngine` walks nodes in that order
//! exactly once. Because producers are always visited before their
//! consumers, an active edge that fires mid-tick ("this output just
//! ticked, schedule whoever reads it, right now") never needs a second
//! pass to catch up with — the consumer simply hasn't been visited yet
//! when its upstream ticks.
//!
//! ## Lifecycle
//!
//! `GraphEngine::run` takes a graph through `initialise` → `start` →
//! repeated `evaluate_graph` ticks → `stop`, with `stop` wrapped in a
//! [`scopeguard`] so it always runs once `start` has completed,
//! regardless of whether the tick loop exits normally, on error, or by
//! unwinding through a panic.

#[macro_use]
extern crate log;

pub mod builder;
pub mod context;
pub mod debug_dump;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ids;
pub mod nested;
pub mod node;
pub mod observer;
pub mod rank;
pub mod scheduler;
pub mod time;
pub mod typemeta;
pub mod value;

pub use error::{GraphError, GraphResult};
pub use ids::{GraphId, NodeId};
pub use time::EngineTime;
