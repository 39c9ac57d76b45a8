// SPDX-License-Identifier: MIT

//! Graph execution
//!
//! A small superstep executor: fan-out/fan-in, conditional edges, one kind
//! of suspension point, and checkpoints to resume from.

pub mod checkpoint;
mod compile;
pub mod executor;
pub mod types;

pub use checkpoint::{Checkpoint, Checkpointer, MemoryCheckpointer};
pub use compile::GraphBuilder;
pub use executor::{GraphRunner, RunOutcome, MAX_SUPERSTEPS};
pub use types::{CompiledNode, Edge, NodeKind, WaitMode, WorkflowEvent, END};
