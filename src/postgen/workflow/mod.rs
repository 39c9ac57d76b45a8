// SPDX-License-Identifier: MIT

//! Post-generation workflow
//!
//! State, quality gate, writer routing, human review and the graph that
//! ties the steps together.

pub mod builder;
pub mod gate;
pub mod graph;
pub mod review;
pub mod routing;
pub mod state;

pub use builder::build_post_graph;
pub use gate::{QualityChecks, Route};
pub use review::ReviewInput;
pub use routing::{route_to_specialized_writer, WriterVariant};
pub use state::{Acceptance, GenerationInput, GenerationState, RunStatus, StateUpdate};
