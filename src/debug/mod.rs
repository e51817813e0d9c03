//! # Debug Trace Reconstruction
//!
//! Turns a debug event captured by the gateway into a step-by-step, diff
//! annotated view of how each policy changed the request and the response.
//!
//! ## Pipeline
//! - [`event`]: raw event model and payload decoding
//! - [`accumulator`]: cumulative per-step snapshots for each phase
//! - [`diff`]: added / deleted / updated classification
//! - [`tree`]: grouped inspector tree
//! - [`timeline`]: flat timeline and selection
//! - [`response`] and [`view`]: view models consumed by the console

pub mod accumulator;
pub mod diff;
pub mod event;
pub mod response;
pub mod snapshot;
pub mod timeline;
pub mod tree;
pub mod view;

pub use accumulator::{accumulate, PolicyDebugStep};
pub use diff::{classify, DiffKind};
pub use event::{
    ApiDebugStatus, DebugEvent, DebugEventPayload, DebugEventStatus, DebugStepRaw, EventRecord,
    Phase, PolicyCatalog, PolicyListItem, PolicyScope, PolicyStage, StepStatus,
};
pub use response::DebugResponse;
pub use snapshot::{PhaseSnapshot, RequestSnapshot, ResponseSnapshot};
pub use timeline::{Inspection, Timeline, TimelineEntry, TimelineMode};
pub use tree::{build_tree, NodeType, NodeValue, TreeNode};
pub use view::{DebugView, Selection};
