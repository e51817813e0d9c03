//! # Policy Debugger Library - Core Library Crate
//!
//! Replays a captured request through an API's policy chain on the gateway and
//! reconstructs, step by step, how each policy changed the request and the
//! response.
//!
//! ## Flow
//! 1. A [`DebugSession`] submits a [`DebugRequest`] through a [`DebugBackend`]
//!    (normally the reqwest-based [`ManagementClient`]).
//! 2. The [`PollingOrchestrator`] re-reads the resulting event every second until
//!    the gateway reports a result, an error, or the polling window closes.
//! 3. The finished event is decoded and turned into a [`DebugResponse`]: cumulative
//!    per-policy snapshots for the request and the response phases.
//! 4. A [`DebugView`] lays those snapshots out as a timeline and builds diff trees
//!    for whatever the user selects.
//!
//! ## Module Layout
//! - `core`: error type and configuration, shared by every other module
//! - `debug`: pure, synchronous trace reconstruction (no I/O)
//! - `client`: management API access, polling and the session state machine
//! - `observability`: logging initialisation and metrics recording

/// Core functionality: error types and configuration
pub mod core;

/// Debug event model and trace reconstruction pipeline
/// Everything in here is a pure transformation over an already-decoded event
pub mod debug;

/// Management API client, polling orchestrator and debug session
pub mod client;

/// Logging and metrics
pub mod observability;

// Re-export commonly used types so users can write `use policy_debugger::DebugError`
// instead of `use policy_debugger::core::error::DebugError`

/// Main error type used throughout the debugger
pub use core::error::{DebugError, DebugResult};

/// Console configuration
pub use core::config::{ApiVersion, DebugConsoleConfig, ManagementConfig, PollingConfig};

/// Reconstruction pipeline entry points
pub use debug::{DebugEvent, DebugResponse, DebugView, PolicyCatalog, Timeline, TreeNode};

/// Session and backend types
pub use client::{
    DebugBackend, DebugRequest, DebugSession, ManagementClient, PollingOrchestrator,
    SessionState,
};
