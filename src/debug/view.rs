//! Rendered state of one debug run: the response, its timeline and the current
//! inspector selection. A new view is built for every run, so a new request
//! always starts with an empty selection.

use serde::{Deserialize, Serialize};

use crate::debug::event::PolicyCatalog;
use crate::debug::response::DebugResponse;
use crate::debug::timeline::{Inspection, Timeline};
use crate::debug::tree::{build_tree, TreeNode};

/// Current timeline selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Selection {
    Entry { index: usize },
    Range { from: usize, to: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugView {
    pub response: DebugResponse,
    pub timeline: Timeline,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspection: Option<Inspection>,
}

impl DebugView {
    pub fn new(response: DebugResponse, catalog: &PolicyCatalog) -> Self {
        let timeline = Timeline::build(&response, catalog);
        Self {
            response,
            timeline,
            selection: None,
            inspection: None,
        }
    }

    /// Select one timeline entry; non-clickable entries clear the selection
    pub fn select(&mut self, index: usize) -> Option<&Inspection> {
        self.inspection = self.timeline.inspect(&self.response, index);
        self.selection = self
            .inspection
            .as_ref()
            .map(|_| Selection::Entry { index });
        self.inspection.as_ref()
    }

    /// Select a range of policy entries of the same phase
    pub fn select_range(&mut self, from: usize, to: usize) -> Option<&Inspection> {
        self.inspection = self.timeline.inspect_range(&self.response, from, to);
        self.selection = self
            .inspection
            .as_ref()
            .map(|_| Selection::Range { from, to });
        self.inspection.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.inspection = None;
    }

    /// Overall request comparison: client request against the request sent to the backend
    pub fn request_overview(&self) -> Vec<TreeNode> {
        build_tree(Some(&self.response.request_input), Some(self.response.request_output()))
    }

    /// Overall response comparison: backend response against the response sent to the client
    pub fn response_overview(&self) -> Vec<TreeNode> {
        build_tree(Some(&self.response.response_input), Some(self.response.response_output()))
    }
}
