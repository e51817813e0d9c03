//! # Grouped Tree Builder
//!
//! Builds the inspector tree comparing two snapshots of the same phase. Each HTTP
//! concern present on either side becomes a group node with one leaf holding the
//! input/output pair and how it should be rendered.
//!
//! Groups are sorted by name, case-insensitively. The `Errors` group, built from
//! the `error.*` fields, always comes first when present.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::debug::diff::{classify, diff_rows, DiffKind, TableRow};
use crate::debug::snapshot::{
    display_value, format_body, ErrorFields, MultiValueMap, PhaseSnapshot,
};

pub const PROPERTIES_GROUP: &str = "HTTP properties";
pub const HEADERS_GROUP: &str = "HTTP headers";
pub const BODY_GROUP: &str = "HTTP body";
pub const ATTRIBUTES_GROUP: &str = "Attributes";
pub const ERRORS_GROUP: &str = "Errors";

/// How a leaf is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Text,
    Table,
    Body,
    Error,
}

/// Value shown on one side of a leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    Text(String),
    Table(BTreeMap<String, String>),
}

impl NodeValue {
    /// Canonical text used for diff classification
    fn canonical(&self) -> String {
        match self {
            NodeValue::Text(text) => text.clone(),
            NodeValue::Table(rows) => rows
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Inspector tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<NodeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<NodeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffKind>,
}

impl TreeNode {
    fn group(name: &str, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.to_string(),
            node_type: None,
            children,
            input: None,
            output: None,
            diff: None,
        }
    }

    fn leaf(
        name: &str,
        node_type: NodeType,
        input: Option<NodeValue>,
        output: Option<NodeValue>,
    ) -> Self {
        let diff = classify(
            input.as_ref().map(NodeValue::canonical).as_deref(),
            output.as_ref().map(NodeValue::canonical).as_deref(),
        );
        Self {
            name: name.to_string(),
            node_type: Some(node_type),
            children: Vec::new(),
            input,
            output,
            diff,
        }
    }

    /// Row-level comparison for table leaves
    pub fn table_rows(&self) -> Vec<TableRow> {
        let empty = BTreeMap::new();
        let side = |value: &Option<NodeValue>| match value {
            Some(NodeValue::Table(rows)) => rows.clone(),
            _ => empty.clone(),
        };
        diff_rows(&side(&self.input), &side(&self.output))
    }

    /// Depth-first search by node name
    pub fn find(&self, name: &str) -> Option<&TreeNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

/// Build the grouped tree comparing `input` to `output`
pub fn build_tree<S: PhaseSnapshot>(input: Option<&S>, output: Option<&S>) -> Vec<TreeNode> {
    let mut groups = Vec::new();

    let properties = |s: &S| non_empty_table(s.properties());
    if let Some(leaf) = table_leaf("properties", input.and_then(properties), output.and_then(properties)) {
        groups.push(TreeNode::group(PROPERTIES_GROUP, vec![leaf]));
    }

    let headers = |s: &S| s.headers().and_then(headers_table);
    if let Some(leaf) = table_leaf("headers", input.and_then(headers), output.and_then(headers)) {
        groups.push(TreeNode::group(HEADERS_GROUP, vec![leaf]));
    }

    let body = |s: &S| {
        s.body()
            .filter(|b| !b.is_empty())
            .map(|b| NodeValue::Text(format_body(b)))
    };
    let (body_in, body_out) = (input.and_then(body), output.and_then(body));
    if body_in.is_some() || body_out.is_some() {
        groups.push(TreeNode::group(
            BODY_GROUP,
            vec![TreeNode::leaf("body", NodeType::Body, body_in, body_out)],
        ));
    }

    let attributes = |s: &S| {
        s.attributes().and_then(|attrs| {
            non_empty_table(
                attrs
                    .iter()
                    .map(|(k, v)| (k.clone(), display_value(v)))
                    .collect(),
            )
        })
    };
    if let Some(leaf) = table_leaf("attributes", input.and_then(attributes), output.and_then(attributes)) {
        groups.push(TreeNode::group(ATTRIBUTES_GROUP, vec![leaf]));
    }

    groups.sort_by_key(|node| node.name.to_lowercase());

    if let Some(errors) = errors_group(input, output) {
        groups.insert(0, errors);
    }

    groups
}

fn errors_group<S: PhaseSnapshot>(input: Option<&S>, output: Option<&S>) -> Option<TreeNode> {
    let empty = ErrorFields::default();
    let before = input.map_or(&empty, |s| s.errors()).entries();
    let after = output.map_or(&empty, |s| s.errors()).entries();

    let children: Vec<TreeNode> = before
        .into_iter()
        .zip(after)
        .filter(|((_, b), (_, a))| b.is_some() || a.is_some())
        .map(|((key, b), (_, a))| {
            TreeNode::leaf(key, NodeType::Error, b.map(NodeValue::Text), a.map(NodeValue::Text))
        })
        .collect();

    (!children.is_empty()).then(|| TreeNode::group(ERRORS_GROUP, children))
}

fn table_leaf(
    name: &str,
    input: Option<BTreeMap<String, String>>,
    output: Option<BTreeMap<String, String>>,
) -> Option<TreeNode> {
    if input.is_none() && output.is_none() {
        return None;
    }
    Some(TreeNode::leaf(
        name,
        NodeType::Table,
        input.map(NodeValue::Table),
        output.map(NodeValue::Table),
    ))
}

fn headers_table(headers: &MultiValueMap) -> Option<BTreeMap<String, String>> {
    non_empty_table(
        headers
            .iter()
            .map(|(name, values)| (name.clone(), values.join(", ")))
            .collect(),
    )
}

fn non_empty_table(rows: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!rows.is_empty()).then_some(rows)
}
