//! Node records, sparse field updates, and the active tool configuration.
//!
//! DESIGN
//! ======
//! A `Node` is the unit of persistence and broadcast: the same serialized
//! record is stored per room in Postgres and carried in peer frames. Field
//! names are camelCase on the wire to match the persisted document shape.
//! `children` is ordered (it encodes edge order); `parents` is a set and only
//! exists so that deletes can unlink incoming edges without a full scan.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque, immutable node identifier.
pub type NodeId = String;

/// Outline drawn for a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    #[default]
    Rectangle,
    Ellipse,
    Star,
}

impl ShapeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Star => "star",
        }
    }
}

impl FromStr for ShapeType {
    type Err = InvalidNode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rectangle" => Ok(Self::Rectangle),
            "ellipse" => Ok(Self::Ellipse),
            "star" => Ok(Self::Star),
            other => Err(InvalidNode::UnknownShape(other.to_owned())),
        }
    }
}

/// A graph vertex as stored, broadcast, and rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Serialized rich-text document. Opaque to the engine.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub shape_type: ShapeType,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub fill_style: String,
    #[serde(default)]
    pub stroke_style: String,
    /// Outgoing edges, in draw order.
    #[serde(default)]
    pub children: Vec<NodeId>,
    /// Incoming edges.
    #[serde(default)]
    pub parents: BTreeSet<NodeId>,
}

/// Why a node record was refused admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidNode {
    #[error("node id is empty")]
    EmptyId,
    #[error("node {id}: {field} must be a finite number")]
    NonFinite { id: NodeId, field: &'static str },
    #[error("node {id}: {field} must not be negative")]
    NegativeSize { id: NodeId, field: &'static str },
    #[error("node {0} references itself")]
    SelfReference(NodeId),
    #[error("node {id} lists child {child} more than once")]
    DuplicateChild { id: NodeId, child: NodeId },
    #[error("unknown shape type: {0}")]
    UnknownShape(String),
}

impl Node {
    /// Check that the record is well formed on its own. Edge symmetry across
    /// records is a snapshot-level property and is not checked here.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), InvalidNode> {
        if self.id.is_empty() {
            return Err(InvalidNode::EmptyId);
        }
        for (field, value) in [("x", self.x), ("y", self.y), ("width", self.width), ("height", self.height)] {
            if !value.is_finite() {
                return Err(InvalidNode::NonFinite { id: self.id.clone(), field });
            }
        }
        for (field, value) in [("width", self.width), ("height", self.height)] {
            if value < 0.0 {
                return Err(InvalidNode::NegativeSize { id: self.id.clone(), field });
            }
        }
        if self.children.contains(&self.id) || self.parents.contains(&self.id) {
            return Err(InvalidNode::SelfReference(self.id.clone()));
        }
        let mut seen = BTreeSet::new();
        for child in &self.children {
            if !seen.insert(child) {
                return Err(InvalidNode::DuplicateChild { id: self.id.clone(), child: child.clone() });
            }
        }
        Ok(())
    }

    /// True if the node has neither incoming nor outgoing edges.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.children.is_empty() && self.parents.is_empty()
    }
}

// =============================================================================
// PATCH
// =============================================================================

/// Sparse update of a node's content fields. Edges are never patched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_type: Option<ShapeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_style: Option<String>,
}

impl NodePatch {
    /// A patch that overwrites every content field with the record's values.
    /// This is how a full incoming record replaces a local one.
    #[must_use]
    pub fn from_node(node: &Node) -> Self {
        Self {
            text: Some(node.text.clone()),
            shape_type: Some(node.shape_type),
            x: Some(node.x),
            y: Some(node.y),
            width: Some(node.width),
            height: Some(node.height),
            fill_style: Some(node.fill_style.clone()),
            stroke_style: Some(node.stroke_style.clone()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply to `node`, returning whether anything changed.
    pub fn apply(&self, node: &mut Node) -> bool {
        let before = node.clone();
        if let Some(text) = &self.text {
            node.text.clone_from(text);
        }
        if let Some(shape) = self.shape_type {
            node.shape_type = shape;
        }
        if let Some(x) = self.x {
            node.x = x;
        }
        if let Some(y) = self.y {
            node.y = y;
        }
        if let Some(w) = self.width {
            node.width = w;
        }
        if let Some(h) = self.height {
            node.height = h;
        }
        if let Some(fill) = &self.fill_style {
            node.fill_style.clone_from(fill);
        }
        if let Some(stroke) = &self.stroke_style {
            node.stroke_style.clone_from(stroke);
        }
        *node != before
    }
}

// =============================================================================
// TOOL CONFIGURATION
// =============================================================================

pub const DEFAULT_NODE_WIDTH: f64 = 160.0;
pub const DEFAULT_NODE_HEIGHT: f64 = 60.0;
pub const DEFAULT_FILL_STYLE: &str = "#FFFFFF";
pub const DEFAULT_STROKE_STYLE: &str = "#1F1A17";

/// Defaults applied to newly added nodes. Changed by the toolbar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    pub shape_type: ShapeType,
    pub width: f64,
    pub height: f64,
    pub fill_style: String,
    pub stroke_style: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            shape_type: ShapeType::Rectangle,
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
            fill_style: DEFAULT_FILL_STYLE.to_owned(),
            stroke_style: DEFAULT_STROKE_STYLE.to_owned(),
        }
    }
}

impl ToolConfig {
    /// Build an isolated node at `(x, y)` carrying this tool's shape and
    /// style, labelled `node-<id>`.
    #[must_use]
    pub fn node_at(&self, id: NodeId, x: f64, y: f64) -> Node {
        Node {
            text: text_document(&id, &format!("node-{id}")),
            id,
            shape_type: self.shape_type,
            x,
            y,
            width: self.width,
            height: self.height,
            fill_style: self.fill_style.clone(),
            stroke_style: self.stroke_style.clone(),
            children: Vec::new(),
            parents: BTreeSet::new(),
        }
    }

    /// Overlay the non-edge style fields of a patch onto this configuration.
    /// Position and text are ignored; they are per-node, not per-tool.
    pub fn merge(&mut self, patch: &NodePatch) {
        if let Some(shape) = patch.shape_type {
            self.shape_type = shape;
        }
        if let Some(w) = patch.width.filter(|w| w.is_finite() && *w >= 0.0) {
            self.width = w;
        }
        if let Some(h) = patch.height.filter(|h| h.is_finite() && *h >= 0.0) {
            self.height = h;
        }
        if let Some(fill) = &patch.fill_style {
            self.fill_style.clone_from(fill);
        }
        if let Some(stroke) = &patch.stroke_style {
            self.stroke_style.clone_from(stroke);
        }
    }
}

// =============================================================================
// TEXT
// =============================================================================

/// Serialized rich-text document with one unstyled line. This is the raw
/// block format the editor stores in `Node::text`.
#[must_use]
pub fn text_document(id: &str, line: &str) -> String {
    let key: String = id.chars().filter(char::is_ascii_alphanumeric).take(5).collect();
    serde_json::json!({
        "blocks": [{
            "key": key,
            "text": line,
            "type": "unstyled",
            "depth": 0,
            "inlineStyleRanges": [],
            "entityRanges": [],
            "data": {},
        }],
        "entityMap": {},
    })
    .to_string()
}

#[cfg(test)]
#[path = "node_test.rs"]
mod tests;
