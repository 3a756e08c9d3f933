use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Index of a node inside a [`Tree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a record as supplied by the data source.
///
/// Sources hand out ids as either numbers or strings; both normalise to the
/// same string form so `2` and `"2"` name the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(s)
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        RecordId(n.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<RawId> for RecordId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Int(n) => RecordId(n.to_string()),
            RawId::Float(f) if f.fract() == 0.0 && f.is_finite() => RecordId(format!("{}", f as i64)),
            RawId::Float(f) => RecordId(f.to_string()),
            RawId::Str(s) => RecordId(s),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        RawId::deserialize(d).map(RecordId::from)
    }
}

/// Deserialises an optional parent id, treating empty strings as absent.
fn parent_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RecordId>, D::Error> {
    let raw = Option::<RawId>::deserialize(d)?;
    Ok(raw.map(RecordId::from).filter(|id| !id.0.is_empty()))
}

/// A loosely typed attribute value: numbers stay numbers, everything else is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Text(_) => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::Number(n)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(n) => write!(f, "{n}"),
            AttrValue::Text(s) => f.write_str(s),
        }
    }
}

/// Flat input row. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(alias = "location_id")]
    pub id: RecordId,
    #[serde(
        default,
        alias = "parentId",
        alias = "parent_location_id",
        deserialize_with = "parent_id"
    )]
    pub parent_id: Option<RecordId>,
    #[serde(default)]
    pub value: f64,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// Attribute bag carried along with a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default, alias = "location_name", alias = "name", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, alias = "type", skip_serializing_if = "Option::is_none")]
    pub category: Option<AttrValue>,
    /// Fraction of the cell covered by the attribution sub-rectangle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution_fill: Option<String>,
}

impl RawRecord {
    pub fn new(id: impl Into<RecordId>, parent_id: Option<RecordId>, value: f64) -> Self {
        Self {
            id: id.into(),
            parent_id,
            value,
            attributes: Attributes::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.attributes.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchyNode {
    pub id: NodeId,
    pub record: RecordId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: u32,
    pub height: u32,
    /// Raw declared value; ignored for aggregation once the node has children.
    pub value: f64,
    /// Sum of descendant leaf values.
    pub aggregate: f64,
    pub attributes: Attributes,
}

impl HierarchyNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn label(&self) -> &str {
        self.attributes.label.as_deref().unwrap_or(self.record.as_str())
    }
}

/// Arena of hierarchy nodes. `nodes[i].id == NodeId(i)`.
#[derive(Debug, Clone, Serialize)]
pub struct Tree {
    pub root: NodeId,
    pub nodes: Vec<HierarchyNode>,
    #[serde(skip)]
    pub(crate) by_record: HashMap<RecordId, NodeId>,
}

impl Tree {
    pub fn root(&self) -> &HierarchyNode {
        &self.nodes[self.root.index()]
    }

    pub fn node(&self, id: NodeId) -> &HierarchyNode {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&HierarchyNode> {
        self.nodes.get(id.index())
    }

    pub fn find(&self, record: &RecordId) -> Option<NodeId> {
        self.by_record.get(record).copied()
    }

    pub fn find_node(&self, record: &RecordId) -> Option<&HierarchyNode> {
        self.find(record).map(|id| self.node(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<&HierarchyNode> {
        self.node(id).parent.map(|p| self.node(p))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Breadth-first order starting at the root.
    pub fn descendants(&self) -> Vec<NodeId> {
        self.descendants_of(self.root)
    }

    pub fn descendants_of(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        out.push(start);
        let mut i = 0;
        while i < out.len() {
            out.extend(self.node(out[i]).children.iter().copied());
            i += 1;
        }
        out
    }

    /// Pre-order (parents before children, children in sort order).
    pub fn each_before(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.node(id).children.iter().rev().copied());
        }
        out
    }

    pub fn leaves_of(&self, start: NodeId) -> impl Iterator<Item = &HierarchyNode> + '_ {
        self.descendants_of(start)
            .into_iter()
            .map(move |id| self.node(id))
            .filter(|n| n.is_leaf())
    }

    /// True when `ancestor` is `id` itself or appears on its parent chain.
    pub fn has_ancestor(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.node(c).parent;
        }
        false
    }
}
