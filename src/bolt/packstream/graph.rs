//! Graph entities hydrated from PackStream structures.
//!
//! The server returns nodes, relationships and paths as tagged structures.
//! The constructors here are wired into the [`MapperRegistry`] used by the
//! connection, so records surface fully typed entities instead of raw
//! structures.
//!
//! [`MapperRegistry`]: super::MapperRegistry

use std::collections::HashMap;

use super::types::Value;
use super::PackStreamError;

/// Structure signatures for graph entities.
pub mod sig {
    /// Node structure signature (`'N'`)
    pub const NODE: u8 = 0x4E;
    /// Relationship structure signature (`'R'`)
    pub const RELATIONSHIP: u8 = 0x52;
    /// Unbound relationship structure signature (`'r'`)
    pub const UNBOUND_RELATIONSHIP: u8 = 0x72;
    /// Path structure signature (`'P'`)
    pub const PATH: u8 = 0x50;
}

/// A node in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node identity
    pub id: i64,
    /// Node labels
    pub labels: Vec<String>,
    /// Node properties
    pub properties: HashMap<String, Value>,
}

impl Node {
    /// Create a node.
    pub fn new(id: i64, labels: Vec<String>, properties: HashMap<String, Value>) -> Self {
        Self {
            id,
            labels,
            properties,
        }
    }

    /// Hydrate from the wire fields `(id, labels, properties)`.
    pub fn from_fields(fields: Vec<Value>) -> Result<Self, PackStreamError> {
        let [id, labels, properties] = take_fields(fields, "Node")?;
        Ok(Self {
            id: take_int(id, "node id")?,
            labels: take_string_list(labels, "node labels")?,
            properties: take_map(properties, "node properties")?,
        })
    }
}

/// A relationship between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Relationship identity
    pub id: i64,
    /// Identity of the start node
    pub start_node_id: i64,
    /// Identity of the end node
    pub end_node_id: i64,
    /// Relationship type
    pub rel_type: String,
    /// Relationship properties
    pub properties: HashMap<String, Value>,
}

impl Relationship {
    /// Create a relationship.
    pub fn new(
        id: i64,
        start_node_id: i64,
        end_node_id: i64,
        rel_type: impl Into<String>,
        properties: HashMap<String, Value>,
    ) -> Self {
        Self {
            id,
            start_node_id,
            end_node_id,
            rel_type: rel_type.into(),
            properties,
        }
    }

    /// Hydrate from the wire fields `(id, start, end, type, properties)`.
    pub fn from_fields(fields: Vec<Value>) -> Result<Self, PackStreamError> {
        let [id, start, end, rel_type, properties] = take_fields(fields, "Relationship")?;
        Ok(Self {
            id: take_int(id, "relationship id")?,
            start_node_id: take_int(start, "relationship start node")?,
            end_node_id: take_int(end, "relationship end node")?,
            rel_type: take_string(rel_type, "relationship type")?,
            properties: take_map(properties, "relationship properties")?,
        })
    }
}

/// A relationship without endpoints, as it appears inside a path before
/// binding.
#[derive(Debug, Clone, PartialEq)]
pub struct UnboundRelationship {
    /// Relationship identity
    pub id: i64,
    /// Relationship type
    pub rel_type: String,
    /// Relationship properties
    pub properties: HashMap<String, Value>,
}

impl UnboundRelationship {
    /// Hydrate from the wire fields `(id, type, properties)`.
    pub fn from_fields(fields: Vec<Value>) -> Result<Self, PackStreamError> {
        let [id, rel_type, properties] = take_fields(fields, "UnboundRelationship")?;
        Ok(Self {
            id: take_int(id, "relationship id")?,
            rel_type: take_string(rel_type, "relationship type")?,
            properties: take_map(properties, "relationship properties")?,
        })
    }

    /// Bind the relationship to its endpoints.
    pub fn bind(self, start_node_id: i64, end_node_id: i64) -> Relationship {
        Relationship {
            id: self.id,
            start_node_id,
            end_node_id,
            rel_type: self.rel_type,
            properties: self.properties,
        }
    }
}

/// One step of a path: a start node, the relationship traversed, and the
/// node it leads to.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegment {
    /// Node the segment starts at
    pub start: Node,
    /// Relationship traversed by the segment, fully bound
    pub relationship: Relationship,
    /// Node the segment ends at
    pub end: Node,
}

/// A traversal through the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// First node of the traversal
    pub start: Node,
    /// Last node of the traversal
    pub end: Node,
    /// The traversal steps, in order
    pub segments: Vec<PathSegment>,
}

impl Path {
    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the path has no segments (a single-node path).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Build a path from its wire representation.
    ///
    /// The wire form carries the distinct nodes, the distinct relationships
    /// without endpoints, and a sequence of `(rel_index, node_index)` pairs.
    /// Relationship indices are 1-based and signed: a positive index walks
    /// the relationship from the previous node to the next, a negative index
    /// walks it against its direction. Node indices are 0-based. Each
    /// traversed relationship is bound to its endpoints here.
    pub fn from_wire(
        nodes: Vec<Node>,
        rels: Vec<UnboundRelationship>,
        sequence: Vec<i64>,
    ) -> Result<Self, PackStreamError> {
        let start = nodes
            .first()
            .cloned()
            .ok_or_else(|| invalid("path requires at least one node"))?;

        if sequence.len() % 2 != 0 {
            return Err(invalid("path sequence must hold pairs of indices"));
        }

        let mut segments = Vec::with_capacity(sequence.len() / 2);
        let mut prev = start.clone();

        for pair in sequence.chunks_exact(2) {
            let rel_index = pair[0];
            let node_index = pair[1];

            if rel_index == 0 {
                return Err(invalid("path relationship index cannot be zero"));
            }
            let unbound = rels
                .get(rel_index.unsigned_abs() as usize - 1)
                .cloned()
                .ok_or_else(|| invalid("path relationship index out of range"))?;
            let next = usize::try_from(node_index)
                .ok()
                .and_then(|i| nodes.get(i))
                .cloned()
                .ok_or_else(|| invalid("path node index out of range"))?;

            let relationship = if rel_index > 0 {
                unbound.bind(prev.id, next.id)
            } else {
                unbound.bind(next.id, prev.id)
            };

            segments.push(PathSegment {
                start: prev,
                relationship,
                end: next.clone(),
            });
            prev = next;
        }

        Ok(Self {
            start,
            end: prev,
            segments,
        })
    }

    /// Hydrate from the wire fields `(nodes, rels, sequence)`.
    pub fn from_fields(fields: Vec<Value>) -> Result<Self, PackStreamError> {
        let [nodes, rels, sequence] = take_fields(fields, "Path")?;

        let nodes = take_list(nodes, "path nodes")?
            .into_iter()
            .map(|v| match v {
                Value::Node(n) => Ok(n),
                other => Err(invalid(format!(
                    "path nodes must be Node structures, got {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rels = take_list(rels, "path relationships")?
            .into_iter()
            .map(|v| match v {
                Value::UnboundRelationship(r) => Ok(r),
                other => Err(invalid(format!(
                    "path relationships must be unbound, got {}",
                    other.type_name()
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let sequence = take_list(sequence, "path sequence")?
            .into_iter()
            .map(|v| take_int(v, "path sequence index"))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_wire(nodes, rels, sequence)
    }
}

pub(crate) fn map_node(fields: Vec<Value>) -> Result<Value, PackStreamError> {
    Node::from_fields(fields).map(Value::Node)
}

pub(crate) fn map_relationship(fields: Vec<Value>) -> Result<Value, PackStreamError> {
    Relationship::from_fields(fields).map(Value::Relationship)
}

pub(crate) fn map_unbound_relationship(fields: Vec<Value>) -> Result<Value, PackStreamError> {
    UnboundRelationship::from_fields(fields).map(Value::UnboundRelationship)
}

pub(crate) fn map_path(fields: Vec<Value>) -> Result<Value, PackStreamError> {
    Path::from_fields(fields).map(Value::Path)
}

fn invalid(msg: impl Into<String>) -> PackStreamError {
    PackStreamError::InvalidStructure(msg.into())
}

fn take_fields<const N: usize>(
    fields: Vec<Value>,
    what: &str,
) -> Result<[Value; N], PackStreamError> {
    let len = fields.len();
    <[Value; N]>::try_from(fields)
        .map_err(|_| invalid(format!("{} requires {} fields, got {}", what, N, len)))
}

fn take_int(value: Value, what: &str) -> Result<i64, PackStreamError> {
    match value {
        Value::Integer(i) => Ok(i),
        other => Err(invalid(format!(
            "{} must be an integer, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn take_string(value: Value, what: &str) -> Result<String, PackStreamError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(invalid(format!(
            "{} must be a string, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn take_list(value: Value, what: &str) -> Result<Vec<Value>, PackStreamError> {
    match value {
        Value::List(l) => Ok(l),
        other => Err(invalid(format!(
            "{} must be a list, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn take_map(value: Value, what: &str) -> Result<HashMap<String, Value>, PackStreamError> {
    match value {
        Value::Map(m) => Ok(m),
        other => Err(invalid(format!(
            "{} must be a map, got {}",
            what,
            other.type_name()
        ))),
    }
}

fn take_string_list(value: Value, what: &str) -> Result<Vec<String>, PackStreamError> {
    take_list(value, what)?
        .into_iter()
        .map(|v| take_string(v, what))
        .collect()
}
