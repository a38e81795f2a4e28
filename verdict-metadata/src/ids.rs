// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// A unique identifier for a node in the test hierarchy.
///
/// Identifiers are opaque: the producer picks them, and they only need to be unique among nodes
/// at the same [`NodeLevel`] within a run.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(SmolStr);

impl NodeId {
    /// Creates a new identifier.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(SmolStr::new(id))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty, which makes it unusable.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(SmolStr::from(id))
    }
}

/// A level in the test hierarchy, from the outermost to the innermost.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeLevel {
    /// A test assembly.
    Assembly,
    /// A test collection: the unit of parallel scheduling.
    Collection,
    /// A test class.
    Class,
    /// A test method.
    Method,
    /// An individual test.
    Test,
}

impl NodeLevel {
    /// All levels, outermost first.
    pub const ALL: &'static [Self] = &[
        Self::Assembly,
        Self::Collection,
        Self::Class,
        Self::Method,
        Self::Test,
    ];

    /// Returns the enclosing level, or `None` for [`NodeLevel::Assembly`].
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Assembly => None,
            Self::Collection => Some(Self::Assembly),
            Self::Class => Some(Self::Collection),
            Self::Method => Some(Self::Class),
            Self::Test => Some(Self::Method),
        }
    }

    /// Returns a short lowercase name for this level.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assembly => "assembly",
            Self::Collection => "collection",
            Self::Class => "class",
            Self::Method => "method",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for NodeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identifiers of a node and all of its ancestors.
///
/// The hierarchy is a strict tree: assembly → collection → class → method → test. A path never
/// refers back up to a parent object; it only names the ancestors by identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodePath {
    /// The owning assembly.
    pub assembly: NodeId,

    /// The owning test collection, if this path is at the collection level or below.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<NodeId>,

    /// The owning test class, if this path is at the class level or below.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<NodeId>,

    /// The owning test method, if this path is at the method level or below.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<NodeId>,

    /// The test, if this path is at the test level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<NodeId>,
}

impl NodePath {
    /// Creates a path to an assembly.
    pub fn assembly(assembly: impl Into<NodeId>) -> Self {
        Self {
            assembly: assembly.into(),
            collection: None,
            class: None,
            method: None,
            test: None,
        }
    }

    /// Returns a path to a collection within this path's assembly.
    pub fn collection(&self, collection: impl Into<NodeId>) -> Self {
        Self {
            collection: Some(collection.into()),
            class: None,
            method: None,
            test: None,
            ..self.clone()
        }
    }

    /// Returns a path to a class within this path's collection.
    pub fn class(&self, class: impl Into<NodeId>) -> Self {
        Self {
            class: Some(class.into()),
            method: None,
            test: None,
            ..self.clone()
        }
    }

    /// Returns a path to a method within this path's class.
    pub fn method(&self, method: impl Into<NodeId>) -> Self {
        Self {
            method: Some(method.into()),
            test: None,
            ..self.clone()
        }
    }

    /// Returns a path to a test within this path's method.
    pub fn test(&self, test: impl Into<NodeId>) -> Self {
        Self {
            test: Some(test.into()),
            ..self.clone()
        }
    }

    /// Returns the identifier at the given level, if present.
    pub fn id_at(&self, level: NodeLevel) -> Option<&NodeId> {
        match level {
            NodeLevel::Assembly => Some(&self.assembly),
            NodeLevel::Collection => self.collection.as_ref(),
            NodeLevel::Class => self.class.as_ref(),
            NodeLevel::Method => self.method.as_ref(),
            NodeLevel::Test => self.test.as_ref(),
        }
    }

    /// Returns the level of the deepest identifier in this path.
    pub fn depth(&self) -> NodeLevel {
        NodeLevel::ALL
            .iter()
            .rev()
            .copied()
            .find(|level| self.id_at(*level).is_some())
            .unwrap_or(NodeLevel::Assembly)
    }

    /// Returns the first problem with this path, if any.
    ///
    /// A path is well-formed if its identifiers are contiguous from the assembly down to its
    /// depth, and none of them are empty.
    pub fn check(&self) -> Result<(), PathProblem> {
        let depth = self.depth();
        for level in NodeLevel::ALL.iter().copied().take_while(|l| *l <= depth) {
            match self.id_at(level) {
                None => return Err(PathProblem::Missing(level)),
                Some(id) if id.is_empty() => return Err(PathProblem::Empty(level)),
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Returns the keys for every node in this path, from the assembly down.
    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        NodeLevel::ALL.iter().filter_map(move |level| {
            self.id_at(*level).map(|id| NodeKey {
                level: *level,
                id: id.clone(),
            })
        })
    }

    /// Returns the key for the node at the given level, if present.
    pub fn key_at(&self, level: NodeLevel) -> Option<NodeKey> {
        self.id_at(level).map(|id| NodeKey {
            level,
            id: id.clone(),
        })
    }
}

/// A problem with a [`NodePath`], as returned by [`NodePath::check`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathProblem {
    /// A level between the assembly and the deepest identifier has no identifier.
    Missing(NodeLevel),

    /// The identifier at this level is empty.
    Empty(NodeLevel),
}

impl fmt::Display for PathProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(level) => write!(f, "missing {level} identifier"),
            Self::Empty(level) => write!(f, "empty {level} identifier"),
        }
    }
}

/// A node identifier qualified by its level.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// The level of the node.
    pub level: NodeLevel,

    /// The identifier of the node.
    pub id: NodeId,
}
