//! Byte tags for node kinds and time windows.

use std::fmt;

use thiserror::Error;

/// Node kinds a rule-implementation class may be registered as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Relation that fails if any child fails.
    None,
    /// Relation that passes only when every child passes.
    And,
    /// Relation that always passes after running every child.
    True,
    /// Relation that runs every child and passes if any passes.
    All,
    /// Relation that passes on the first passing child.
    Any,
    /// Leaf returning a boolean flow decision.
    LeafFlow,
    /// Leaf returning a result value.
    LeafResult,
    /// Leaf with no decision.
    LeafNone,
}

/// A tag byte outside the known table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown tag {0}")]
pub struct UnknownTag(pub u8);

impl NodeType {
    /// Every node type, in tag order.
    pub const ALL: [Self; 8] = [
        Self::None,
        Self::And,
        Self::True,
        Self::All,
        Self::Any,
        Self::LeafFlow,
        Self::LeafResult,
        Self::LeafNone,
    ];

    /// Decodes a tag byte.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownTag`] for bytes outside `0..=7`.
    pub const fn from_byte(tag: u8) -> Result<Self, UnknownTag> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::And),
            2 => Ok(Self::True),
            3 => Ok(Self::All),
            4 => Ok(Self::Any),
            5 => Ok(Self::LeafFlow),
            6 => Ok(Self::LeafResult),
            7 => Ok(Self::LeafNone),
            other => Err(UnknownTag(other)),
        }
    }

    /// Encodes the tag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::And => 1,
            Self::True => 2,
            Self::All => 3,
            Self::Any => 4,
            Self::LeafFlow => 5,
            Self::LeafResult => 6,
            Self::LeafNone => 7,
        }
    }

    /// Returns `true` for the three leaf kinds.
    #[must_use]
    pub const fn is_leaf(self) -> bool {
        matches!(self, Self::LeafFlow | Self::LeafResult | Self::LeafNone)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "NONE",
            Self::And => "AND",
            Self::True => "TRUE",
            Self::All => "ALL",
            Self::Any => "ANY",
            Self::LeafFlow => "LEAF_FLOW",
            Self::LeafResult => "LEAF_RESULT",
            Self::LeafNone => "LEAF_NONE",
        };
        formatter.write_str(label)
    }
}

/// Time window governing when a node is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TimeType {
    /// Always active.
    #[default]
    None,
    /// Active from `start` onwards.
    AfterStart,
    /// Active until `end`.
    BeforeEnd,
    /// Active between `start` and `end`.
    Between,
}

impl TimeType {
    /// Decodes a tag byte.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownTag`] for bytes outside the table.
    pub const fn from_byte(tag: u8) -> Result<Self, UnknownTag> {
        match tag {
            1 => Ok(Self::None),
            5 => Ok(Self::AfterStart),
            6 => Ok(Self::BeforeEnd),
            7 => Ok(Self::Between),
            other => Err(UnknownTag(other)),
        }
    }

    /// Encodes the tag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::None => 1,
            Self::AfterStart => 5,
            Self::BeforeEnd => 6,
            Self::Between => 7,
        }
    }
}
