//! Path-shaped identifiers for entities in the show tree.
//!
//! A show is identified by its title, a season by `(title, season)` and an
//! episode by `(title, season, episode)`. Descendants always extend the id of
//! their parent, which lets lookups descend the tree by prefix.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One component of an [`EntityId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdSegment {
    /// A season or episode number.
    Number(u32),
    /// A show title.
    Name(String),
}

impl From<u32> for IdSegment {
    fn from(n: u32) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for IdSegment {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

impl From<String> for IdSegment {
    fn from(s: String) -> Self {
        Self::Name(s)
    }
}

impl fmt::Display for IdSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Name(s) => write!(f, "{}", s),
        }
    }
}

/// Unique identifier for a show, season or episode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Vec<IdSegment>);

impl EntityId {
    /// Identifier of a show with the given title.
    #[must_use]
    pub fn show(title: impl Into<String>) -> Self {
        Self(vec![IdSegment::Name(title.into())])
    }

    /// Identifier of a child of this entity (a season of a show, an episode
    /// of a season).
    #[must_use]
    pub fn child(&self, segment: impl Into<IdSegment>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[IdSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn is_prefix_of(&self, other: &EntityId) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl From<Vec<IdSegment>> for EntityId {
    fn from(segments: Vec<IdSegment>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{}", segment)?;
            first = false;
        }
        Ok(())
    }
}
