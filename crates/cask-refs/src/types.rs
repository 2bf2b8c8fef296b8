//! The [`Reference`] record and its creation request.

use cask_types::{Digest, OwnerId, ReferenceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An owner's named pointer to a stored blob.
///
/// At most one reference exists per (owner, digest) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: ReferenceId,
    pub owner: OwnerId,
    pub digest: Digest,
    pub display_name: String,
    pub is_private: bool,
    /// Whether the blob already existed, for another reference, when this
    /// reference was created.
    pub is_duplicate: bool,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to create a [`Reference`]; the registry assigns the id
/// and timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReference {
    pub owner: OwnerId,
    pub digest: Digest,
    pub display_name: String,
    pub is_private: bool,
    pub is_duplicate: bool,
}

impl NewReference {
    pub(crate) fn into_reference(self) -> Reference {
        Reference {
            id: ReferenceId::new(),
            owner: self.owner,
            digest: self.digest,
            display_name: self.display_name,
            is_private: self.is_private,
            is_duplicate: self.is_duplicate,
            created_at: Utc::now(),
        }
    }
}
