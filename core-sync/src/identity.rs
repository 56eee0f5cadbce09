//! Identity Resolution
//!
//! The scanner never knows primary keys up front. Every cached entity is
//! addressed by a content hash of its natural key instead, and lookups go
//! through the per-kind hash index kept by the unit of work.

use core_library::models::{
    Album, Artist, ClassificationEntry, ClassificationType, RelatedImage, Song, ValueListEntry,
    ValueListKind,
};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// SHA-256 of a natural key, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityHash(String);

impl IdentityHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash `values` joined with `|`, lowercased first when `ignore_case` is set
pub fn identity_hash<S: AsRef<str>>(values: &[S], ignore_case: bool) -> IdentityHash {
    let joined = values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("|");
    let joined = if ignore_case {
        joined.to_lowercase()
    } else {
        joined
    };

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    IdentityHash(format!("{:x}", hasher.finalize()))
}

pub fn artist_key(name: &str) -> IdentityHash {
    identity_hash(&[name.trim()], true)
}

/// Albums are scoped by their primary artist; the year is not part of the key
pub fn album_key(primary_artist_id: &str, name: &str) -> IdentityHash {
    identity_hash(&[primary_artist_id, name.trim()], true)
}

pub fn song_key(path: &Path) -> IdentityHash {
    identity_hash(&[path.to_string_lossy().as_ref()], true)
}

pub fn classification_type_key(name: &str) -> IdentityHash {
    identity_hash(&[name.trim()], true)
}

pub fn classification_key(type_id: &str, name: &str) -> IdentityHash {
    identity_hash(&[type_id, name.trim()], true)
}

pub fn value_list_key(kind: ValueListKind, name: &str) -> IdentityHash {
    identity_hash(&[kind.as_str(), name.trim()], true)
}

/// Images are identified by where they come from, not by what they belong to
pub fn image_key(source_path: &str, source_index: i32) -> IdentityHash {
    identity_hash(&[source_path, source_index.to_string().as_str()], true)
}

/// Natural key of a cached row
pub trait Identity {
    fn identity(&self) -> IdentityHash;
}

impl Identity for Artist {
    fn identity(&self) -> IdentityHash {
        artist_key(&self.name)
    }
}

impl Identity for Album {
    fn identity(&self) -> IdentityHash {
        album_key(&self.primary_artist_id, &self.name)
    }
}

impl Identity for Song {
    fn identity(&self) -> IdentityHash {
        song_key(Path::new(&self.file_path))
    }
}

impl Identity for ClassificationType {
    fn identity(&self) -> IdentityHash {
        classification_type_key(&self.name)
    }
}

impl Identity for ClassificationEntry {
    fn identity(&self) -> IdentityHash {
        classification_key(&self.type_id, &self.name)
    }
}

impl Identity for ValueListEntry {
    fn identity(&self) -> IdentityHash {
        value_list_key(self.kind, &self.name)
    }
}

impl Identity for RelatedImage {
    fn identity(&self) -> IdentityHash {
        image_key(&self.source_path, self.source_index)
    }
}
