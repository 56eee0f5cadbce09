//! Per-run working set
//!
//! A [`UnitOfWork`] owns every cached row for one scan. Rows are addressed by
//! their [`IdentityHash`] and carry a [`RowState`] telling the flush which
//! rows to insert and which to update. Nothing in here touches storage.

use core_library::models::{
    Album, Artist, ClassificationEntry, ClassificationType, PartyRelation, RelatedImage, Song,
    SongClassification, ValueListEntry,
};
use std::collections::HashMap;
use tracing::debug;

use crate::identity::{Identity, IdentityHash};

/// Persistence state of a cached row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowState {
    /// Loaded from storage and untouched
    Clean,
    /// Created during this run, not persisted yet
    New,
    /// Loaded from storage and mutated during this run
    Dirty,
}

#[derive(Debug, Clone)]
struct Tracked<T> {
    row: T,
    state: RowState,
}

/// Content-addressed collection of one entity kind
#[derive(Debug, Clone)]
pub struct EntitySet<T> {
    rows: Vec<Tracked<T>>,
    index: HashMap<IdentityHash, usize>,
}

impl<T> Default for EntitySet<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Identity> EntitySet<T> {
    /// Index persisted rows as `Clean`.
    ///
    /// When two stored rows share an identity the first one wins the index;
    /// the other stays reachable through iteration only.
    pub fn load(rows: Vec<T>) -> Self {
        let mut set = Self::default();
        for row in rows {
            let hash = row.identity();
            let position = set.rows.len();
            set.rows.push(Tracked {
                row,
                state: RowState::Clean,
            });
            if set.index.contains_key(&hash) {
                debug!(identity = %hash, "Duplicate identity in stored rows");
            } else {
                set.index.insert(hash, position);
            }
        }
        set
    }

    /// Add a row created during this run. An existing row with the same
    /// identity is kept and returned instead.
    pub fn insert_new(&mut self, row: T) -> &T {
        let hash = row.identity();
        let position = match self.index.get(&hash) {
            Some(position) => *position,
            None => {
                let position = self.rows.len();
                self.rows.push(Tracked {
                    row,
                    state: RowState::New,
                });
                self.index.insert(hash, position);
                position
            }
        };
        &self.rows[position].row
    }
}

impl<T> EntitySet<T> {
    pub fn find(&self, hash: &IdentityHash) -> Option<&T> {
        self.index.get(hash).map(|position| &self.rows[*position].row)
    }

    pub fn state(&self, hash: &IdentityHash) -> Option<RowState> {
        self.index.get(hash).map(|position| self.rows[*position].state)
    }

    /// First row matching `predicate`; linear, for lookups by something
    /// other than identity
    pub fn find_by<P>(&self, predicate: P) -> Option<&T>
    where
        P: Fn(&T) -> bool,
    {
        self.rows.iter().map(|t| &t.row).find(|row| predicate(*row))
    }

    /// Apply `change` to the row with identity `hash`.
    ///
    /// `change` reports whether it modified the row; a modified `Clean` row
    /// becomes `Dirty`. Identity-bearing fields must not be changed.
    pub fn modify<F>(&mut self, hash: &IdentityHash, change: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        let Some(position) = self.index.get(hash) else {
            return false;
        };
        let tracked = &mut self.rows[*position];
        let changed = change(&mut tracked.row);
        if changed && tracked.state == RowState::Clean {
            tracked.state = RowState::Dirty;
        }
        changed
    }

    pub fn new_rows(&self) -> impl Iterator<Item = &T> {
        self.with_state(RowState::New)
    }

    pub fn dirty_rows(&self) -> impl Iterator<Item = &T> {
        self.with_state(RowState::Dirty)
    }

    pub fn clean_rows(&self) -> impl Iterator<Item = &T> {
        self.with_state(RowState::Clean)
    }

    fn with_state(&self, state: RowState) -> impl Iterator<Item = &T> {
        self.rows
            .iter()
            .filter(move |t| t.state == state)
            .map(|t| &t.row)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().map(|t| &t.row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything one scan run reads and writes
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    pub value_lists: EntitySet<ValueListEntry>,
    pub classification_types: EntitySet<ClassificationType>,
    pub classification_entries: EntitySet<ClassificationEntry>,
    pub artists: EntitySet<Artist>,
    pub albums: EntitySet<Album>,
    pub songs: EntitySet<Song>,
    pub images: EntitySet<RelatedImage>,
    /// Created for added songs only; never loaded
    pub song_classifications: Vec<SongClassification>,
    /// Created for added songs only; never loaded
    pub party_relations: Vec<PartyRelation>,
}

impl UnitOfWork {
    /// Number of rows the flush will insert or update
    pub fn pending_changes(&self) -> usize {
        self.value_lists.new_rows().count()
            + self.classification_types.new_rows().count()
            + self.classification_entries.new_rows().count()
            + self.artists.new_rows().count()
            + self.artists.dirty_rows().count()
            + self.albums.new_rows().count()
            + self.albums.dirty_rows().count()
            + self.songs.new_rows().count()
            + self.songs.dirty_rows().count()
            + self.images.new_rows().count()
            + self.song_classifications.len()
            + self.party_relations.len()
    }
}
