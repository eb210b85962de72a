//! Collision chains: key tables whose entries are linked lists of records.
//!
//! A transaction id is reused over the life of a capture, so one key can name
//! several unrelated dialogues. The table maps each key to the *head* record
//! of a chain; later dialogues with the same key are appended behind it.
//!
//! Records live in an arena and point at each other with [`ChainId`]
//! indices, so the links are plain `Option<ChainId>` values with no
//! ownership cycles:
//!
//! ```text
//! heads: key ──▶ [head] ──next──▶ [rec] ──next──▶ [tail]
//!                       ◀──prev──       ◀──prev──
//! ```
//!
//! Arena slots are never reused, so a stale `ChainId` can only ever resolve
//! to `None`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::iter;

use tracing::trace;

use crate::context::SessionId;

/// Index of a record inside one [`ChainTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(u32);

impl ChainId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Joins a key to a dialogue and to its siblings under the same key.
#[derive(Debug, Clone)]
pub struct ChainRecord<K> {
    /// Owned copy of the key; appended records copy the head's key.
    pub key: K,
    /// Dialogue this record belongs to.
    pub session: SessionId,
    /// Only the head is stored directly in the table.
    pub is_head: bool,
    pub prev: Option<ChainId>,
    pub next: Option<ChainId>,
}

/// What [`ChainTable::unlink`] did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unlinked {
    /// The record was the only one under its key; the key is gone.
    Removed,
    /// The record was spliced out of the middle or the tail of its chain.
    Spliced,
    /// The record was the head; its successor now heads the chain.
    Promoted(ChainId),
    /// The id did not resolve to a live record.
    Missing,
}

/// Key table plus record arena for one message kind.
#[derive(Debug)]
pub struct ChainTable<K> {
    name: &'static str,
    heads: HashMap<K, ChainId>,
    records: Vec<Option<ChainRecord<K>>>,
    live: usize,
}

impl<K> ChainTable<K>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            heads: HashMap::new(),
            records: Vec::new(),
            live: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of keys with a chain.
    pub fn head_count(&self) -> usize {
        self.heads.len()
    }

    /// Number of live records across all chains.
    pub fn record_count(&self) -> usize {
        self.live
    }

    pub fn get(&self, id: ChainId) -> Option<&ChainRecord<K>> {
        self.records.get(id.index()).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: ChainId) -> Option<&mut ChainRecord<K>> {
        self.records.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Head record stored under `key`, if any.
    pub fn head(&self, key: &K) -> Option<ChainId> {
        let head = self.heads.get(key).copied();
        trace!(table = self.name, %key, found = head.is_some(), "chain lookup");
        head
    }

    /// Walks the chain under `key` from head to tail.
    pub fn walk<'a>(&'a self, key: &K) -> impl Iterator<Item = (ChainId, &'a ChainRecord<K>)> + 'a {
        let first = self.head(key).and_then(|id| self.get(id).map(|rec| (id, rec)));
        iter::successors(first, move |(_, rec)| {
            rec.next.and_then(|id| self.get(id).map(|next| (id, next)))
        })
    }

    /// Last record of the chain under `key`.
    pub fn tail(&self, key: &K) -> Option<ChainId> {
        self.walk(key).last().map(|(id, _)| id)
    }

    fn alloc(&mut self, record: ChainRecord<K>) -> ChainId {
        let id = ChainId(self.records.len() as u32);
        self.records.push(Some(record));
        self.live += 1;
        id
    }

    /// Starts a new chain under `key`. The caller checks no chain exists yet.
    pub fn insert_head(&mut self, key: K, session: SessionId) -> ChainId {
        let id = self.alloc(ChainRecord {
            key: key.clone(),
            session,
            is_head: true,
            prev: None,
            next: None,
        });
        self.heads.insert(key, id);
        id
    }

    /// Appends a record for `session` right after `tail`, copying its key.
    ///
    /// Returns `None` when `tail` is not a live record. `tail` must be the
    /// last record of its chain; a successor it already has is relinked
    /// behind the new record.
    pub fn append(&mut self, tail: ChainId, session: SessionId) -> Option<ChainId> {
        let (key, old_next) = {
            let rec = self.get(tail)?;
            (rec.key.clone(), rec.next)
        };
        let id = self.alloc(ChainRecord {
            key,
            session,
            is_head: false,
            prev: Some(tail),
            next: old_next,
        });
        if let Some(rec) = self.get_mut(tail) {
            rec.next = Some(id);
        }
        if let Some(next) = old_next.and_then(|n| self.get_mut(n)) {
            next.prev = Some(id);
        }
        Some(id)
    }

    /// Links `session` in front of the current head of `key`, or starts a
    /// new chain when the key is unknown.
    pub fn push_front(&mut self, key: K, session: SessionId) -> ChainId {
        let Some(old_head) = self.heads.get(&key).copied() else {
            return self.insert_head(key, session);
        };
        let id = self.alloc(ChainRecord {
            key: key.clone(),
            session,
            is_head: true,
            prev: None,
            next: Some(old_head),
        });
        if let Some(rec) = self.get_mut(old_head) {
            rec.is_head = false;
            rec.prev = Some(id);
        }
        self.heads.insert(key, id);
        id
    }

    /// Links `session` under `key`: a new head when the key is unknown,
    /// otherwise appended to the current tail.
    pub fn push(&mut self, key: K, session: SessionId) -> ChainId {
        match self.tail(&key).and_then(|tail| self.append(tail, session)) {
            Some(id) => id,
            None => self.insert_head(key, session),
        }
    }

    /// Detaches a record from its chain and frees it.
    ///
    /// A head with a successor hands the table entry over to that successor.
    pub fn unlink(&mut self, id: ChainId) -> Unlinked {
        let Some(record) = self.records.get_mut(id.index()).and_then(Option::take) else {
            return Unlinked::Missing;
        };
        self.live -= 1;

        if record.is_head {
            match record.next {
                None => {
                    self.heads.remove(&record.key);
                    Unlinked::Removed
                }
                Some(next) => {
                    if let Some(succ) = self.get_mut(next) {
                        succ.is_head = true;
                        succ.prev = None;
                    }
                    self.heads.insert(record.key, next);
                    Unlinked::Promoted(next)
                }
            }
        } else {
            if let Some(prev) = record.prev.and_then(|p| self.get_mut(p)) {
                prev.next = record.next;
            }
            if let Some(next) = record.next.and_then(|n| self.get_mut(n)) {
                next.prev = record.prev;
            }
            Unlinked::Spliced
        }
    }
}
