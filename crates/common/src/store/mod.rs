//! Bounded in-memory file store with FIFO eviction.
//!
//! Entries are kept in insertion order; when an `add` would exceed the
//! count or total-byte budget, the oldest entries are evicted until the
//! incoming file fits. Payload buffers are shared [`Bytes`] handles and are
//! never mutated in place: [`FileStore::replace_bytes`] swaps in a new
//! buffer, so readers that obtained the old one keep seeing stable bytes.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::text::Encoding;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("name conflict")]
    NameConflict,
    #[error("too large")]
    TooLarge,
    #[error("insufficient space")]
    InsufficientSpace,
    #[error("replace would exceed limits")]
    ReplaceWouldExceed,
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

/// Metadata snapshot for a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    /// 128-bit random identifier, rendered as 32 lowercase hex characters.
    pub id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub size_bytes: u64,
    pub encoding: Encoding,
    pub is_text: bool,
}

/// A stored file: metadata plus a shared handle to the payload.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub meta: FileMeta,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct AddParams {
    pub name: String,
    pub bytes: Bytes,
    pub encoding: Encoding,
    pub is_text: bool,
    /// Creation instant; defaults to the current time.
    pub now: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct ReplaceParams {
    pub id: String,
    pub bytes: Bytes,
    pub encoding: Encoding,
    pub is_text: bool,
}

struct Entry {
    meta: FileMeta,
    data: Bytes,
    seq: u64,
}

#[derive(Default)]
struct Inner {
    by_id: HashMap<String, Entry>,
    by_name: HashMap<String, String>,
    /// Insertion order: monotonic sequence -> id. The first key is always
    /// the oldest live entry, which is what eviction removes.
    order: BTreeMap<u64, String>,
    next_seq: u64,
    total_bytes: u64,
}

/// Thread-safe in-memory file store.
///
/// Mutations are serialized under the write half of an `RwLock`; reads take
/// the shared half. Returned [`Bytes`] stay valid after the lock is dropped
/// because payloads are replaced by swap, never mutated.
pub struct FileStore {
    max_files: usize,
    max_total_bytes: u64,
    inner: RwLock<Inner>,
}

impl FileStore {
    pub fn new(max_files: usize, max_total_bytes: u64) -> Result<Self, StoreError> {
        if max_files == 0 || max_total_bytes == 0 {
            return Err(StoreError::InvalidInput(
                "max_files/max_total_bytes must be > 0",
            ));
        }
        Ok(Self {
            max_files,
            max_total_bytes,
            inner: RwLock::new(Inner::default()),
        })
    }

    pub fn limits(&self) -> (usize, u64) {
        (self.max_files, self.max_total_bytes)
    }

    /// Current entry count and total payload bytes.
    pub fn stats(&self) -> (usize, u64) {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (inner.by_id.len(), inner.total_bytes)
    }

    /// Snapshot of all metadata in insertion (FIFO) order.
    pub fn list(&self) -> Vec<FileMeta> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .values()
            .map(|id| inner.by_id[id].meta.clone())
            .collect()
    }

    pub fn has_name(&self, name: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_name.contains_key(name)
    }

    pub fn get_meta(&self, id: &str) -> Result<FileMeta, StoreError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .by_id
            .get(id)
            .map(|en| en.meta.clone())
            .ok_or(StoreError::NotFound)
    }

    /// Returns the entry with a shared handle to its payload. The handle
    /// remains readable even if `replace_bytes` later installs new content.
    pub fn get(&self, id: &str) -> Result<FileEntry, StoreError> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .by_id
            .get(id)
            .map(|en| FileEntry {
                meta: en.meta.clone(),
                bytes: en.data.clone(),
            })
            .ok_or(StoreError::NotFound)
    }

    /// Like [`FileStore::get`], but yields a seekable reader over the payload.
    pub fn open(&self, id: &str) -> Result<(FileMeta, Cursor<Bytes>), StoreError> {
        let entry = self.get(id)?;
        Ok((entry.meta, Cursor::new(entry.bytes)))
    }

    pub fn add(&self, p: AddParams) -> Result<FileMeta, StoreError> {
        if p.name.is_empty() {
            return Err(StoreError::InvalidInput("name is required"));
        }
        let size = p.bytes.len() as u64;
        let now = p.now.unwrap_or_else(OffsetDateTime::now_utc);

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if inner.by_name.contains_key(&p.name) {
            return Err(StoreError::NameConflict);
        }
        if size > self.max_total_bytes {
            return Err(StoreError::TooLarge);
        }
        self.evict_locked(&mut inner, size)?;

        let meta = FileMeta {
            id: new_id(),
            name: p.name,
            created_at: now.to_offset(time::UtcOffset::UTC),
            size_bytes: size,
            encoding: p.encoding,
            is_text: p.is_text,
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, meta.id.clone());
        inner.by_name.insert(meta.name.clone(), meta.id.clone());
        inner.total_bytes += size;
        inner.by_id.insert(
            meta.id.clone(),
            Entry {
                meta: meta.clone(),
                data: p.bytes,
                seq,
            },
        );

        Ok(meta)
    }

    pub fn delete(&self, id: &str) -> Result<FileMeta, StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Self::remove_locked(&mut inner, id).ok_or(StoreError::NotFound)
    }

    /// Renames an entry. Renaming to the current name is a no-op; a name
    /// held by another entry rejects with `NameConflict` and leaves the
    /// original binding untouched.
    pub fn rename(&self, id: &str, new_name: &str) -> Result<FileMeta, StoreError> {
        if new_name.is_empty() {
            return Err(StoreError::InvalidInput("new name is required"));
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Inner { by_id, by_name, .. } = &mut *inner;
        let en = by_id.get_mut(id).ok_or(StoreError::NotFound)?;
        if en.meta.name == new_name {
            return Ok(en.meta.clone());
        }
        if by_name.contains_key(new_name) {
            return Err(StoreError::NameConflict);
        }

        by_name.remove(&en.meta.name);
        by_name.insert(new_name.to_owned(), en.meta.id.clone());
        en.meta.name = new_name.to_owned();
        Ok(en.meta.clone())
    }

    /// Installs a new payload for `id` by swapping buffers. Never evicts
    /// siblings: if the projected total exceeds the budget the call fails
    /// with `ReplaceWouldExceed` and the entry is left untouched.
    pub fn replace_bytes(&self, p: ReplaceParams) -> Result<FileMeta, StoreError> {
        if p.id.is_empty() {
            return Err(StoreError::InvalidInput("id is required"));
        }
        let new_size = p.bytes.len() as u64;
        if new_size > self.max_total_bytes {
            return Err(StoreError::TooLarge);
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let total = inner.total_bytes;
        let en = inner.by_id.get_mut(&p.id).ok_or(StoreError::NotFound)?;

        let projected = total - en.meta.size_bytes + new_size;
        if projected > self.max_total_bytes {
            return Err(StoreError::ReplaceWouldExceed);
        }

        en.data = p.bytes;
        en.meta.size_bytes = new_size;
        en.meta.encoding = p.encoding;
        en.meta.is_text = p.is_text;
        let meta = en.meta.clone();
        inner.total_bytes = projected;
        Ok(meta)
    }

    /// Runs the eviction routine without adding anything, so an upload can
    /// pre-shrink the store before committing to reading a large body.
    pub fn evict_to_fit(&self, incoming_size: u64) -> Result<(), StoreError> {
        if incoming_size > self.max_total_bytes {
            return Err(StoreError::TooLarge);
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_locked(&mut inner, incoming_size)
    }

    fn evict_locked(&self, inner: &mut Inner, incoming: u64) -> Result<(), StoreError> {
        while inner.by_id.len() >= self.max_files
            || inner.total_bytes + incoming > self.max_total_bytes
        {
            let oldest = match inner.order.values().next() {
                Some(id) => id.clone(),
                None => break,
            };
            Self::remove_locked(inner, &oldest);
        }
        if inner.by_id.len() >= self.max_files
            || inner.total_bytes + incoming > self.max_total_bytes
        {
            return Err(StoreError::InsufficientSpace);
        }
        Ok(())
    }

    fn remove_locked(inner: &mut Inner, id: &str) -> Option<FileMeta> {
        let en = inner.by_id.remove(id)?;
        inner.by_name.remove(&en.meta.name);
        inner.order.remove(&en.seq);
        inner.total_bytes -= en.meta.size_bytes;
        Some(en.meta)
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn add_named(s: &FileStore, name: &str, data: &'static str) -> Result<FileMeta, StoreError> {
        s.add(AddParams {
            name: name.to_owned(),
            bytes: Bytes::from_static(data.as_bytes()),
            encoding: Encoding::Unknown,
            is_text: false,
            now: Some(datetime!(2025-01-01 00:00:00 UTC)),
        })
    }

    fn assert_invariants(s: &FileStore) {
        let metas = s.list();
        let (files, total) = s.stats();
        let (max_files, max_total) = s.limits();
        assert_eq!(metas.len(), files);
        assert!(files <= max_files);
        assert_eq!(total, metas.iter().map(|m| m.size_bytes).sum::<u64>());
        assert!(total <= max_total);
        for m in &metas {
            assert!(s.has_name(&m.name));
            assert_eq!(s.get_meta(&m.id).unwrap().name, m.name);
        }
    }

    #[test]
    fn rejects_zero_limits() {
        assert!(matches!(
            FileStore::new(0, 10),
            Err(StoreError::InvalidInput(_))
        ));
        assert!(matches!(
            FileStore::new(10, 0),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn add_name_conflict_rejects() {
        let s = FileStore::new(10, 1000).unwrap();
        add_named(&s, "a.txt", "1").unwrap();
        assert_eq!(
            add_named(&s, "a.txt", "2").unwrap_err(),
            StoreError::NameConflict
        );
        assert_invariants(&s);
    }

    #[test]
    fn add_empty_name_rejects() {
        let s = FileStore::new(10, 1000).unwrap();
        assert!(matches!(
            add_named(&s, "", "1"),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn add_larger_than_total_budget_rejects() {
        let s = FileStore::new(10, 3).unwrap();
        assert_eq!(add_named(&s, "a", "1234").unwrap_err(), StoreError::TooLarge);
    }

    #[test]
    fn fifo_eviction_by_max_files() {
        let s = FileStore::new(2, 1000).unwrap();
        let a = add_named(&s, "a", "1").unwrap();
        add_named(&s, "b", "2").unwrap();
        add_named(&s, "c", "3").unwrap();

        assert_eq!(s.get_meta(&a.id).unwrap_err(), StoreError::NotFound);
        let names: Vec<_> = s.list().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_invariants(&s);
    }

    #[test]
    fn fifo_eviction_by_max_total_bytes() {
        let s = FileStore::new(10, 3).unwrap();
        let a = add_named(&s, "a", "1").unwrap();
        add_named(&s, "b", "2").unwrap();
        add_named(&s, "c", "3").unwrap();

        assert_eq!(s.get_meta(&a.id).unwrap_err(), StoreError::NotFound);
        assert_invariants(&s);
    }

    #[test]
    fn replace_would_exceed_rejects_and_keeps_bytes() {
        let s = FileStore::new(10, 3).unwrap();
        let a = add_named(&s, "a", "1").unwrap();
        add_named(&s, "b", "2").unwrap();

        let err = s
            .replace_bytes(ReplaceParams {
                id: a.id.clone(),
                bytes: Bytes::from_static(b"111"),
                encoding: Encoding::Unknown,
                is_text: false,
            })
            .unwrap_err();
        assert_eq!(err, StoreError::ReplaceWouldExceed);

        let f = s.get(&a.id).unwrap();
        assert_eq!(&f.bytes[..], b"1");
        assert_eq!(f.meta.size_bytes, 1);
        assert_invariants(&s);
    }

    #[test]
    fn replace_swaps_buffer_and_keeps_identity() {
        let s = FileStore::new(10, 1000).unwrap();
        let a = add_named(&s, "a", "old").unwrap();
        let before = s.get(&a.id).unwrap();

        let updated = s
            .replace_bytes(ReplaceParams {
                id: a.id.clone(),
                bytes: Bytes::from_static(b"new bytes"),
                encoding: Encoding::Utf8,
                is_text: true,
            })
            .unwrap();

        // the old handle still reads the old buffer
        assert_eq!(&before.bytes[..], b"old");
        assert_eq!(&s.get(&a.id).unwrap().bytes[..], b"new bytes");
        assert_eq!(updated.id, a.id);
        assert_eq!(updated.name, a.name);
        assert_eq!(updated.created_at, a.created_at);
        assert_eq!(updated.encoding, Encoding::Utf8);
        assert!(updated.is_text);
        assert_invariants(&s);
    }

    #[test]
    fn replace_preserves_fifo_position() {
        let s = FileStore::new(10, 1000).unwrap();
        let a = add_named(&s, "a", "1").unwrap();
        add_named(&s, "b", "2").unwrap();
        s.replace_bytes(ReplaceParams {
            id: a.id.clone(),
            bytes: Bytes::from_static(b"11"),
            encoding: Encoding::Unknown,
            is_text: false,
        })
        .unwrap();

        let names: Vec<_> = s.list().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn rename_conflict_rejects_and_keeps_original() {
        let s = FileStore::new(10, 1000).unwrap();
        let a = add_named(&s, "a.txt", "1").unwrap();
        add_named(&s, "b.txt", "2").unwrap();

        assert_eq!(
            s.rename(&a.id, "b.txt").unwrap_err(),
            StoreError::NameConflict
        );
        assert_eq!(s.get_meta(&a.id).unwrap().name, "a.txt");
        assert!(s.has_name("a.txt"));
        assert_invariants(&s);
    }

    #[test]
    fn rename_to_same_name_is_noop() {
        let s = FileStore::new(10, 1000).unwrap();
        let a = add_named(&s, "a.txt", "1").unwrap();
        let meta = s.rename(&a.id, "a.txt").unwrap();
        assert_eq!(meta, a);
    }

    #[test]
    fn rename_updates_index() {
        let s = FileStore::new(10, 1000).unwrap();
        let a = add_named(&s, "a.txt", "1").unwrap();
        let meta = s.rename(&a.id, "z.txt").unwrap();
        assert_eq!(meta.name, "z.txt");
        assert!(!s.has_name("a.txt"));
        assert!(s.has_name("z.txt"));
        assert_invariants(&s);
    }

    #[test]
    fn delete_removes_everywhere() {
        let s = FileStore::new(10, 1000).unwrap();
        let a = add_named(&s, "a", "123").unwrap();
        let b = add_named(&s, "b", "45").unwrap();

        let removed = s.delete(&a.id).unwrap();
        assert_eq!(removed.id, a.id);
        assert_eq!(s.delete(&a.id).unwrap_err(), StoreError::NotFound);
        assert!(!s.has_name("a"));
        assert_eq!(s.stats(), (1, 2));
        assert_eq!(s.list()[0].id, b.id);
        assert_invariants(&s);
    }

    #[test]
    fn evict_to_fit_reports_unreachable_fit() {
        let s = FileStore::new(10, 3).unwrap();
        assert_eq!(s.evict_to_fit(4).unwrap_err(), StoreError::TooLarge);
        // fits trivially in an empty store
        s.evict_to_fit(3).unwrap();
    }

    #[test]
    fn evict_to_fit_drops_oldest_until_fit() {
        let s = FileStore::new(10, 3).unwrap();
        let a = add_named(&s, "a", "1").unwrap();
        let b = add_named(&s, "b", "2").unwrap();

        // 1 + 2 stored; making room for 1 more byte only needs "a" gone
        s.evict_to_fit(1).unwrap();
        assert_eq!(s.get_meta(&a.id).unwrap_err(), StoreError::NotFound);
        assert_eq!(s.get_meta(&b.id).unwrap().name, "b");
        assert_invariants(&s);
    }

    #[test]
    fn open_yields_seekable_reader_valid_across_replace() {
        use std::io::{Read, Seek, SeekFrom};

        let s = FileStore::new(10, 1000).unwrap();
        let a = add_named(&s, "a", "hello world").unwrap();
        let (meta, mut reader) = s.open(&a.id).unwrap();
        assert_eq!(meta.size_bytes, 11);

        s.replace_bytes(ReplaceParams {
            id: a.id.clone(),
            bytes: Bytes::from_static(b"replaced"),
            encoding: Encoding::Unknown,
            is_text: false,
        })
        .unwrap();

        reader.seek(SeekFrom::Start(6)).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "world");
    }

    #[test]
    fn ids_are_128_bit_hex_and_unique() {
        let s = FileStore::new(100, 1000).unwrap();
        let mut seen = std::collections::HashSet::new();
        for i in 0..50 {
            let meta = s
                .add(AddParams {
                    name: format!("f{i}"),
                    bytes: Bytes::new(),
                    encoding: Encoding::Unknown,
                    is_text: false,
                    now: None,
                })
                .unwrap();
            assert_eq!(meta.id.len(), 32);
            assert!(meta.id.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(seen.insert(meta.id));
        }
    }
}
