//! On-disk index cache keyed by repository fingerprint.
//!
//! Each fingerprint gets its own SQLite file, `<root>/<fingerprint>.db`,
//! holding a `metadata` key/value table and the ordered `entries`. Vectors
//! are stored as little-endian `f32` BLOBs so they round-trip bit-exactly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use reposcope_core::{CodeChunk, EntityKind, Fingerprint, ScopeError};
use rusqlite::{params, Connection, OpenFlags};

use crate::index::{IndexEntry, RepositoryIndex};

/// Bumped whenever the file layout changes; older files become misses.
const FORMAT_VERSION: &str = "1";

const SCHEMA: &str = "
    CREATE TABLE metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE entries (
        position INTEGER PRIMARY KEY,
        file_path TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        content TEXT NOT NULL,
        entity_name TEXT NOT NULL,
        kind TEXT NOT NULL,
        language TEXT NOT NULL,
        context_header TEXT NOT NULL,
        embedding BLOB NOT NULL
    );
";

/// Persistent store of [`RepositoryIndex`]es.
///
/// Creating a cache touches nothing on disk; the directory is created by the
/// first [`save`](Self::save).
///
/// # Examples
///
/// ```
/// use reposcope_core::Fingerprint;
/// use reposcope_search::IndexCache;
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache = IndexCache::new(dir.path().join("cache"));
/// let fp = Fingerprint::new("deadbeef").unwrap();
/// assert!(cache.load(&fp).is_none());
/// assert!(!dir.path().join("cache").exists());
/// ```
#[derive(Debug, Clone)]
pub struct IndexCache {
    root: PathBuf,
}

impl IndexCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the cache files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that stores the index for `fingerprint`.
    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(format!("{fingerprint}.db"))
    }

    /// Load the index stored for `fingerprint`.
    ///
    /// Returns `None` when there is no file, and also when the file is
    /// unreadable, corrupt, or from another format version. Those cases are
    /// logged at `warn` and the caller rebuilds the index.
    pub fn load(&self, fingerprint: &Fingerprint) -> Option<RepositoryIndex> {
        let path = self.path_for(fingerprint);
        if !path.is_file() {
            tracing::debug!(fingerprint = fingerprint.short(), "index cache miss");
            return None;
        }
        match read_index(&path, fingerprint) {
            Ok(index) => {
                tracing::debug!(
                    fingerprint = fingerprint.short(),
                    entries = index.len(),
                    "index cache hit"
                );
                Some(index)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring unreadable index cache file"
                );
                None
            }
        }
    }

    /// Persist `index`, replacing any file for the same fingerprint.
    ///
    /// The index is written to a temporary sibling and renamed into place, so
    /// readers see either the old file or the complete new one.
    ///
    /// # Errors
    ///
    /// Returns [`ScopeError::Cache`] if the directory or file cannot be
    /// written.
    pub fn save(&self, index: &RepositoryIndex) -> Result<(), ScopeError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| ScopeError::Cache(format!("failed to create cache directory: {e}")))?;

        let target = self.path_for(&index.fingerprint);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let tmp = self.root.join(format!(
            "{}.db.tmp-{}-{nanos}",
            index.fingerprint,
            std::process::id()
        ));

        let written = write_index(&tmp, index).and_then(|()| {
            std::fs::rename(&tmp, &target)
                .map_err(|e| ScopeError::Cache(format!("failed to move cache file into place: {e}")))
        });
        if written.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        written?;

        tracing::debug!(
            path = %target.display(),
            entries = index.len(),
            "saved index cache"
        );
        Ok(())
    }
}

fn write_index(path: &Path, index: &RepositoryIndex) -> Result<(), ScopeError> {
    let mut conn = Connection::open(path)
        .map_err(|e| ScopeError::Cache(format!("failed to open cache file: {e}")))?;
    conn.execute_batch(SCHEMA)
        .map_err(|e| ScopeError::Cache(format!("failed to create schema: {e}")))?;

    let tx = conn
        .transaction()
        .map_err(|e| ScopeError::Cache(format!("failed to begin transaction: {e}")))?;
    {
        let mut meta = tx
            .prepare("INSERT INTO metadata (key, value) VALUES (?1, ?2)")
            .map_err(|e| ScopeError::Cache(format!("failed to prepare metadata insert: {e}")))?;
        let dimensions = index.dimensions.to_string();
        for (key, value) in [
            ("format_version", FORMAT_VERSION),
            ("fingerprint", index.fingerprint.as_str()),
            ("model_id", index.model_id.as_str()),
            ("dimensions", dimensions.as_str()),
        ] {
            meta.execute(params![key, value])
                .map_err(|e| ScopeError::Cache(format!("failed to set metadata '{key}': {e}")))?;
        }

        let mut insert = tx
            .prepare(
                "INSERT INTO entries
                 (position, file_path, start_line, end_line, content, entity_name, kind,
                  language, context_header, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .map_err(|e| ScopeError::Cache(format!("failed to prepare entry insert: {e}")))?;
        for (position, entry) in index.entries.iter().enumerate() {
            let chunk = &entry.chunk;
            insert
                .execute(params![
                    position as i64,
                    chunk.file.to_string_lossy().to_string(),
                    chunk.start_line,
                    chunk.end_line,
                    chunk.content,
                    chunk.entity_name,
                    chunk.kind.as_str(),
                    chunk.language,
                    chunk.context_header,
                    floats_to_bytes(&entry.embedding),
                ])
                .map_err(|e| ScopeError::Cache(format!("failed to insert entry: {e}")))?;
        }
    }
    tx.commit()
        .map_err(|e| ScopeError::Cache(format!("failed to commit cache file: {e}")))
}

fn read_index(path: &Path, fingerprint: &Fingerprint) -> Result<RepositoryIndex, ScopeError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| ScopeError::Cache(format!("failed to open cache file: {e}")))?;

    let version = get_metadata(&conn, "format_version")?;
    if version != FORMAT_VERSION {
        return Err(ScopeError::Cache(format!(
            "format version {version}, expected {FORMAT_VERSION}"
        )));
    }
    let stored = get_metadata(&conn, "fingerprint")?;
    if stored != fingerprint.as_str() {
        return Err(ScopeError::Cache(format!(
            "file holds fingerprint {stored}, expected {fingerprint}"
        )));
    }
    let model_id = get_metadata(&conn, "model_id")?;
    let raw_dims = get_metadata(&conn, "dimensions")?;
    let dimensions: usize = raw_dims
        .parse()
        .map_err(|_| ScopeError::Cache(format!("corrupted dimension metadata: '{raw_dims}'")))?;

    let mut stmt = conn
        .prepare(
            "SELECT file_path, start_line, end_line, content, entity_name, kind, language,
                    context_header, embedding
             FROM entries ORDER BY position",
        )
        .map_err(|e| ScopeError::Cache(format!("failed to prepare entry query: {e}")))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, Vec<u8>>(8)?,
            ))
        })
        .map_err(|e| ScopeError::Cache(format!("failed to query entries: {e}")))?;

    let mut index = RepositoryIndex::new(fingerprint.clone(), model_id, dimensions);
    for row in rows {
        let (file, start, end, content, name, kind, language, header, blob) =
            row.map_err(|e| ScopeError::Cache(format!("failed to read entry: {e}")))?;
        if blob.len() != dimensions * 4 {
            return Err(ScopeError::Cache(format!(
                "embedding of {} bytes does not hold {dimensions} floats",
                blob.len()
            )));
        }
        let mut chunk = CodeChunk::new(PathBuf::from(file), start, end, content)
            .map_err(|e| ScopeError::Cache(format!("invalid entry: {e}")))?;
        chunk.entity_name = name;
        chunk.kind = kind.parse::<EntityKind>().map_err(ScopeError::Cache)?;
        chunk.language = language;
        chunk.context_header = header;
        index.entries.push(IndexEntry {
            chunk: Arc::new(chunk),
            embedding: bytes_to_floats(&blob),
        });
    }
    Ok(index)
}

fn get_metadata(conn: &Connection, key: &str) -> Result<String, ScopeError> {
    conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .map_err(|e| ScopeError::Cache(format!("failed to get metadata '{key}': {e}")))
}

fn floats_to_bytes(floats: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(floats.len() * 4);
    for f in floats {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    bytes
}

fn bytes_to_floats(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
