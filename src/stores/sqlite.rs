//! SQLite + sqlite-vec backed chunk store.
//!
//! One database file holds the collection: a `chunks` table carrying the
//! payload fields and a `chunks_embeddings` vec0 virtual table carrying the
//! fixed-dimension vectors, joined by point id. The schema and its secondary
//! indexes are created lazily the first time the store is opened.
//!
//! Similarity search is a cosine-distance scan via `vec_distance_cosine`;
//! the role filter is applied inside the query so unauthorized chunks never
//! leave the database.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};

use super::{ChunkRecord, ScoredChunk, SearchFilter, UploadMeta, VectorStore};
use crate::types::RagError;

/// Collection (table) name reported in storage errors.
const COLLECTION: &str = "chunks";

/// Raw row shape produced inside the database closure; JSON decoding happens
/// outside, where malformed payloads can be rejected as storage errors.
struct ChunkRow {
    id: String,
    source: String,
    chunk_index: i64,
    chunk: String,
    last_updated: String,
    roles_json: String,
    file_in_storage: Option<String>,
    display_name: Option<String>,
    distance: Option<f32>,
}

#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
    dimensions: usize,
}

impl SqliteChunkStore {
    /// Opens (or creates) the collection at `path` with vectors of
    /// `dimensions` and cosine distance.
    pub async fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self, RagError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| storage_err("open", err))?;

        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(err),
            }
        })
        .await
        .map_err(|err| storage_err("open", err))?;

        let store = Self { conn, dimensions };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Fixed vector dimension of the collection.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn ensure_schema(&self) -> Result<(), RagError> {
        let dimensions = self.dimensions;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS chunks (
                        id TEXT PRIMARY KEY,
                        source TEXT NOT NULL,
                        chunk_index INTEGER NOT NULL,
                        chunk TEXT NOT NULL,
                        last_updated TEXT NOT NULL,
                        allowed_roles TEXT NOT NULL,
                        file_in_storage TEXT,
                        display_name TEXT
                    )",
                    [],
                )?;
                conn.execute(
                    "CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)",
                    [],
                )?;
                conn.execute(
                    "CREATE INDEX IF NOT EXISTS idx_chunks_source_index
                     ON chunks(source, chunk_index)",
                    [],
                )?;
                conn.execute(
                    "CREATE INDEX IF NOT EXISTS idx_chunks_last_updated
                     ON chunks(last_updated)",
                    [],
                )?;
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS chunks_embeddings
                         USING vec0(id TEXT PRIMARY KEY, embedding float[{dimensions}])"
                    ),
                    [],
                )?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| storage_err("create collection", err))
    }

    fn register_sqlite_vec() -> Result<(), RagError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(|reason| storage_err("register extension", reason))
    }
}

fn storage_err(operation: &str, reason: impl std::fmt::Display) -> RagError {
    RagError::Storage {
        collection: COLLECTION.to_string(),
        operation: operation.to_string(),
        reason: reason.to_string(),
    }
}

fn row_to_record(row: ChunkRow) -> Result<ChunkRecord, RagError> {
    let allowed_roles: Vec<String> = serde_json::from_str(&row.roles_json).map_err(|err| {
        storage_err(
            "decode",
            format!("malformed allowed_roles for point '{}': {err}", row.id),
        )
    })?;
    let chunk_index = u32::try_from(row.chunk_index).map_err(|_| {
        storage_err(
            "decode",
            format!(
                "chunk_index {} out of range for point '{}'",
                row.chunk_index, row.id
            ),
        )
    })?;
    let upload = match (row.file_in_storage, row.display_name) {
        (Some(file_in_storage), Some(display_name)) => Some(UploadMeta {
            file_in_storage,
            display_name,
        }),
        _ => None,
    };

    Ok(ChunkRecord {
        point_id: row.id,
        source: row.source,
        chunk_index,
        chunk: row.chunk,
        last_updated: row.last_updated,
        allowed_roles,
        upload,
        vector: None,
    })
}

/// Serialized insert row, prepared outside the database closure so that
/// serialization failures surface as storage errors, not panics.
struct InsertRow {
    id: String,
    source: String,
    chunk_index: i64,
    chunk: String,
    last_updated: String,
    roles_json: String,
    file_in_storage: Option<String>,
    display_name: Option<String>,
    vector_json: String,
}

#[async_trait]
impl VectorStore for SqliteChunkStore {
    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), RagError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let Some(vector) = record.vector else {
                return Err(storage_err(
                    "upsert",
                    format!("record '{}' is missing its vector", record.point_id),
                ));
            };
            if vector.len() != self.dimensions {
                return Err(storage_err(
                    "upsert",
                    format!(
                        "record '{}' carries a {}-dimension vector, collection is {}",
                        record.point_id,
                        vector.len(),
                        self.dimensions
                    ),
                ));
            }
            let roles_json = serde_json::to_string(&record.allowed_roles)
                .map_err(|err| storage_err("upsert", err))?;
            let vector_json =
                serde_json::to_string(&vector).map_err(|err| storage_err("upsert", err))?;
            let (file_in_storage, display_name) = match record.upload {
                Some(meta) => (Some(meta.file_in_storage), Some(meta.display_name)),
                None => (None, None),
            };
            rows.push(InsertRow {
                id: record.point_id,
                source: record.source,
                chunk_index: i64::from(record.chunk_index),
                chunk: record.chunk,
                last_updated: record.last_updated,
                roles_json,
                file_in_storage,
                display_name,
                vector_json,
            });
        }

        // Point ids are fresh uuids and never reused, so the batch is a
        // plain transactional insert.
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                {
                    let mut chunk_stmt = tx.prepare(
                        "INSERT INTO chunks
                         (id, source, chunk_index, chunk, last_updated, allowed_roles,
                          file_in_storage, display_name)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    let mut embed_stmt = tx.prepare(
                        "INSERT INTO chunks_embeddings (id, embedding) VALUES (?1, vec_f32(?2))",
                    )?;
                    for row in &rows {
                        chunk_stmt.execute((
                            &row.id,
                            &row.source,
                            row.chunk_index,
                            &row.chunk,
                            &row.last_updated,
                            &row.roles_json,
                            &row.file_in_storage,
                            &row.display_name,
                        ))?;
                        embed_stmt.execute((&row.id, &row.vector_json))?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| storage_err("upsert", err))
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ScoredChunk>, RagError> {
        let embedding_json =
            serde_json::to_string(query_vector).map_err(|err| storage_err("search", err))?;
        let role: Option<String> = filter
            .and_then(SearchFilter::role)
            .map(str::to_string);
        let limit = top_k as i64;

        let rows: Vec<ChunkRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.source, c.chunk_index, c.chunk, c.last_updated,
                            c.allowed_roles, c.file_in_storage, c.display_name,
                            vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance
                     FROM chunks c
                     JOIN chunks_embeddings e ON c.id = e.id
                     WHERE ?2 IS NULL
                        OR EXISTS (SELECT 1 FROM json_each(c.allowed_roles)
                                   WHERE json_each.value = ?2)
                     ORDER BY distance ASC, c.id ASC
                     LIMIT ?3",
                )?;

                let mapped = stmt.query_map((&embedding_json, &role, limit), |row| {
                    Ok(ChunkRow {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        chunk_index: row.get(2)?,
                        chunk: row.get(3)?,
                        last_updated: row.get(4)?,
                        roles_json: row.get(5)?,
                        file_in_storage: row.get(6)?,
                        display_name: row.get(7)?,
                        distance: Some(row.get(8)?),
                    })
                })?;

                let mut rows = Vec::new();
                for row in mapped {
                    rows.push(row?);
                }
                Ok(rows)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| storage_err("search", err))?;

        rows.into_iter()
            .map(|row| {
                // Cosine distance in [0, 2]; similarity is 1 - distance.
                let score = row.distance.map(|d| 1.0 - d);
                Ok(ScoredChunk {
                    record: row_to_record(row)?,
                    score,
                })
            })
            .collect()
    }

    async fn lookup_exact(
        &self,
        source: &str,
        chunk_index: u32,
        role: &str,
    ) -> Result<Vec<ChunkRecord>, RagError> {
        let source = source.to_string();
        let role = role.to_string();
        let index = i64::from(chunk_index);

        let rows: Vec<ChunkRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, source, chunk_index, chunk, last_updated,
                            allowed_roles, file_in_storage, display_name
                     FROM chunks
                     WHERE source = ?1 AND chunk_index = ?2
                       AND EXISTS (SELECT 1 FROM json_each(allowed_roles)
                                   WHERE json_each.value = ?3)
                     LIMIT 1",
                )?;

                let mapped = stmt.query_map((&source, index, &role), |row| {
                    Ok(ChunkRow {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        chunk_index: row.get(2)?,
                        chunk: row.get(3)?,
                        last_updated: row.get(4)?,
                        roles_json: row.get(5)?,
                        file_in_storage: row.get(6)?,
                        display_name: row.get(7)?,
                        distance: None,
                    })
                })?;

                let mut rows = Vec::new();
                for row in mapped {
                    rows.push(row?);
                }
                Ok(rows)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| storage_err("lookup", err))?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn count(&self) -> Result<usize, RagError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error| storage_err("count", err))
    }
}
