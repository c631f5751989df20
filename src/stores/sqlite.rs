//! SQLite-backed vector store using the `sqlite-vec` extension.
//!
//! Layout inside one database file (`chunks.sqlite` under the collection
//! directory): a `collections` registry, a `chunks` table holding text and
//! metadata, and a `chunk_embeddings` vec0 virtual table sharing rowids with
//! `chunks`. Nearest-neighbor queries use `vec_distance_cosine` ordered
//! ascending. The embedding dimensionality is fixed by the first insert;
//! later inserts with a different width fail at the SQL layer.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::{Arc, Once};

use tokio_rusqlite::{Connection, OptionalExtension, ffi, rusqlite};
use tracing::warn;

use super::{ChunkRecord, QueryHit, VectorStore};
use crate::embeddings::EmbeddingProvider;
use crate::types::RagError;

/// File name of the store's native database inside a collection directory.
pub const STORE_FILE: &str = "chunks.sqlite";

#[derive(Clone)]
pub struct SqliteVectorStore {
    conn: Connection,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl SqliteVectorStore {
    /// Open (or create) the database at `path` without an internal embedding
    /// provider; every inserted record must carry its own vector.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        Self::open_inner(path, None).await
    }

    /// Open with an internal embedding provider. Records inserted without a
    /// vector are embedded by the store, and [`VectorStore::query_text`]
    /// becomes available.
    pub async fn open_with_embedder(
        path: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RagError> {
        Self::open_inner(path, Some(embedder)).await
    }

    async fn open_inner(
        path: impl AsRef<Path>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Result<Self, RagError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;

        conn.call(|conn| -> Result<(), rusqlite::Error> {
            // Fails early when the extension did not load.
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS collections (
                     name TEXT PRIMARY KEY,
                     created_at TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS chunks (
                     id TEXT NOT NULL,
                     collection TEXT NOT NULL,
                     source TEXT NOT NULL,
                     doc_index INTEGER NOT NULL,
                     chunk_index INTEGER NOT NULL,
                     content TEXT NOT NULL,
                     metadata TEXT NOT NULL,
                     UNIQUE(collection, id)
                 );
                 CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection);",
            )?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        Ok(Self { conn, embedder })
    }

    /// Underlying connection, for diagnostics not covered by the trait.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, RagError> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let found = conn
                    .query_row(
                        "SELECT name FROM collections WHERE name = ?",
                        [&name],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(found.is_some())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}

#[async_trait::async_trait]
impl VectorStore for SqliteVectorStore {
    async fn create_collection(&self, name: &str) -> Result<(), RagError> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
                conn.execute(
                    "INSERT OR IGNORE INTO collections (name, created_at) VALUES (?, ?)",
                    [&name, &now],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn get_collection(&self, name: &str) -> Result<(), RagError> {
        if self.collection_exists(name).await? {
            Ok(())
        } else {
            Err(RagError::CollectionNotFound(name.to_string()))
        }
    }

    async fn get_or_create(&self, name: &str) -> Result<(), RagError> {
        match self.get_collection(name).await {
            Ok(()) => Ok(()),
            Err(RagError::CollectionNotFound(_)) => self.create_collection(name).await,
            Err(err) => Err(err),
        }
    }

    async fn insert_chunks(
        &self,
        collection: &str,
        records: Vec<ChunkRecord>,
    ) -> Result<usize, RagError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.get_collection(collection).await?;

        // Resolve embeddings and serialize them before entering the
        // connection closure; the provider call is async and may fail per
        // record, and the closure itself only deals in sqlite errors.
        let mut prepared: Vec<(ChunkRecord, String)> = Vec::with_capacity(records.len());
        let mut dims = 0usize;
        for record in records {
            let embedding = match (&record.embedding, &self.embedder) {
                (Some(embedding), _) => embedding.clone(),
                (None, Some(provider)) => match provider.embed(&record.content).await {
                    Ok(embedding) => embedding,
                    Err(err) => {
                        warn!(
                            chunk_id = %record.id,
                            source = %record.source,
                            error = %err,
                            "skipping chunk: embedding failed"
                        );
                        continue;
                    }
                },
                (None, None) => {
                    warn!(
                        chunk_id = %record.id,
                        source = %record.source,
                        "skipping chunk: no embedding supplied and store has no provider"
                    );
                    continue;
                }
            };
            dims = embedding.len();
            let embedding_json = serde_json::to_string(&embedding)
                .map_err(|err| RagError::Storage(err.to_string()))?;
            prepared.push((record, embedding_json));
        }

        if prepared.is_empty() {
            return Ok(0);
        }

        let collection = collection.to_string();
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE IF NOT EXISTS chunk_embeddings \
                         USING vec0(embedding float[{dims}])"
                    ),
                    [],
                )?;

                let tx = conn.transaction()?;
                let mut inserted = 0usize;
                for (record, embedding_json) in &prepared {
                    tx.execute(
                        "INSERT INTO chunks (id, collection, source, doc_index, chunk_index, content, metadata) \
                         VALUES (?, ?, ?, ?, ?, ?, ?)",
                        (
                            &record.id,
                            &collection,
                            &record.source,
                            record.doc_index as i64,
                            record.chunk_index as i64,
                            &record.content,
                            record.metadata.to_string(),
                        ),
                    )?;
                    let rowid = tx.last_insert_rowid();

                    tx.execute(
                        "INSERT INTO chunk_embeddings (rowid, embedding) VALUES (?, ?)",
                        (rowid, embedding_json),
                    )?;
                    inserted += 1;
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn query_embedding(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryHit>, RagError> {
        self.get_collection(collection).await?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        // An empty collection has no embeddings table yet; that is a valid
        // zero-hit query, not an error.
        if self.count(collection).await? == 0 {
            return Ok(Vec::new());
        }

        let embedding_json =
            serde_json::to_string(embedding).map_err(|err| RagError::Storage(err.to_string()))?;
        let collection = collection.to_string();

        self.conn
            .call(move |conn| -> Result<Vec<QueryHit>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.content, c.metadata, \
                     vec_distance_cosine(e.embedding, vec_f32(?1)) AS distance \
                     FROM chunks c \
                     JOIN chunk_embeddings e ON e.rowid = c.rowid \
                     WHERE c.collection = ?2 \
                     ORDER BY distance ASC \
                     LIMIT ?3",
                )?;

                let rows = stmt.query_map(
                    (&embedding_json, &collection, top_k as i64),
                    |row| {
                        let metadata: String = row.get(2)?;
                        Ok(QueryHit {
                            id: row.get(0)?,
                            content: row.get(1)?,
                            metadata: serde_json::from_str(&metadata)
                                .unwrap_or(serde_json::Value::Null),
                            distance: row.get(3)?,
                        })
                    },
                )?;

                let mut hits = Vec::new();
                for row in rows {
                    hits.push(row?);
                }
                Ok(hits)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn query_text(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<QueryHit>, RagError> {
        let Some(provider) = &self.embedder else {
            return Err(RagError::Embedding(
                "store has no embedding provider; use query_embedding".to_string(),
            ));
        };
        let embedding = provider.embed(text).await?;
        self.query_embedding(collection, &embedding, top_k).await
    }

    async fn count(&self, collection: &str) -> Result<usize, RagError> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM chunks WHERE collection = ?",
                    [&collection],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn chunk_ids(&self, collection: &str) -> Result<Vec<String>, RagError> {
        let collection = collection.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt =
                    conn.prepare("SELECT id FROM chunks WHERE collection = ? ORDER BY rowid")?;
                let rows = stmt.query_map([&collection], |row| row.get::<_, String>(0))?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                Ok(ids)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
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
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
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
        .map_err(RagError::Storage)
}
