use rig::OneOrMany;
use rig::embeddings::{Embedding, EmbeddingModel};
use rig_sqlite::{Column, ColumnValue, SqliteVectorStore, SqliteVectorStoreTable};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;
use tokio_rusqlite::{Connection, ffi};

use super::{IndexedChunk, VectorBackend};
use crate::types::AssistantError;

/// Row shape of the `chunks` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredChunk {
    pub id: String,
    pub source: String,
    #[serde(deserialize_with = "deserialize_chunk_index")]
    pub chunk_index: usize,
    pub content: String,
}

impl SqliteVectorStoreTable for StoredChunk {
    fn name() -> &'static str {
        "chunks"
    }

    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", "TEXT PRIMARY KEY"),
            Column::new("source", "TEXT").indexed(),
            Column::new("chunk_index", "TEXT"),
            Column::new("content", "TEXT"),
        ]
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn column_values(&self) -> Vec<(&'static str, Box<dyn ColumnValue>)> {
        vec![
            ("id", Box::new(self.id.clone())),
            ("source", Box::new(self.source.clone())),
            ("chunk_index", Box::new(self.chunk_index.to_string())),
            ("content", Box::new(self.content.clone())),
        ]
    }
}

// chunk_index is stored as TEXT; accept either representation on the way out.
fn deserialize_chunk_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Num(value) => usize::try_from(value)
            .map_err(|_| de::Error::custom(format!("chunk_index {value} does not fit in usize"))),
        Repr::Text(text) => text.parse::<usize>().map_err(|err| {
            de::Error::custom(format!("unable to parse chunk_index '{text}': {err}"))
        }),
    }
}

impl From<IndexedChunk> for StoredChunk {
    fn from(record: IndexedChunk) -> Self {
        StoredChunk {
            id: record.id,
            source: record.source,
            chunk_index: record.chunk_index,
            content: record.content,
        }
    }
}

impl From<StoredChunk> for IndexedChunk {
    fn from(row: StoredChunk) -> Self {
        IndexedChunk {
            id: row.id,
            source: row.source,
            chunk_index: row.chunk_index,
            content: row.content,
        }
    }
}

/// SQLite-backed chunk store with vector search via `sqlite-vec`.
#[derive(Clone)]
pub struct SqliteChunkStore<E>
where
    E: EmbeddingModel + 'static,
{
    inner: SqliteVectorStore<E, StoredChunk>,
    /// Separate connection handle for direct queries not supported by
    /// rig-sqlite. This is a clone of the connection used by the inner store.
    conn: Connection,
}

impl<E> SqliteChunkStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    /// Opens (creating if absent) the database at `path`.
    pub async fn open(path: impl AsRef<Path>, model: &E) -> Result<Self, AssistantError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| AssistantError::Index(err.to_string()))?;
        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Rusqlite(err)),
            }
        })
        .await
        .map_err(|err| AssistantError::Index(err.to_string()))?;
        // Clone connection for direct access before moving into store
        let conn_for_queries = conn.clone();
        let store = SqliteVectorStore::new(conn, model)
            .await
            .map_err(|err| AssistantError::Index(err.to_string()))?;
        Ok(Self {
            inner: store,
            conn: conn_for_queries,
        })
    }

    fn register_sqlite_vec() -> Result<(), AssistantError> {
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
            .map_err(AssistantError::Index)
    }

    /// Get the underlying connection for direct queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait::async_trait]
impl<E> VectorBackend for SqliteChunkStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    async fn insert_chunks(
        &self,
        chunks: Vec<(IndexedChunk, Vec<f32>)>,
    ) -> Result<(), AssistantError> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut rows = Vec::with_capacity(chunks.len());
        for (record, embedding) in chunks {
            let converted: Vec<f64> = embedding.into_iter().map(|value| value as f64).collect();
            let embed = Embedding {
                document: record.content.clone(),
                vec: converted,
            };
            rows.push((StoredChunk::from(record), OneOrMany::one(embed)));
        }
        self.inner
            .add_rows(rows)
            .await
            .map_err(|err| AssistantError::Index(err.to_string()))?;
        Ok(())
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(IndexedChunk, f32)>, AssistantError> {
        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| AssistantError::Index(err.to_string()))?;
        let conn = self.connection();

        conn.call(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT c.id, c.source, c.chunk_index, c.content, \
                     vec_distance_cosine(e.embedding, vec_f32(?)) AS distance \
                     FROM chunks AS c \
                     JOIN chunks_embeddings AS e ON e.rowid = c.rowid \
                     ORDER BY distance ASC \
                     LIMIT {}",
                    top_k
                ))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

            let rows = stmt
                .query_map([&embedding_json], |row| {
                    let chunk = IndexedChunk {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        chunk_index: row.get::<_, String>(2)?.parse().unwrap_or(0),
                        content: row.get(3)?,
                    };
                    let distance: f32 = row.get(4)?;
                    // Cosine distance to similarity.
                    Ok((chunk, 1.0 - distance))
                })
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
            }
            Ok(results)
        })
        .await
        .map_err(|err| AssistantError::Index(err.to_string()))
    }

    async fn sample(&self, limit: usize) -> Result<Vec<IndexedChunk>, AssistantError> {
        let conn = self.connection();

        conn.call(move |conn| {
            let mut stmt = conn
                .prepare("SELECT id, source, chunk_index, content FROM chunks LIMIT ?")
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

            let rows = stmt
                .query_map([limit as i64], |row| {
                    Ok(IndexedChunk {
                        id: row.get(0)?,
                        source: row.get(1)?,
                        chunk_index: row.get::<_, String>(2)?.parse().unwrap_or(0),
                        content: row.get(3)?,
                    })
                })
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
            }
            Ok(results)
        })
        .await
        .map_err(|err| AssistantError::Index(err.to_string()))
    }

    async fn count(&self) -> Result<usize, AssistantError> {
        let conn = self.connection();

        conn.call(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(count as usize)
        })
        .await
        .map_err(|err| AssistantError::Index(err.to_string()))
    }
}
