//! SQLite-backed cache store.
//!
//! Lets a long-running host keep its namespaces across restarts. The router
//! only ever sees the [`CacheStore`] trait; the table layout is private to
//! this adapter.

use super::traits::{CacheStore, NamespaceMeta, StoreStats, StoredResponse};
use crate::error::{Result, SwError};
use crate::models::{
    HeaderMap, HeaderName, HeaderValue, RequestKey, Response, ResponseType, StatusCode,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// SQLite-based cache store.
///
/// Thread-safe via an internal mutex on the connection.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at the specified database path.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SwError::Io {
                message: format!("Failed to create cache directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| SwError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        // WAL for concurrent readers while a write is in flight
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| SwError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| SwError::Database {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| SwError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Namespaces, ordered by rowid (creation order)
            CREATE TABLE IF NOT EXISTS cache_namespaces (
                namespace TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            -- Response snapshots
            CREATE TABLE IF NOT EXISTS cache_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                status INTEGER NOT NULL,
                response_type TEXT NOT NULL,
                headers BLOB NOT NULL,
                body BLOB NOT NULL,
                cached_at TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .map_err(|e| SwError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }
}

fn ensure_namespace(conn: &Connection, namespace: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_namespaces (namespace, created_at) VALUES (?1, ?2)",
        params![namespace, Utc::now().to_rfc3339()],
    )
    .map_err(|e| SwError::Database {
        message: format!("Failed to create namespace {}: {}", namespace, e),
        source: Some(e),
    })?;
    Ok(())
}

fn corrupt(key: &RequestKey, detail: impl std::fmt::Display) -> SwError {
    SwError::Store {
        message: format!("Corrupt cache entry {}: {}", key, detail),
    }
}

/// Headers as an HTTP/1 header block, one `name: value\r\n` line each.
fn encode_headers(headers: &HeaderMap) -> Vec<u8> {
    let mut block = Vec::new();
    for (name, value) in headers {
        block.extend_from_slice(name.as_str().as_bytes());
        block.extend_from_slice(b": ");
        block.extend_from_slice(value.as_bytes());
        block.extend_from_slice(b"\r\n");
    }
    block
}

fn decode_headers(key: &RequestKey, block: &[u8]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for line in block.split(|b| *b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        let split = line
            .windows(2)
            .position(|w| w == b": ")
            .ok_or_else(|| corrupt(key, "header line without separator"))?;
        let name = HeaderName::from_bytes(&line[..split]).map_err(|e| corrupt(key, e))?;
        let value = HeaderValue::from_bytes(&line[split + 2..]).map_err(|e| corrupt(key, e))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn insert_entry(
    conn: &Connection,
    namespace: &str,
    key: &RequestKey,
    response: &Response,
) -> Result<()> {
    let headers = encode_headers(&response.headers);
    conn.execute(
        r#"
        INSERT OR REPLACE INTO cache_entries
        (namespace, key, status, response_type, headers, body, cached_at, size_bytes)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            namespace,
            key.as_str(),
            response.status.as_u16(),
            response.response_type.as_str(),
            headers,
            response.body.as_ref(),
            Utc::now().to_rfc3339(),
            response.body.len() as i64,
        ],
    )
    .map_err(|e| SwError::Database {
        message: format!("Failed to store {}: {}", key, e),
        source: Some(e),
    })?;
    Ok(())
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn open(&self, namespace: &str) -> Result<()> {
        let conn = self.lock()?;
        ensure_namespace(&conn, namespace)
    }

    async fn get(&self, namespace: &str, key: &RequestKey) -> Result<Option<StoredResponse>> {
        let conn = self.lock()?;

        let row: Option<(u16, String, Vec<u8>, Vec<u8>, String)> = conn
            .query_row(
                r#"
                SELECT status, response_type, headers, body, cached_at
                FROM cache_entries
                WHERE namespace = ?1 AND key = ?2
                "#,
                params![namespace, key.as_str()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| SwError::Database {
                message: format!("Failed to query cache entry: {}", e),
                source: Some(e),
            })?;

        let (status, response_type, headers, body, cached_at_str) = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let status = StatusCode::from_u16(status).map_err(|e| corrupt(key, e))?;
        let headers = decode_headers(key, &headers)?;
        let cached_at = DateTime::parse_from_rfc3339(&cached_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(StoredResponse {
            response: Response {
                status,
                response_type: ResponseType::parse(&response_type),
                headers,
                body: Bytes::from(body),
            },
            cached_at,
        }))
    }

    async fn put(&self, namespace: &str, key: &RequestKey, response: &Response) -> Result<()> {
        let conn = self.lock()?;
        ensure_namespace(&conn, namespace)?;
        insert_entry(&conn, namespace, key, response)
    }

    async fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|e| SwError::Database {
            message: format!("Failed to begin transaction: {}", e),
            source: Some(e),
        })?;

        ensure_namespace(&tx, namespace)?;
        for (key, response) in entries {
            insert_entry(&tx, namespace, key, response)?;
        }

        tx.commit().map_err(|e| SwError::Database {
            message: format!("Failed to commit {} entries: {}", entries.len(), e),
            source: Some(e),
        })?;

        debug!("Stored {} entries in namespace '{}'", entries.len(), namespace);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT namespace FROM cache_namespaces ORDER BY rowid")
            .map_err(|e| SwError::Database {
                message: format!("Failed to prepare namespace query: {}", e),
                source: Some(e),
            })?;

        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| SwError::Database {
                message: format!("Failed to list namespaces: {}", e),
                source: Some(e),
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(names)
    }

    async fn has_namespace(&self, namespace: &str) -> Result<bool> {
        let conn = self.lock()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM cache_namespaces WHERE namespace = ?1",
                params![namespace],
                |_| Ok(true),
            )
            .optional()
            .map_err(|e| SwError::Database {
                message: format!("Failed to check namespace: {}", e),
                source: Some(e),
            })?
            .unwrap_or(false);
        Ok(exists)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        let conn = self.lock()?;

        let entries = conn
            .execute(
                "DELETE FROM cache_entries WHERE namespace = ?1",
                params![namespace],
            )
            .map_err(|e| SwError::Database {
                message: format!("Failed to delete entries of {}: {}", namespace, e),
                source: Some(e),
            })?;

        let removed = conn
            .execute(
                "DELETE FROM cache_namespaces WHERE namespace = ?1",
                params![namespace],
            )
            .map_err(|e| SwError::Database {
                message: format!("Failed to delete namespace {}: {}", namespace, e),
                source: Some(e),
            })?;

        debug!("Deleted namespace '{}' ({} entries)", namespace, entries);

        Ok(removed > 0)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT n.namespace, COUNT(e.key), COALESCE(SUM(e.size_bytes), 0)
                FROM cache_namespaces n
                LEFT JOIN cache_entries e ON e.namespace = n.namespace
                GROUP BY n.namespace
                ORDER BY n.rowid
                "#,
            )
            .map_err(|e| SwError::Database {
                message: format!("Failed to prepare stats query: {}", e),
                source: Some(e),
            })?;

        let namespaces = stmt
            .query_map([], |row| {
                let namespace: String = row.get(0)?;
                let entry_count: i64 = row.get(1)?;
                let total_size_bytes: i64 = row.get(2)?;
                Ok(NamespaceMeta {
                    namespace,
                    entry_count: entry_count as usize,
                    total_size_bytes: total_size_bytes as u64,
                })
            })
            .map_err(|e| SwError::Database {
                message: format!("Failed to query stats: {}", e),
                source: Some(e),
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(StoreStats::from_namespaces(namespaces))
    }
}
