//! SQLite implementation of the ChainStore trait.
//!
//! This is the persistent storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use clustersync_core::{
    decode_header, encode_header, validate_block_body, Block, BlockBody, BlockHash, Header,
    SealValidator, ValidationError,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ChainStore, InsertResult};

/// SQLite-based chain store.
///
/// Thread-safe via an internal Mutex. All database work runs on the blocking
/// pool so the async runtime is never stalled by disk I/O.
pub struct SqliteChainStore {
    conn: Arc<Mutex<Connection>>,
    validator: Arc<dyn SealValidator>,
}

impl SqliteChainStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>, validator: Arc<dyn SealValidator>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            validator,
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory(validator: Arc<dyn SealValidator>) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            validator,
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn encode_body(body: &BlockBody) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(body, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_body(bytes: &[u8]) -> Result<BlockBody> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_stored_header(bytes: &[u8]) -> Result<Header> {
    decode_header(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn load_header(conn: &Connection, hash: &BlockHash) -> Result<Option<Header>> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT header FROM blocks WHERE hash = ?1",
            params![hash.0.as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    bytes.map(|b| decode_stored_header(&b)).transpose()
}

fn block_exists(conn: &Connection, hash: &BlockHash) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM blocks WHERE hash = ?1)",
        params![hash.0.as_slice()],
        |row| row.get(0),
    )?;
    Ok(exists)
}

#[async_trait]
impl ChainStore for SqliteChainStore {
    async fn has_block(&self, hash: &BlockHash) -> Result<bool> {
        let hash = *hash;
        self.blocking(move |conn| block_exists(conn, &hash)).await
    }

    async fn current_header(&self) -> Result<Header> {
        self.blocking(|conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT b.header FROM chain_tip t JOIN blocks b ON b.hash = t.hash
                     WHERE t.id = 0",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            match bytes {
                Some(b) => decode_stored_header(&b),
                None => Err(StoreError::Empty),
            }
        })
        .await
    }

    fn validate_seal(&self, header: &Header) -> std::result::Result<(), ValidationError> {
        self.validator.validate_seal(header)
    }

    async fn add_block(&self, block: &Block) -> Result<InsertResult> {
        validate_block_body(block)?;
        self.validator.validate_seal(&block.header)?;

        let hash = block.hash();
        let number = block.number();
        let stored_number =
            i64::try_from(number).map_err(|_| StoreError::HeightOutOfRange(number))?;
        let parent = block.header.parent_hash;
        let genesis = block.header.is_genesis();
        let header_bytes = encode_header(&block.header);
        let body_bytes = encode_body(&block.body)?;

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            if block_exists(&tx, &hash)? {
                return Ok(InsertResult::AlreadyExists);
            }
            if !genesis && !block_exists(&tx, &parent)? {
                return Err(StoreError::MissingParent {
                    hash,
                    parent,
                    number,
                });
            }

            tx.execute(
                "INSERT INTO blocks (hash, number, parent_hash, header, body, stored_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    hash.0.as_slice(),
                    stored_number,
                    parent.0.as_slice(),
                    header_bytes,
                    body_bytes,
                    now_millis(),
                ],
            )?;

            let tip_number: Option<i64> = tx
                .query_row(
                    "SELECT b.number FROM chain_tip t JOIN blocks b ON b.hash = t.hash
                     WHERE t.id = 0",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            if tip_number.map_or(true, |tip| stored_number > tip) {
                tx.execute(
                    "INSERT INTO chain_tip (id, hash) VALUES (0, ?1)
                     ON CONFLICT(id) DO UPDATE SET hash = excluded.hash",
                    params![hash.0.as_slice()],
                )?;
            }

            tx.commit()?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_block(&self, hash: &BlockHash) -> Result<Option<Block>> {
        let hash = *hash;
        self.blocking(move |conn| {
            let row: Option<(Vec<u8>, Vec<u8>)> = conn
                .query_row(
                    "SELECT header, body FROM blocks WHERE hash = ?1",
                    params![hash.0.as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((header, body)) => Ok(Some(Block::new(
                    decode_stored_header(&header)?,
                    decode_body(&body)?,
                ))),
                None => Ok(None),
            }
        })
        .await
    }

    async fn get_header(&self, hash: &BlockHash) -> Result<Option<Header>> {
        let hash = *hash;
        self.blocking(move |conn| load_header(conn, &hash)).await
    }
}

fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ChainStoreExt;
    use bytes::Bytes;
    use clustersync_core::{AuthoritySeal, ChainId, Keypair};
    use tempfile::tempdir;

    fn chain(keypair: &Keypair, len: u64) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut parent = BlockHash::ZERO;
        for number in 0..len {
            let body = BlockBody::Minor {
                transactions: vec![Bytes::from(format!("tx-{}", number))],
            };
            let block = Block::sealed(ChainId::Shard(2), number, parent, 1000, body, keypair);
            parent = block.hash();
            blocks.push(block);
        }
        blocks
    }

    #[tokio::test]
    async fn test_sqlite_store_basic() {
        let store = SqliteChainStore::open_memory(Arc::new(AuthoritySeal::open())).unwrap();
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let blocks = chain(&keypair, 3);

        for block in &blocks {
            assert_eq!(store.add_block(block).await.unwrap(), InsertResult::Inserted);
        }

        assert!(store.has_block(&blocks[1].hash()).await.unwrap());
        assert_eq!(store.current_header().await.unwrap(), blocks[2].header);
        assert_eq!(store.get_block(&blocks[1].hash()).await.unwrap(), Some(blocks[1].clone()));
    }

    #[tokio::test]
    async fn test_sqlite_store_idempotent() {
        let store = SqliteChainStore::open_memory(Arc::new(AuthoritySeal::open())).unwrap();
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let blocks = chain(&keypair, 1);

        assert_eq!(store.add_block(&blocks[0]).await.unwrap(), InsertResult::Inserted);
        assert_eq!(store.add_block(&blocks[0]).await.unwrap(), InsertResult::AlreadyExists);
    }

    #[tokio::test]
    async fn test_sqlite_missing_parent() {
        let store = SqliteChainStore::open_memory(Arc::new(AuthoritySeal::open())).unwrap();
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let blocks = chain(&keypair, 2);

        assert!(matches!(
            store.add_block(&blocks[1]).await,
            Err(StoreError::MissingParent { .. })
        ));
        assert!(matches!(store.current_header().await, Err(StoreError::Empty)));
    }

    #[tokio::test]
    async fn test_sqlite_rejects_unrepresentable_height() {
        let store = SqliteChainStore::open_memory(Arc::new(AuthoritySeal::open())).unwrap();
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let blocks = chain(&keypair, 2);
        for block in &blocks {
            store.add_block(block).await.unwrap();
        }

        let body = BlockBody::Minor {
            transactions: Vec::new(),
        };
        let towering = Block::sealed(
            ChainId::Shard(2),
            u64::MAX,
            blocks[1].hash(),
            1000,
            body,
            &keypair,
        );

        assert!(matches!(
            store.add_block(&towering).await,
            Err(StoreError::HeightOutOfRange(u64::MAX))
        ));
        assert!(!store.has_block(&towering.hash()).await.unwrap());
        assert_eq!(store.current_header().await.unwrap(), blocks[1].header);
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chain.db");
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let blocks = chain(&keypair, 4);

        {
            let store = SqliteChainStore::open(&path, Arc::new(AuthoritySeal::open())).unwrap();
            for block in &blocks {
                store.add_block(block).await.unwrap();
            }
        }

        let store = SqliteChainStore::open(&path, Arc::new(AuthoritySeal::open())).unwrap();
        assert_eq!(store.current_header().await.unwrap().number, 3);
        let headers = store.headers_descending(blocks[3].hash(), 10).await.unwrap();
        assert_eq!(headers.len(), 4);
    }
}
