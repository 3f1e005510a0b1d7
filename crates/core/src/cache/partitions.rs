//! Partition management.
//!
//! A partition is a named bucket of entries. Partitions are created lazily by
//! `open_partition` or the first write, and deleting one removes its entries.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Create the partition if it does not exist yet.
    pub async fn open_partition(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM partitions WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every partition, in creation order.
    pub async fn partition_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a partition and all of its entries.
    ///
    /// Returns false if the partition did not exist.
    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE partition = ?1", params![name])?;
                let deleted = tx.execute("DELETE FROM partitions WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every partition regardless of generation.
    ///
    /// Returns the number of partitions deleted.
    pub async fn delete_all_partitions(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries", [])?;
                let deleted = tx.execute("DELETE FROM partitions", [])?;
                tx.commit()?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use crate::CacheDb;

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("app-static-v2025-01-15").await.unwrap();
        db.open_partition("app-static-v2025-01-15").await.unwrap();

        assert_eq!(db.partition_names().await.unwrap(), vec!["app-static-v2025-01-15".to_string()]);
        assert!(db.has_partition("app-static-v2025-01-15").await.unwrap());
        assert!(!db.has_partition("app-dynamic-v2025-01-15").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_partition("a").await.unwrap();
        db.open_partition("b").await.unwrap();

        assert!(db.delete_partition("a").await.unwrap());
        assert!(!db.delete_partition("a").await.unwrap());
        assert_eq!(db.partition_names().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_all_partitions() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["a", "b", "c"] {
            db.open_partition(name).await.unwrap();
        }

        assert_eq!(db.delete_all_partitions().await.unwrap(), 3);
        assert!(db.partition_names().await.unwrap().is_empty());
    }
}
