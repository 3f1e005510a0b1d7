//! Entry reads and writes.
//!
//! An entry is a response snapshot stored under a request key inside one
//! partition. Writing to a partition that does not exist creates it.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::hash::request_key;
use crate::Error;
use crate::exchange::{ProxyRequest, ProxyResponse, ResponseSource};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Store a response for a request, replacing any previous entry.
    pub async fn put(&self, partition: &str, request: &ProxyRequest, response: &ProxyResponse) -> Result<(), Error> {
        let partition = partition.to_string();
        let key = request_key(request);
        let url = request.url.to_string();
        let method = request.method.to_ascii_uppercase();
        let headers_json = serde_json::to_string(&response.headers)?;
        let status = response.status;
        let status_text = response.status_text.clone();
        let body = response.body.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
                    params![partition, now],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                        partition, key, url, method, status, status_text, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(partition, key) DO UPDATE SET
                        url = excluded.url,
                        method = excluded.method,
                        status = excluded.status,
                        status_text = excluded.status_text,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![partition, key, url, method, status, status_text, headers_json, body, now],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request in one partition.
    pub async fn match_in(&self, partition: &str, request: &ProxyRequest) -> Result<Option<ProxyResponse>, Error> {
        let partition = partition.to_string();
        let key = request_key(request);
        self.conn
            .call(move |conn| -> Result<Option<ProxyResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, status_text, headers_json, body
                     FROM entries WHERE partition = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![partition, key], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u16>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                });

                match result {
                    Ok((url, status, status_text, headers_json, body)) => {
                        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)?;
                        Ok(Some(ProxyResponse {
                            status,
                            status_text,
                            headers,
                            body,
                            url: Some(url),
                            source: ResponseSource::Cache,
                        }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a request across several partitions, first hit wins.
    pub async fn match_any(&self, partitions: &[String], request: &ProxyRequest) -> Result<Option<ProxyResponse>, Error> {
        for partition in partitions {
            if let Some(response) = self.match_in(partition, request).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    pub async fn entry_count(&self, partition: &str) -> Result<u64, Error> {
        let partition = partition.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE partition = ?1", params![partition], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(url: &str) -> ProxyRequest {
        ProxyRequest::get(Url::parse(url).unwrap())
    }

    fn response(body: &str) -> ProxyResponse {
        ProxyResponse::new(200, "OK")
            .with_header("Content-Type", "text/html")
            .with_body(body)
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://app.example.com/");

        db.put("app-critical-v2025-01-15", &req, &response("<html>home</html>"))
            .await
            .unwrap();

        let hit = db.match_in("app-critical-v2025-01-15", &req).await.unwrap().unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.text(), "<html>home</html>");
        assert_eq!(hit.content_type(), Some("text/html"));
        assert_eq!(hit.source, ResponseSource::Cache);
        assert_eq!(hit.url.as_deref(), Some("https://app.example.com/"));
    }

    #[tokio::test]
    async fn test_put_creates_partition() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("fresh", &request("https://app.example.com/a"), &response("a"))
            .await
            .unwrap();
        assert!(db.has_partition("fresh").await.unwrap());
        assert_eq!(db.entry_count("fresh").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_put_replaces_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://app.example.com/a");
        db.put("p", &req, &response("old")).await.unwrap();
        db.put("p", &req, &response("new")).await.unwrap();

        assert_eq!(db.entry_count("p").await.unwrap(), 1);
        assert_eq!(db.match_in("p", &req).await.unwrap().unwrap().text(), "new");
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.match_in("p", &request("https://app.example.com/none")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_match_any_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://app.example.com/logo.png");
        db.put("second", &req, &response("from second")).await.unwrap();
        db.put("first", &req, &response("from first")).await.unwrap();

        let partitions = vec!["first".to_string(), "second".to_string()];
        let hit = db.match_any(&partitions, &req).await.unwrap().unwrap();
        assert_eq!(hit.text(), "from first");
    }

    #[tokio::test]
    async fn test_delete_partition_drops_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let req = request("https://app.example.com/a");
        db.put("p", &req, &response("a")).await.unwrap();
        db.delete_partition("p").await.unwrap();

        assert!(db.match_in("p", &req).await.unwrap().is_none());
        assert_eq!(db.entry_count("p").await.unwrap(), 0);
    }
}
