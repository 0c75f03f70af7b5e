//! [`Store`] implementation for the SQLite cache.

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

use super::Store;
use super::connection::CacheDb;
use crate::{Error, RequestKey, Response};

type EntryRow = (String, i64, String, Vec<u8>);

fn parse_url(raw: &str) -> Result<Url, Error> {
    Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("stored url {raw}: {e}")))
}

fn ensure_generation(conn: &rusqlite::Connection, generation: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR IGNORE INTO generations (name, created_at, seq)
         SELECT ?1, ?2, COALESCE(MAX(seq), 0) + 1 FROM generations",
        params![generation, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

#[async_trait]
impl Store for CacheDb {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                ensure_generation(conn, &generation)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let generation = generation.to_string();
        let key_hash = key.hash();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<EntryRow>, Error> {
                let result = conn.query_row(
                    "SELECT response_url, status, headers_json, body
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                    params![generation, key_hash],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                );

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some((response_url, status, headers_json, body)) = row else {
            return Ok(None);
        };

        Ok(Some(Response {
            url: parse_url(&response_url)?,
            status: u16::try_from(status).map_err(|_| Error::InvalidInput(format!("stored status {status}")))?,
            headers: Response::headers_from_json(&headers_json)?,
            body: body.into(),
        }))
    }

    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let generation = generation.to_string();
        let key_hash = key.hash();
        let method = key.method.clone();
        let url = key.url.to_string();
        let response_url = response.url.to_string();
        let status = i64::from(response.status);
        let headers_json = response.headers_json()?;
        let body = response.body.to_vec();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_generation(&tx, &generation)?;
                tx.execute(
                    "INSERT INTO entries (
                        generation, key_hash, method, url, response_url,
                        status, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(generation, key_hash) DO UPDATE SET
                        response_url = excluded.response_url,
                        status = excluded.status,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![
                        generation,
                        key_hash,
                        method,
                        url,
                        response_url,
                        status,
                        headers_json,
                        body,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE generation = ?1", params![generation])?;
                let deleted = tx.execute("DELETE FROM generations WHERE name = ?1", params![generation])?;
                tx.commit()?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY seq ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self, generation: &str) -> Result<Vec<RequestKey>, Error> {
        let generation = generation.to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(String, String)>, Error> {
                let mut stmt =
                    conn.prepare("SELECT method, url FROM entries WHERE generation = ?1 ORDER BY method ASC, url ASC")?;
                let rows = stmt
                    .query_map(params![generation], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(method, url)| Ok(RequestKey { method, url: parse_url(&url)? }))
            .collect()
    }
}
