//! SQLite 기준선 저장소
//!
//! `baseline` 테이블 하나에 (page_name, link, hash_code)를 저장합니다.
//! `replace_all`은 단일 트랜잭션으로 전체를 교체합니다.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OpenFlags};

use super::BaselineStore;
use crate::crawler::PageRecord;

/// SQLite 기준선 저장소
pub struct SqliteBaselineStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteBaselineStore {
    /// 저장소 열기 (없으면 생성)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create baseline directory")?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open SQLite baseline")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS baseline (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                page_name TEXT NOT NULL,
                link TEXT NOT NULL,
                hash_code TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create baseline table")?;

        tracing::debug!("Baseline store initialized at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl BaselineStore for SqliteBaselineStore {
    fn load_all(&self) -> Result<Vec<PageRecord>> {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT page_name, link, hash_code FROM baseline ORDER BY seq")?;
        let records = stmt
            .query_map([], |row| {
                Ok(PageRecord {
                    name: row.get(0)?,
                    url: row.get(1)?,
                    content_hash: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read baseline rows")?;

        Ok(records)
    }

    fn replace_all(&self, records: &[PageRecord]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let tx = conn.transaction().context("Failed to begin transaction")?;
        tx.execute("DELETE FROM baseline", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO baseline (page_name, link, hash_code) VALUES (?1, ?2, ?3)",
            )?;
            for record in records {
                stmt.execute(params![record.name, record.url, record.content_hash])?;
            }
        }
        tx.commit().context("Failed to commit baseline")?;

        tracing::debug!("Replaced baseline with {} records", records.len());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(name: &str, hash: &str) -> PageRecord {
        PageRecord {
            name: name.to_string(),
            url: format!("https://example.edu/{}", name),
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = SqliteBaselineStore::open(&dir.path().join("baseline.db")).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_replace_all_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = SqliteBaselineStore::open(&dir.path().join("baseline.db")).unwrap();

        store.replace_all(&[record("a", "1"), record("b", "2")]).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record("a", "1"), record("b", "2")]);

        store.replace_all(&[record("c", "3")]).unwrap();
        assert_eq!(store.load_all().unwrap(), vec![record("c", "3")]);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("baseline.sqlite");

        SqliteBaselineStore::open(&path)
            .unwrap()
            .replace_all(&[record("home", "abc")])
            .unwrap();

        let reopened = SqliteBaselineStore::open(&path).unwrap();
        assert_eq!(reopened.load_all().unwrap(), vec![record("home", "abc")]);
    }
}
