use crate::error::{PipelineError, Result};
use duckdb::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A DuckDB connection released exactly once: by [`ScopedConnection::close`]
/// on the normal path, or by `Drop` on every other path.
pub struct ScopedConnection {
    conn: Option<Connection>,
    label: PathBuf,
}

impl ScopedConnection {
    /// Open (or create) the database file, creating its directory
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            PipelineError::Load(format!("Failed to open {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "DuckDB connection opened");

        Ok(Self {
            conn: Some(conn),
            label: path.to_path_buf(),
        })
    }

    pub fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| PipelineError::Load("Connection already closed".to_string()))
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Close now and surface any error from closing
    pub fn close(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| {
                PipelineError::Load(format!("Failed to close {}: {}", self.label.display(), e))
            }),
            None => Ok(()),
        }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err((_, e)) = conn.close() {
                warn!(path = %self.label.display(), error = %e, "Failed to close DuckDB connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_close_releases_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("crags.duckdb");

        let scoped = ScopedConnection::open(&path)?;
        scoped
            .connection()?
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
            .map_err(|e| PipelineError::Load(e.to_string()))?;
        scoped.close()?;

        let reopened = Connection::open(&path).map_err(|e| PipelineError::Load(e.to_string()))?;
        let count: i64 = reopened
            .query_row("SELECT count(*) FROM t", [], |row| row.get(0))
            .map_err(|e| PipelineError::Load(e.to_string()))?;
        assert_eq!(count, 1);
        Ok(())
    }

    #[test]
    fn test_drop_releases_on_early_exit() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("crags.duckdb");

        let failing = || -> Result<()> {
            let scoped = ScopedConnection::open(&path)?;
            scoped
                .connection()?
                .execute_batch("SELECT * FROM missing_table")
                .map_err(|e| PipelineError::Load(e.to_string()))?;
            scoped.close()
        };
        assert!(matches!(failing(), Err(PipelineError::Load(_))));

        // The file is free again
        let scoped = ScopedConnection::open(&path)?;
        assert!(scoped.is_open());
        scoped.close()
    }
}
