//! Open the store database.

use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::{SCHEMA, WAL_PRAGMAS};

/// Background runs and the CLI may share one file; writers wait this long on a locked DB.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn prepare(conn: &Connection, file_backed: bool) -> rusqlite::Result<()> {
    if file_backed {
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.execute_batch(WAL_PRAGMAS)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
    }
    conn.execute_batch(SCHEMA)
}

/// Open or create the store DB at `path`. Schema creation is idempotent.
pub fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    prepare(&conn, true)?;
    Ok(conn)
}

/// Same schema, no WAL. Used by tests.
pub fn open_connection_in_memory() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn, false)?;
    Ok(conn)
}
