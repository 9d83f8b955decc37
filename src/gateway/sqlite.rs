use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Transaction};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{parse_markers, GatewayError, PersistenceGateway};
use crate::point::{Point, PointSequence};
use crate::utils;

/* One row per user, `markers` is the JSON array the frontend sends us
(`[{"lat":..,"lng":..}, ...]`). The store treats it as an opaque blob and only
parses it when loading.

`user_id` is unique so saves are upserts. `load` still concatenates every row
it finds for the user, that is what the gateway contract promises.
*/

pub const DB_FILE_NAME: &str = "drawings.db";

#[allow(clippy::type_complexity)]
fn open_db_and_run_migration(
    conn: &mut Connection,
    migrations: &[&dyn Fn(&Transaction) -> Result<()>],
) -> Result<()> {
    let tx = conn.transaction()?;

    let version = utils::db::init_metadata_and_get_version(&tx)? as usize;
    let target_version = migrations.len();
    debug!(
        "[sqlite_gateway] current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, migration) in migrations.iter().enumerate().skip(version) {
                info!("[sqlite_gateway] running migration for version: {}", i + 1);
                migration(&tx)?;
            }
            utils::db::set_version_in_metadata(&tx, target_version as i32)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(())
}

fn create_drawing_table(tx: &Transaction) -> Result<()> {
    let sql = "
    CREATE TABLE drawing (
        id          INTEGER PRIMARY KEY AUTOINCREMENT
                            NOT NULL,
        user_id     TEXT    NOT NULL
                            UNIQUE,
        markers     TEXT    NOT NULL,
        updated_at  INTEGER NOT NULL -- unix timestamp in seconds
    );
    ";
    for s in sql_split::split(sql) {
        tx.execute(&s, ())?;
    }
    Ok(())
}

pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    pub fn open(support_dir: &str) -> Result<SqliteGateway> {
        debug!("[sqlite_gateway] opening {} in {}", DB_FILE_NAME, support_dir);
        let conn = Connection::open(Path::new(support_dir).join(DB_FILE_NAME))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<SqliteGateway> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<SqliteGateway> {
        open_db_and_run_migration(&mut conn, &[&create_drawing_table])?;
        Ok(SqliteGateway {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    /// Write the raw `markers` column, bypassing serialization.
    pub fn put_raw(&self, user_id: &str, markers_json: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO drawing (user_id, markers, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET markers = excluded.markers, updated_at = excluded.updated_at;",
            (user_id, markers_json, Utc::now().timestamp()),
        )?;
        Ok(())
    }

    pub fn list_users(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut query = conn.prepare("SELECT DISTINCT user_id FROM drawing ORDER BY user_id;")?;
        let mut users = Vec::new();
        for row in query.query_map((), |row| row.get(0))? {
            users.push(row?);
        }
        Ok(users)
    }

    pub fn flush(&self) -> Result<()> {
        self.conn()?.cache_flush()?;
        Ok(())
    }

    fn load_rows(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut query = conn.prepare("SELECT markers FROM drawing WHERE user_id = ?1 ORDER BY id;")?;
        let mut rows = Vec::new();
        for row in query.query_map([user_id], |row| row.get(0))? {
            rows.push(row?);
        }
        Ok(rows)
    }
}

impl PersistenceGateway for SqliteGateway {
    fn save(&self, user_id: &str, markers: &[Point]) -> Result<(), GatewayError> {
        let markers_json = serde_json::to_string(markers).map_err(anyhow::Error::from)?;
        self.put_raw(user_id, &markers_json)?;
        debug!(
            "[sqlite_gateway] saved {} markers for user {}",
            markers.len(),
            user_id
        );
        Ok(())
    }

    fn load(&self, user_id: &str) -> Result<PointSequence, GatewayError> {
        let rows = self.load_rows(user_id)?;
        if rows.is_empty() {
            return Err(GatewayError::NotFound(user_id.to_string()));
        }
        let mut markers = Vec::new();
        for row in rows {
            markers.extend(parse_markers(user_id, &row)?);
        }
        Ok(markers)
    }
}
