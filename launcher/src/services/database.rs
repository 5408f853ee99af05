//! SQLite schema check with create-if-missing semantics

use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::Path;

use shared::{process_debug, process_info, ComponentId};

use crate::config::DatabaseSettings;
use crate::error::{LauncherError, LauncherResult};
use crate::traits::{DatabaseCheck, DatabaseStatus};

pub struct SqliteDatabaseCheck {
    settings: DatabaseSettings,
}

impl SqliteDatabaseCheck {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self { settings }
    }

    fn list_tables(conn: &Connection) -> LauncherResult<BTreeSet<String>> {
        let mut stmt =
            conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(names)
    }

    fn missing_tables(&self, tables: &BTreeSet<String>) -> Vec<String> {
        self.settings
            .required_tables
            .iter()
            .filter(|t| !tables.contains(*t))
            .cloned()
            .collect()
    }

    fn needs_schema(&self, tables: &BTreeSet<String>) -> bool {
        if self.settings.required_tables.is_empty() {
            tables.is_empty()
        } else {
            !self.missing_tables(tables).is_empty()
        }
    }

    fn apply_schema(conn: &Connection, schema_file: &Path) -> LauncherResult<()> {
        let sql = std::fs::read_to_string(schema_file).map_err(|e| {
            LauncherError::database(format!("cannot read schema {}: {e}", schema_file.display()))
        })?;
        conn.execute_batch(&sql)
            .map_err(|e| LauncherError::database(format!("schema {} failed: {e}", schema_file.display())))?;
        process_info!(ComponentId::Launcher, "🗄️ Applied schema {}", schema_file.display());
        Ok(())
    }

    /// Blocking body of the check
    pub fn ensure_schema_blocking(&self) -> LauncherResult<DatabaseStatus> {
        let path = &self.settings.path;
        let created_file = !path.exists();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LauncherError::database(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        let before = Self::list_tables(&conn)?;
        process_debug!(ComponentId::Launcher, "🗄️ {} has {} tables", path.display(), before.len());

        let mut tables = before.clone();
        if self.needs_schema(&before) {
            let schema_file = self
                .settings
                .schema_file
                .as_deref()
                .filter(|p| p.is_file())
                .ok_or_else(|| {
                    LauncherError::database(format!(
                        "schema missing in {} and no schema file to create it",
                        path.display()
                    ))
                })?;

            Self::apply_schema(&conn, schema_file)?;
            tables = Self::list_tables(&conn)?;

            let still_missing = self.missing_tables(&tables);
            if !still_missing.is_empty() {
                return Err(LauncherError::database(format!(
                    "tables still missing after schema: {}",
                    still_missing.join(", ")
                )));
            }
            if tables.is_empty() {
                return Err(LauncherError::database("schema file created no tables"));
            }
        }

        Ok(DatabaseStatus {
            path: path.clone(),
            created_file,
            created_tables: tables.difference(&before).cloned().collect(),
            tables: tables.into_iter().collect(),
        })
    }
}

#[async_trait]
impl DatabaseCheck for SqliteDatabaseCheck {
    async fn ensure_schema(&self) -> LauncherResult<DatabaseStatus> {
        let check = SqliteDatabaseCheck::new(self.settings.clone());
        tokio::task::spawn_blocking(move || check.ensure_schema_blocking())
            .await
            .map_err(|e| LauncherError::database(format!("database check task failed: {e}")))?
    }
}
