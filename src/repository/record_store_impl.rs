// ==========================================
// CSV 导入器 - SQLite 目标记录存储
// ==========================================
// 表: sections / fields / entries / entry_data
// 职责: RecordStore 实现 + 管理辅助（建模型、建字段、删字段、查记录）
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_in_memory_connection, open_sqlite_connection};
use crate::domain::{FieldDescriptor, NewRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::RecordStore;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SqliteRecordStore
// ==========================================
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// 打开（或创建）数据库并初始化表结构
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 内存数据库
    pub fn in_memory() -> RepositoryResult<Self> {
        let conn = open_in_memory_connection()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（会再次应用统一 PRAGMA 并建表，幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 共享连接（配置管理器等复用）
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 管理辅助 =====

    /// 创建数据模型，返回 ID
    pub fn create_section(&self, name: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute("INSERT INTO sections (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    /// 在数据模型下创建字段，返回字段 ID
    pub fn create_field(&self, section_id: i64, element_name: &str, label: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO fields (section_id, element_name, label) VALUES (?1, ?2, ?3)",
            params![section_id, element_name, label],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 删除字段（已有记录中的值保留）
    pub fn delete_field(&self, field_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM fields WHERE id = ?1", params![field_id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("field", field_id));
        }
        Ok(())
    }

    /// 删除数据模型（级联删除字段与记录）
    pub fn delete_section(&self, section_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM sections WHERE id = ?1", params![section_id])?;
        if affected == 0 {
            return Err(RepositoryError::not_found("section", section_id));
        }
        Ok(())
    }

    /// 全部数据模型 (id, name)
    pub fn list_sections(&self) -> RepositoryResult<Vec<(i64, String)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM sections ORDER BY id")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 数据模型下的记录数
    pub fn count_entries(&self, section_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE section_id = ?1",
            params![section_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 数据模型下的记录 ID（按创建顺序）
    pub fn entry_ids(&self, section_id: i64) -> RepositoryResult<Vec<i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT id FROM entries WHERE section_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![section_id], |row| row.get::<_, i64>(0))?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// 读取单条记录
    pub fn entry(&self, entry_id: i64) -> RepositoryResult<NewRecord> {
        let conn = self.get_conn()?;
        let mut record = conn
            .query_row(
                "SELECT section_id, author_id, creation_date, creation_date_gmt FROM entries WHERE id = ?1",
                params![entry_id],
                |row| {
                    Ok(NewRecord {
                        schema_id: row.get(0)?,
                        author_id: row.get(1)?,
                        creation_date: row.get(2)?,
                        creation_date_gmt: row.get(3)?,
                        values: BTreeMap::new(),
                    })
                },
            )
            .optional()?
            .ok_or_else(|| RepositoryError::not_found("entry", entry_id))?;

        let mut stmt =
            conn.prepare("SELECT element_name, value FROM entry_data WHERE entry_id = ?1")?;
        let rows = stmt.query_map(params![entry_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (name, value) = row?;
            record.values.insert(name, value);
        }
        Ok(record)
    }

    /// 读取记录的字段值
    pub fn entry_values(&self, entry_id: i64) -> RepositoryResult<BTreeMap<String, String>> {
        Ok(self.entry(entry_id)?.values)
    }
}

impl RecordStore for SqliteRecordStore {
    fn schema_exists(&self, schema_id: i64) -> RepositoryResult<bool> {
        Ok(self.schema_name(schema_id)?.is_some())
    }

    fn schema_name(&self, schema_id: i64) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let name = conn
            .query_row(
                "SELECT name FROM sections WHERE id = ?1",
                params![schema_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    fn fields_of(&self, schema_id: i64) -> RepositoryResult<Vec<FieldDescriptor>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, element_name, label FROM fields WHERE section_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![schema_id], |row| {
            Ok(FieldDescriptor {
                id: row.get(0)?,
                element_name: row.get(1)?,
                label: row.get(2)?,
            })
        })?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn field_exists(&self, field_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let exists = conn
            .query_row("SELECT 1 FROM fields WHERE id = ?1", params![field_id], |_| Ok(()))
            .optional()?
            .is_some();
        Ok(exists)
    }

    fn commit(&self, record: NewRecord) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO entries (section_id, author_id, creation_date, creation_date_gmt) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.schema_id,
                record.author_id,
                record.creation_date,
                record.creation_date_gmt
            ],
        )?;
        let entry_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO entry_data (entry_id, element_name, value) VALUES (?1, ?2, ?3)",
            )?;
            for (name, value) in &record.values {
                stmt.execute(params![entry_id, name, value])?;
            }
        }

        tx.commit()?;
        Ok(entry_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_and_fields() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let section = store.create_section("Articles").unwrap();
        let title = store.create_field(section, "title", "Title").unwrap();
        store.create_field(section, "body", "Body").unwrap();

        assert!(store.schema_exists(section).unwrap());
        assert!(!store.schema_exists(section + 100).unwrap());
        assert_eq!(store.schema_name(section).unwrap().as_deref(), Some("Articles"));

        let fields = store.fields_of(section).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].element_name, "title");

        assert!(store.field_exists(title).unwrap());
        store.delete_field(title).unwrap();
        assert!(!store.field_exists(title).unwrap());
        assert!(store.delete_field(title).unwrap_err().is_not_found());
    }

    #[test]
    fn test_commit_and_read_back() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let section = store.create_section("People").unwrap();

        let mut record = store.create_record(section, 9);
        record.creation_date = "2024-01-01 10:00:00".to_string();
        record.creation_date_gmt = "2024-01-01 02:00:00".to_string();
        record.set("name", "Ada");
        record.set("email", "ada@example.com");

        let id = store.commit(record.clone()).unwrap();
        assert_eq!(store.count_entries(section).unwrap(), 1);
        assert_eq!(store.entry(id).unwrap(), record);
    }

    #[test]
    fn test_commit_to_missing_section_fails() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let record = NewRecord::new(42, 1);
        assert!(store.commit(record).is_err());
    }

    #[test]
    fn test_delete_section_cascades() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let section = store.create_section("Tmp").unwrap();
        store.create_field(section, "a", "A").unwrap();
        store.delete_section(section).unwrap();

        assert!(!store.schema_exists(section).unwrap());
        assert!(store.fields_of(section).unwrap().is_empty());
    }
}
