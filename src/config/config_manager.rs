// ==========================================
// CSV 导入器 - 配置管理器
// ==========================================
// 职责: 从 config_kv 表加载导入器配置，缺省键回落到默认值
// 存储: config_kv 表 (scope_id='global', key-value)
// ==========================================

use crate::config::importer_config::{parse_mode, ImporterConfig};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const WORKSPACE_ROOT: &str = "paths.workspace";
    pub const EXTENSIONS_ROOT: &str = "paths.extensions";
    pub const INSTALLED_COMPONENTS: &str = "extensions.installed";
    pub const FILE_MODE: &str = "write_mode.file";
    pub const DIRECTORY_MODE: &str = "write_mode.directory";
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    #[error("锁获取失败: {0}")]
    LockError(String),

    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let guard = conn.lock().map_err(|e| ConfigError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
            crate::db::init_schema(&guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| ConfigError::LockError(e.to_string()))?;

        conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| ConfigError::ConfigReadError {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// 写入（覆盖）global scope 的配置值
    pub fn set_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| ConfigError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照
    pub fn snapshot(&self) -> ConfigResult<HashMap<String, String>> {
        let conn = self.conn.lock().map_err(|e| ConfigError::LockError(e.to_string()))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut map = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// 加载导入器配置
    ///
    /// 缺省键使用 `base` 中的值；格式错误的值返回 ConfigValueError
    pub fn load_importer_config(&self, base: ImporterConfig) -> ConfigResult<ImporterConfig> {
        let mut config = base;

        if let Some(value) = self.get_value(config_keys::WORKSPACE_ROOT)? {
            config.workspace_root = PathBuf::from(value.trim());
        }
        if let Some(value) = self.get_value(config_keys::EXTENSIONS_ROOT)? {
            config.extensions_root = PathBuf::from(value.trim());
        }
        if let Some(value) = self.get_value(config_keys::INSTALLED_COMPONENTS)? {
            config.installed_components = serde_json::from_str::<Vec<String>>(&value).map_err(|e| {
                ConfigError::ConfigValueError {
                    key: config_keys::INSTALLED_COMPONENTS.to_string(),
                    value: value.clone(),
                    message: e.to_string(),
                }
            })?;
        }
        if let Some(value) = self.get_value(config_keys::FILE_MODE)? {
            config.file_mode = Self::mode_value(config_keys::FILE_MODE, &value)?;
        }
        if let Some(value) = self.get_value(config_keys::DIRECTORY_MODE)? {
            config.directory_mode = Self::mode_value(config_keys::DIRECTORY_MODE, &value)?;
        }

        debug!(
            workspace = %config.workspace_root.display(),
            components = config.installed_components.len(),
            "导入器配置已加载"
        );
        Ok(config)
    }

    fn mode_value(key: &str, value: &str) -> ConfigResult<u32> {
        parse_mode(value).ok_or_else(|| ConfigError::ConfigValueError {
            key: key.to_string(),
            value: value.to_string(),
            message: "期望八进制权限位，例如 0644".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_connection;

    fn manager() -> ConfigManager {
        let conn = open_in_memory_connection().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_no_keys() {
        let manager = manager();
        let base = ImporterConfig::new("/srv/workspace");
        let config = manager.load_importer_config(base.clone()).unwrap();
        assert_eq!(config, base);
    }

    #[test]
    fn test_overrides_from_config_kv() {
        let manager = manager();
        manager.set_value(config_keys::WORKSPACE_ROOT, "/data/ws").unwrap();
        manager.set_value(config_keys::INSTALLED_COMPONENTS, r#"["blog","shop"]"#).unwrap();
        manager.set_value(config_keys::FILE_MODE, "0600").unwrap();
        manager.set_value(config_keys::DIRECTORY_MODE, "0700").unwrap();

        let config = manager
            .load_importer_config(ImporterConfig::new("/srv/workspace"))
            .unwrap();

        assert_eq!(config.workspace_root, PathBuf::from("/data/ws"));
        assert_eq!(config.installed_components, vec!["blog", "shop"]);
        assert_eq!(config.file_mode, 0o600);
        assert_eq!(config.directory_mode, 0o700);
    }

    #[test]
    fn test_set_value_overwrites() {
        let manager = manager();
        manager.set_value("k", "1").unwrap();
        manager.set_value("k", "2").unwrap();
        assert_eq!(manager.get_value("k").unwrap(), Some("2".to_string()));
        assert_eq!(manager.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_mode_is_value_error() {
        let manager = manager();
        manager.set_value(config_keys::FILE_MODE, "rw-r--r--").unwrap();

        let result = manager.load_importer_config(ImporterConfig::new("/srv/workspace"));
        assert!(matches!(result, Err(ConfigError::ConfigValueError { .. })));
    }
}
