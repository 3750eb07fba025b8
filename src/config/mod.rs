// ==========================================
// CSV 导入器 - 配置层
// ==========================================
// 职责: 导入器配置（搜索根/工作区/权限位），支持 config_kv 覆写
// ==========================================

pub mod config_manager;
pub mod importer_config;

// 重导出核心类型
pub use config_manager::{config_keys, ConfigError, ConfigManager, ConfigResult};
pub use importer_config::{default_workspace_root, ImporterConfig, IMPORTERS_SUBDIR};
