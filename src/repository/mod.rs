// ==========================================
// CSV 导入器 - 仓储层
// ==========================================
// 红线: Repository 不含映射/执行逻辑
// ==========================================
// 职责:
// - 导入定义的文件存储（DefinitionStore）
// - 目标数据模型/记录访问（RecordStore）
// 约束: 所有查询使用参数化
// ==========================================

pub mod artifact_codec;
pub mod definition_store;
pub mod error;
pub mod fs_ops;
pub mod record_store;
pub mod record_store_impl;

pub use artifact_codec::{artifact_file_name, handle_from_file_name};
pub use definition_store::DefinitionStore;
pub use error::{RepositoryError, RepositoryResult};
pub use record_store::RecordStore;
pub use record_store_impl::SqliteRecordStore;
