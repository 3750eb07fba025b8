// ==========================================
// CSV 导入器 - 领域模型层
// ==========================================
// 职责: 定义导入定义、目标字段、待提交记录
// 红线: 不含数据访问逻辑,不含执行逻辑
// ==========================================

pub mod definition;
pub mod record;

// 重导出核心类型
pub use definition::{derive_handle, Author, ImportDefinition, Mapping, SchemaRef, SourceFile};
pub use record::{FieldDescriptor, NewRecord, RECORD_TIMESTAMP_FORMAT};
