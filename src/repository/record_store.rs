// ==========================================
// CSV 导入器 - 目标记录存储 Trait
// ==========================================
// 职责: 定义导入执行所需的目标数据模型/记录访问接口（不包含实现）
// 红线: 只做数据访问，不含映射规则
// ==========================================

use crate::domain::{FieldDescriptor, NewRecord};
use crate::repository::error::RepositoryResult;
use std::sync::Arc;

// ==========================================
// RecordStore Trait
// ==========================================
// 用途: 目标数据模型（section）与记录（entry）访问
// 实现者: SqliteRecordStore（使用 rusqlite）
pub trait RecordStore {
    /// 数据模型是否存在
    fn schema_exists(&self, schema_id: i64) -> RepositoryResult<bool>;

    /// 数据模型名称（不存在返回 None）
    fn schema_name(&self, schema_id: i64) -> RepositoryResult<Option<String>>;

    /// 数据模型的全部字段
    fn fields_of(&self, schema_id: i64) -> RepositoryResult<Vec<FieldDescriptor>>;

    /// 字段是否存在（不限数据模型）
    fn field_exists(&self, field_id: i64) -> RepositoryResult<bool>;

    /// 创建待提交记录
    fn create_record(&self, schema_id: i64, author_id: i64) -> NewRecord {
        NewRecord::new(schema_id, author_id)
    }

    /// 提交记录
    ///
    /// # 返回
    /// - Ok(i64): 新记录 ID
    fn commit(&self, record: NewRecord) -> RepositoryResult<i64>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn schema_exists(&self, schema_id: i64) -> RepositoryResult<bool> {
        (**self).schema_exists(schema_id)
    }

    fn schema_name(&self, schema_id: i64) -> RepositoryResult<Option<String>> {
        (**self).schema_name(schema_id)
    }

    fn fields_of(&self, schema_id: i64) -> RepositoryResult<Vec<FieldDescriptor>> {
        (**self).fields_of(schema_id)
    }

    fn field_exists(&self, field_id: i64) -> RepositoryResult<bool> {
        (**self).field_exists(field_id)
    }

    fn create_record(&self, schema_id: i64, author_id: i64) -> NewRecord {
        (**self).create_record(schema_id, author_id)
    }

    fn commit(&self, record: NewRecord) -> RepositoryResult<i64> {
        (**self).commit(record)
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn schema_exists(&self, schema_id: i64) -> RepositoryResult<bool> {
        (**self).schema_exists(schema_id)
    }

    fn schema_name(&self, schema_id: i64) -> RepositoryResult<Option<String>> {
        (**self).schema_name(schema_id)
    }

    fn fields_of(&self, schema_id: i64) -> RepositoryResult<Vec<FieldDescriptor>> {
        (**self).fields_of(schema_id)
    }

    fn field_exists(&self, field_id: i64) -> RepositoryResult<bool> {
        (**self).field_exists(field_id)
    }

    fn create_record(&self, schema_id: i64, author_id: i64) -> NewRecord {
        (**self).create_record(schema_id, author_id)
    }

    fn commit(&self, record: NewRecord) -> RepositoryResult<i64> {
        (**self).commit(record)
    }
}
