// ==========================================
// CSV 导入器 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 用途: 执行期追加到调用方错误收集器的每条消息都由此渲染
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入执行错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 结构性错误（终止本次执行）=====
    #[error("导入定义未设置目标数据模型")]
    SchemaNotSet,

    #[error("目标数据模型已不存在: {id}:{name}")]
    SchemaMissing { id: i64, name: String },

    #[error("导入定义未设置源文件")]
    SourceNotSet,

    #[error("无法打开 CSV 文件进行导入: {path}")]
    SourceUnreadable { path: String },

    #[error("导入定义没有任何列映射")]
    NoMappings,

    #[error("目标字段已不存在: {field_id}")]
    FieldMissing { field_id: i64 },

    // ===== 行级错误（继续执行）=====
    #[error("无法从第 {row} 行的第 {column} 列取值，文件: {path}")]
    ColumnMissing {
        column: usize,
        row: usize,
        path: String,
    },

    #[error("读取第 {row} 行失败，文件: {path}: {message}")]
    RowReadFailed {
        row: usize,
        path: String,
        message: String,
    },

    #[error("第 {row} 行记录提交失败: {message}")]
    CommitFailed { row: usize, message: String },

    // ===== 协作方错误 =====
    #[error("目标存储访问失败: {0}")]
    Repository(#[from] RepositoryError),
}

impl ImportError {
    /// 是否为终止执行的结构性错误
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ImportError::ColumnMissing { .. } | ImportError::CommitFailed { .. }
        )
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let msg = ImportError::SchemaMissing { id: 7, name: "Articles".to_string() }.to_string();
        assert!(msg.contains('7') && msg.contains("Articles"));

        let msg = ImportError::ColumnMissing {
            column: 4,
            row: 2,
            path: "/tmp/data.csv".to_string(),
        }
        .to_string();
        assert!(msg.contains('4') && msg.contains('2') && msg.contains("/tmp/data.csv"));
    }

    #[test]
    fn test_fatality() {
        assert!(ImportError::FieldMissing { field_id: 1 }.is_fatal());
        assert!(!ImportError::ColumnMissing { column: 0, row: 0, path: String::new() }.is_fatal());
    }
}
