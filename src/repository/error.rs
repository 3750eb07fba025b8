// ==========================================
// CSV 导入器 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - 发现缺口（NotFound）: 视为“不存在”，不是存储错误
// - 存储错误（I/O）: 目录不可写、文件移动失败、定义写入失败、回滚失败
// - 目标存储错误: SQLite 访问
// ==========================================

use std::path::PathBuf;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 发现缺口 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== 定义存储错误 =====
    #[error("导入定义不完整，无法保存: {0}")]
    IncompleteDefinition(String),

    #[error("无法保存导入定义，路径不可写: {}", path.display())]
    DirectoryNotWritable {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("移动源文件失败: {} -> {}: {source}", from.display(), to.display())]
    FileMove {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法写入导入定义文件: {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("无法写入导入定义文件（源文件已回滚至 {}）: {message}", original.display())]
    ArtifactWriteRolledBack { original: PathBuf, message: String },

    #[error(
        "无法写入导入定义文件，且源文件回滚失败；源文件现位于 {}（原位置 {}）: {message}",
        current.display(),
        original.display()
    )]
    RollbackFailed {
        original: PathBuf,
        current: PathBuf,
        message: String,
    },

    #[error("导入定义文件格式错误: {}: {message}", path.display())]
    ArtifactFormat { path: PathBuf, message: String },

    #[error("导入定义文件版本过新: {} (format={found}, 支持<={supported})", path.display())]
    UnsupportedArtifactVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("删除文件失败: {}: {source}", path.display())]
    FileDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("文件读取失败: {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("导入定义序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    // ===== 目标存储错误 =====
    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// 发现缺口（调用方不应与存储错误混淆）
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("FOREIGN KEY") => {
                RepositoryError::ForeignKeyViolation(msg)
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
