// ==========================================
// CSV 导入器 - API 层错误类型
// ==========================================
// 职责: 定义 API 层错误类型，将仓储错误转换为面向调用方的消息
// 分类: 校验错误（按字段收集）/ 发现缺口 / 存储错误
// ==========================================

use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("导入定义校验失败: {0}")]
    Validation(ValidationErrors),

    // ==========================================
    // 发现缺口
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 存储错误
    // ==========================================
    #[error("存储失败: {0}")]
    StorageError(String),

    /// 需要调用方按类型处理的仓储错误（如回滚失败时的实际文件位置）
    #[error(transparent)]
    Repository(RepositoryError),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::IncompleteDefinition(msg) => ApiError::InvalidInput(msg),

            // 回滚失败保留类型：调用方需要据此更新跟踪的文件路径
            err @ RepositoryError::RollbackFailed { .. } => ApiError::Repository(err),

            err @ (RepositoryError::DirectoryNotWritable { .. }
            | RepositoryError::FileMove { .. }
            | RepositoryError::ArtifactWrite { .. }
            | RepositoryError::ArtifactWriteRolledBack { .. }
            | RepositoryError::FileDelete { .. }
            | RepositoryError::FileRead { .. }
            | RepositoryError::ArtifactFormat { .. }
            | RepositoryError::UnsupportedArtifactVersion { .. }
            | RepositoryError::Serialization(_)) => ApiError::StorageError(err.to_string()),

            RepositoryError::Other(err) => ApiError::Other(err),
            err => ApiError::Repository(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// ValidationErrors - 按字段收集的校验消息
// ==========================================
// 键: name / source / destination / mappings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// 某字段的消息（无则为空）
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// 全部消息（"字段: 消息" 形式，便于追加到错误收集器）
    pub fn messages(&self) -> Vec<String> {
        self.iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{}: {}", field, m)))
            .collect()
    }

    pub fn into_result(self) -> ApiResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_repository_error_mapping() {
        let err: ApiError = RepositoryError::not_found("import definition", "x").into();
        assert!(err.is_not_found());

        let err: ApiError = RepositoryError::FileMove {
            from: PathBuf::from("/a"),
            to: PathBuf::from("/b"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        }
        .into();
        assert!(matches!(err, ApiError::StorageError(_)));

        let err: ApiError = RepositoryError::RollbackFailed {
            original: PathBuf::from("/a"),
            current: PathBuf::from("/b"),
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            ApiError::Repository(RepositoryError::RollbackFailed { .. })
        ));
    }

    #[test]
    fn test_validation_errors() {
        let mut errors = ValidationErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.add("source", "a");
        errors.add("source", "b");
        errors.add("name", "c");

        assert_eq!(errors.get("source").len(), 2);
        assert!(errors.get("mappings").is_empty());
        assert_eq!(errors.messages(), vec!["name: c", "source: a", "source: b"]);
        assert!(matches!(errors.into_result(), Err(ApiError::Validation(_))));
    }
}
