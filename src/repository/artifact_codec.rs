// ==========================================
// CSV 导入器 - 导入定义文件编解码
// ==========================================
// 文件名: csv-importer.<handle>.json
// 文档:   { "format": 1, "definition": { ... } }
// 规则:
// - storage_file 不写入文档，加载时回填为实际读取路径
// - format 高于当前支持版本的文档拒绝加载
// ==========================================

use crate::domain::ImportDefinition;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::ARTIFACT_FORMAT_VERSION;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 文件名前缀
pub const ARTIFACT_PREFIX: &str = "csv-importer.";

/// 文件名后缀
pub const ARTIFACT_SUFFIX: &str = ".json";

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactDocument {
    format: u32,
    definition: ImportDefinition,
}

#[derive(Debug, Deserialize)]
struct FormatHeader {
    format: u32,
}

/// 由句柄生成文件名
pub fn artifact_file_name(handle: &str) -> String {
    format!("{}{}{}", ARTIFACT_PREFIX, handle, ARTIFACT_SUFFIX)
}

/// 由文件名还原句柄（大小写不敏感地去掉前后缀）
///
/// 不符合命名约定时返回 None
pub fn handle_from_file_name(file_name: &str) -> Option<String> {
    let lower = file_name.to_ascii_lowercase();
    if !lower.starts_with(ARTIFACT_PREFIX) || !lower.ends_with(ARTIFACT_SUFFIX) {
        return None;
    }
    if file_name.len() <= ARTIFACT_PREFIX.len() + ARTIFACT_SUFFIX.len() {
        return None;
    }
    let handle = &file_name[ARTIFACT_PREFIX.len()..file_name.len() - ARTIFACT_SUFFIX.len()];
    Some(handle.to_string())
}

/// 编码为 JSON 文档
pub fn encode(definition: &ImportDefinition) -> RepositoryResult<Vec<u8>> {
    let document = ArtifactDocument {
        format: ARTIFACT_FORMAT_VERSION,
        definition: definition.clone(),
    };
    let bytes = serde_json::to_vec_pretty(&document)?;
    Ok(bytes)
}

/// 解码 JSON 文档
///
/// # 参数
/// - path: 文档来源路径（用于错误信息与 storage_file 回填）
/// - bytes: 文档内容
pub fn decode(path: &Path, bytes: &[u8]) -> RepositoryResult<ImportDefinition> {
    let header: FormatHeader =
        serde_json::from_slice(bytes).map_err(|e| RepositoryError::ArtifactFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if header.format > ARTIFACT_FORMAT_VERSION {
        return Err(RepositoryError::UnsupportedArtifactVersion {
            path: path.to_path_buf(),
            found: header.format,
            supported: ARTIFACT_FORMAT_VERSION,
        });
    }

    let document: ArtifactDocument =
        serde_json::from_slice(bytes).map_err(|e| RepositoryError::ArtifactFormat {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut definition = document.definition;
    definition.storage_file = Some(path.to_path_buf());
    Ok(definition)
}

/// 读取并解码定义文件
pub fn read_artifact(path: &Path) -> RepositoryResult<ImportDefinition> {
    let bytes = std::fs::read(path).map_err(|e| RepositoryError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    decode(path, &bytes)
}
