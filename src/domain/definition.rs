// ==========================================
// CSV 导入器 - 导入定义领域模型
// ==========================================
// 职责: 导入定义（源文件元数据 + 表头标记 + 列→字段映射 + 目标数据模型）
// 用途: 构建器产出，DefinitionStore 持久化，ImportRunner 执行
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ==========================================
// 句柄推导
// ==========================================

/// 由显示名称推导句柄：转小写，去掉所有非字母数字字符
///
/// 句柄只在创建时推导一次，之后不可变。
pub fn derive_handle(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

// ==========================================
// Author - 定义作者（创建时采集，之后不再重算）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
}

// ==========================================
// SourceFile - 样例 CSV 文件引用
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,          // 当前文件位置（store 后位于托管目录）
    pub original_name: String,  // 上传时的原始文件名（仅展示）
    pub has_header: bool,       // 首行是否为表头
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>, has_header: bool) -> Self {
        Self {
            path: path.into(),
            original_name: original_name.into(),
            has_header,
        }
    }

    /// 文件存在且可读
    pub fn is_readable(&self) -> bool {
        std::fs::File::open(&self.path).is_ok()
    }
}

// ==========================================
// SchemaRef - 目标数据模型（section）引用
// ==========================================
// name 仅用于展示与错误信息，匹配只看 id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

// ==========================================
// Mapping - 列 → 字段映射
// ==========================================
// 顺序只影响展示；执行时按 column_index / field_id 匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mapping {
    pub column_index: usize,
    pub field_id: i64,
}

impl Mapping {
    pub fn new(column_index: usize, field_id: i64) -> Self {
        Self {
            column_index,
            field_id,
        }
    }
}

// ==========================================
// ImportDefinition - 导入定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDefinition {
    // ===== 标识 =====
    pub handle: String,

    // ===== 展示元数据 =====
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Author,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: String, // 产出该定义的引擎版本

    // ===== 映射配置 =====
    #[serde(default)]
    pub source_file: Option<SourceFile>,
    #[serde(default)]
    pub destination: Option<SchemaRef>,
    #[serde(default)]
    pub mappings: Vec<Mapping>,

    // ===== 存储位置 =====
    // 不序列化：加载时由实际读取路径回填
    #[serde(skip)]
    pub storage_file: Option<PathBuf>,
}

impl ImportDefinition {
    /// 创建新的空定义（句柄由名称推导）
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        let name = name.into();
        Self {
            handle: derive_handle(&name),
            name,
            description: String::new(),
            author: Author::default(),
            created_at: now,
            updated_at: now,
            version: crate::VERSION.to_string(),
            source_file: None,
            destination: None,
            mappings: Vec::new(),
            storage_file: None,
        }
    }

    /// 目标数据模型 ID
    pub fn destination_schema_id(&self) -> Option<i64> {
        self.destination.as_ref().map(|s| s.id)
    }

    /// 源文件路径
    pub fn source_path(&self) -> Option<&Path> {
        self.source_file.as_ref().map(|s| s.path.as_path())
    }

    /// 是否有表头（无源文件时视为无表头）
    pub fn has_header(&self) -> bool {
        self.source_file.as_ref().map(|s| s.has_header).unwrap_or(false)
    }

    /// 是否可执行
    ///
    /// 源文件已设置且可读、目标数据模型已设置、映射非空。
    /// 列下标与字段 ID 的有效性在执行时才校验（两侧都可能已漂移）。
    pub fn is_complete(&self) -> bool {
        self.source_file.as_ref().map(SourceFile::is_readable).unwrap_or(false)
            && self.destination.is_some()
            && !self.mappings.is_empty()
    }

    /// 用新上传的数据文件替换模板源文件（表头标记沿用模板）
    pub fn with_data_file(mut self, path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        let has_header = self.has_header();
        self.source_file = Some(SourceFile::new(path, original_name, has_header));
        self
    }

    /// 映射摘要（列表页展示前 N 条）
    pub fn mapping_preview(&self, limit: usize) -> Vec<Mapping> {
        self.mappings.iter().take(limit).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_derive_handle_strips_non_alphanumeric() {
        assert_eq!(derive_handle("Product Feed 2"), "productfeed2");
        assert_eq!(derive_handle("  My-Importer_v1.0 "), "myimporterv10");
        assert_eq!(derive_handle("!!!"), "");
    }

    #[test]
    fn test_new_definition_derives_handle_once() {
        let now = Utc::now();
        let mut def = ImportDefinition::new("Customer List", now);
        assert_eq!(def.handle, "customerlist");

        def.name = "Renamed".to_string();
        assert_eq!(def.handle, "customerlist");
        assert_eq!(def.created_at, def.updated_at);
    }

    #[test]
    fn test_is_complete_requires_all_parts() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();

        let mut def = ImportDefinition::new("x", Utc::now());
        assert!(!def.is_complete());

        def.source_file = Some(SourceFile::new(file.path(), "x.csv", true));
        def.destination = Some(SchemaRef { id: 1, name: "Articles".to_string() });
        assert!(!def.is_complete(), "no mappings yet");

        def.mappings.push(Mapping::new(0, 3));
        assert!(def.is_complete());

        def.source_file = Some(SourceFile::new("/nonexistent/x.csv", "x.csv", true));
        assert!(!def.is_complete());
    }

    #[test]
    fn test_with_data_file_keeps_header_flag() {
        let mut def = ImportDefinition::new("x", Utc::now());
        def.source_file = Some(SourceFile::new("/tmp/template.csv", "template.csv", true));

        let def = def.with_data_file("/tmp/upload.csv", "upload.csv");
        let source = def.source_file.unwrap();
        assert_eq!(source.path, PathBuf::from("/tmp/upload.csv"));
        assert!(source.has_header);
    }

    #[test]
    fn test_storage_file_is_not_serialized() {
        let mut def = ImportDefinition::new("x", Utc::now());
        def.storage_file = Some(PathBuf::from("/somewhere/csv-importer.x.json"));

        let json = serde_json::to_string(&def).unwrap();
        assert!(!json.contains("storage_file"));

        let back: ImportDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.storage_file, None);
    }
}
