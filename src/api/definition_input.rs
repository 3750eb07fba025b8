// ==========================================
// CSV 导入器 - 定义输入与构建
// ==========================================
// 职责:
// - DefinitionInput: 编辑界面提交的显式输入（全部字段可缺省）
// - merge: 多步表单的逐次提交合并（后提交的已有字段覆盖）
// - build_definition: 输入 → ImportDefinition
// - validate_definition: 按字段收集校验消息，从不返回错误
// ==========================================

use crate::api::error::ValidationErrors;
use crate::domain::{derive_handle, Author, ImportDefinition, Mapping, SchemaRef, SourceFile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

// ==========================================
// DefinitionInput
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionInput {
    /// 已保存定义的句柄（创建后不可变；新建时为空，由名称推导）
    pub handle: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// 已保存定义的作者（新建时为空，由编辑人补齐）
    pub author: Option<Author>,
    pub created_at: Option<DateTime<Utc>>,
    pub source_path: Option<PathBuf>,
    pub source_name: Option<String>,
    pub has_header: Option<bool>,
    pub destination: Option<SchemaRef>,
    pub mappings: Option<Vec<Mapping>>,
    /// 已保存定义的定义文件位置
    pub storage_file: Option<PathBuf>,
}

impl DefinitionInput {
    /// 合并后续提交：later 中存在的字段覆盖当前值
    pub fn merge(self, later: DefinitionInput) -> DefinitionInput {
        DefinitionInput {
            handle: later.handle.or(self.handle),
            name: later.name.or(self.name),
            description: later.description.or(self.description),
            author: later.author.or(self.author),
            created_at: later.created_at.or(self.created_at),
            source_path: later.source_path.or(self.source_path),
            source_name: later.source_name.or(self.source_name),
            has_header: later.has_header.or(self.has_header),
            destination: later.destination.or(self.destination),
            mappings: later.mappings.or(self.mappings),
            storage_file: later.storage_file.or(self.storage_file),
        }
    }

    /// 从已保存定义还原编辑输入
    pub fn from_definition(definition: &ImportDefinition) -> DefinitionInput {
        let source = definition.source_file.as_ref();
        DefinitionInput {
            handle: Some(definition.handle.clone()),
            name: Some(definition.name.clone()),
            description: Some(definition.description.clone()),
            author: Some(definition.author.clone()),
            created_at: Some(definition.created_at),
            source_path: source.map(|s| s.path.clone()),
            source_name: source.map(|s| s.original_name.clone()),
            has_header: source.map(|s| s.has_header),
            destination: definition.destination.clone(),
            mappings: Some(definition.mappings.clone()),
            storage_file: definition.storage_file.clone(),
        }
    }
}

// ==========================================
// EditContext - 构建时的环境信息
// ==========================================
#[derive(Debug, Clone)]
pub struct EditContext {
    /// 当前编辑人（新建定义的作者）
    pub actor: Author,
    pub now: DateTime<Utc>,
}

/// 由输入构建导入定义
///
/// 输入携带句柄时沿用（改名不改句柄），否则由名称推导；
/// 作者仅在输入未携带时取当前编辑人；created_at 缺省为当前时间
pub fn build_definition(input: &DefinitionInput, ctx: &EditContext) -> ImportDefinition {
    let name = input.name.as_deref().map(str::trim).unwrap_or("").to_string();

    let source_file = input.source_path.as_ref().map(|path| {
        let original_name = input.source_name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        SourceFile::new(path.clone(), original_name, input.has_header.unwrap_or(false))
    });

    let handle = input
        .handle
        .clone()
        .filter(|handle| !handle.is_empty())
        .unwrap_or_else(|| derive_handle(&name));

    ImportDefinition {
        handle,
        name,
        description: input.description.clone().unwrap_or_default(),
        author: input.author.clone().unwrap_or_else(|| ctx.actor.clone()),
        created_at: input.created_at.unwrap_or(ctx.now),
        updated_at: ctx.now,
        version: crate::VERSION.to_string(),
        source_file,
        destination: input.destination.clone(),
        mappings: input.mappings.clone().unwrap_or_default(),
        storage_file: input.storage_file.clone(),
    }
}

/// 校验导入定义（保存前）
///
/// 键: name / source / destination / mappings
pub fn validate_definition(definition: &ImportDefinition) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    // 名称
    if definition.name.trim().is_empty() {
        errors.add("name", "导入定义必须有名称");
    } else if definition.handle.is_empty() {
        errors.add("name", "名称中至少需要一个字母或数字");
    } else if !definition.handle.chars().all(char::is_alphanumeric) {
        errors.add("name", format!("句柄只能包含字母或数字: '{}'", definition.handle));
    }

    // 源文件
    match &definition.source_file {
        None => errors.add("source", "保存的导入定义必须有样例文件"),
        Some(source) => {
            if source.original_name.trim().is_empty() {
                errors.add("source", "样例文件必须有可展示的文件名");
            }
            if !source.path.exists() {
                errors.add("source", "样例文件路径不存在");
            } else if !source.is_readable() {
                errors.add("source", "样例文件无法读取");
            }
        }
    }

    // 目标数据模型与映射
    if !definition.mappings.is_empty() && definition.destination.is_none() {
        errors.add("destination", "存在列映射时必须选择目标数据模型");
    }

    let mut seen = HashSet::new();
    for mapping in &definition.mappings {
        if !seen.insert(*mapping) {
            errors.add(
                "mappings",
                format!("重复的映射: 第 {} 列 → 字段 {}", mapping.column_index, mapping.field_id),
            );
        }
    }

    errors
}
