// ==========================================
// CSV 导入器 - 目标记录领域模型
// ==========================================
// 职责: 目标数据模型字段描述 + 待提交记录
// 说明: 目标存储本身是外部协作方，这里只定义边界上的数据结构
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 时间戳格式（与目标存储约定一致）
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// FieldDescriptor - 目标字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: i64,
    pub element_name: String, // 写入记录时使用的键
    pub label: String,
}

// ==========================================
// NewRecord - 待提交的目标记录
// ==========================================
// 每个非空数据行一条，由 ImportRunner 构建
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub schema_id: i64,
    pub author_id: i64,
    pub creation_date: String,     // 本地时间
    pub creation_date_gmt: String, // UTC 时间
    pub values: BTreeMap<String, String>,
}

impl NewRecord {
    pub fn new(schema_id: i64, author_id: i64) -> Self {
        Self {
            schema_id,
            author_id,
            creation_date: String::new(),
            creation_date_gmt: String::new(),
            values: BTreeMap::new(),
        }
    }

    /// 设置字段值（同名覆盖）
    pub fn set(&mut self, element_name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(element_name.into(), value.into());
    }

    pub fn get(&self, element_name: &str) -> Option<&str> {
        self.values.get(element_name).map(String::as_str)
    }
}
