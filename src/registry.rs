// ==========================================
// CSV 导入器 - 导入定义注册表
// ==========================================
// 职责: 聚合 DefinitionStore::list_all，按展示需要排序与过滤
// 排序: 稳定排序，相等时保持枚举顺序；降序同样保持
// ==========================================

use crate::domain::ImportDefinition;
use crate::repository::DefinitionStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

// ==========================================
// SortKey - 排序列
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    File,
    Section,
    Modified,
    Author,
}

impl SortKey {
    /// 解析排序列（未知值回退为 Name）
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => SortKey::File,
            "section" => SortKey::Section,
            "modified" => SortKey::Modified,
            "author" => SortKey::Author,
            _ => SortKey::Name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::File => "file",
            SortKey::Section => "section",
            SortKey::Modified => "modified",
            SortKey::Author => "author",
        }
    }

    fn compare(&self, a: &ImportDefinition, b: &ImportDefinition) -> Ordering {
        match self {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::File => a.source_path().cmp(&b.source_path()),
            SortKey::Section => section_name(a).cmp(section_name(b)),
            SortKey::Modified => a.updated_at.cmp(&b.updated_at),
            SortKey::Author => a.author.name.cmp(&b.author.name),
        }
    }
}

fn section_name(definition: &ImportDefinition) -> &str {
    definition
        .destination
        .as_ref()
        .map(|s| s.name.as_str())
        .unwrap_or("")
}

// ==========================================
// ListQuery - 列表查询条件
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub descending: bool,
    /// 只保留目标数据模型为该 ID 的定义
    #[serde(default)]
    pub schema_id: Option<i64>,
    /// 名称/句柄/描述的子串匹配（大小写不敏感）
    #[serde(default)]
    pub search: Option<String>,
}

impl ListQuery {
    pub fn sorted_by(sort: SortKey, descending: bool) -> Self {
        Self {
            sort,
            descending,
            ..Self::default()
        }
    }

    fn matches(&self, definition: &ImportDefinition) -> bool {
        if let Some(schema_id) = self.schema_id {
            if definition.destination_schema_id() != Some(schema_id) {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [&definition.name, &definition.handle, &definition.description]
                    .iter()
                    .any(|text| text.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

// ==========================================
// DefinitionRegistry
// ==========================================
pub struct DefinitionRegistry<'a> {
    store: &'a DefinitionStore,
}

impl<'a> DefinitionRegistry<'a> {
    pub fn new(store: &'a DefinitionStore) -> Self {
        Self { store }
    }

    /// 全部定义（按名称升序）
    pub fn all(&self) -> Vec<ImportDefinition> {
        self.list(&ListQuery::default())
    }

    /// 过滤并排序
    pub fn list(&self, query: &ListQuery) -> Vec<ImportDefinition> {
        let mut definitions: Vec<ImportDefinition> = self
            .store
            .list_all()
            .into_iter()
            .filter(|d| query.matches(d))
            .collect();

        sort_definitions(&mut definitions, query.sort, query.descending);
        debug!(count = definitions.len(), sort = query.sort.as_str(), descending = query.descending, "定义列表");
        definitions
    }
}

/// 稳定排序；降序时反转比较器而非结果，相等项保持原顺序
pub fn sort_definitions(definitions: &mut [ImportDefinition], key: SortKey, descending: bool) {
    if descending {
        definitions.sort_by(|a, b| key.compare(b, a));
    } else {
        definitions.sort_by(|a, b| key.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Author, SchemaRef};
    use chrono::{TimeZone, Utc};

    fn def(name: &str, section: &str, author: &str, day: u32) -> ImportDefinition {
        let at = Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap();
        let mut d = ImportDefinition::new(name, at);
        d.destination = Some(SchemaRef { id: i64::from(day), name: section.to_string() });
        d.author = Author { name: author.to_string(), ..Author::default() };
        d
    }

    fn names(defs: &[ImportDefinition]) -> Vec<&str> {
        defs.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("section"), SortKey::Section);
        assert_eq!(SortKey::parse("MODIFIED"), SortKey::Modified);
        assert_eq!(SortKey::parse("bogus"), SortKey::Name);
        assert_eq!(SortKey::parse(""), SortKey::Name);
    }

    #[test]
    fn test_sort_by_keys() {
        let mut defs = vec![
            def("Beta", "Products", "Zoe", 3),
            def("Alpha", "Orders", "Mia", 1),
            def("Gamma", "Articles", "Ann", 2),
        ];

        sort_definitions(&mut defs, SortKey::Name, false);
        assert_eq!(names(&defs), ["Alpha", "Beta", "Gamma"]);

        sort_definitions(&mut defs, SortKey::Section, false);
        assert_eq!(names(&defs), ["Gamma", "Alpha", "Beta"]);

        sort_definitions(&mut defs, SortKey::Modified, true);
        assert_eq!(names(&defs), ["Beta", "Gamma", "Alpha"]);

        sort_definitions(&mut defs, SortKey::Author, false);
        assert_eq!(names(&defs), ["Gamma", "Alpha", "Beta"]);
    }

    #[test]
    fn test_sort_is_stable_in_both_directions() {
        let mut defs = vec![
            def("One", "Same", "A", 1),
            def("Two", "Same", "A", 2),
            def("Three", "Same", "A", 3),
        ];

        sort_definitions(&mut defs, SortKey::Section, false);
        assert_eq!(names(&defs), ["One", "Two", "Three"]);

        sort_definitions(&mut defs, SortKey::Section, true);
        assert_eq!(names(&defs), ["One", "Two", "Three"]);
    }

    #[test]
    fn test_query_filters() {
        let mut d = def("Product Feed", "Products", "Zoe", 3);
        d.description = "Nightly supplier export".to_string();

        let query = ListQuery {
            search: Some("SUPPLIER".to_string()),
            ..ListQuery::default()
        };
        assert!(query.matches(&d));

        let query = ListQuery {
            schema_id: Some(4),
            ..ListQuery::default()
        };
        assert!(!query.matches(&d));

        let query = ListQuery {
            schema_id: Some(3),
            search: Some("  ".to_string()),
            ..ListQuery::default()
        };
        assert!(query.matches(&d));
    }
}
