// ==========================================
// CSV 导入器 - 导入器配置
// ==========================================
// 职责: 搜索根目录、工作区位置、写入权限位
// 搜索根: 每个已安装组件 <extensions>/<handle>/csv-importers/
//         + 默认工作区 <workspace>/csv-importers/
// ==========================================

use std::path::{Path, PathBuf};

/// 搜索根下的固定子目录
pub const IMPORTERS_SUBDIR: &str = "csv-importers";

/// 工作区环境变量
pub const WORKSPACE_ENV: &str = "CSV_IMPORTER_WORKSPACE";

/// 默认文件权限位
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// 默认目录权限位
pub const DEFAULT_DIRECTORY_MODE: u32 = 0o755;

// ==========================================
// ImporterConfig
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImporterConfig {
    /// 默认工作区根目录
    pub workspace_root: PathBuf,
    /// 组件（扩展）根目录；其下的文件视为托管文件，原地保留
    pub extensions_root: PathBuf,
    /// 已安装组件句柄（按注册顺序扫描）
    pub installed_components: Vec<String>,
    /// 写入文件权限位（仅 unix 生效）
    pub file_mode: u32,
    /// 创建目录权限位（仅 unix 生效）
    pub directory_mode: u32,
}

impl ImporterConfig {
    /// 以工作区根目录创建配置；扩展根默认为工作区同级的 extensions/
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let extensions_root = workspace_root
            .parent()
            .map(|p| p.join("extensions"))
            .unwrap_or_else(|| PathBuf::from("extensions"));

        Self {
            workspace_root,
            extensions_root,
            installed_components: Vec::new(),
            file_mode: DEFAULT_FILE_MODE,
            directory_mode: DEFAULT_DIRECTORY_MODE,
        }
    }

    pub fn with_extensions_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.extensions_root = root.into();
        self
    }

    pub fn with_component(mut self, handle: impl Into<String>) -> Self {
        self.installed_components.push(handle.into());
        self
    }

    /// 从环境变量/用户数据目录推导默认配置
    pub fn from_env() -> Self {
        Self::new(default_workspace_root())
    }

    /// 工作区下的导入器目录
    pub fn workspace_importers_dir(&self) -> PathBuf {
        self.workspace_root.join(IMPORTERS_SUBDIR)
    }

    /// 某个组件的导入器目录
    pub fn component_importers_dir(&self, component: &str) -> PathBuf {
        self.extensions_root.join(component).join(IMPORTERS_SUBDIR)
    }

    /// 全部候选搜索根（不过滤存在性）：组件在前，工作区最后
    pub fn candidate_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .installed_components
            .iter()
            .map(|c| self.component_importers_dir(c))
            .collect();
        roots.push(self.workspace_importers_dir());
        roots
    }

    /// 实际扫描的搜索根：只保留存在的目录
    pub fn search_roots(&self) -> Vec<PathBuf> {
        self.candidate_roots()
            .into_iter()
            .filter(|p| p.is_dir())
            .collect()
    }

    /// 路径是否位于组件根目录下（托管扩展文件）
    pub fn is_managed_extension_path(&self, path: &Path) -> bool {
        path.starts_with(&self.extensions_root)
    }
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// 默认工作区根目录
///
/// 优先级: 环境变量 > 用户数据目录 > ./workspace
pub fn default_workspace_root() -> PathBuf {
    if let Ok(path) = std::env::var(WORKSPACE_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    match dirs::data_dir() {
        // 开发环境使用独立目录，避免污染正式数据
        #[cfg(debug_assertions)]
        Some(data_dir) => data_dir.join("csv-importer-dev").join("workspace"),
        #[cfg(not(debug_assertions))]
        Some(data_dir) => data_dir.join("csv-importer").join("workspace"),
        None => PathBuf::from("./workspace"),
    }
}

/// 解析八进制权限位字符串（"0644" / "644" / "0o644"）
pub fn parse_mode(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 8).ok().filter(|m| *m <= 0o7777)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_search_roots_order_and_existence() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("workspace");
        let extensions = temp.path().join("extensions");

        let config = ImporterConfig::new(&workspace)
            .with_extensions_root(&extensions)
            .with_component("blog")
            .with_component("shop")
            .with_component("missing");

        std::fs::create_dir_all(config.component_importers_dir("shop")).unwrap();
        std::fs::create_dir_all(config.component_importers_dir("blog")).unwrap();
        std::fs::create_dir_all(config.workspace_importers_dir()).unwrap();

        let roots = config.search_roots();
        assert_eq!(
            roots,
            vec![
                extensions.join("blog").join(IMPORTERS_SUBDIR),
                extensions.join("shop").join(IMPORTERS_SUBDIR),
                workspace.join(IMPORTERS_SUBDIR),
            ]
        );
    }

    #[test]
    fn test_default_extensions_root_is_sibling_of_workspace() {
        let config = ImporterConfig::new("/srv/site/workspace");
        assert_eq!(config.extensions_root, PathBuf::from("/srv/site/extensions"));
        assert!(config.is_managed_extension_path(Path::new("/srv/site/extensions/blog/x.csv")));
        assert!(!config.is_managed_extension_path(Path::new("/srv/site/workspace/x.csv")));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("0644"), Some(0o644));
        assert_eq!(parse_mode("755"), Some(0o755));
        assert_eq!(parse_mode("0o600"), Some(0o600));
        assert_eq!(parse_mode("rw-r--r--"), None);
        assert_eq!(parse_mode(""), None);
    }
}
