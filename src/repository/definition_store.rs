// ==========================================
// CSV 导入器 - 导入定义存储
// ==========================================
// 职责: 按句柄加载、保存、删除、枚举导入定义
// 存储布局:
// - 定义文件: <root>/csv-importers/csv-importer.<handle>.json
// - 样例文件: 组件目录下原地保留，否则移至 <workspace>/csv-importers/<handle>.csv
// 保存顺序: 建目录/可写检查 → 暂存旧样例 → 移动样例文件 → 原子写定义文件 → 失败时回滚移动并放回旧样例
// ==========================================

use crate::config::ImporterConfig;
use crate::domain::ImportDefinition;
use crate::repository::artifact_codec::{self, artifact_file_name, handle_from_file_name};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::fs_ops;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

// ==========================================
// DefinitionStore
// ==========================================
#[derive(Debug, Clone)]
pub struct DefinitionStore {
    config: ImporterConfig,
}

impl DefinitionStore {
    pub fn new(config: ImporterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    // ==========================================
    // 定位
    // ==========================================

    /// 按扫描顺序查找句柄对应的定义文件（首个命中）
    pub fn locate(&self, handle: &str) -> Option<PathBuf> {
        if !is_valid_handle(handle) {
            return None;
        }
        let file_name = artifact_file_name(handle);
        self.config
            .search_roots()
            .into_iter()
            .map(|root| root.join(&file_name))
            .find(|path| path.is_file())
    }

    /// 定义文件的规范位置
    ///
    /// 已位于组件目录下的定义原地重写，否则写入工作区
    pub fn artifact_path_for(&self, definition: &ImportDefinition) -> PathBuf {
        match &definition.storage_file {
            Some(path) if self.config.is_managed_extension_path(path) => path.clone(),
            _ => self
                .config
                .workspace_importers_dir()
                .join(artifact_file_name(&definition.handle)),
        }
    }

    /// 样例文件的规范位置
    ///
    /// 已位于组件目录下的样例文件原地保留，否则为 <workspace>/csv-importers/<handle>.csv
    pub fn sample_path_for(&self, definition: &ImportDefinition, current: &Path) -> PathBuf {
        if self.config.is_managed_extension_path(current) {
            current.to_path_buf()
        } else {
            self.config
                .workspace_importers_dir()
                .join(format!("{}.csv", definition.handle))
        }
    }

    // ==========================================
    // 加载
    // ==========================================

    /// 按句柄加载定义
    ///
    /// # 返回
    /// - Err(NotFound): 任何搜索根下都没有该句柄的定义文件
    /// - Err(其他): 定义文件存在但无法读取/解析
    #[instrument(skip(self))]
    pub fn load(&self, handle: &str) -> RepositoryResult<ImportDefinition> {
        let path = self
            .locate(handle)
            .ok_or_else(|| RepositoryError::not_found("import definition", handle))?;
        debug!(path = %path.display(), "加载导入定义");
        artifact_codec::read_artifact(&path)
    }

    /// 枚举全部定义
    ///
    /// 按句柄去重（扫描顺序首个命中为准）；无法加载或样例文件缺失的定义静默排除
    #[instrument(skip(self))]
    pub fn list_all(&self) -> Vec<ImportDefinition> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut definitions = Vec::new();

        for root in self.config.search_roots() {
            let entries = match fs::read_dir(&root) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "搜索根无法读取，已跳过");
                    continue;
                }
            };

            let mut candidates: Vec<(String, PathBuf)> = entries
                .filter_map(Result::ok)
                .filter_map(|entry| {
                    let name = entry.file_name().into_string().ok()?;
                    let handle = handle_from_file_name(&name)?;
                    Some((handle, entry.path()))
                })
                .filter(|(_, path)| path.is_file())
                .collect();
            candidates.sort_by(|a, b| a.1.cmp(&b.1));

            for (handle, path) in candidates {
                if !seen.insert(handle.clone()) {
                    debug!(handle = %handle, path = %path.display(), "句柄重复，已被先前的搜索根覆盖");
                    continue;
                }

                match artifact_codec::read_artifact(&path) {
                    Ok(definition) => {
                        let sample_present = definition
                            .source_path()
                            .map(Path::is_file)
                            .unwrap_or(false);
                        if sample_present {
                            definitions.push(definition);
                        } else {
                            debug!(handle = %handle, "样例文件缺失，已排除");
                        }
                    }
                    Err(e) => {
                        warn!(handle = %handle, path = %path.display(), error = %e, "导入定义无法加载，已排除");
                    }
                }
            }
        }

        definitions
    }

    // ==========================================
    // 保存
    // ==========================================

    /// 保存定义（使用当前时间作为更新时间）
    pub fn store(&self, definition: &ImportDefinition) -> RepositoryResult<ImportDefinition> {
        self.store_at(definition, Utc::now())
    }

    /// 保存定义
    ///
    /// # 返回
    /// - Ok(ImportDefinition): 更新后的定义（样例文件新路径、storage_file、updated_at、version）
    /// - Err: 入参 `definition` 描述的文件状态保持不变（回滚失败时除外，见 RollbackFailed）
    #[instrument(skip(self, definition, now), fields(handle = %definition.handle))]
    pub fn store_at(
        &self,
        definition: &ImportDefinition,
        now: DateTime<Utc>,
    ) -> RepositoryResult<ImportDefinition> {
        if !is_valid_handle(&definition.handle) {
            return Err(RepositoryError::IncompleteDefinition(format!(
                "句柄无效: '{}'",
                definition.handle
            )));
        }
        let source = definition
            .source_file
            .as_ref()
            .ok_or_else(|| RepositoryError::IncompleteDefinition("未设置样例文件".to_string()))?;

        let artifact_path = self.artifact_path_for(definition);
        let original_sample = source.path.clone();
        let target_sample = self.sample_path_for(definition, &original_sample);

        // 1) 目录准备：任何文件被触碰前完成
        self.ensure_writable_dir(parent_of(&artifact_path)?)?;
        if let Some(dir) = target_sample.parent() {
            self.ensure_writable_dir(dir)?;
        }
        if artifact_path.exists() && !fs_ops::is_writable(&artifact_path) {
            return Err(RepositoryError::DirectoryNotWritable {
                path: artifact_path,
                source: None,
            });
        }

        // 2) 样例文件迁移；目标位置已有旧样例时先暂存，成功后删除，失败时放回
        let moved = original_sample != target_sample;
        let displaced = if moved {
            fs_ops::set_aside(&target_sample).map_err(|e| RepositoryError::FileMove {
                from: target_sample.clone(),
                to: target_sample.clone(),
                source: e,
            })?
        } else {
            None
        };
        if moved {
            if let Err(e) = fs_ops::move_file(&original_sample, &target_sample) {
                if let Some(backup) = &displaced {
                    if let Err(restore_err) = fs_ops::restore_aside(backup, &target_sample) {
                        warn!(backup = %backup.display(), error = %restore_err, "旧样例文件恢复失败");
                    }
                }
                return Err(RepositoryError::FileMove {
                    from: original_sample,
                    to: target_sample,
                    source: e,
                });
            }
            debug!(from = %original_sample.display(), to = %target_sample.display(), "样例文件已迁移");
        }

        let mut updated = definition.clone();
        if let Some(file) = updated.source_file.as_mut() {
            file.path = target_sample.clone();
        }
        updated.updated_at = now;
        updated.version = crate::VERSION.to_string();
        updated.storage_file = Some(artifact_path.clone());

        // 3) 写定义文件，失败则回滚迁移
        let write_result = artifact_codec::encode(&updated).and_then(|bytes| {
            fs_ops::write_atomic(&artifact_path, &bytes, self.config.file_mode).map_err(|e| {
                RepositoryError::ArtifactWrite {
                    path: artifact_path.clone(),
                    source: e,
                }
            })
        });

        match write_result {
            Ok(()) => {
                if let Some(backup) = &displaced {
                    if let Err(e) = fs::remove_file(backup) {
                        warn!(backup = %backup.display(), error = %e, "旧样例文件备份删除失败");
                    }
                }
                info!(path = %artifact_path.display(), "导入定义已保存");
                Ok(updated)
            }
            Err(write_err) if moved => {
                let message = write_err.to_string();
                let sample_back = fs_ops::move_file(&target_sample, &original_sample).and_then(|()| {
                    if original_sample.is_file() {
                        Ok(())
                    } else {
                        Err(io::Error::new(io::ErrorKind::NotFound, "回滚后原位置仍不可见"))
                    }
                });
                if let Err(rollback_err) = sample_back {
                    warn!(error = %message, rollback_error = %rollback_err, "样例文件回滚失败");
                    return Err(RepositoryError::RollbackFailed {
                        original: original_sample,
                        current: target_sample,
                        message: format!("{}; 回滚失败: {}", message, rollback_err),
                    });
                }

                if let Some(backup) = displaced {
                    if let Err(restore_err) = fs_ops::restore_aside(&backup, &target_sample) {
                        warn!(error = %message, restore_error = %restore_err, "旧样例文件恢复失败");
                        return Err(RepositoryError::RollbackFailed {
                            original: target_sample,
                            current: backup,
                            message: format!("{}; 旧样例文件恢复失败: {}", message, restore_err),
                        });
                    }
                }

                warn!(error = %message, "定义文件写入失败，样例文件已回滚");
                Err(RepositoryError::ArtifactWriteRolledBack {
                    original: original_sample,
                    message,
                })
            }
            Err(write_err) => {
                warn!(error = %write_err, "定义文件写入失败");
                Err(write_err)
            }
        }
    }

    // ==========================================
    // 删除
    // ==========================================

    /// 删除定义文件与样例文件
    ///
    /// 两个删除都会尝试；返回首个失败。可能部分删除。
    #[instrument(skip(self, definition), fields(handle = %definition.handle))]
    pub fn remove(&self, definition: &ImportDefinition) -> RepositoryResult<()> {
        let artifact = definition
            .storage_file
            .clone()
            .or_else(|| self.locate(&definition.handle));

        let mut first_error: Option<RepositoryError> = None;

        match artifact {
            Some(path) => {
                if let Err(e) = fs::remove_file(&path) {
                    first_error = Some(RepositoryError::FileDelete { path, source: e });
                }
            }
            None => {
                first_error = Some(RepositoryError::not_found("import definition", &definition.handle));
            }
        }

        if let Some(sample) = definition.source_path() {
            if let Err(e) = fs::remove_file(sample) {
                let err = RepositoryError::FileDelete {
                    path: sample.to_path_buf(),
                    source: e,
                };
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        match first_error {
            Some(err) => {
                warn!(error = %err, "导入定义删除不完整");
                Err(err)
            }
            None => {
                info!("导入定义已删除");
                Ok(())
            }
        }
    }

    /// 按句柄删除（加载后 remove）
    pub fn delete(&self, handle: &str) -> RepositoryResult<()> {
        let definition = self.load(handle)?;
        self.remove(&definition)
    }

    fn ensure_writable_dir(&self, dir: &Path) -> RepositoryResult<()> {
        if !dir.is_dir() {
            fs_ops::create_dir_all_with_mode(dir, self.config.directory_mode).map_err(|e| {
                RepositoryError::DirectoryNotWritable {
                    path: dir.to_path_buf(),
                    source: Some(e),
                }
            })?;
        }
        if !fs_ops::is_writable(dir) {
            return Err(RepositoryError::DirectoryNotWritable {
                path: dir.to_path_buf(),
                source: None,
            });
        }
        Ok(())
    }
}

/// 句柄只允许字母数字（不含路径分隔符等）
fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty() && handle.chars().all(char::is_alphanumeric)
}

fn parent_of(path: &Path) -> RepositoryResult<&Path> {
    path.parent().ok_or_else(|| RepositoryError::DirectoryNotWritable {
        path: path.to_path_buf(),
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceFile;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> DefinitionStore {
        let config = ImporterConfig::new(temp.path().join("workspace"))
            .with_extensions_root(temp.path().join("extensions"));
        DefinitionStore::new(config)
    }

    #[test]
    fn test_invalid_handles_are_not_located() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        assert!(store.locate("").is_none());
        assert!(store.locate("../etc").is_none());
        assert!(store.load("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_canonical_paths() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let mut def = ImportDefinition::new("Products", Utc::now());

        let ws = temp.path().join("workspace").join("csv-importers");
        assert_eq!(store.artifact_path_for(&def), ws.join("csv-importer.products.json"));
        assert_eq!(
            store.sample_path_for(&def, Path::new("/tmp/upload.csv")),
            ws.join("products.csv")
        );

        let managed = temp
            .path()
            .join("extensions")
            .join("shop")
            .join("csv-importers");
        def.storage_file = Some(managed.join("csv-importer.products.json"));
        assert_eq!(store.artifact_path_for(&def), managed.join("csv-importer.products.json"));
        assert_eq!(
            store.sample_path_for(&def, &managed.join("sample.csv")),
            managed.join("sample.csv")
        );
    }

    #[test]
    fn test_store_requires_source_file() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        let def = ImportDefinition::new("Products", Utc::now());
        assert!(matches!(
            store.store(&def).unwrap_err(),
            RepositoryError::IncompleteDefinition(_)
        ));

        let mut nameless = ImportDefinition::new("!!!", Utc::now());
        nameless.source_file = Some(SourceFile::new(temp.path().join("a.csv"), "a.csv", false));
        assert!(matches!(
            store.store(&nameless).unwrap_err(),
            RepositoryError::IncompleteDefinition(_)
        ));
    }
}
