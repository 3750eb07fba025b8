// ==========================================
// CSV 导入器 - 导入器门面
// ==========================================
// 职责: 为编辑界面/CLI 组合 DefinitionStore、DefinitionRegistry、ImportRunner
// 调用方负责按句柄串行化定义修改与执行
// ==========================================

use crate::api::definition_input::{build_definition, validate_definition, DefinitionInput, EditContext};
use crate::api::error::{ApiError, ApiResult};
use crate::config::ImporterConfig;
use crate::domain::{Author, ImportDefinition};
use crate::importer::clock::{Clock, SystemClock};
use crate::importer::column_vocabulary::{self, EXAMPLE_LENGTH};
use crate::importer::runner::{ImportRunner, RunSummary};
use crate::registry::{DefinitionRegistry, ListQuery};
use crate::repository::{DefinitionStore, RecordStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 上传暂存目录名（位于系统临时目录下）
pub const UPLOAD_STAGING_DIR: &str = "csv-importer-uploads";

/// 批量删除结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    /// (句柄, 失败原因)
    pub failed: Vec<(String, String)>,
}

/// 导入器 API
pub struct ImporterApi<S>
where
    S: RecordStore,
{
    definitions: DefinitionStore,
    runner: ImportRunner<S>,
    clock: Arc<dyn Clock>,
    staging_dir: PathBuf,
}

impl<S> ImporterApi<S>
where
    S: RecordStore,
{
    /// 使用系统时钟创建
    pub fn new(config: ImporterConfig, records: S) -> Self {
        Self::with_clock(config, records, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ImporterConfig, records: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            definitions: DefinitionStore::new(config),
            runner: ImportRunner::with_clock(records, Box::new(Arc::clone(&clock))),
            clock,
            staging_dir: std::env::temp_dir().join(UPLOAD_STAGING_DIR),
        }
    }

    /// 替换上传暂存目录
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    pub fn records(&self) -> &S {
        self.runner.store()
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 定义列表（排序/过滤）
    pub fn list(&self, query: &ListQuery) -> Vec<ImportDefinition> {
        DefinitionRegistry::new(&self.definitions).list(query)
    }

    /// 按句柄加载
    pub fn load(&self, handle: &str) -> ApiResult<ImportDefinition> {
        Ok(self.definitions.load(handle)?)
    }

    /// 列词表（无预览时为空）
    pub fn columns(&self, path: &Path, has_header: bool) -> Vec<String> {
        column_vocabulary::derive(path, has_header)
    }

    /// 示例行（默认 EXAMPLE_LENGTH 行）
    pub fn preview(&self, path: &Path, has_header: bool, limit: Option<usize>) -> Vec<Vec<String>> {
        column_vocabulary::preview_rows(path, has_header, limit.unwrap_or(EXAMPLE_LENGTH))
    }

    // ==========================================
    // 上传暂存
    // ==========================================

    /// 复制上传文件到暂存目录，返回暂存路径
    ///
    /// 暂存文件在多步编辑间保留，直到 save 将其迁入工作区
    pub fn stage_upload(&self, source: &Path, original_name: &str) -> ApiResult<PathBuf> {
        let target = self.staging_path(original_name)?;
        fs::copy(source, &target).map_err(|e| {
            ApiError::StorageError(format!(
                "暂存上传文件失败: {} -> {}: {}",
                source.display(),
                target.display(),
                e
            ))
        })?;
        info!(path = %target.display(), "上传文件已暂存");
        Ok(target)
    }

    /// 写入上传内容到暂存目录，返回暂存路径
    pub fn stage_upload_bytes(&self, contents: &[u8], original_name: &str) -> ApiResult<PathBuf> {
        let target = self.staging_path(original_name)?;
        fs::write(&target, contents).map_err(|e| {
            ApiError::StorageError(format!("暂存上传文件失败: {}: {}", target.display(), e))
        })?;
        info!(path = %target.display(), "上传内容已暂存");
        Ok(target)
    }

    fn staging_path(&self, original_name: &str) -> ApiResult<PathBuf> {
        // 只取文件名部分
        let name = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::InvalidInput(format!("无效的上传文件名: '{}'", original_name)))?;

        fs::create_dir_all(&self.staging_dir).map_err(|e| {
            ApiError::StorageError(format!(
                "无法创建暂存目录: {}: {}",
                self.staging_dir.display(),
                e
            ))
        })?;
        Ok(self
            .staging_dir
            .join(format!("{}-{}", Uuid::new_v4().simple(), name)))
    }

    // ==========================================
    // 编辑
    // ==========================================

    /// 由输入构建定义（不校验、不保存）
    pub fn build(&self, input: &DefinitionInput, actor: &Author) -> ImportDefinition {
        let ctx = EditContext {
            actor: actor.clone(),
            now: self.clock.now_utc(),
        };
        build_definition(input, &ctx)
    }

    /// 保存: 构建 → 校验 → 存储
    ///
    /// # 返回
    /// - Ok(ImportDefinition): 存储后的定义（样例文件已迁入托管位置）
    /// - Err(Validation): 按字段收集的校验消息
    /// - Err(StorageError / Repository): 存储失败，样例文件已回滚（RollbackFailed 除外）
    #[instrument(skip(self, input, actor))]
    pub fn save(&self, input: &DefinitionInput, actor: &Author) -> ApiResult<ImportDefinition> {
        let definition = self.build(input, actor);
        validate_definition(&definition).into_result()?;

        let stored = self
            .definitions
            .store_at(&definition, self.clock.now_utc())
            .map_err(|e| {
                warn!(handle = %definition.handle, error = %e, "保存导入定义失败");
                ApiError::from(e)
            })?;
        Ok(stored)
    }

    /// 删除单个定义（定义文件 + 样例文件）
    pub fn remove(&self, definition: &ImportDefinition) -> ApiResult<()> {
        Ok(self.definitions.remove(definition)?)
    }

    /// 批量按句柄删除；逐个执行，失败不影响其余
    pub fn delete_many(&self, handles: &[String]) -> DeleteOutcome {
        let mut outcome = DeleteOutcome::default();
        for handle in handles {
            match self.definitions.delete(handle) {
                Ok(()) => outcome.deleted.push(handle.clone()),
                Err(e) => outcome.failed.push((handle.clone(), e.to_string())),
            }
        }
        outcome
    }

    // ==========================================
    // 执行
    // ==========================================

    /// 执行已保存的定义
    ///
    /// # 参数
    /// - data_file: 新上传的数据文件 (路径, 原始文件名)；为空时使用样例文件
    pub fn run_saved(
        &self,
        handle: &str,
        data_file: Option<(&Path, &str)>,
        actor_id: i64,
        errors: &mut Vec<String>,
    ) -> ApiResult<RunSummary> {
        let mut definition = self.definitions.load(handle)?;
        if let Some((path, original_name)) = data_file {
            definition = definition.with_data_file(path, original_name);
        }
        Ok(self.runner.run(actor_id, &definition, errors))
    }

    /// 执行编辑中的定义（不保存）
    pub fn run_unsaved(
        &self,
        input: &DefinitionInput,
        actor: &Author,
        actor_id: i64,
        errors: &mut Vec<String>,
    ) -> RunSummary {
        let definition = self.build(input, actor);
        self.runner.run(actor_id, &definition, errors)
    }

    /// 直接执行给定定义
    pub fn run(&self, definition: &ImportDefinition, actor_id: i64, errors: &mut Vec<String>) -> RunSummary {
        self.runner.run(actor_id, definition, errors)
    }
}
