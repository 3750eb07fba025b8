// ==========================================
// CSV 导入器 - 导入执行器
// ==========================================
// 职责: 按导入定义逐行读取数据文件，应用列映射，提交目标记录
// 流程: 预检(数据模型/映射) → 打开文件 → 跳过表头 → 逐行处理 → 关闭
// 失败语义:
// - 数据模型缺失 / 文件打不开 / 映射字段缺失: 追加错误并终止
//   （已提交的记录保留，至少一次，不回滚）
// - 行内列越界: 追加行级错误，只跳过该条映射，该行继续提交
// ==========================================

use crate::domain::{FieldDescriptor, ImportDefinition};
use crate::importer::clock::{Clock, SystemClock};
use crate::importer::error::ImportError;
use crate::importer::file_parser::{CsvRow, RowReader};
use crate::repository::RecordStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

// ==========================================
// RunSummary - 单次执行汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub rows_read: usize,          // 读取的数据行（不含表头）
    pub records_committed: usize,  // 成功提交的记录
    pub rows_skipped_blank: usize, // 空行或首字段为空而跳过的行
    pub errors_appended: usize,    // 本次追加到错误收集器的消息数
    pub aborted: bool,             // 是否因结构性错误提前终止
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            rows_read: 0,
            records_committed: 0,
            rows_skipped_blank: 0,
            errors_appended: 0,
            aborted: false,
        }
    }
}

// ==========================================
// 错误收集器包装：追加消息的同时记日志
// ==========================================
struct ErrorSink<'a> {
    errors: &'a mut Vec<String>,
    appended: usize,
}

impl<'a> ErrorSink<'a> {
    fn new(errors: &'a mut Vec<String>) -> Self {
        Self { errors, appended: 0 }
    }

    fn push(&mut self, err: ImportError) {
        if err.is_fatal() {
            error!(error = %err, "导入终止");
        } else {
            warn!(error = %err, "行级导入错误");
        }
        self.errors.push(err.to_string());
        self.appended += 1;
    }
}

// ==========================================
// ImportRunner - 导入执行器
// ==========================================
pub struct ImportRunner<S>
where
    S: RecordStore,
{
    // 目标记录存储（外部协作方）
    store: S,

    // 记录创建时间来源
    clock: Box<dyn Clock>,
}

impl<S> ImportRunner<S>
where
    S: RecordStore,
{
    /// 使用系统时钟创建执行器
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Box::new(SystemClock))
    }

    pub fn with_clock(store: S, clock: Box<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 执行导入
    ///
    /// # 参数
    /// - actor_id: 当前操作人 ID（写入每条记录）
    /// - definition: 导入定义（源文件可为新上传文件）
    /// - errors: 调用方错误收集器，所有可恢复问题以可读消息追加
    ///
    /// # 返回
    /// - RunSummary: 执行汇总；不会返回错误，问题全部进入 errors
    pub fn run(
        &self,
        actor_id: i64,
        definition: &ImportDefinition,
        errors: &mut Vec<String>,
    ) -> RunSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("import_run", run_id = %run_id, handle = %definition.handle);
        let _guard = span.enter();

        let mut sink = ErrorSink::new(errors);
        let mut summary = RunSummary::new(run_id);

        let completed = self.execute(actor_id, definition, &mut sink, &mut summary);
        summary.aborted = !completed;
        summary.errors_appended = sink.appended;

        info!(
            rows_read = summary.rows_read,
            committed = summary.records_committed,
            blank = summary.rows_skipped_blank,
            errors = summary.errors_appended,
            aborted = summary.aborted,
            "导入执行结束"
        );
        summary
    }

    /// 返回 false 表示结构性错误导致提前终止
    fn execute(
        &self,
        actor_id: i64,
        definition: &ImportDefinition,
        sink: &mut ErrorSink<'_>,
        summary: &mut RunSummary,
    ) -> bool {
        // === 步骤 1: 预检 ===
        let schema = match definition.destination.as_ref() {
            Some(schema) => schema,
            None => {
                sink.push(ImportError::SchemaNotSet);
                return false;
            }
        };

        match self.store.schema_exists(schema.id) {
            Ok(true) => {}
            Ok(false) => {
                sink.push(ImportError::SchemaMissing {
                    id: schema.id,
                    name: schema.name.clone(),
                });
                return false;
            }
            Err(e) => {
                sink.push(ImportError::Repository(e));
                return false;
            }
        }

        if definition.mappings.is_empty() {
            sink.push(ImportError::NoMappings);
            return false;
        }

        let fields = match self.store.fields_of(schema.id) {
            Ok(fields) => fields,
            Err(e) => {
                sink.push(ImportError::Repository(e));
                return false;
            }
        };

        // === 步骤 2: 打开文件 ===
        let source = match definition.source_file.as_ref() {
            Some(source) => source,
            None => {
                sink.push(ImportError::SourceNotSet);
                return false;
            }
        };
        let path_display = source.path.display().to_string();

        // 读取器持有文件句柄，任何 return 都会随之关闭文件
        let mut rows = match RowReader::open(&source.path) {
            Ok(rows) => rows,
            Err(e) => {
                debug!(error = %e, "打开源文件失败");
                sink.push(ImportError::SourceUnreadable { path: path_display });
                return false;
            }
        };

        // === 步骤 3: 跳过表头（第 0 行，空行也算）===
        if source.has_header {
            if let Some(Err(e)) = rows.next() {
                sink.push(ImportError::RowReadFailed {
                    row: 0,
                    path: path_display,
                    message: e.to_string(),
                });
                return false;
            }
        }

        // === 步骤 4: 逐行处理 ===
        while let Some(result) = rows.next() {
            let (current_row, line) = match result {
                Ok(item) => item,
                Err(e) => {
                    // 后续行无法可靠定位，停止读取；已提交记录保留
                    sink.push(ImportError::RowReadFailed {
                        row: rows.next_row_number(),
                        path: path_display,
                        message: e.to_string(),
                    });
                    return false;
                }
            };
            summary.rows_read += 1;

            // 空行与首字段为空的行都跳过，行号照常递增
            let row = match line {
                CsvRow::Record(row) if !row.get(0).map(str::is_empty).unwrap_or(true) => row,
                _ => {
                    summary.rows_skipped_blank += 1;
                    continue;
                }
            };

            let mut record = self.store.create_record(schema.id, actor_id);
            record.creation_date = self.clock.local_stamp();
            record.creation_date_gmt = self.clock.utc_stamp();

            for mapping in &definition.mappings {
                let field = match resolve_field(&fields, mapping.field_id) {
                    Some(field) => field,
                    None => {
                        sink.push(ImportError::FieldMissing {
                            field_id: mapping.field_id,
                        });
                        return false;
                    }
                };

                match row.get(mapping.column_index) {
                    Some(value) => record.set(field.element_name.clone(), value),
                    None => sink.push(ImportError::ColumnMissing {
                        column: mapping.column_index,
                        row: current_row,
                        path: path_display.clone(),
                    }),
                }
            }

            match self.store.commit(record) {
                Ok(record_id) => {
                    summary.records_committed += 1;
                    debug!(row = current_row, record_id, "记录已提交");
                }
                Err(e) => sink.push(ImportError::CommitFailed {
                    row: current_row,
                    message: e.to_string(),
                }),
            }
        }

        // === 步骤 5: 完成（reader 在此释放）===
        true
    }
}

// 只按字段 ID 在目标数据模型的字段中查找
fn resolve_field(fields: &[FieldDescriptor], field_id: i64) -> Option<&FieldDescriptor> {
    fields.iter().find(|f| f.id == field_id)
}
