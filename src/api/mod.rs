// ==========================================
// CSV 导入器 - API 层
// ==========================================
// 职责: 编辑界面/CLI 与核心之间的边界
// - 显式输入结构与多步提交合并
// - 定义构建与按字段校验
// - ImporterApi 门面
// ==========================================

pub mod definition_input;
pub mod error;
pub mod importer_api;

pub use definition_input::{build_definition, validate_definition, DefinitionInput, EditContext};
pub use error::{ApiError, ApiResult, ValidationErrors};
pub use importer_api::{DeleteOutcome, ImporterApi, UPLOAD_STAGING_DIR};
