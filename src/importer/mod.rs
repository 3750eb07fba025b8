// ==========================================
// CSV 导入器 - 导入层
// ==========================================
// 职责: 列词表推导（映射编辑预览）、导入执行（逐行映射并提交目标记录）
// 支持: 逗号分隔、双引号转义的 CSV
// ==========================================

// 模块声明
pub mod clock;
pub mod column_vocabulary;
pub mod error;
pub mod file_parser;
pub mod runner;

// 重导出核心类型
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ImportError, ImportResult};
pub use runner::{ImportRunner, RunSummary};
