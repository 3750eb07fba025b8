// ==========================================
// CSV 导入器 - 核心库
// ==========================================
// 职责: 导入定义（列 → 字段映射）的建立、持久化、发现与执行
// 技术栈: Rust + csv + serde_json + SQLite（目标记录存储）
// 执行模型: 单进程、同步、每次调用执行到完成
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 导入定义与目标数据模型
pub mod domain;

// 导入层 - 列词表推导与导入执行
pub mod importer;

// 数据仓储层 - 定义存储与目标记录存储
pub mod repository;

// 定义注册表 - 列表/排序/过滤
pub mod registry;

// 配置层 - 搜索根目录与写入权限
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 表单输入构建/校验/门面
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    derive_handle, Author, FieldDescriptor, ImportDefinition, Mapping, NewRecord, SchemaRef,
    SourceFile,
};

// 导入层
pub use importer::{
    column_vocabulary, Clock, ImportError, ImportRunner, RunSummary, SystemClock,
};

// 仓储层
pub use repository::{
    DefinitionStore, RecordStore, RepositoryError, RepositoryResult, SqliteRecordStore,
};

// 注册表
pub use registry::{DefinitionRegistry, ListQuery, SortKey};

// 配置
pub use config::{ConfigManager, ImporterConfig};

// API
pub use api::{ApiError, ApiResult, DefinitionInput, ImporterApi};

// ==========================================
// 常量定义
// ==========================================

// 引擎版本（写入每个导入定义，用于前向兼容检查）
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "CSV 导入器";

// 定义文件格式版本
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;
