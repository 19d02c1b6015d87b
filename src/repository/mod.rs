// ==========================================
// 实体表格导入导出 - 数据仓储层
// ==========================================
// 红线: Repository 不含导入校验逻辑
// ==========================================
// 职责: 提供持久化协作方接口与两个参考实现，屏蔽数据库细节
// 约束: 所有查询使用参数化，标识符统一加引号
// ==========================================

pub mod entity_store;
pub mod error;
pub mod graph_writer;
pub mod memory_store;
pub mod sqlite_store;

// 重导出核心仓储
pub use entity_store::{load_instances, EntityStore, ForeignLookup};
pub use error::{RepositoryError, RepositoryResult};
pub use graph_writer::GraphWriter;
pub use memory_store::MemoryEntityStore;
pub use sqlite_store::SqliteEntityStore;
