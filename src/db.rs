// ==========================================
// 实体表格导入导出 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（SqliteEntityStore / ConfigManager 共用）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 文件库使用 WAL，批量导入读取与配置写入互不阻塞
// ==========================================

use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 默认数据库文件名
pub const DEFAULT_DB_FILE: &str = "entity_sheet_io.db";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
/// - journal_mode 对内存库返回 "memory"，不视为错误
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!(journal_mode = %mode, "SQLite 连接已配置");
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 默认数据库路径：本地数据目录下的 entity-sheet-io/entity_sheet_io.db
///
/// 取不到数据目录时退回当前目录
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("entity-sheet-io"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DB_FILE)
}
