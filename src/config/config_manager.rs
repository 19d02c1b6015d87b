// ==========================================
// 实体表格导入导出 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)，当前只使用 scope_id='global'
// ==========================================

use crate::config::sheet_config_trait::{ConfigResult, SheetConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::SheetFormat;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

// ==========================================
// 默认值
// ==========================================
pub const DEFAULT_EXPORT_FORMAT: SheetFormat = SheetFormat::Xlsx;
pub const DEFAULT_TEMPLATE_REPEAT_GROUPS: usize = 1;
pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
pub const DEFAULT_MAX_IMPORT_ROWS: usize = 10_000;

const CREATE_CONFIG_TABLE: &str = "CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（config_kv 表不存在时自动创建）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            conn_guard.execute_batch(CREATE_CONFIG_TABLE)?;
        }

        Ok(Self { conn })
    }

    fn lock(&self) -> ConfigResult<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?)
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    /// 写入 global 配置（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON 格式，键有序）
    ///
    /// # 用途
    /// - 导入报告归档时记录当时的配置
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 覆盖现有的同名 global 配置；以 "__meta_" 开头的键不回写
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter().filter(|(k, _)| !k.starts_with("__meta_")) {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// 配置值解析（格式错误时告警并回退默认值）
// ==========================================
fn parse_format(key: &str, value: &str) -> SheetFormat {
    value.parse::<SheetFormat>().unwrap_or_else(|_| {
        warn!(config_key = key, raw_value = %value, "表格格式配置错误，使用默认值");
        DEFAULT_EXPORT_FORMAT
    })
}

fn parse_positive(key: &str, value: &str, default: usize) -> usize {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            warn!(config_key = key, raw_value = %value, default, "数值配置错误，使用默认值");
            default
        }
    }
}

/// 分隔符：单个 ASCII 字符，或 "tab" / "\t"
fn parse_delimiter(key: &str, value: &str) -> u8 {
    match value {
        "tab" | "\\t" | "\t" => b'\t',
        v if v.len() == 1 && v.is_ascii() => v.as_bytes()[0],
        _ => {
            warn!(config_key = key, raw_value = %value, "CSV 分隔符配置错误，使用默认值");
            DEFAULT_CSV_DELIMITER
        }
    }
}

// ==========================================
// SheetConfigReader Trait 实现
// ==========================================
#[async_trait]
impl SheetConfigReader for ConfigManager {
    async fn get_default_export_format(&self) -> ConfigResult<SheetFormat> {
        let value = self.get_config_or_default(
            config_keys::DEFAULT_EXPORT_FORMAT,
            DEFAULT_EXPORT_FORMAT.extension(),
        )?;
        Ok(parse_format(config_keys::DEFAULT_EXPORT_FORMAT, &value))
    }

    async fn get_template_repeat_groups(&self) -> ConfigResult<usize> {
        let value = self.get_config_or_default(config_keys::TEMPLATE_REPEAT_GROUPS, "1")?;
        Ok(parse_positive(
            config_keys::TEMPLATE_REPEAT_GROUPS,
            &value,
            DEFAULT_TEMPLATE_REPEAT_GROUPS,
        ))
    }

    async fn get_csv_delimiter(&self) -> ConfigResult<u8> {
        let value = self.get_config_or_default(config_keys::CSV_DELIMITER, ",")?;
        Ok(parse_delimiter(config_keys::CSV_DELIMITER, &value))
    }

    async fn get_sheet_name(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::SHEET_NAME, DEFAULT_SHEET_NAME)?;
        let trimmed = value.trim();
        Ok(if trimmed.is_empty() {
            DEFAULT_SHEET_NAME.to_string()
        } else {
            trimmed.to_string()
        })
    }

    async fn get_max_import_rows(&self) -> ConfigResult<usize> {
        let value = self.get_config_or_default(config_keys::MAX_IMPORT_ROWS, "10000")?;
        Ok(parse_positive(
            config_keys::MAX_IMPORT_ROWS,
            &value,
            DEFAULT_MAX_IMPORT_ROWS,
        ))
    }
}

// ==========================================
// StaticSheetConfig - 进程内配置（测试 / 嵌入场景）
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSheetConfig {
    pub default_export_format: SheetFormat,
    pub template_repeat_groups: usize,
    pub csv_delimiter: char,
    pub sheet_name: String,
    pub max_import_rows: usize,
}

impl Default for StaticSheetConfig {
    fn default() -> Self {
        Self {
            default_export_format: DEFAULT_EXPORT_FORMAT,
            template_repeat_groups: DEFAULT_TEMPLATE_REPEAT_GROUPS,
            csv_delimiter: DEFAULT_CSV_DELIMITER as char,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            max_import_rows: DEFAULT_MAX_IMPORT_ROWS,
        }
    }
}

#[async_trait]
impl SheetConfigReader for StaticSheetConfig {
    async fn get_default_export_format(&self) -> ConfigResult<SheetFormat> {
        Ok(self.default_export_format)
    }

    async fn get_template_repeat_groups(&self) -> ConfigResult<usize> {
        Ok(self.template_repeat_groups)
    }

    async fn get_csv_delimiter(&self) -> ConfigResult<u8> {
        Ok(u8::try_from(self.csv_delimiter).unwrap_or(DEFAULT_CSV_DELIMITER))
    }

    async fn get_sheet_name(&self) -> ConfigResult<String> {
        Ok(self.sheet_name.clone())
    }

    async fn get_max_import_rows(&self) -> ConfigResult<usize> {
        Ok(self.max_import_rows)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导出
    pub const DEFAULT_EXPORT_FORMAT: &str = "sheet_default_export_format";
    pub const SHEET_NAME: &str = "sheet_name";
    pub const CSV_DELIMITER: &str = "sheet_csv_delimiter";

    // 模板
    pub const TEMPLATE_REPEAT_GROUPS: &str = "sheet_template_repeat_groups";

    // 导入
    pub const MAX_IMPORT_ROWS: &str = "sheet_max_import_rows";
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_manager() -> (NamedTempFile, ConfigManager) {
        let temp = NamedTempFile::new().unwrap();
        let manager = ConfigManager::new(temp.path().to_str().unwrap()).unwrap();
        (temp, manager)
    }

    #[tokio::test]
    async fn test_defaults_when_table_empty() {
        let (_temp, manager) = create_manager();
        assert_eq!(manager.get_default_export_format().await.unwrap(), SheetFormat::Xlsx);
        assert_eq!(manager.get_template_repeat_groups().await.unwrap(), 1);
        assert_eq!(manager.get_csv_delimiter().await.unwrap(), b',');
        assert_eq!(manager.get_sheet_name().await.unwrap(), "Sheet1");
        assert_eq!(manager.get_max_import_rows().await.unwrap(), 10_000);
    }

    #[tokio::test]
    async fn test_overrides_and_invalid_values() {
        let (_temp, manager) = create_manager();
        manager.set_global_config_value(config_keys::DEFAULT_EXPORT_FORMAT, "csv").unwrap();
        manager.set_global_config_value(config_keys::CSV_DELIMITER, "tab").unwrap();
        manager.set_global_config_value(config_keys::MAX_IMPORT_ROWS, "-5").unwrap();

        assert_eq!(manager.get_default_export_format().await.unwrap(), SheetFormat::Csv);
        assert_eq!(manager.get_csv_delimiter().await.unwrap(), b'\t');
        assert_eq!(manager.get_max_import_rows().await.unwrap(), DEFAULT_MAX_IMPORT_ROWS);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let (_temp, manager) = create_manager();
        manager.set_global_config_value(config_keys::SHEET_NAME, "Orders").unwrap();
        let snapshot = manager.get_config_snapshot().unwrap();
        assert_eq!(snapshot, r#"{"sheet_name":"Orders"}"#);

        let (_other_temp, other) = create_manager();
        let restored = other
            .restore_config_from_snapshot(r#"{"sheet_name":"Orders","__meta_note":"x"}"#)
            .unwrap();
        assert_eq!(restored, 1);
        assert_eq!(
            other.get_global_config_value(config_keys::SHEET_NAME).unwrap(),
            Some("Orders".to_string())
        );
    }

    #[test]
    fn test_static_config_deserializes_with_defaults() {
        let config: StaticSheetConfig = serde_json::from_str(r#"{"csv_delimiter":";"}"#).unwrap();
        assert_eq!(config.csv_delimiter, ';');
        assert_eq!(config.max_import_rows, DEFAULT_MAX_IMPORT_ROWS);
    }
}
