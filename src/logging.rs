// ==========================================
// 实体表格导入导出 - 日志初始化
// ==========================================
// 工具: tracing-subscriber（EnvFilter + fmt）
// 输出: 文本（交互使用）/ JSON 行（批量导入按 batch_id 检索）
// ==========================================

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

/// 未设置 RUST_LOG 时的过滤规则
pub const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// 按格式安装全局订阅者；已安装时返回 false
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=entity_sheet_io::engine=debug
pub fn init_with(format: LogFormat) -> bool {
    let filter = env_filter(DEFAULT_FILTER);
    let result = match format {
        LogFormat::Text => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_line_number(true)
            .try_init(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init(),
    };
    result.is_ok()
}

/// 文本格式日志
///
/// # 示例
/// ```no_run
/// use entity_sheet_io::logging;
/// logging::init();
/// ```
pub fn init() {
    init_with(LogFormat::Text);
}

/// JSON 行格式日志
pub fn init_json() {
    init_with(LogFormat::Json);
}

/// 测试日志：输出到测试捕获，本 crate 记录 debug 级别
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(env_filter("entity_sheet_io=debug"))
        .with_test_writer()
        .try_init();
}
