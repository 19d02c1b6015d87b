// ==========================================
// 实体表格导入导出 - 表格API
// ==========================================
// 职责: 串联 列结构 → 投影/对账 → 表格读写 → 提交
// 流程:
// - 导出: 加载实例 → 投影 → 写文件
// - 模板: 列结构 × 配置分组数 → 只写表头
// - 导入: 读文件 → 对账 → ImportReport（不落库）
// - 提交: ImportReport 中接收的实体图 → GraphWriter
// 红线: 导入与提交分离；单文件失败不影响批量中的其他文件
// ==========================================

use crate::api::error::{config_value, ApiError, ApiResult};
use crate::config::SheetConfigReader;
use crate::contract::EntityRegistry;
use crate::domain::{CommitSummary, ImportReport, SheetFormat, SheetRow};
use crate::engine::{project, reconcile, ExportRow, Projection};
use crate::repository::{load_instances, EntityStore, GraphWriter};
use crate::schema::{ColumnSchema, SchemaCache};
use crate::sheet::{writer_for, SheetError, SheetReader, UniversalSheetParser};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// 导出结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub entity_type: String,
    /// 实际写出的文件（未指定扩展名时按默认格式补齐）
    pub path: PathBuf,
    pub format: SheetFormat,
    pub rows: usize,
    pub columns: usize,
}

/// 表格API
pub struct SheetApi<S, C> {
    registry: Arc<EntityRegistry>,
    schemas: Arc<SchemaCache>,
    store: Arc<S>,
    config: Arc<C>,
}

impl<S, C> SheetApi<S, C>
where
    S: EntityStore,
    C: SheetConfigReader,
{
    /// 创建新的SheetApi实例（独立的列结构缓存）
    pub fn new(registry: Arc<EntityRegistry>, store: Arc<S>, config: Arc<C>) -> Self {
        Self {
            registry,
            schemas: Arc::new(SchemaCache::new()),
            store,
            config,
        }
    }

    /// 与其他 SheetApi 共享列结构缓存
    pub fn with_schema_cache(mut self, schemas: Arc<SchemaCache>) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 获取实体的列结构（缓存）
    pub fn schema(&self, entity: &str) -> ApiResult<Arc<ColumnSchema>> {
        Ok(self.schemas.get_or_build(&self.registry, entity)?)
    }

    /// 投影实体的全部记录（不写文件）
    pub fn export_projection(&self, entity: &str) -> ApiResult<Projection> {
        let schema = self.schema(entity)?;
        let instances = load_instances(self.store.as_ref(), &schema)?;
        Ok(project(&schema, &instances, self.store.as_ref())?)
    }

    /// 导出实体的全部记录到文件
    ///
    /// # 参数
    /// - entity: 实体类型名
    /// - path: 目标文件；扩展名决定格式，无扩展名时使用配置的默认格式
    ///
    /// # 返回
    /// - Ok(ExportSummary): 写出结果
    /// - Err(ApiError): 声明错误 / 仓储故障 / 写文件失败（不产生部分导出）
    #[instrument(skip_all, fields(entity = %entity, path = %path.display()))]
    pub async fn export_file(&self, entity: &str, path: &Path) -> ApiResult<ExportSummary> {
        let projection = self.export_projection(entity)?;
        let (path, format) = self.output_target(path).await?;

        let summary = ExportSummary {
            entity_type: entity.to_string(),
            path: path.clone(),
            format,
            rows: projection.rows.len(),
            columns: projection.layout.len(),
        };

        self.write_sheet(path, format, projection.headers(), projection.rows)
            .await?;

        info!(
            entity = %entity,
            path = %summary.path.display(),
            rows = summary.rows,
            columns = summary.columns,
            "导出完成"
        );
        Ok(summary)
    }

    /// 生成导入模板（只有表头；每个 to-many 关联按配置渲染分组）
    #[instrument(skip_all, fields(entity = %entity, path = %path.display()))]
    pub async fn template_file(&self, entity: &str, path: &Path) -> ApiResult<ExportSummary> {
        let schema = self.schema(entity)?;
        let groups = config_value(self.config.get_template_repeat_groups().await)?;
        let layout = schema.template_layout(groups);
        let (path, format) = self.output_target(path).await?;

        let summary = ExportSummary {
            entity_type: entity.to_string(),
            path: path.clone(),
            format,
            rows: 0,
            columns: layout.len(),
        };

        self.write_sheet(path, format, layout.headers(), Vec::new())
            .await?;

        info!(entity = %entity, groups, columns = summary.columns, "导入模板已生成");
        Ok(summary)
    }

    /// 导入文件（对账，不落库）
    ///
    /// # 返回
    /// - Ok(ImportReport): 接收的实体图 + 拒绝的行（含全部违规）
    /// - Err(ApiError): 文件无法读取 / 超过行数上限 / 声明错误 / 查找故障
    #[instrument(skip_all, fields(entity = %entity, path = %path.display()))]
    pub async fn import_file(&self, entity: &str, path: &Path) -> ApiResult<ImportReport> {
        let started_at = Utc::now();
        let batch_id = Uuid::new_v4().to_string();

        let schema = self.schema(entity)?;
        let rows = self.read_sheet(path).await?;

        let limit = config_value(self.config.get_max_import_rows().await)?;
        if rows.len() > limit {
            warn!(rows = rows.len(), limit, "导入行数超限，整个文件不处理");
            return Err(ApiError::TooManyRows {
                file: path.display().to_string(),
                rows: rows.len(),
                limit,
            });
        }

        let reconciliation = reconcile(&schema, &rows, self.store.as_ref())?;
        if !reconciliation.ignored_columns.is_empty() {
            warn!(columns = ?reconciliation.ignored_columns, "存在无法识别的列，已忽略");
        }

        let report = ImportReport {
            batch_id,
            entity_type: entity.to_string(),
            file_name: path.display().to_string(),
            started_at,
            finished_at: Utc::now(),
            reconciliation,
        };

        info!(
            batch_id = %report.batch_id,
            accepted = report.reconciliation.accepted.len(),
            rejected = report.reconciliation.rejected.len(),
            "导入对账完成"
        );
        Ok(report)
    }

    /// 批量导入多个文件（并发；单文件失败只影响自身结果）
    ///
    /// # 返回
    /// - 与输入顺序一致的 (文件, 结果) 列表
    pub async fn batch_import(
        &self,
        entity: &str,
        paths: &[PathBuf],
    ) -> Vec<(PathBuf, ApiResult<ImportReport>)> {
        let results = join_all(paths.iter().map(|path| self.import_file(entity, path))).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            error!(entity = %entity, files = paths.len(), failed, "批量导入存在失败文件");
        } else {
            info!(entity = %entity, files = paths.len(), "批量导入完成");
        }

        paths.iter().cloned().zip(results).collect()
    }

    /// 提交导入报告中接收的实体图
    #[instrument(skip(self, report), fields(batch_id = %report.batch_id, entity = %report.entity_type))]
    pub fn commit(&self, report: &ImportReport) -> ApiResult<CommitSummary> {
        let writer = GraphWriter::new(self.store.as_ref(), &self.registry);
        Ok(writer.commit(&report.batch_id, &report.reconciliation.accepted)?)
    }

    // ==========================================
    // 文件读写（阻塞 I/O 放到 blocking 线程池）
    // ==========================================

    async fn read_sheet(&self, path: &Path) -> ApiResult<Vec<SheetRow>> {
        let delimiter = config_value(self.config.get_csv_delimiter().await)?;
        let sheet_name = config_value(self.config.get_sheet_name().await)?;
        let parser = UniversalSheetParser::new(delimiter, Some(sheet_name));
        let path = path.to_path_buf();

        let rows = tokio::task::spawn_blocking(move || parser.read_rows(&path))
            .await
            .map_err(|e| ApiError::InternalError(format!("读取任务失败: {}", e)))??;
        Ok(rows)
    }

    async fn write_sheet(
        &self,
        path: PathBuf,
        format: SheetFormat,
        headers: Vec<String>,
        rows: Vec<ExportRow>,
    ) -> ApiResult<()> {
        let delimiter = config_value(self.config.get_csv_delimiter().await)?;
        let sheet_name = config_value(self.config.get_sheet_name().await)?;
        let writer = writer_for(format, delimiter, &sheet_name);

        tokio::task::spawn_blocking(move || writer.write(&path, &headers, &rows))
            .await
            .map_err(|e| ApiError::InternalError(format!("写出任务失败: {}", e)))??;
        Ok(())
    }

    /// 目标文件与格式；.xls 只支持读取
    async fn output_target(&self, path: &Path) -> ApiResult<(PathBuf, SheetFormat)> {
        match path.extension().and_then(|e| e.to_str()) {
            None => {
                let format = config_value(self.config.get_default_export_format().await)?;
                Ok((path.with_extension(format.extension()), format))
            }
            Some(ext) => match SheetFormat::from_extension(ext) {
                Some(format) if !ext.eq_ignore_ascii_case("xls") => Ok((path.to_path_buf(), format)),
                _ => Err(SheetError::UnsupportedFormat(ext.to_string()).into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticSheetConfig;
    use crate::domain::{EntityType, FieldDef, Record, RuleSet};
    use crate::repository::MemoryEntityStore;
    use tempfile::TempDir;

    fn api(config: StaticSheetConfig) -> SheetApi<MemoryEntityStore, StaticSheetConfig> {
        let mut registry = EntityRegistry::new();
        registry
            .insert(
                EntityType::new("Customer", vec![FieldDef::integer("id"), FieldDef::text("name")])
                    .with_rules(RuleSet::new().rule("name", "required")),
            )
            .unwrap();
        SheetApi::new(
            Arc::new(registry),
            Arc::new(MemoryEntityStore::new()),
            Arc::new(config),
        )
    }

    #[tokio::test]
    async fn test_export_without_extension_uses_default_format() {
        let dir = TempDir::new().unwrap();
        let api = api(StaticSheetConfig {
            default_export_format: SheetFormat::Csv,
            ..StaticSheetConfig::default()
        });
        let customer = api.registry().require("Customer").unwrap().clone();
        api.store()
            .seed(&customer, Record::new().with("name", "CustomerA"))
            .unwrap();

        let summary = api.export_file("Customer", &dir.path().join("customers")).await.unwrap();
        assert_eq!(summary.format, SheetFormat::Csv);
        assert_eq!(summary.path, dir.path().join("customers.csv"));
        assert_eq!(summary.rows, 1);
        assert!(summary.path.exists());
    }

    #[tokio::test]
    async fn test_import_over_row_limit_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("customers.csv");
        std::fs::write(&path, "name\nA\nB\nC\n").unwrap();

        let api = api(StaticSheetConfig {
            max_import_rows: 2,
            ..StaticSheetConfig::default()
        });
        let err = api.import_file("Customer", &path).await.unwrap_err();
        assert!(matches!(err, ApiError::TooManyRows { rows: 3, limit: 2, .. }));
    }

    #[tokio::test]
    async fn test_xls_output_unsupported() {
        let dir = TempDir::new().unwrap();
        let api = api(StaticSheetConfig::default());
        let err = api
            .template_file("Customer", &dir.path().join("template.xls"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::FileError(SheetError::UnsupportedFormat(_))));
    }
}
