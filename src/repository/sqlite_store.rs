// ==========================================
// 实体表格导入导出 - SQLite 仓储实现
// ==========================================
// 职责: EntityStore 的 rusqlite 实现；每个实体类型一张表
// 建表: 构造时按注册表自动 CREATE TABLE IF NOT EXISTS
// 主键: 未声明或声明为整数 → INTEGER AUTOINCREMENT；文本主键 → uuid
// ==========================================

use crate::contract::EntityRegistry;
use crate::db::open_sqlite_connection;
use crate::domain::{EntityType, FieldType, Record, RelationDef, Value};
use crate::repository::entity_store::{EntityStore, ForeignLookup};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

pub struct SqliteEntityStore {
    conn: Arc<Mutex<Connection>>,
    registry: Arc<EntityRegistry>,
}

impl SqliteEntityStore {
    /// 打开数据库并为全部已注册实体建表
    pub fn new(db_path: &str, registry: Arc<EntityRegistry>) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)), registry)
    }

    /// 从已有连接创建（共享连接场景）
    pub fn from_connection(
        conn: Arc<Mutex<Connection>>,
        registry: Arc<EntityRegistry>,
    ) -> RepositoryResult<Self> {
        let store = Self { conn, registry };
        store.ensure_tables()?;
        Ok(store)
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn entity(&self, name: &str) -> RepositoryResult<&EntityType> {
        self.registry
            .get(name)
            .ok_or_else(|| RepositoryError::UnknownEntity(name.to_string()))
    }

    /// 为全部已注册实体建表（幂等）
    pub fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        for name in self.registry.names() {
            let entity = self.entity(name)?;
            conn.execute_batch(&create_table_sql(entity))?;
        }
        info!(tables = self.registry.len(), "实体表初始化完成");
        Ok(())
    }

    fn select_where(
        &self,
        entity: &EntityType,
        field: &str,
        value: &Value,
        limit_one: bool,
    ) -> RepositoryResult<Vec<Record>> {
        let typed = coerce(entity, field, value);
        if typed.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 ORDER BY rowid{}",
            quote_ident(&entity.name),
            quote_ident(field),
            if limit_one { " LIMIT 1" } else { "" }
        );

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let rows = stmt.query_map([to_sql(&typed)], |row| read_record(entity, &columns, row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

impl ForeignLookup for SqliteEntityStore {
    fn find_by_field(
        &self,
        entity: &str,
        field: &str,
        value: &Value,
    ) -> RepositoryResult<Option<Record>> {
        let entity = self.entity(entity)?;
        Ok(self.select_where(entity, field, value, true)?.into_iter().next())
    }
}

impl EntityStore for SqliteEntityStore {
    fn load_all(&self, entity: &str) -> RepositoryResult<Vec<Record>> {
        let entity = self.entity(entity)?;
        let sql = format!("SELECT * FROM {} ORDER BY rowid", quote_ident(&entity.name));

        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let rows = stmt.query_map([], |row| read_record(entity, &columns, row))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        debug!(entity = %entity.name, count = records.len(), "加载全部记录");
        Ok(records)
    }

    fn load_related(&self, relation: &RelationDef, parent: &Record) -> RepositoryResult<Vec<Record>> {
        let target = self.entity(&relation.target_type)?;
        self.select_where(target, &relation.foreign_field, parent.get(&relation.local_field), false)
    }

    fn upsert(&self, entity: &EntityType, mut record: Record) -> RepositoryResult<Record> {
        let pk = entity.primary_key.clone();
        let key = coerce(entity, &pk, record.get(&pk));

        // 仅写入已知列
        let columns: Vec<(String, Value)> = record
            .iter()
            .filter(|(field, _)| *field != &pk && entity.field(field).is_some())
            .map(|(field, value)| (field.clone(), coerce(entity, field, value)))
            .collect();

        let conn = self.get_conn()?;

        let exists = !key.is_empty()
            && conn
                .query_row(
                    &format!(
                        "SELECT 1 FROM {} WHERE {} = ?1",
                        quote_ident(&entity.name),
                        quote_ident(&pk)
                    ),
                    [to_sql(&key)],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

        if exists {
            if !columns.is_empty() {
                let assignments: Vec<String> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, (field, _))| format!("{} = ?{}", quote_ident(field), i + 1))
                    .collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    quote_ident(&entity.name),
                    assignments.join(", "),
                    quote_ident(&pk),
                    columns.len() + 1
                );
                let params = columns
                    .iter()
                    .map(|(_, v)| to_sql(v))
                    .chain(std::iter::once(to_sql(&key)));
                conn.execute(&sql, params_from_iter(params))?;
            }
        } else {
            let key = if key.is_empty() && is_text_key(entity) {
                Value::Text(Uuid::new_v4().to_string())
            } else {
                key
            };

            let mut fields: Vec<String> = columns.iter().map(|(f, _)| quote_ident(f)).collect();
            let mut values: Vec<SqlValue> = columns.iter().map(|(_, v)| to_sql(v)).collect();
            if !key.is_empty() {
                fields.push(quote_ident(&pk));
                values.push(to_sql(&key));
            }

            let sql = if fields.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&entity.name))
            } else {
                let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_ident(&entity.name),
                    fields.join(", "),
                    placeholders.join(", ")
                )
            };
            conn.execute(&sql, params_from_iter(values))?;

            let key = if key.is_empty() {
                Value::Integer(conn.last_insert_rowid())
            } else {
                key
            };
            record.set(pk.clone(), key);
        }

        let key = record.get(&pk).clone();
        drop(conn);

        self.select_where(entity, &pk, &key, true)?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: entity.name.clone(),
                id: key.to_cell_string(),
            })
    }
}

// ==========================================
// SQL 辅助函数
// ==========================================

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn is_text_key(entity: &EntityType) -> bool {
    matches!(
        entity.field(&entity.primary_key).map(|f| f.field_type),
        Some(FieldType::Text)
    )
}

fn sql_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Integer | FieldType::Boolean => "INTEGER",
        FieldType::Decimal => "REAL",
        FieldType::Text | FieldType::Date | FieldType::DateTime => "TEXT",
    }
}

fn create_table_sql(entity: &EntityType) -> String {
    let pk = &entity.primary_key;
    let pk_column = if is_text_key(entity) {
        format!("{} TEXT PRIMARY KEY", quote_ident(pk))
    } else {
        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(pk))
    };

    let mut columns = vec![pk_column];
    for field in entity.fields.iter().filter(|f| &f.name != pk) {
        columns.push(format!("{} {}", quote_ident(&field.name), sql_type(field.field_type)));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({});",
        quote_ident(&entity.name),
        columns.join(", ")
    )
}

/// 字段类型（主键未声明时按整数处理）
fn field_type_of(entity: &EntityType, field: &str) -> FieldType {
    entity
        .field(field)
        .map(|f| f.field_type)
        .unwrap_or(FieldType::Integer)
}

/// 将任意值转换为列的声明类型；无法转换时保留原值交给 SQLite 亲和性处理
fn coerce(entity: &EntityType, field: &str, value: &Value) -> Value {
    if value.is_empty() {
        return Value::Empty;
    }
    Value::parse_cell(&value.to_cell_string(), field_type_of(entity, field))
        .unwrap_or_else(|_| value.clone())
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Empty => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Decimal(d) => SqlValue::Real(*d),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Date(_) | Value::DateTime(_) => SqlValue::Text(value.to_cell_string()),
    }
}

fn from_sql(value: SqlValue, field_type: FieldType) -> Value {
    match (value, field_type) {
        (SqlValue::Null, _) => Value::Empty,
        (SqlValue::Integer(i), FieldType::Boolean) => Value::Boolean(i != 0),
        (SqlValue::Integer(i), FieldType::Decimal) => Value::Decimal(i as f64),
        (SqlValue::Integer(i), _) => Value::Integer(i),
        (SqlValue::Real(d), _) => Value::Decimal(d),
        (SqlValue::Text(s), FieldType::Text) => Value::Text(s),
        (SqlValue::Text(s), field_type) => {
            Value::parse_cell(&s, field_type).unwrap_or(Value::Text(s))
        }
        (SqlValue::Blob(bytes), _) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

fn read_record(entity: &EntityType, columns: &[String], row: &Row<'_>) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (idx, column) in columns.iter().enumerate() {
        let raw: SqlValue = row.get(idx)?;
        record.set(column.clone(), from_sql(raw, field_type_of(entity, column)));
    }
    Ok(record)
}
