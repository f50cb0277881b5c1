// ==========================================
// 拉丝/桁架生产线 - SQLite 文档存储
// ==========================================
// 职责: RecordStore 的 rusqlite 实现
// 存储: 每个集合一张表 (id, body JSON, updated_at)
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{Collection, RecordStore};
use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};

// ==========================================
// SqliteRecordStore
// ==========================================
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// 打开数据库并建表
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 (调用方负责建表)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn fetch_all(&self, collection: Collection) -> RepositoryResult<Vec<JsonValue>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT body FROM {} ORDER BY rowid",
            collection.table_name()
        ))?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(RepositoryError::from))
            .collect()
    }

    async fn insert(&self, collection: Collection, record: JsonValue) -> RepositoryResult<()> {
        let id = record_id(&record)?;
        let body = serde_json::to_string(&record)?;
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (id, body) VALUES (?1, ?2)",
                collection.table_name()
            ),
            params![id, body],
        )?;
        Ok(())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: JsonValue,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        if !merge_by_id(&conn, collection, id, &partial)? {
            return Err(RepositoryError::NotFound {
                entity: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_by_id(&self, collection: Collection, id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", collection.table_name()),
            params![id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_where(
        &self,
        collection: Collection,
        column: &str,
        value: &JsonValue,
    ) -> RepositoryResult<usize> {
        let path = json_path(column)?;
        let value = sql_value(value)?;
        let conn = self.get_conn()?;
        let affected = conn.execute(
            &format!(
                "DELETE FROM {} WHERE json_extract(body, ?1) = ?2",
                collection.table_name()
            ),
            params![path, value],
        )?;
        Ok(affected)
    }

    async fn update_where(
        &self,
        collection: Collection,
        column: &str,
        value: &JsonValue,
        partial: JsonValue,
    ) -> RepositoryResult<usize> {
        let path = json_path(column)?;
        let value = sql_value(value)?;
        let conn = self.get_conn()?;
        let ids = {
            let mut stmt = conn.prepare(&format!(
                "SELECT id FROM {} WHERE json_extract(body, ?1) = ?2 ORDER BY rowid",
                collection.table_name()
            ))?;
            let ids = stmt
                .query_map(params![path, value], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        let mut updated = 0;
        for id in &ids {
            if merge_by_id(&conn, collection, id, &partial)? {
                updated += 1;
            }
        }
        Ok(updated)
    }
}

// ==========================================
// 内部辅助
// ==========================================

fn record_id(record: &JsonValue) -> RepositoryResult<String> {
    record
        .get("id")
        .and_then(JsonValue::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RepositoryError::FieldValueError {
            field: "id".to_string(),
            message: "记录缺少字符串 id".to_string(),
        })
}

/// 读-合并-写; 记录不存在返回 false
fn merge_by_id(
    conn: &Connection,
    collection: Collection,
    id: &str,
    partial: &JsonValue,
) -> RepositoryResult<bool> {
    let table = collection.table_name();
    let body: Option<String> = conn
        .query_row(
            &format!("SELECT body FROM {} WHERE id = ?1", table),
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(body) = body else {
        return Ok(false);
    };

    let mut current: JsonValue = serde_json::from_str(&body)?;
    merge_partial(&mut current, partial)?;
    conn.execute(
        &format!(
            "UPDATE {} SET body = ?1, updated_at = datetime('now') WHERE id = ?2",
            table
        ),
        params![serde_json::to_string(&current)?, id],
    )?;
    Ok(true)
}

/// 顶层字段覆盖; id 不可修改
fn merge_partial(target: &mut JsonValue, partial: &JsonValue) -> RepositoryResult<()> {
    let (Some(target), Some(partial)) = (target.as_object_mut(), partial.as_object()) else {
        return Err(RepositoryError::ValidationError(
            "局部更新必须为 JSON 对象".to_string(),
        ));
    };
    for (key, value) in partial {
        if key == "id" {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}

/// 字段名 -> JSON 路径; 仅允许字母数字与下划线
fn json_path(column: &str) -> RepositoryResult<String> {
    let valid = !column.is_empty()
        && column
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(RepositoryError::FieldValueError {
            field: column.to_string(),
            message: "非法字段名".to_string(),
        });
    }
    Ok(format!("$.{}", column))
}

/// JSON 标量 -> SQLite 值 (与 json_extract 的返回类型对齐)
fn sql_value(value: &JsonValue) -> RepositoryResult<SqlValue> {
    match value {
        JsonValue::String(s) => Ok(SqlValue::Text(s.clone())),
        JsonValue::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real).ok_or_else(|| {
                RepositoryError::ValidationError(format!("无法比较的数值: {}", n))
            }),
        },
        _ => Err(RepositoryError::ValidationError(
            "条件值必须为 JSON 标量".to_string(),
        )),
    }
}
