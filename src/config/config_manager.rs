// ==========================================
// 拉丝/桁架生产线 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::production_config_trait::ProductionConfigReader;
use crate::config::truss_catalog::{TrussModel, TrussModelCatalog};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取正数配置, 非法或非正值回退默认值
    fn get_positive_f64(&self, key: &str, default: f64) -> Result<f64, Box<dyn Error>> {
        let value = self.get_config_or_default(key, &default.to_string())?;
        match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
            _ => {
                tracing::warn!(config_key = key, raw_value = %value, "配置值非法，使用默认值");
                Ok(default)
            }
        }
    }
}

// ==========================================
// ProductionConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ProductionConfigReader for ConfigManager {
    async fn get_residual_threshold_kg(&self) -> Result<f64, Box<dyn Error>> {
        self.get_positive_f64(
            config_keys::RESIDUAL_THRESHOLD_KG,
            crate::engine::lot_status::DEFAULT_RESIDUAL_THRESHOLD_KG,
        )
    }

    async fn get_package_tolerance(&self) -> Result<f64, Box<dyn Error>> {
        self.get_positive_f64(
            config_keys::PACKAGE_TOLERANCE,
            crate::engine::package_gate::DEFAULT_PACKAGE_TOLERANCE,
        )
    }

    async fn get_steel_density(&self) -> Result<f64, Box<dyn Error>> {
        self.get_positive_f64(
            config_keys::STEEL_DENSITY,
            crate::engine::shift_report::DEFAULT_STEEL_DENSITY,
        )
    }

    async fn get_truss_catalog(&self) -> Result<TrussModelCatalog, Box<dyn Error>> {
        let Some(value) = self.get_config_value(config_keys::TRUSS_MODELS)? else {
            return Ok(TrussModelCatalog::builtin());
        };
        match serde_json::from_str::<Vec<TrussModel>>(&value) {
            Ok(models) if !models.is_empty() => Ok(TrussModelCatalog::new(models)),
            _ => {
                tracing::warn!(
                    config_key = config_keys::TRUSS_MODELS,
                    raw_value = %value,
                    "桁架型号配置格式错误，使用内置目录"
                );
                Ok(TrussModelCatalog::builtin())
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 批次余量
    pub const RESIDUAL_THRESHOLD_KG: &str = "residual_threshold_kg";

    // 包称重
    pub const PACKAGE_TOLERANCE: &str = "package_tolerance";

    // 班次报表
    pub const STEEL_DENSITY: &str = "steel_density";

    // 桁架型号目录 (JSON 数组)
    pub const TRUSS_MODELS: &str = "truss_models";

    // 经理授权口令
    pub const MANAGER_CREDENTIAL: &str = "manager_credential";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use serde_json::json;
    use tempfile::NamedTempFile;

    fn create_test_manager() -> (NamedTempFile, ConfigManager) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        let conn = open_sqlite_connection(&db_path).unwrap();
        init_schema(&conn).unwrap();
        let manager = ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap();
        (temp_file, manager)
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let (_tmp, manager) = create_test_manager();

        let settings = manager.load_settings().await.unwrap();
        assert_eq!(settings.residual_threshold_kg, 0.05);
        assert_eq!(settings.package_tolerance, 0.01);
        assert_eq!(settings.steel_density, 7850.0);
        assert!(settings.truss_catalog.find("H-8 PESADA", "12").is_some());
    }

    #[tokio::test]
    async fn test_overrides_and_invalid_values() {
        let (_tmp, manager) = create_test_manager();
        manager
            .set_global_config_value(config_keys::PACKAGE_TOLERANCE, "0.02")
            .unwrap();
        manager
            .set_global_config_value(config_keys::RESIDUAL_THRESHOLD_KG, "-1")
            .unwrap();

        assert_eq!(manager.get_package_tolerance().await.unwrap(), 0.02);
        assert_eq!(manager.get_residual_threshold_kg().await.unwrap(), 0.05);
    }

    #[tokio::test]
    async fn test_truss_models_override() {
        let (_tmp, manager) = create_test_manager();
        let custom = json!([{
            "code": "X1",
            "model": "H-12 ESPECIAL",
            "size": "8",
            "top_gauge": "7",
            "bottom_gauge": "5",
            "diagonal_gauge": "4.2",
            "unit_weight": 10.0,
            "top_weight": 4.0,
            "diagonal_weight": 3.0,
            "bottom_weight": 3.0
        }]);
        manager
            .set_global_config_value(config_keys::TRUSS_MODELS, &custom.to_string())
            .unwrap();

        let catalog = manager.get_truss_catalog().await.unwrap();
        assert_eq!(catalog.models().len(), 1);
        assert!(catalog.find("h-12 especial", "8.0").is_some());

        manager
            .set_global_config_value(config_keys::TRUSS_MODELS, "not json")
            .unwrap();
        let fallback = manager.get_truss_catalog().await.unwrap();
        assert!(fallback.find("H-8 LEVE", "6").is_some());
    }
}
