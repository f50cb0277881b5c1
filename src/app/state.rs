// ==========================================
// 拉丝/桁架生产线 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{
    FinishedGoodsApi, Notifier, ProductionApi, StaticCredentialAuthorizer, StockApi,
    TracingNotifier, TransferApi,
};
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::config::production_config_trait::{ProductionConfigReader, ProductionSettings};
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{
    FinishedGoodsRepository, ProductionOrderRepository, RecordStore, ShiftReportRepository,
    SqliteRecordStore, StockLotRepository, TransferRepository,
};

/// 应用状态
///
/// 所有 API 共享同一个数据库连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 引擎参数 (启动时从 config_kv 读取)
    pub settings: ProductionSettings,

    pub stock_api: Arc<StockApi>,
    pub production_api: Arc<ProductionApi>,
    pub transfer_api: Arc<TransferApi>,
    pub finished_goods_api: Arc<FinishedGoodsApi>,

    /// 配置管理 (读写 config_kv)
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例 (通知转发到 tracing)
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    pub async fn new(db_path: String) -> Result<Self, String> {
        Self::with_notifier(db_path, Arc::new(TracingNotifier)).await
    }

    /// 使用指定通知实现创建AppState
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并建表
    /// 2. 读取引擎参数与主管口令
    /// 3. 创建所有Repository与API实例
    pub async fn with_notifier(
        db_path: String,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let settings = config_manager
            .load_settings()
            .await
            .map_err(|e| format!("读取生产配置失败: {}", e))?;
        let credential = config_manager
            .get_global_config_value(config_keys::MANAGER_CREDENTIAL)
            .map_err(|e| format!("读取主管口令失败: {}", e))?;
        if credential.is_none() {
            tracing::warn!(
                config_key = config_keys::MANAGER_CREDENTIAL,
                "未配置主管口令，超差包称重将无法授权"
            );
        }

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::from_connection(conn));
        let lot_repo = Arc::new(StockLotRepository::new(store.clone()));
        let order_repo = Arc::new(ProductionOrderRepository::new(store.clone()));
        let transfer_repo = Arc::new(TransferRepository::new(store.clone()));
        let finished_goods_repo = Arc::new(FinishedGoodsRepository::new(store.clone()));
        let shift_report_repo = Arc::new(ShiftReportRepository::new(store));

        // ==========================================
        // 初始化API层
        // ==========================================
        let stock_api = Arc::new(StockApi::new(lot_repo.clone(), notifier.clone()));
        let production_api = Arc::new(ProductionApi::new(
            lot_repo.clone(),
            order_repo,
            finished_goods_repo.clone(),
            shift_report_repo,
            &settings,
            Arc::new(StaticCredentialAuthorizer::new(credential)),
            notifier.clone(),
        ));
        let transfer_api = Arc::new(TransferApi::new(
            lot_repo,
            transfer_repo.clone(),
            notifier.clone(),
        ));
        let finished_goods_api = Arc::new(FinishedGoodsApi::new(
            finished_goods_repo,
            transfer_repo,
            notifier,
        ));

        tracing::info!(
            residual_threshold_kg = settings.residual_threshold_kg,
            package_tolerance = settings.package_tolerance,
            truss_models = settings.truss_catalog.models().len(),
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            settings,
            stock_api,
            production_api,
            transfer_api,
            finished_goods_api,
            config_manager,
        })
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 WIRE_TRUSS_LEDGER_DB_PATH 优先
/// - 开发环境: 用户数据目录/wire-truss-ledger-dev/wire_truss_ledger.db
/// - 生产环境: 用户数据目录/wire-truss-ledger/wire_truss_ledger.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("WIRE_TRUSS_LEDGER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./wire_truss_ledger.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("wire-truss-ledger-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("wire-truss-ledger");
        }

        std::fs::create_dir_all(&path).ok();
        path = path.join("wire_truss_ledger.db");
    }

    path.to_string_lossy().to_string()
}
