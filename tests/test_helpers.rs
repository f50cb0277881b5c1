// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库, AppState 装配, 收货与订单测试数据
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::NamedTempFile;
use wire_truss_ledger::api::MemoryNotifier;
use wire_truss_ledger::app::AppState;
use wire_truss_ledger::config::{config_keys, ConfigManager};
use wire_truss_ledger::db::{init_schema, open_sqlite_connection};
use wire_truss_ledger::domain::order::{RawTrussSelection, SelectedLotIdsInput};
use wire_truss_ledger::{
    MachineType, MaterialReceipt, MaterialType, NewProductionOrder, ReceivedLot, StockLot,
};

pub const MANAGER_CREDENTIAL: &str = "4321";

/// 测试环境: 临时库 + AppState + 通知收集
pub struct TestEnv {
    pub temp_file: NamedTempFile,
    pub db_path: String,
    pub state: AppState,
    pub notifier: Arc<MemoryNotifier>,
}

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 写入全局配置
pub fn set_config(db_path: &str, key: &str, value: &str) {
    let config = ConfigManager::new(db_path).unwrap();
    config.set_global_config_value(key, value).unwrap();
}

/// 创建测试环境 (已配置主管口令)
pub async fn create_test_env() -> TestEnv {
    let (temp_file, db_path) = create_test_db().unwrap();
    set_config(&db_path, config_keys::MANAGER_CREDENTIAL, MANAGER_CREDENTIAL);
    let notifier = Arc::new(MemoryNotifier::new());
    let state = AppState::with_notifier(db_path.clone(), notifier.clone())
        .await
        .unwrap();
    TestEnv {
        temp_file,
        db_path,
        state,
        notifier,
    }
}

/// 在同一数据库上重新装配 AppState (用于读取新配置)
pub async fn reopen(env: &TestEnv) -> (AppState, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::new());
    let state = AppState::with_notifier(env.db_path.clone(), notifier.clone())
        .await
        .unwrap();
    (state, notifier)
}

// ==========================================
// 收货数据
// ==========================================

pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, d, 8, 0, 0).unwrap()
}

pub fn received(
    internal_lot: &str,
    material_type: MaterialType,
    gauge: &str,
    label_weight: f64,
    scale_weight: f64,
) -> ReceivedLot {
    ReceivedLot {
        internal_lot: internal_lot.to_string(),
        supplier_lot: format!("S-{}", internal_lot),
        run_number: "C-2231".to_string(),
        material_type,
        gauge: gauge.to_string(),
        label_weight,
        scale_weight,
    }
}

pub fn receipt(conference_number: &str, entry_date: DateTime<Utc>, lots: Vec<ReceivedLot>) -> MaterialReceipt {
    MaterialReceipt {
        entry_date,
        supplier: "Belgo".to_string(),
        invoice_number: "NF-88120".to_string(),
        conference_number: conference_number.to_string(),
        lots,
    }
}

/// 按内部批次号查找批次 ID
pub fn lot_id(lots: &[StockLot], internal_lot: &str) -> String {
    lots.iter()
        .find(|l| l.internal_lot == internal_lot)
        .map(|l| l.id.clone())
        .unwrap_or_else(|| panic!("批次不存在: {}", internal_lot))
}

pub async fn find_lot(state: &AppState, lot_id: &str) -> StockLot {
    state
        .stock_api
        .list_lots()
        .await
        .unwrap()
        .into_iter()
        .find(|l| l.id == lot_id)
        .unwrap()
}

// ==========================================
// 桁架场景
// ==========================================

/// 桁架原料: 上弦 T1 200kg, 下弦 B1/B2 各 50kg, 斜筋 D1/D2 各 60kg
pub async fn receive_truss_stock(state: &AppState) -> Vec<StockLot> {
    state
        .stock_api
        .receive_material(receipt(
            "CONF-T",
            day(3),
            vec![
                received("T1", MaterialType::Ca60, "5.6", 200.0, 200.0),
                received("B1", MaterialType::Ca60, "3.2", 50.0, 50.0),
                received("B2", MaterialType::Ca60, "3.2", 50.0, 50.0),
                received("D1", MaterialType::Ca60, "3.2", 60.0, 60.0),
                received("D2", MaterialType::Ca60, "3.2", 60.0, 60.0),
            ],
        ))
        .await
        .unwrap()
}

/// H-8 LEVE 6m 订单; 100 件理论重量 289.8kg
pub fn truss_order(order_number: &str, pieces: u32, lots: &[StockLot]) -> NewProductionOrder {
    NewProductionOrder {
        order_number: order_number.to_string(),
        machine: MachineType::Truss,
        target_gauge: "5.6".to_string(),
        truss_model: Some("H-8 LEVE".to_string()),
        truss_size: Some("6".to_string()),
        quantity_to_produce: Some(pieces),
        selected_lot_ids: SelectedLotIdsInput::Structured(RawTrussSelection {
            all_top: vec![lot_id(lots, "T1")],
            all_bottom_left: vec![lot_id(lots, "B1")],
            all_bottom_right: vec![lot_id(lots, "B2")],
            all_diagonal_left: vec![lot_id(lots, "D1")],
            all_diagonal_right: vec![lot_id(lots, "D2")],
            ..Default::default()
        }),
        planned_output_weight: None,
    }
}

// ==========================================
// 拉丝场景
// ==========================================

/// 盘条: W1 标签 1000 / 磅秤 1005, W2 800 / 800, W3 600 / 600
pub async fn receive_wire_rod(state: &AppState) -> Vec<StockLot> {
    state
        .stock_api
        .receive_material(receipt(
            "CONF-W",
            day(1),
            vec![
                received("W1", MaterialType::WireRod, "6.5", 1000.0, 1005.0),
                received("W2", MaterialType::WireRod, "6.5", 800.0, 800.0),
                received("W3", MaterialType::WireRod, "6.5", 600.0, 600.0),
            ],
        ))
        .await
        .unwrap()
}

pub fn wire_draw_order(order_number: &str, lot_ids: Vec<String>) -> NewProductionOrder {
    NewProductionOrder {
        order_number: order_number.to_string(),
        machine: MachineType::WireDraw,
        target_gauge: "4.2".to_string(),
        truss_model: None,
        truss_size: None,
        quantity_to_produce: None,
        selected_lot_ids: SelectedLotIdsInput::Flat(lot_ids),
        planned_output_weight: None,
    }
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}
