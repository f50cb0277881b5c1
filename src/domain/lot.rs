// ==========================================
// 拉丝/桁架生产线 - 原料批次领域模型
// ==========================================
// 红线: remaining_quantity >= 0, 历史只追加不修改
// 用途: 收货写入, 生产/调拨/拉丝转化时变更
// 对齐: stock_lots 集合
// ==========================================

use crate::domain::types::{LotStatus, MaterialType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

// ==========================================
// StockLot - 原料批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLot {
    // ===== 主键 =====
    pub id: String,

    // ===== 收货信息 =====
    pub entry_date: DateTime<Utc>,    // 入库日期 (FIFO 依据)
    pub supplier: String,             // 供应商
    pub invoice_number: String,       // 发票号 (NF-e)
    pub conference_number: String,    // 收货核对单号
    pub internal_lot: String,         // 内部批次号 (排序用)
    pub supplier_lot: String,         // 供应商批次号
    pub run_number: String,           // 炉号

    // ===== 物料维度 =====
    pub material_type: MaterialType,
    pub gauge: String,                // 线径 (bitola), 如 "6.35"

    // ===== 重量 (kg) =====
    pub label_weight: f64,            // 标签重量
    pub initial_quantity: f64,        // 初始重量 (磅秤)
    pub remaining_quantity: f64,      // 剩余重量

    // ===== 状态与占用 =====
    pub status: LotStatus,
    #[serde(default)]
    pub production_order_ids: Vec<String>, // 占用该批次的生产订单

    // ===== 审计 =====
    #[serde(default)]
    pub history: Vec<HistoryEvent>,
}

impl StockLot {
    /// 是否被指定订单占用
    pub fn is_claimed_by(&self, order_id: &str) -> bool {
        self.production_order_ids.iter().any(|id| id == order_id)
    }
}

// ==========================================
// HistoryEvent - 批次历史记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub details: BTreeMap<String, JsonValue>,
}

impl HistoryEvent {
    pub fn new(event_type: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.into(),
            date,
            details: BTreeMap::new(),
        }
    }

    /// 追加明细字段
    pub fn with(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// 历史记录类型
pub mod history_types {
    pub const RECEIPT: &str = "RECEIPT";
    pub const CONSUMPTION: &str = "CONSUMPTION";
    pub const TRUSS_CONSUMPTION: &str = "TRUSS_CONSUMPTION";
    pub const WIRE_DRAW_TRANSFORMATION: &str = "WIRE_DRAW_TRANSFORMATION";
    pub const TRANSFER: &str = "TRANSFER";
    pub const ORDER_CLAIM: &str = "ORDER_CLAIM";
    pub const ORDER_RELEASE: &str = "ORDER_RELEASE";
}

// ==========================================
// 收货核对 (Conference) - 批次创建入参
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialReceipt {
    pub entry_date: DateTime<Utc>,
    pub supplier: String,
    pub invoice_number: String,
    pub conference_number: String,
    pub lots: Vec<ReceivedLot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedLot {
    pub internal_lot: String,
    pub supplier_lot: String,
    pub run_number: String,
    pub material_type: MaterialType,
    pub gauge: String,
    pub label_weight: f64,
    pub scale_weight: f64, // 磅秤实测重量 -> initial/remaining
}
