// ==========================================
// 拉丝/桁架生产线 - 班次报表
// ==========================================
// 只读派生: 由订单事件按 [start, end) 窗口生成
// ==========================================

use crate::domain::order::{DowntimeEvent, ProcessedLot};
use crate::domain::types::MachineType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftReport {
    pub id: String,
    pub date: DateTime<Utc>, // = 班次结束时间
    pub operator: String,
    pub machine: MachineType,
    pub production_order_id: String,
    pub order_number: String,
    pub target_gauge: String,
    pub truss_model: Option<String>,
    pub truss_size: Option<String>,
    pub quantity_to_produce: Option<u32>,
    pub shift_start: DateTime<Utc>,
    pub shift_end: DateTime<Utc>,
    pub processed_lots: Vec<ProcessedLot>,
    pub downtime_events: Vec<DowntimeEvent>,
    pub total_produced_weight: f64,
    pub total_produced_meters: f64,
    pub total_scrap_weight: f64,
    pub scrap_percentage: f64,
}
