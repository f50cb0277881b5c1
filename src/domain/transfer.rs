// ==========================================
// 拉丝/桁架生产线 - 调拨记录领域模型
// ==========================================
// 红线: 调拨记录一经生成不可修改
// 对齐: transfer_records / finished_goods_transfer_records 集合
// ==========================================

use crate::domain::types::MaterialType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// TransferRecord - 原料调拨记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub operator: String,
    pub destination_sector: String,
    pub transferred_lots: Vec<TransferredLot>,
}

impl TransferRecord {
    pub fn total_weight(&self) -> f64 {
        self.transferred_lots.iter().map(|l| l.transferred_quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferredLot {
    pub lot_id: String,
    pub internal_lot: String,
    pub material_type: MaterialType,
    pub gauge: String,
    pub transferred_quantity: f64,
}

// ==========================================
// FinishedGoodsTransferRecord - 成品调拨记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedGoodsTransferRecord {
    pub id: String,
    pub date: DateTime<Utc>,
    pub operator: String,
    pub destination: String,
    pub other_destination: Option<String>, // destination = "other" 时的自由文本
    pub transferred_items: Vec<TransferredFinishedGood>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferredFinishedGood {
    pub item_id: String,
    pub model: String,
    pub size: String,
    pub transferred_quantity: u32,
    pub transferred_weight: f64,
}

// ==========================================
// 调拨计划入参
// ==========================================

/// 调拨需求 (物料 + 线径 + 目标重量)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub material_type: MaterialType,
    pub gauge: String,
    pub target_weight: f64,
}

/// 成品调拨明细 (按件数)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedGoodsTransferLine {
    pub item_id: String,
    pub quantity: u32,
}
