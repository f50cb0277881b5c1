// ==========================================
// 拉丝/桁架生产线 - 成品库存领域模型
// ==========================================
// 标准桁架入 finished_goods 集合, 短料入 offcut_items 集合
// ==========================================

use crate::domain::types::{FinishedGoodsStatus, ProductType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedGoodsItem {
    pub id: String,
    pub production_date: DateTime<Utc>,
    pub production_order_id: String,
    pub order_number: String,
    pub product_type: ProductType,
    pub model: String,
    pub size: String,
    pub quantity: u32,
    pub total_weight: f64,
    pub status: FinishedGoodsStatus,
}

impl FinishedGoodsItem {
    /// 单件重量 (件数为 0 时返回 0)
    pub fn weight_per_piece(&self) -> f64 {
        if self.quantity == 0 {
            0.0
        } else {
            self.total_weight / self.quantity as f64
        }
    }

    pub fn is_offcut(&self) -> bool {
        self.product_type == ProductType::TrussOffcut
    }
}
