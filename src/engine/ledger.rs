// ==========================================
// 拉丝/桁架生产线 - 原料批次台账
// ==========================================
// 职责: 持有批次快照,执行扣减/状态/历史/占用变更
// 红线: 台账不做任何持久化; 变更仅标记为脏,
//       由调用方在校验通过后取出批次写入
// 红线: remaining_quantity 永不为负
// ==========================================

use crate::domain::lot::{history_types, HistoryEvent, StockLot};
use crate::domain::types::{LotStatus, MaterialType};
use crate::engine::lot_status;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// 浮点比较容差 (kg)
const WEIGHT_EPSILON: f64 = 1e-9;

// ==========================================
// LedgerError - 台账错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("批次不存在: {lot_id}")]
    LotNotFound { lot_id: String },

    #[error("批次已存在: {lot_id}")]
    DuplicateLot { lot_id: String },

    #[error("扣减数量无效 (lot_id={lot_id}): {amount}")]
    InvalidAmount { lot_id: String, amount: f64 },

    #[error("批次余量不足 (lot_id={lot_id}): 请求 {requested:.2} kg, 剩余 {remaining:.2} kg")]
    InsufficientQuantity {
        lot_id: String,
        requested: f64,
        remaining: f64,
    },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// ==========================================
// 暂存写入批次
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum LotWrite {
    Insert(StockLot),
    Update(StockLot),
}

impl LotWrite {
    pub fn lot(&self) -> &StockLot {
        match self {
            LotWrite::Insert(lot) | LotWrite::Update(lot) => lot,
        }
    }

    pub fn lot_id(&self) -> &str {
        &self.lot().id
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerBatch {
    pub writes: Vec<LotWrite>,
}

impl LedgerBatch {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

// ==========================================
// StockLedger - 批次台账
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    lots: Vec<StockLot>,
    index: HashMap<String, usize>,
    // 按首次变更顺序记录
    dirty: Vec<String>,
    dirty_set: HashSet<String>,
    inserted: HashSet<String>,
}

impl StockLedger {
    /// 从批次快照构建台账 (调用方每条命令前重新拉取)
    pub fn from_snapshot(lots: Vec<StockLot>) -> Self {
        let index = lots
            .iter()
            .enumerate()
            .map(|(i, lot)| (lot.id.clone(), i))
            .collect();
        Self {
            lots,
            index,
            ..Default::default()
        }
    }

    pub fn get(&self, lot_id: &str) -> Option<&StockLot> {
        self.index.get(lot_id).map(|&i| &self.lots[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &StockLot> {
        self.lots.iter()
    }

    pub fn len(&self) -> usize {
        self.lots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn is_dirty(&self, lot_id: &str) -> bool {
        self.dirty_set.contains(lot_id)
    }

    /// 按物料 + 线径 + 状态查询
    pub fn find_by_material_and_gauge(
        &self,
        material: MaterialType,
        gauge: &str,
        status_in: &[LotStatus],
    ) -> Vec<&StockLot> {
        self.lots
            .iter()
            .filter(|lot| lot.material_type == material)
            .filter(|lot| gauge_matches(&lot.gauge, gauge))
            .filter(|lot| status_in.contains(&lot.status))
            .collect()
    }

    // ==========================================
    // 变更操作
    // ==========================================

    /// 扣减批次重量并追加历史
    ///
    /// 历史明细自动补充 amount / before / after
    ///
    /// # 返回
    /// 扣减后的剩余重量
    pub fn consume(
        &mut self,
        lot_id: &str,
        amount: f64,
        event: HistoryEvent,
    ) -> LedgerResult<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidAmount {
                lot_id: lot_id.to_string(),
                amount,
            });
        }

        let lot = self.lot_mut(lot_id)?;
        let before = lot.remaining_quantity;
        if amount > before + WEIGHT_EPSILON {
            return Err(LedgerError::InsufficientQuantity {
                lot_id: lot_id.to_string(),
                requested: amount,
                remaining: before,
            });
        }

        let after = round2((before - amount).max(0.0));
        lot.remaining_quantity = after;
        lot.history.push(
            event
                .with("amount", round2(amount))
                .with("before", round2(before))
                .with("after", after),
        );

        self.mark_dirty(lot_id);
        Ok(after)
    }

    pub fn set_status(&mut self, lot_id: &str, status: LotStatus) -> LedgerResult<()> {
        let lot = self.lot_mut(lot_id)?;
        if lot.status != status {
            lot.status = status;
            self.mark_dirty(lot_id);
        }
        Ok(())
    }

    pub fn append_history(&mut self, lot_id: &str, event: HistoryEvent) -> LedgerResult<()> {
        self.lot_mut(lot_id)?.history.push(event);
        self.mark_dirty(lot_id);
        Ok(())
    }

    /// 残余重量清零 (桁架耗尽判定后)
    ///
    /// # 返回
    /// 被清零的重量
    pub fn write_off_residual(&mut self, lot_id: &str) -> LedgerResult<f64> {
        let lot = self.lot_mut(lot_id)?;
        let residual = lot.remaining_quantity;
        if residual != 0.0 {
            lot.remaining_quantity = 0.0;
            self.mark_dirty(lot_id);
        }
        Ok(residual)
    }

    /// 订单占用批次
    pub fn claim(&mut self, lot_id: &str, order_id: &str) -> LedgerResult<()> {
        let lot = self.lot_mut(lot_id)?;
        if !lot.is_claimed_by(order_id) {
            lot.production_order_ids.push(order_id.to_string());
            self.mark_dirty(lot_id);
        }
        Ok(())
    }

    /// 订单释放批次
    ///
    /// # 返回
    /// 释放后是否仍有其他订单占用
    pub fn release(&mut self, lot_id: &str, order_id: &str) -> LedgerResult<bool> {
        let lot = self.lot_mut(lot_id)?;
        let before = lot.production_order_ids.len();
        lot.production_order_ids.retain(|id| id != order_id);
        let still_claimed = !lot.production_order_ids.is_empty();
        if lot.production_order_ids.len() != before {
            self.mark_dirty(lot_id);
        }
        Ok(still_claimed)
    }

    /// 拉丝 1:1 转化: 原批次就地替换为 CA-60
    pub fn replace_transformed(
        &mut self,
        lot_id: &str,
        target_gauge: &str,
        final_weight: f64,
        now: DateTime<Utc>,
        order_number: &str,
    ) -> LedgerResult<()> {
        if !final_weight.is_finite() || final_weight < 0.0 {
            return Err(LedgerError::InvalidAmount {
                lot_id: lot_id.to_string(),
                amount: final_weight,
            });
        }

        let lot = self.lot_mut(lot_id)?;
        let event = HistoryEvent::new(history_types::WIRE_DRAW_TRANSFORMATION, now)
            .with("order_number", order_number)
            .with("from_material", lot.material_type.to_string())
            .with("from_gauge", lot.gauge.clone())
            .with("to_gauge", target_gauge)
            .with("input_label_weight", lot.label_weight)
            .with("final_weight", final_weight);

        lot.material_type = MaterialType::Ca60;
        lot.gauge = target_gauge.to_string();
        lot.label_weight = final_weight;
        lot.initial_quantity = final_weight;
        lot.remaining_quantity = final_weight;
        lot.status = lot_status::after_transformation();
        lot.production_order_ids.clear();
        lot.history.push(event);

        self.mark_dirty(lot_id);
        Ok(())
    }

    /// 新批次入账 (收货)
    pub fn insert_new(&mut self, lot: StockLot) -> LedgerResult<()> {
        if self.index.contains_key(&lot.id) {
            return Err(LedgerError::DuplicateLot { lot_id: lot.id });
        }
        let id = lot.id.clone();
        self.index.insert(id.clone(), self.lots.len());
        self.lots.push(lot);
        self.inserted.insert(id.clone());
        self.mark_dirty(&id);
        Ok(())
    }

    /// 取出暂存写入并清空脏标记
    pub fn take_batch(&mut self) -> LedgerBatch {
        let dirty = std::mem::take(&mut self.dirty);
        self.dirty_set.clear();
        let inserted = std::mem::take(&mut self.inserted);

        let writes = dirty
            .into_iter()
            .filter_map(|id| {
                let lot = self.get(&id)?.clone();
                Some(if inserted.contains(&id) {
                    LotWrite::Insert(lot)
                } else {
                    LotWrite::Update(lot)
                })
            })
            .collect();

        LedgerBatch { writes }
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn lot_mut(&mut self, lot_id: &str) -> LedgerResult<&mut StockLot> {
        match self.index.get(lot_id) {
            Some(&i) => Ok(&mut self.lots[i]),
            None => Err(LedgerError::LotNotFound {
                lot_id: lot_id.to_string(),
            }),
        }
    }

    fn mark_dirty(&mut self, lot_id: &str) {
        if self.dirty_set.insert(lot_id.to_string()) {
            self.dirty.push(lot_id.to_string());
        }
    }
}

/// 线径比较: 文本一致, 或数值一致 ("6.35" == "6.350")
pub fn gauge_matches(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a == b {
        return true;
    }
    match (parse_decimal(a), parse_decimal(b)) {
        (Some(x), Some(y)) => (x - y).abs() < WEIGHT_EPSILON,
        _ => false,
    }
}

/// 解析数值文本, 兼容逗号小数点
pub fn parse_decimal(s: &str) -> Option<f64> {
    s.trim().replace(',', ".").parse::<f64>().ok()
}

/// 保留两位小数
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
