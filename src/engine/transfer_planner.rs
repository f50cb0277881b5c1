// ==========================================
// 拉丝/桁架生产线 - 调拨计划引擎 (FIFO)
// ==========================================
// 职责: 按 (物料, 线径, 目标重量) 需求从可用批次中挑选整批
// 策略: 向上取整 / 向下取整 两种策略对全部需求同时评估,
//       取合计达成重量最接近合计目标者 (相同时取向下取整)
// 红线: 同一批次不得被两条需求同时选中
// 红线: 计划为只读; 提交时才扣减台账
// ==========================================

use crate::domain::finished_goods::FinishedGoodsItem;
use crate::domain::lot::{history_types, HistoryEvent, StockLot};
use crate::domain::transfer::{
    FinishedGoodsTransferLine, FinishedGoodsTransferRecord, TransferRecord, TransferRequest,
    TransferredFinishedGood, TransferredLot,
};
use crate::domain::types::{id_prefixes, new_id, FinishedGoodsStatus, LotStatus, MaterialType};
use crate::engine::allocator::natural_cmp;
use crate::engine::ledger::{round2, LedgerError, StockLedger};
use crate::engine::lot_status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

const WEIGHT_EPSILON: f64 = 1e-9;

// ==========================================
// PlanningError - 调拨错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    #[error("调拨需求无效: {0}")]
    InvalidRequest(String),

    #[error("批次不在计划候选中: {lot_id}")]
    UnknownLot { lot_id: String },

    #[error("批次已被其他需求选中: {lot_id}")]
    LotAlreadySelected { lot_id: String },

    #[error("调拨数量无效 (lot_id={lot_id}): {quantity}, 可用 {available:.2}")]
    InvalidQuantity {
        lot_id: String,
        quantity: f64,
        available: f64,
    },

    #[error("批次当前不可调拨 (lot_id={lot_id}, status={status})")]
    LotUnavailable { lot_id: String, status: LotStatus },

    #[error("成品不存在: {item_id}")]
    ItemNotFound { item_id: String },

    #[error("成品调拨件数无效 (item_id={item_id}): {quantity}, 库存 {available}")]
    InvalidItemQuantity {
        item_id: String,
        quantity: u32,
        available: u32,
    },

    #[error("没有可调拨的明细")]
    NothingToTransfer,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type PlanningResult<T> = Result<T, PlanningError>;

// ==========================================
// 计划结构
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundingPolicy {
    RoundUp,
    RoundDown,
}

/// 候选批次 (included = 是否纳入调拨)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedLot {
    pub lot_id: String,
    pub internal_lot: String,
    pub entry_date: DateTime<Utc>,
    pub available: f64,
    pub quantity: f64,
    pub included: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestProposal {
    pub request: TransferRequest,
    pub lots: Vec<ProposedLot>,
}

impl RequestProposal {
    pub fn achieved(&self) -> f64 {
        self.lots.iter().filter(|l| l.included).map(|l| l.quantity).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPlan {
    pub policy: RoundingPolicy,
    pub proposals: Vec<RequestProposal>,
}

impl TransferPlan {
    pub fn total_target(&self) -> f64 {
        self.proposals.iter().map(|p| p.request.target_weight).sum()
    }

    pub fn total_achieved(&self) -> f64 {
        self.proposals.iter().map(|p| p.achieved()).sum()
    }

    /// 调整批次是否纳入
    pub fn set_included(&mut self, lot_id: &str, included: bool) -> PlanningResult<()> {
        if included {
            let taken_elsewhere = self
                .proposals
                .iter()
                .flat_map(|p| p.lots.iter())
                .any(|l| l.lot_id == lot_id && l.included);
            if taken_elsewhere {
                return Err(PlanningError::LotAlreadySelected {
                    lot_id: lot_id.to_string(),
                });
            }
        }

        // 同一批次可能出现在多条需求的候选中, 纳入时只取第一条
        let lot = self
            .proposals
            .iter_mut()
            .flat_map(|p| p.lots.iter_mut())
            .find(|l| l.lot_id == lot_id && (included || l.included))
            .ok_or_else(|| PlanningError::UnknownLot {
                lot_id: lot_id.to_string(),
            })?;
        lot.included = included;
        Ok(())
    }

    /// 调整批次调拨数量, 范围 (0, 可用量]
    pub fn set_quantity(&mut self, lot_id: &str, quantity: f64) -> PlanningResult<()> {
        let mut found = false;
        for lot in self
            .proposals
            .iter_mut()
            .flat_map(|p| p.lots.iter_mut())
            .filter(|l| l.lot_id == lot_id)
        {
            if !(quantity > 0.0) || quantity > lot.available + WEIGHT_EPSILON {
                return Err(PlanningError::InvalidQuantity {
                    lot_id: lot_id.to_string(),
                    quantity,
                    available: lot.available,
                });
            }
            lot.quantity = quantity;
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(PlanningError::UnknownLot {
                lot_id: lot_id.to_string(),
            })
        }
    }

    /// 已纳入的调拨明细 (lot_id, 数量)
    pub fn selected_lines(&self) -> Vec<(String, f64)> {
        self.proposals
            .iter()
            .flat_map(|p| p.lots.iter())
            .filter(|l| l.included)
            .map(|l| (l.lot_id.clone(), l.quantity))
            .collect()
    }
}

// ==========================================
// TransferPlanner
// ==========================================
#[derive(Default)]
pub struct TransferPlanner {}

impl TransferPlanner {
    pub fn new() -> Self {
        Self {}
    }

    /// 生成默认调拨计划
    pub fn plan(
        &self,
        ledger: &StockLedger,
        requests: &[TransferRequest],
    ) -> PlanningResult<TransferPlan> {
        if requests.is_empty() {
            return Err(PlanningError::InvalidRequest("调拨需求为空".to_string()));
        }
        for r in requests {
            if r.gauge.trim().is_empty() {
                return Err(PlanningError::InvalidRequest("线径不能为空".to_string()));
            }
            if !(r.target_weight > 0.0) {
                return Err(PlanningError::InvalidRequest(format!(
                    "目标重量必须大于 0: {} {}",
                    r.material_type, r.gauge
                )));
            }
        }

        let up = self.evaluate(ledger, requests, RoundingPolicy::RoundUp);
        let down = self.evaluate(ledger, requests, RoundingPolicy::RoundDown);

        let target: f64 = requests.iter().map(|r| r.target_weight).sum();
        let up_gap = (up.total_achieved() - target).abs();
        let down_gap = (down.total_achieved() - target).abs();
        let chosen = if up_gap < down_gap - WEIGHT_EPSILON { up } else { down };

        info!(
            policy = ?chosen.policy,
            target = target,
            achieved = chosen.total_achieved(),
            up_gap = up_gap,
            down_gap = down_gap,
            "调拨计划生成"
        );
        Ok(chosen)
    }

    /// 按指定策略对全部需求选批
    pub fn evaluate(
        &self,
        ledger: &StockLedger,
        requests: &[TransferRequest],
        policy: RoundingPolicy,
    ) -> TransferPlan {
        let mut taken: HashSet<String> = HashSet::new();
        let mut proposals = Vec::with_capacity(requests.len());

        for request in requests {
            let candidates = fifo_candidates(ledger, request.material_type, &request.gauge, &taken);
            let mut accumulated = 0.0;
            let mut stopped = false;
            let mut lots = Vec::with_capacity(candidates.len());

            for lot in candidates {
                let include = !stopped
                    && match policy {
                        RoundingPolicy::RoundUp => {
                            accumulated + WEIGHT_EPSILON < request.target_weight
                        }
                        RoundingPolicy::RoundDown => {
                            accumulated + lot.remaining_quantity
                                <= request.target_weight + WEIGHT_EPSILON
                        }
                    };
                if include {
                    accumulated += lot.remaining_quantity;
                    taken.insert(lot.id.clone());
                } else {
                    stopped = true;
                }
                lots.push(ProposedLot {
                    lot_id: lot.id.clone(),
                    internal_lot: lot.internal_lot.clone(),
                    entry_date: lot.entry_date,
                    available: lot.remaining_quantity,
                    quantity: lot.remaining_quantity,
                    included: include,
                });
            }

            debug!(
                policy = ?policy,
                material = %request.material_type,
                gauge = %request.gauge,
                target = request.target_weight,
                achieved = accumulated,
                "需求选批"
            );
            proposals.push(RequestProposal {
                request: request.clone(),
                lots,
            });
        }

        TransferPlan { policy, proposals }
    }

    /// 提交调拨: 校验全部明细后扣减台账并生成记录
    pub fn commit(
        &self,
        ledger: &mut StockLedger,
        lines: &[(String, f64)],
        destination: &str,
        operator: &str,
        now: DateTime<Utc>,
    ) -> PlanningResult<TransferRecord> {
        let destination = destination.trim();
        if destination.is_empty() {
            return Err(PlanningError::InvalidRequest("目的车间不能为空".to_string()));
        }
        if lines.is_empty() {
            return Err(PlanningError::NothingToTransfer);
        }

        // 1. 校验
        let mut seen = HashSet::new();
        for (lot_id, quantity) in lines {
            if !seen.insert(lot_id.as_str()) {
                return Err(PlanningError::LotAlreadySelected {
                    lot_id: lot_id.clone(),
                });
            }
            let lot = ledger.get(lot_id).ok_or_else(|| LedgerError::LotNotFound {
                lot_id: lot_id.clone(),
            })?;
            if !lot.status.is_available() {
                return Err(PlanningError::LotUnavailable {
                    lot_id: lot_id.clone(),
                    status: lot.status,
                });
            }
            if !(*quantity > 0.0) || *quantity > lot.remaining_quantity + WEIGHT_EPSILON {
                return Err(PlanningError::InvalidQuantity {
                    lot_id: lot_id.clone(),
                    quantity: *quantity,
                    available: lot.remaining_quantity,
                });
            }
        }

        // 2. 扣减
        let mut transferred = Vec::with_capacity(lines.len());
        for (lot_id, quantity) in lines {
            let event = HistoryEvent::new(history_types::TRANSFER, now)
                .with("destination", destination)
                .with("operator", operator);
            let quantity = quantity.min(ledger.get(lot_id).map(|l| l.remaining_quantity).unwrap_or(0.0));
            let remaining = ledger.consume(lot_id, quantity, event)?;

            let Some(lot) = ledger.get(lot_id) else {
                continue;
            };
            let status = lot_status::after_transfer(lot.status, remaining);
            transferred.push(TransferredLot {
                lot_id: lot.id.clone(),
                internal_lot: lot.internal_lot.clone(),
                material_type: lot.material_type,
                gauge: lot.gauge.clone(),
                transferred_quantity: round2(quantity),
            });
            ledger.set_status(lot_id, status)?;
        }

        let record = TransferRecord {
            id: new_id(id_prefixes::TRANSFER),
            date: now,
            operator: operator.to_string(),
            destination_sector: destination.to_string(),
            transferred_lots: transferred,
        };
        info!(
            transfer_id = %record.id,
            lots = record.transferred_lots.len(),
            weight = record.total_weight(),
            "原料调拨完成"
        );
        Ok(record)
    }
}

/// FIFO 候选: 可用/余料状态, 按入库日期升序, 同日按批次号自然序
fn fifo_candidates<'a>(
    ledger: &'a StockLedger,
    material: MaterialType,
    gauge: &str,
    taken: &HashSet<String>,
) -> Vec<&'a StockLot> {
    let mut lots: Vec<&StockLot> = ledger
        .find_by_material_and_gauge(
            material,
            gauge,
            &[LotStatus::Available, LotStatus::AvailableSupport],
        )
        .into_iter()
        .filter(|l| l.remaining_quantity > 0.0 && !taken.contains(&l.id))
        .collect();
    lots.sort_by(|a, b| {
        a.entry_date
            .cmp(&b.entry_date)
            .then_with(|| natural_cmp(&a.internal_lot, &b.internal_lot))
    });
    lots
}

// ==========================================
// 成品调拨 (按件数, 重量按单件均摊)
// ==========================================

/// 成品调拨
///
/// # 返回
/// (调拨记录, 变更后的成品条目)
pub fn transfer_finished_goods(
    items: &[FinishedGoodsItem],
    lines: &[FinishedGoodsTransferLine],
    destination: &str,
    other_destination: Option<&str>,
    operator: &str,
    now: DateTime<Utc>,
) -> PlanningResult<(FinishedGoodsTransferRecord, Vec<FinishedGoodsItem>)> {
    let destination = destination.trim();
    if destination.is_empty() {
        return Err(PlanningError::InvalidRequest("目的地不能为空".to_string()));
    }
    if lines.is_empty() {
        return Err(PlanningError::NothingToTransfer);
    }

    let mut seen = HashSet::new();
    let mut transferred = Vec::with_capacity(lines.len());
    let mut updated = Vec::with_capacity(lines.len());

    for line in lines {
        if !seen.insert(line.item_id.as_str()) {
            return Err(PlanningError::InvalidRequest(format!(
                "成品重复出现: {}",
                line.item_id
            )));
        }
        let item = items
            .iter()
            .find(|i| i.id == line.item_id)
            .ok_or_else(|| PlanningError::ItemNotFound {
                item_id: line.item_id.clone(),
            })?;
        if item.status != FinishedGoodsStatus::Available
            || line.quantity == 0
            || line.quantity > item.quantity
        {
            return Err(PlanningError::InvalidItemQuantity {
                item_id: line.item_id.clone(),
                quantity: line.quantity,
                available: item.quantity,
            });
        }

        let transferred_weight = item.weight_per_piece() * line.quantity as f64;
        transferred.push(TransferredFinishedGood {
            item_id: item.id.clone(),
            model: item.model.clone(),
            size: item.size.clone(),
            transferred_quantity: line.quantity,
            transferred_weight: round2(transferred_weight),
        });

        let mut next = item.clone();
        next.quantity = item.quantity - line.quantity;
        if next.quantity > 0 {
            next.total_weight = round2((item.total_weight - transferred_weight).max(0.0));
        } else {
            next.total_weight = 0.0;
            next.status = FinishedGoodsStatus::Transferred;
        }
        updated.push(next);
    }

    let record = FinishedGoodsTransferRecord {
        id: new_id(id_prefixes::FINISHED_GOODS_TRANSFER),
        date: now,
        operator: operator.to_string(),
        destination: destination.to_string(),
        other_destination: other_destination
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        transferred_items: transferred,
    };
    Ok((record, updated))
}
