// ==========================================
// 拉丝/桁架生产线 - 消耗分配引擎
// ==========================================
// 职责: 订单完工时计算各批次扣减量与新状态
// 输入: 批次台账快照 + 订单 + 完工数据
// 输出: 台账变更 (由调用方取出写入)
// 红线: 先完整计算再落账; 计算失败台账零变更
// 红线: 同一批次被多个部件共用时不得超扣
// ==========================================

use crate::config::truss_catalog::{TrussModel, TrussModelCatalog};
use crate::domain::lot::{history_types, HistoryEvent, StockLot};
use crate::domain::order::{LotSelection, Offcut, ProductionOrder, TrussLotSelection};
use crate::domain::types::{LotStatus, TrussPart};
use crate::engine::ledger::{round2, LedgerError, StockLedger};
use crate::engine::lot_status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// 部件目标重量视为已满足的容差 (kg)
const TARGET_EPSILON: f64 = 0.0001;

// ==========================================
// AllocationError - 分配错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    /// 严重错误: 型号目录中不存在, 不得扣减任何库存
    #[error("桁架型号未找到: model={model}, size={size}")]
    ModelNotFound { model: String, size: String },

    #[error("订单缺少桁架型号或长度: {order_number}")]
    MissingModel { order_number: String },

    #[error("订单选批与机组不符: {order_number}")]
    SelectionMismatch { order_number: String },

    #[error("批次尚未录入称重: {lot_id}")]
    MissingFinalWeight { lot_id: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AllocationError {
    /// 是否为严重错误 (区别于校验类错误)
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            AllocationError::ModelNotFound { .. } | AllocationError::MissingModel { .. }
        )
    }
}

pub type AllocationResult<T> = Result<T, AllocationError>;

// ==========================================
// 分配结果
// ==========================================

/// 单个部件的扣减明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartConsumption {
    pub part: TrussPart,
    pub target: f64,
    pub drawn: f64,
    pub draws: Vec<LotDraw>,
}

impl PartConsumption {
    /// 未满足的目标重量
    pub fn shortfall(&self) -> f64 {
        (self.target - self.drawn).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotDraw {
    pub lot_id: String,
    pub amount: f64,
}

/// 单个批次的完工结算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotOutcome {
    pub lot_id: String,
    pub internal_lot: String,
    pub consumed: f64,
    pub before: f64,
    pub after: f64,
    pub new_status: LotStatus,
}

/// 桁架分配结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrussAllocation {
    pub model_code: String,
    pub unit_weight: f64,
    pub parts: Vec<PartConsumption>,
    pub lots: Vec<LotOutcome>,
}

impl TrussAllocation {
    pub fn total_target(&self) -> f64 {
        self.parts.iter().map(|p| p.target).sum()
    }

    pub fn total_consumed(&self) -> f64 {
        self.lots.iter().map(|l| l.consumed).sum()
    }
}

/// 拉丝转化结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireDrawOutcome {
    pub transformed_lot_ids: Vec<String>,
    pub released_lot_ids: Vec<String>,
    pub input_label_weight: f64,
    pub output_weight: f64,
    pub scrap_weight: f64,
}

// ==========================================
// ConsumptionAllocator - 消耗分配引擎
// ==========================================
pub struct ConsumptionAllocator {
    residual_threshold: f64,
}

impl Default for ConsumptionAllocator {
    fn default() -> Self {
        Self::new(lot_status::DEFAULT_RESIDUAL_THRESHOLD_KG)
    }
}

impl ConsumptionAllocator {
    pub fn new(residual_threshold: f64) -> Self {
        Self { residual_threshold }
    }

    // ==========================================
    // 桁架
    // ==========================================

    /// 计算桁架完工扣减 (不修改台账)
    ///
    /// # 参数
    /// - `active_order_ids`: 当前 PENDING / IN_PROGRESS 订单 ID
    ///
    /// # 规则
    /// 1. 各部件目标 = 单件部件重量 × 件数 + 短料按部件占比分摊
    /// 2. 下弦、斜筋目标平分左右两侧
    /// 3. 候选批次: 余料/桁架生产中优先, 其次按内部批次号自然序
    /// 4. 贪心扣减 min(剩余目标, 批次可用量)
    pub fn plan_truss(
        &self,
        ledger: &StockLedger,
        order: &ProductionOrder,
        pieces: u32,
        offcuts: &[Offcut],
        catalog: &TrussModelCatalog,
        active_order_ids: &HashSet<String>,
    ) -> AllocationResult<TrussAllocation> {
        let selection = match &order.selected_lots {
            LotSelection::Truss(s) => s,
            LotSelection::WireDraw { .. } => {
                return Err(AllocationError::SelectionMismatch {
                    order_number: order.order_number.clone(),
                })
            }
        };
        let model = resolve_model(order, catalog)?;
        let targets = part_targets(model, pieces, offcuts);

        // 1. 各部件贪心扣减 (共享消耗表)
        let mut consumed: HashMap<String, f64> = HashMap::new();
        let mut parts = Vec::with_capacity(TrussPart::ALL.len());
        for (part, target) in targets {
            let candidates = sorted_candidates(ledger, selection.part(part));
            let mut remaining_target = target;
            let mut draws = Vec::new();

            for lot in candidates {
                if remaining_target <= TARGET_EPSILON {
                    break;
                }
                let already = consumed.get(&lot.id).copied().unwrap_or(0.0);
                let available = (lot.remaining_quantity - already).max(0.0);
                let take = remaining_target.min(available);
                if take > 0.0 {
                    consumed.insert(lot.id.clone(), already + take);
                    remaining_target -= take;
                    draws.push(LotDraw {
                        lot_id: lot.id.clone(),
                        amount: take,
                    });
                }
            }

            let drawn = target - remaining_target.max(0.0);
            if remaining_target > TARGET_EPSILON {
                warn!(
                    order_number = %order.order_number,
                    part = %part,
                    target = target,
                    shortfall = remaining_target,
                    "部件选用批次余量不足"
                );
            }
            parts.push(PartConsumption {
                part,
                target,
                drawn,
                draws,
            });
        }

        // 2. 订单涉及的全部批次重新评估状态
        let lots = involved_lot_ids(selection, &consumed)
            .into_iter()
            .filter_map(|id| ledger.get(&id))
            .map(|lot| {
                let used = consumed.get(&lot.id).copied().unwrap_or(0.0);
                let before = lot.remaining_quantity;
                let raw_after = round2((before - used).max(0.0));
                let has_other = lot
                    .production_order_ids
                    .iter()
                    .any(|id| id != &order.id && active_order_ids.contains(id));
                let new_status =
                    lot_status::after_truss_consumption(raw_after, self.residual_threshold, has_other);
                let after = if new_status == LotStatus::Consumed {
                    0.0
                } else {
                    raw_after
                };
                LotOutcome {
                    lot_id: lot.id.clone(),
                    internal_lot: lot.internal_lot.clone(),
                    consumed: used,
                    before,
                    after,
                    new_status,
                }
            })
            .collect();

        Ok(TrussAllocation {
            model_code: model.code.clone(),
            unit_weight: model.unit_weight,
            parts,
            lots,
        })
    }

    /// 将桁架分配结果落到台账
    pub fn apply_truss(
        &self,
        ledger: &mut StockLedger,
        order: &ProductionOrder,
        allocation: &TrussAllocation,
        now: DateTime<Utc>,
    ) -> AllocationResult<()> {
        for outcome in &allocation.lots {
            let event = HistoryEvent::new(history_types::TRUSS_CONSUMPTION, now)
                .with("order_id", order.id.as_str())
                .with("order_number", order.order_number.as_str())
                .with("new_status", outcome.new_status.to_db_str());

            if outcome.consumed > 0.0 {
                ledger.consume(&outcome.lot_id, outcome.consumed, event)?;
            } else {
                ledger.append_history(
                    &outcome.lot_id,
                    event
                        .with("amount", 0.0)
                        .with("before", round2(outcome.before))
                        .with("after", round2(outcome.before)),
                )?;
            }
            if outcome.new_status == LotStatus::Consumed {
                ledger.write_off_residual(&outcome.lot_id)?;
            }
            ledger.set_status(&outcome.lot_id, outcome.new_status)?;
            ledger.release(&outcome.lot_id, &order.id)?;
        }
        Ok(())
    }

    /// 桁架完工: 计算 + 落账
    #[instrument(skip_all, fields(order_number = %order.order_number, pieces = pieces))]
    pub fn allocate_truss(
        &self,
        ledger: &mut StockLedger,
        order: &ProductionOrder,
        pieces: u32,
        offcuts: &[Offcut],
        catalog: &TrussModelCatalog,
        active_order_ids: &HashSet<String>,
        now: DateTime<Utc>,
    ) -> AllocationResult<TrussAllocation> {
        let allocation =
            self.plan_truss(ledger, order, pieces, offcuts, catalog, active_order_ids)?;
        self.apply_truss(ledger, order, &allocation, now)?;

        info!(
            model = %allocation.model_code,
            target = allocation.total_target(),
            consumed = allocation.total_consumed(),
            lots = allocation.lots.len(),
            "桁架完工扣减完成"
        );
        Ok(allocation)
    }

    // ==========================================
    // 拉丝
    // ==========================================

    /// 拉丝完工: 已加工批次 1:1 转化为 CA-60, 未加工批次释放占用
    ///
    /// 废料 = Σ原标签重量 − Σ成品重量, 不小于 0
    #[instrument(skip_all, fields(order_number = %order.order_number))]
    pub fn transform_wire_draw(
        &self,
        ledger: &mut StockLedger,
        order: &ProductionOrder,
        now: DateTime<Utc>,
    ) -> AllocationResult<WireDrawOutcome> {
        let selected = match &order.selected_lots {
            LotSelection::WireDraw { lot_ids } => lot_ids,
            LotSelection::Truss(_) => {
                return Err(AllocationError::SelectionMismatch {
                    order_number: order.order_number.clone(),
                })
            }
        };

        // 1. 校验: 全部已加工批次存在且已称重 (同一批次以最后一条为准)
        let mut final_weights: Vec<(String, f64)> = Vec::new();
        for processed in &order.processed_lots {
            let weight = processed
                .final_weight
                .ok_or_else(|| AllocationError::MissingFinalWeight {
                    lot_id: processed.lot_id.clone(),
                })?;
            if ledger.get(&processed.lot_id).is_none() {
                return Err(LedgerError::LotNotFound {
                    lot_id: processed.lot_id.clone(),
                }
                .into());
            }
            match final_weights.iter_mut().find(|(id, _)| id == &processed.lot_id) {
                Some(entry) => entry.1 = weight,
                None => final_weights.push((processed.lot_id.clone(), weight)),
            }
        }

        // 2. 转化
        let mut input_label_weight = 0.0;
        let mut output_weight = 0.0;
        let mut transformed = Vec::with_capacity(final_weights.len());
        for (lot_id, weight) in &final_weights {
            input_label_weight += ledger.get(lot_id).map(|l| l.label_weight).unwrap_or(0.0);
            output_weight += weight;
            ledger.replace_transformed(
                lot_id,
                &order.target_gauge,
                *weight,
                now,
                &order.order_number,
            )?;
            transformed.push(lot_id.clone());
        }

        // 3. 未加工批次释放占用
        let mut released = Vec::new();
        for lot_id in selected {
            if transformed.contains(lot_id) {
                continue;
            }
            let Some(current) = ledger.get(lot_id).map(|l| l.status) else {
                warn!(lot_id = %lot_id, "选用批次已不在台账中, 跳过释放");
                continue;
            };
            let still_claimed = ledger.release(lot_id, &order.id)?;
            ledger.set_status(lot_id, lot_status::on_release(current, still_claimed))?;
            ledger.append_history(
                lot_id,
                HistoryEvent::new(history_types::ORDER_RELEASE, now)
                    .with("order_number", order.order_number.as_str())
                    .with("reason", "not processed"),
            )?;
            released.push(lot_id.clone());
        }

        let scrap_weight = round2((input_label_weight - output_weight).max(0.0));
        info!(
            transformed = transformed.len(),
            released = released.len(),
            input = input_label_weight,
            output = output_weight,
            scrap = scrap_weight,
            "拉丝完工转化完成"
        );

        Ok(WireDrawOutcome {
            transformed_lot_ids: transformed,
            released_lot_ids: released,
            input_label_weight,
            output_weight,
            scrap_weight,
        })
    }
}

// ==========================================
// 辅助函数
// ==========================================

/// 查找订单对应的桁架型号
pub fn resolve_model<'a>(
    order: &ProductionOrder,
    catalog: &'a TrussModelCatalog,
) -> AllocationResult<&'a TrussModel> {
    let (Some(model), Some(size)) = (order.truss_model.as_deref(), order.truss_size.as_deref())
    else {
        return Err(AllocationError::MissingModel {
            order_number: order.order_number.clone(),
        });
    };
    catalog
        .find(model, size)
        .ok_or_else(|| AllocationError::ModelNotFound {
            model: model.to_string(),
            size: size.to_string(),
        })
}

/// 五个部件的目标扣减重量
pub fn part_targets(model: &TrussModel, pieces: u32, offcuts: &[Offcut]) -> Vec<(TrussPart, f64)> {
    let pieces = pieces as f64;
    let mut top = model.top_weight * pieces;
    let mut bottom = model.bottom_weight * pieces;
    let mut diagonal = model.diagonal_weight * pieces;

    if model.unit_weight > 0.0 {
        for offcut in offcuts {
            top += model.top_weight / model.unit_weight * offcut.total_weight;
            bottom += model.bottom_weight / model.unit_weight * offcut.total_weight;
            diagonal += model.diagonal_weight / model.unit_weight * offcut.total_weight;
        }
    }

    vec![
        (TrussPart::Top, top),
        (TrussPart::BottomLeft, bottom / 2.0),
        (TrussPart::BottomRight, bottom / 2.0),
        (TrussPart::DiagonalLeft, diagonal / 2.0),
        (TrussPart::DiagonalRight, diagonal / 2.0),
    ]
}

/// 当前活动订单 ID 集合
pub fn active_order_ids(orders: &[ProductionOrder]) -> HashSet<String> {
    orders
        .iter()
        .filter(|o| o.status.is_active())
        .map(|o| o.id.clone())
        .collect()
}

fn sorted_candidates<'a>(ledger: &'a StockLedger, lot_ids: &[String]) -> Vec<&'a StockLot> {
    let mut lots: Vec<&StockLot> = lot_ids.iter().filter_map(|id| ledger.get(id)).collect();
    lots.sort_by(|a, b| {
        let pa = a.status.is_truss_priority();
        let pb = b.status.is_truss_priority();
        pb.cmp(&pa)
            .then_with(|| natural_cmp(&a.internal_lot, &b.internal_lot))
    });
    lots
}

fn involved_lot_ids(selection: &TrussLotSelection, consumed: &HashMap<String, f64>) -> Vec<String> {
    let mut ids = selection.all_lot_ids();
    let mut extra: Vec<&String> = consumed.keys().filter(|id| !ids.contains(id)).collect();
    extra.sort();
    ids.extend(extra.into_iter().cloned());
    ids
}

/// 自然序比较: 数字段按数值比较, 其余忽略大小写
///
/// "L2" < "L10", "lote-a" == "LOTE-A"
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ord = compare_digit_runs(&na, &nb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                let ord = ca.to_lowercase().cmp(cb.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut s = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        s.push(c);
        it.next();
    }
    s
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
