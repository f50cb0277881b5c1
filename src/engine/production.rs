// ==========================================
// 拉丝/桁架生产线 - 生产订单状态机
// ==========================================
// 状态: PENDING -> IN_PROGRESS -> COMPLETED (终态)
// 职责: 订单登记/删除、开工、班次、停机、批次加工、
//       称重、完工结算
// 红线: 引擎只改内存快照, 持久化由 API 层负责
// 红线: 完工重复调用为空操作
// ==========================================

use crate::config::truss_catalog::{TrussModel, TrussModelCatalog};
use crate::domain::finished_goods::FinishedGoodsItem;
use crate::domain::lot::{history_types, HistoryEvent};
use crate::domain::order::{
    ActiveLotProcessing, CompletionData, DowntimeEvent, LotSelection, NewProductionOrder,
    OperatorLog, PostProductionActivity, ProcessedLot, ProductionOrder, SelectionError,
    WeighedPackage,
};
use crate::domain::types::{
    downtime_reasons, id_prefixes, new_id, FinishedGoodsStatus, LotStatus, MachineType,
    MaterialType, OrderStatus, ProductType, TrussPart,
};
use crate::engine::allocator::{
    part_targets, resolve_model, AllocationError, ConsumptionAllocator, TrussAllocation,
    WireDrawOutcome,
};
use crate::engine::ledger::{round2, LedgerError, StockLedger};
use crate::engine::lot_status;
use crate::engine::package_gate::{PackageWeightInput, PendingPackageWeight};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// 重量比较容差 (kg)
const WEIGHT_EPSILON: f64 = 1e-6;

// ==========================================
// ProductionError - 状态机错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProductionError {
    #[error("订单不存在: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("无效的状态转换 (order={order_number}): {from} 状态下不允许 {action}")]
    InvalidStateTransition {
        order_number: String,
        from: OrderStatus,
        action: &'static str,
    },

    #[error("机组不支持该操作 (order={order_number}, machine={machine}): {action}")]
    WrongMachine {
        order_number: String,
        machine: MachineType,
        action: &'static str,
    },

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("选用批次重量不足 ({scope}): 需要 {required:.2} kg, 已选 {selected:.2} kg")]
    InsufficientSelectedWeight {
        scope: String,
        required: f64,
        selected: f64,
    },

    #[error("操作工已有未结束班次: {operator}")]
    ShiftAlreadyOpen { operator: String },

    #[error("操作工无未结束班次: {operator}")]
    NoOpenShift { operator: String },

    #[error("批次不属于该订单: {lot_id}")]
    LotNotInOrder { lot_id: String },

    #[error("已有批次在加工中: {active_lot_id}")]
    LotAlreadyActive { active_lot_id: String },

    #[error("批次未在加工中: {lot_id}")]
    LotNotActive { lot_id: String },

    #[error("批次已加工完成: {lot_id}")]
    LotAlreadyProcessed { lot_id: String },

    #[error("批次尚未加工: {lot_id}")]
    LotNotProcessed { lot_id: String },

    #[error("桁架型号不在目录中: model={model}, size={size}")]
    UnknownModel { model: String, size: String },

    #[error("待授权包称重不存在: {pending_id}")]
    PendingPackageNotFound { pending_id: String },

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ProductionError {
    /// 严重错误 (型号查找失败等), 区别于校验类错误
    pub fn is_critical(&self) -> bool {
        matches!(self, ProductionError::Allocation(e) if e.is_critical())
    }
}

pub type ProductionResult<T> = Result<T, ProductionError>;

// ==========================================
// 输出结构
// ==========================================

/// 开工结果
#[derive(Debug, Clone, PartialEq)]
pub struct StartOutcome {
    /// 操作工从同机组其他订单交接过来时, 原订单 ID
    pub handed_over_from: Option<String>,
}

/// 完工结果
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    AlreadyCompleted,
    Completed(CompletionReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub machine: MachineType,
    pub produced_weight: f64,
    pub scrap_weight: f64,
    pub wire_draw: Option<WireDrawOutcome>,
    pub truss: Option<TrussAllocation>,
    pub finished_goods: Vec<FinishedGoodsItem>,
    pub offcut_items: Vec<FinishedGoodsItem>,
}

// ==========================================
// ProductionOrderMachine - 订单状态机
// ==========================================
pub struct ProductionOrderMachine {
    allocator: ConsumptionAllocator,
    catalog: TrussModelCatalog,
}

impl ProductionOrderMachine {
    pub fn new(allocator: ConsumptionAllocator, catalog: TrussModelCatalog) -> Self {
        Self { allocator, catalog }
    }

    /// 包称重校验所用型号; 查找失败为严重错误
    pub fn package_model(&self, order: &ProductionOrder) -> ProductionResult<&TrussModel> {
        require_machine(order, MachineType::Truss, "record package weight")?;
        Ok(resolve_model(order, &self.catalog)?)
    }

    // ==========================================
    // 登记 / 删除
    // ==========================================

    /// 登记新订单并占用所选批次
    ///
    /// # 校验 (任一失败则台账零变更)
    /// - 订单号非空且唯一 (忽略大小写)
    /// - 桁架: 型号在目录中, 件数 > 0
    /// - 选批归一化通过 (不重复、五部件齐全)
    /// - 批次存在、物料匹配、状态可用
    /// - 选用重量足以覆盖需求
    #[instrument(skip_all, fields(order_number = %input.order_number, machine = %input.machine))]
    pub fn register(
        &self,
        ledger: &mut StockLedger,
        existing: &[ProductionOrder],
        id: String,
        input: NewProductionOrder,
        now: DateTime<Utc>,
    ) -> ProductionResult<ProductionOrder> {
        let order_number = input.order_number.trim().to_string();
        if order_number.is_empty() {
            return Err(ProductionError::Validation("订单号不能为空".to_string()));
        }
        let key = order_number.to_lowercase();
        if existing
            .iter()
            .any(|o| o.order_number.trim().to_lowercase() == key)
        {
            return Err(ProductionError::Validation(format!(
                "订单号已存在: {}",
                order_number
            )));
        }
        if input.target_gauge.trim().is_empty() {
            return Err(ProductionError::Validation("目标线径不能为空".to_string()));
        }
        if matches!(input.quantity_to_produce, Some(0)) {
            return Err(ProductionError::Validation("生产件数必须大于 0".to_string()));
        }
        if let Some(w) = input.planned_output_weight {
            if !(w > 0.0) {
                return Err(ProductionError::Validation("计划产出重量必须大于 0".to_string()));
            }
        }

        let selection = LotSelection::resolve(input.machine, input.selected_lot_ids)?;

        // 1. 批次校验
        let expected_material = match input.machine {
            MachineType::WireDraw => MaterialType::WireRod,
            MachineType::Truss => MaterialType::Ca60,
        };
        let lot_ids = selection.all_lot_ids();
        for lot_id in &lot_ids {
            let lot = ledger.get(lot_id).ok_or_else(|| LedgerError::LotNotFound {
                lot_id: lot_id.clone(),
            })?;
            if lot.material_type != expected_material {
                return Err(ProductionError::Validation(format!(
                    "批次 {} 物料为 {}, 订单需要 {}",
                    lot.internal_lot, lot.material_type, expected_material
                )));
            }
            let usable = lot.status.is_available()
                || (input.machine == MachineType::Truss
                    && lot.status == LotStatus::InProductionTruss);
            if !usable || lot.remaining_quantity <= 0.0 {
                return Err(ProductionError::Validation(format!(
                    "批次 {} 当前不可用 (status={})",
                    lot.internal_lot, lot.status
                )));
            }
        }

        let selected_weight = |ids: &[&String]| -> f64 {
            let unique: HashSet<&String> = ids.iter().copied().collect();
            unique
                .into_iter()
                .filter_map(|id| ledger.get(id))
                .map(|l| l.remaining_quantity)
                .sum()
        };
        let total_weight: f64 = selected_weight(&lot_ids.iter().collect::<Vec<_>>());

        // 2. 重量覆盖校验
        match &selection {
            LotSelection::Truss(parts) => {
                let (Some(model), Some(size)) =
                    (input.truss_model.as_deref(), input.truss_size.as_deref())
                else {
                    return Err(ProductionError::Validation(
                        "桁架订单必须指定型号与长度".to_string(),
                    ));
                };
                let model = self.catalog.find(model, size).ok_or_else(|| {
                    ProductionError::UnknownModel {
                        model: model.to_string(),
                        size: size.to_string(),
                    }
                })?;
                let pieces = input.quantity_to_produce.ok_or_else(|| {
                    ProductionError::Validation("桁架订单必须指定生产件数".to_string())
                })?;

                let targets = part_targets(model, pieces, &[]);
                let target_of = |p: TrussPart| {
                    targets
                        .iter()
                        .find(|(part, _)| *part == p)
                        .map(|(_, w)| *w)
                        .unwrap_or(0.0)
                };
                let groups: [(&str, Vec<TrussPart>); 3] = [
                    ("top", vec![TrussPart::Top]),
                    ("bottom", vec![TrussPart::BottomLeft, TrussPart::BottomRight]),
                    (
                        "diagonal",
                        vec![TrussPart::DiagonalLeft, TrussPart::DiagonalRight],
                    ),
                ];
                for (scope, members) in groups {
                    let required: f64 = members.iter().map(|p| target_of(*p)).sum();
                    let ids: Vec<&String> =
                        members.iter().flat_map(|p| parts.part(*p).iter()).collect();
                    let selected = selected_weight(&ids);
                    if selected + WEIGHT_EPSILON < required {
                        return Err(ProductionError::InsufficientSelectedWeight {
                            scope: scope.to_string(),
                            required,
                            selected,
                        });
                    }
                }
            }
            LotSelection::WireDraw { .. } => {
                if let Some(required) = input.planned_output_weight {
                    if total_weight + WEIGHT_EPSILON < required {
                        return Err(ProductionError::InsufficientSelectedWeight {
                            scope: "wire_draw".to_string(),
                            required,
                            selected: total_weight,
                        });
                    }
                }
            }
        }

        // 3. 占用批次
        let claimed_status = lot_status::on_claim(input.machine);
        for lot_id in &lot_ids {
            ledger.claim(lot_id, &id)?;
            ledger.set_status(lot_id, claimed_status)?;
            ledger.append_history(
                lot_id,
                HistoryEvent::new(history_types::ORDER_CLAIM, now)
                    .with("order_id", id.as_str())
                    .with("order_number", order_number.as_str()),
            )?;
        }

        info!(lots = lot_ids.len(), total_weight = total_weight, "订单登记完成");

        Ok(ProductionOrder {
            id,
            order_number,
            machine: input.machine,
            target_gauge: input.target_gauge.trim().to_string(),
            truss_model: input.truss_model.map(|s| s.trim().to_string()),
            truss_size: input.truss_size.map(|s| s.trim().to_string()),
            quantity_to_produce: input.quantity_to_produce,
            selected_lots: selection,
            total_weight: round2(total_weight),
            planned_output_weight: input.planned_output_weight,
            status: OrderStatus::Pending,
            creation_date: now,
            start_time: None,
            end_time: None,
            downtime_events: vec![],
            operator_logs: vec![],
            processed_lots: vec![],
            active_lot_processing: None,
            weighed_packages: vec![],
            pending_package_weights: vec![],
            offcuts: vec![],
            actual_produced_weight: None,
            actual_produced_quantity: None,
            scrap_weight: None,
        })
    }

    /// 删除未完工订单并释放占用
    pub fn remove(
        &self,
        ledger: &mut StockLedger,
        order: &ProductionOrder,
        now: DateTime<Utc>,
    ) -> ProductionResult<()> {
        if order.status == OrderStatus::Completed {
            return Err(invalid(order, "delete"));
        }
        for lot_id in order.selected_lots.all_lot_ids() {
            let Some(current) = ledger.get(&lot_id).map(|l| l.status) else {
                continue;
            };
            let still_claimed = ledger.release(&lot_id, &order.id)?;
            ledger.set_status(&lot_id, lot_status::on_release(current, still_claimed))?;
            ledger.append_history(
                &lot_id,
                HistoryEvent::new(history_types::ORDER_RELEASE, now)
                    .with("order_number", order.order_number.as_str())
                    .with("reason", "order deleted"),
            )?;
        }
        Ok(())
    }

    // ==========================================
    // 开工 / 班次
    // ==========================================

    /// 开工
    ///
    /// 操作工在同机组其他订单上有未结束班次时, 关闭该班次并在本订单开新班次;
    /// 否则不自动开班次
    pub fn start(
        &self,
        orders: &mut [ProductionOrder],
        order_id: &str,
        operator: &str,
        now: DateTime<Utc>,
    ) -> ProductionResult<StartOutcome> {
        let idx = find_index(orders, order_id)?;
        if orders[idx].status != OrderStatus::Pending {
            return Err(invalid(&orders[idx], "start"));
        }
        let machine = orders[idx].machine;

        let mut handed_over_from = None;
        for (i, other) in orders.iter_mut().enumerate() {
            if i == idx || other.machine != machine {
                continue;
            }
            if let Some(log) = other
                .operator_logs
                .iter_mut()
                .rev()
                .find(|l| l.operator == operator && l.end_time.is_none())
            {
                log.end_time = Some(now);
                handed_over_from = Some(other.id.clone());
                break;
            }
        }

        let order = &mut orders[idx];
        order.status = OrderStatus::InProgress;
        order.start_time = Some(now);
        order.downtime_events.push(DowntimeEvent {
            stop_time: now,
            resume_time: None,
            reason: downtime_reasons::AWAITING_START.to_string(),
        });
        if handed_over_from.is_some() {
            order.operator_logs.push(OperatorLog {
                operator: operator.to_string(),
                start_time: now,
                end_time: None,
                post_production_activities: vec![],
            });
        }

        info!(order_number = %order.order_number, handed_over = handed_over_from.is_some(), "订单开工");
        Ok(StartOutcome { handed_over_from })
    }

    /// 开班
    ///
    /// 同一操作工在同机组任一订单上最多一个未结束班次.
    /// 桁架: 若当前停机原因为"待开工"或"换盘/准备", 自动恢复生产
    pub fn start_shift(
        &self,
        orders: &mut [ProductionOrder],
        order_id: &str,
        operator: &str,
        now: DateTime<Utc>,
    ) -> ProductionResult<()> {
        let idx = find_index(orders, order_id)?;
        require_status(&orders[idx], OrderStatus::InProgress, "start shift")?;
        let machine = orders[idx].machine;
        if orders
            .iter()
            .any(|o| o.machine == machine && o.open_log_for(operator).is_some())
        {
            return Err(ProductionError::ShiftAlreadyOpen {
                operator: operator.to_string(),
            });
        }

        let order = &mut orders[idx];

        order.operator_logs.push(OperatorLog {
            operator: operator.to_string(),
            start_time: now,
            end_time: None,
            post_production_activities: vec![],
        });

        if order.machine == MachineType::Truss {
            let auto_close = order.open_downtime().is_some_and(|e| {
                e.reason == downtime_reasons::AWAITING_START
                    || e.reason == downtime_reasons::TOOL_CHANGE_SETUP
            });
            if auto_close {
                close_open_downtime(order, now);
            }
        }
        Ok(())
    }

    /// 结班
    ///
    /// # 返回
    /// 已关闭的班次 (用于生成班次报表)
    pub fn end_shift(
        &self,
        order: &mut ProductionOrder,
        operator: &str,
        now: DateTime<Utc>,
    ) -> ProductionResult<OperatorLog> {
        let log = order
            .operator_logs
            .iter_mut()
            .rev()
            .find(|l| l.operator == operator && l.end_time.is_none())
            .ok_or_else(|| ProductionError::NoOpenShift {
                operator: operator.to_string(),
            })?;
        log.end_time = Some(now);
        Ok(log.clone())
    }

    /// 完工后辅助作业: 记入该操作工仍未结束班次的最近完工订单
    ///
    /// # 返回
    /// 被记录的订单 ID
    pub fn log_post_production_activity(
        &self,
        orders: &mut [ProductionOrder],
        operator: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> ProductionResult<String> {
        let description = description.trim();
        if description.is_empty() {
            return Err(ProductionError::Validation("作业描述不能为空".to_string()));
        }

        let target = orders
            .iter_mut()
            .filter(|o| o.status == OrderStatus::Completed && o.end_time.is_some())
            .filter(|o| o.open_log_for(operator).is_some())
            .max_by_key(|o| o.end_time)
            .ok_or_else(|| ProductionError::NoOpenShift {
                operator: operator.to_string(),
            })?;

        if let Some(log) = target
            .operator_logs
            .iter_mut()
            .rev()
            .find(|l| l.operator == operator && l.end_time.is_none())
        {
            log.post_production_activities.push(PostProductionActivity {
                timestamp: now,
                description: description.to_string(),
            });
        }
        Ok(target.id.clone())
    }

    // ==========================================
    // 停机
    // ==========================================

    /// 记录停机: 关闭当前停机 (若有), 再开新停机
    pub fn log_downtime(
        &self,
        order: &mut ProductionOrder,
        reason: &str,
        now: DateTime<Utc>,
    ) -> ProductionResult<()> {
        require_status(order, OrderStatus::InProgress, "log downtime")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ProductionError::Validation("停机原因不能为空".to_string()));
        }
        close_open_downtime(order, now);
        order.downtime_events.push(DowntimeEvent {
            stop_time: now,
            resume_time: None,
            reason: reason.to_string(),
        });
        debug!(order_number = %order.order_number, reason = reason, "停机记录");
        Ok(())
    }

    /// 恢复生产; 拉丝无在制批次时转入"换盘/准备"停机
    pub fn resume(&self, order: &mut ProductionOrder, now: DateTime<Utc>) -> ProductionResult<()> {
        require_status(order, OrderStatus::InProgress, "resume")?;
        close_open_downtime(order, now);
        if order.machine == MachineType::WireDraw && order.active_lot_processing.is_none() {
            order.downtime_events.push(DowntimeEvent {
                stop_time: now,
                resume_time: None,
                reason: downtime_reasons::TOOL_CHANGE_SETUP.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 拉丝批次加工
    // ==========================================

    pub fn start_lot_processing(
        &self,
        order: &mut ProductionOrder,
        lot_id: &str,
        now: DateTime<Utc>,
    ) -> ProductionResult<()> {
        require_status(order, OrderStatus::InProgress, "start lot processing")?;
        require_machine(order, MachineType::WireDraw, "start lot processing")?;
        if !order.selected_lots.contains(lot_id) {
            return Err(ProductionError::LotNotInOrder {
                lot_id: lot_id.to_string(),
            });
        }
        if let Some(active) = order.active_lot_id() {
            return Err(ProductionError::LotAlreadyActive {
                active_lot_id: active.to_string(),
            });
        }
        if order.processed_lots.iter().any(|p| p.lot_id == lot_id) {
            return Err(ProductionError::LotAlreadyProcessed {
                lot_id: lot_id.to_string(),
            });
        }

        close_open_downtime(order, now);
        order.active_lot_processing = Some(ActiveLotProcessing {
            lot_id: lot_id.to_string(),
            start_time: now,
        });
        Ok(())
    }

    pub fn finish_lot_processing(
        &self,
        order: &mut ProductionOrder,
        lot_id: &str,
        now: DateTime<Utc>,
    ) -> ProductionResult<()> {
        require_status(order, OrderStatus::InProgress, "finish lot processing")?;
        require_machine(order, MachineType::WireDraw, "finish lot processing")?;
        let active = match &order.active_lot_processing {
            Some(active) if active.lot_id == lot_id => active.clone(),
            _ => {
                return Err(ProductionError::LotNotActive {
                    lot_id: lot_id.to_string(),
                })
            }
        };

        order.processed_lots.push(ProcessedLot {
            lot_id: active.lot_id,
            start_time: active.start_time,
            end_time: now,
            final_weight: None,
            measured_gauge: None,
        });
        order.active_lot_processing = None;
        close_open_downtime(order, now);
        order.downtime_events.push(DowntimeEvent {
            stop_time: now,
            resume_time: None,
            reason: downtime_reasons::TOOL_CHANGE_SETUP.to_string(),
        });
        Ok(())
    }

    /// 补录已加工批次的成品重量与实测线径
    pub fn record_lot_weight(
        &self,
        order: &mut ProductionOrder,
        lot_id: &str,
        final_weight: f64,
        measured_gauge: Option<f64>,
    ) -> ProductionResult<()> {
        require_status(order, OrderStatus::InProgress, "record lot weight")?;
        require_machine(order, MachineType::WireDraw, "record lot weight")?;
        if !final_weight.is_finite() || final_weight <= 0.0 {
            return Err(ProductionError::Validation(format!(
                "成品重量必须大于 0: {}",
                final_weight
            )));
        }

        let mut found = false;
        for processed in order.processed_lots.iter_mut().filter(|p| p.lot_id == lot_id) {
            processed.final_weight = Some(final_weight);
            processed.measured_gauge = measured_gauge;
            found = true;
        }
        if !found {
            return Err(ProductionError::LotNotProcessed {
                lot_id: lot_id.to_string(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 桁架称重 / 计件
    // ==========================================

    /// 写入包称重 (按包号覆盖, 按包号排序)
    ///
    /// 容差校验由调用方在写入前完成
    pub fn apply_package_weight(
        &self,
        order: &mut ProductionOrder,
        package: &PackageWeightInput,
        now: DateTime<Utc>,
    ) -> ProductionResult<()> {
        self.validate_package(order, package)?;
        order
            .weighed_packages
            .retain(|p| p.package_number != package.package_number);
        order.weighed_packages.push(WeighedPackage {
            package_number: package.package_number,
            quantity: package.quantity,
            weight: package.weight,
            timestamp: now,
        });
        order.weighed_packages.sort_by_key(|p| p.package_number);
        Ok(())
    }

    /// 挂起超差包称重; 同一包号的旧挂起记录被替换
    pub fn hold_package_weight(
        &self,
        order: &mut ProductionOrder,
        pending: PendingPackageWeight,
    ) -> ProductionResult<()> {
        self.validate_package(order, &pending.package)?;
        order
            .pending_package_weights
            .retain(|p| p.package.package_number != pending.package.package_number);
        order.pending_package_weights.push(pending);
        Ok(())
    }

    /// 授权挂起的包称重并写入
    pub fn authorize_package_weight(
        &self,
        order: &mut ProductionOrder,
        pending_id: &str,
        now: DateTime<Utc>,
    ) -> ProductionResult<PendingPackageWeight> {
        let idx = pending_index(order, pending_id)?;
        let package = order.pending_package_weights[idx].package.clone();
        self.apply_package_weight(order, &package, now)?;
        Ok(order.pending_package_weights.remove(idx))
    }

    /// 取消挂起的包称重
    pub fn cancel_package_weight(
        &self,
        order: &mut ProductionOrder,
        pending_id: &str,
    ) -> ProductionResult<PendingPackageWeight> {
        let idx = pending_index(order, pending_id)?;
        Ok(order.pending_package_weights.remove(idx))
    }

    /// 包称重入参校验 (挂起前亦需通过)
    pub fn validate_package(
        &self,
        order: &ProductionOrder,
        package: &PackageWeightInput,
    ) -> ProductionResult<()> {
        require_status(order, OrderStatus::InProgress, "record package weight")?;
        require_machine(order, MachineType::Truss, "record package weight")?;
        if package.package_number == 0 || package.quantity == 0 {
            return Err(ProductionError::Validation(
                "包号与件数必须大于 0".to_string(),
            ));
        }
        if !package.weight.is_finite() || package.weight <= 0.0 {
            return Err(ProductionError::Validation(format!(
                "包重量必须大于 0: {}",
                package.weight
            )));
        }
        Ok(())
    }

    /// 更新桁架已生产件数
    pub fn update_produced_quantity(
        &self,
        order: &mut ProductionOrder,
        quantity: u32,
    ) -> ProductionResult<()> {
        require_status(order, OrderStatus::InProgress, "update produced quantity")?;
        require_machine(order, MachineType::Truss, "update produced quantity")?;
        order.actual_produced_quantity = Some(quantity);
        Ok(())
    }

    // ==========================================
    // 完工
    // ==========================================

    /// 完工结算
    ///
    /// - 已完工: 空操作
    /// - 拉丝: 已加工批次转化为 CA-60
    /// - 桁架: 按型号扣减五部件, 生成短料与成品
    ///
    /// 结算失败时订单与台账均不变
    #[instrument(skip_all, fields(order_number = %order.order_number, machine = %order.machine))]
    pub fn complete(
        &self,
        ledger: &mut StockLedger,
        order: &mut ProductionOrder,
        active_order_ids: &HashSet<String>,
        data: CompletionData,
        now: DateTime<Utc>,
    ) -> ProductionResult<CompletionOutcome> {
        match order.status {
            OrderStatus::Completed => {
                debug!("订单已完工, 忽略重复完工");
                return Ok(CompletionOutcome::AlreadyCompleted);
            }
            OrderStatus::Pending => return Err(invalid(order, "complete")),
            OrderStatus::InProgress => {}
        }

        let report = match order.machine {
            MachineType::WireDraw => {
                let outcome = self.allocator.transform_wire_draw(ledger, order, now)?;
                order.actual_produced_weight = Some(round2(outcome.output_weight));
                order.scrap_weight = Some(outcome.scrap_weight);
                CompletionReport {
                    machine: MachineType::WireDraw,
                    produced_weight: round2(outcome.output_weight),
                    scrap_weight: outcome.scrap_weight,
                    wire_draw: Some(outcome),
                    truss: None,
                    finished_goods: vec![],
                    offcut_items: vec![],
                }
            }
            MachineType::Truss => self.complete_truss(ledger, order, active_order_ids, data, now)?,
        };

        close_open_downtime(order, now);
        order.active_lot_processing = None;
        // 未授权的超差包随完工作废
        order.pending_package_weights.clear();
        order.status = OrderStatus::Completed;
        order.end_time = Some(now);

        info!(
            produced_weight = report.produced_weight,
            scrap_weight = report.scrap_weight,
            "订单完工"
        );
        Ok(CompletionOutcome::Completed(report))
    }

    fn complete_truss(
        &self,
        ledger: &mut StockLedger,
        order: &mut ProductionOrder,
        active_order_ids: &HashSet<String>,
        data: CompletionData,
        now: DateTime<Utc>,
    ) -> ProductionResult<CompletionReport> {
        let pieces = data
            .actual_produced_quantity
            .or(order.actual_produced_quantity)
            .unwrap_or(0);
        // 型号查找失败在任何扣减之前返回
        let model = resolve_model(order, &self.catalog)?;
        let unit_weight = model.unit_weight;
        let model_name = model.model.clone();

        // 未填重量的短料按型号每米重量折算
        let offcuts: Vec<_> = data
            .offcuts
            .into_iter()
            .filter(|o| o.quantity > 0 && o.size > 0.0)
            .map(|mut o| {
                if !(o.total_weight > 0.0) {
                    o.total_weight = round2(model.offcut_weight(o.size, o.quantity));
                }
                o
            })
            .collect();

        let allocation = self.allocator.allocate_truss(
            ledger,
            order,
            pieces,
            &offcuts,
            &self.catalog,
            active_order_ids,
            now,
        )?;

        let mut produced_weight: f64 = order.weighed_packages.iter().map(|p| p.weight).sum();
        if !(produced_weight > 0.0) && pieces > 0 {
            produced_weight = unit_weight * pieces as f64;
        }
        let produced_weight = round2(produced_weight);

        let offcut_items: Vec<FinishedGoodsItem> = offcuts
            .iter()
            .map(|o| FinishedGoodsItem {
                id: new_id(id_prefixes::OFFCUT),
                production_date: now,
                production_order_id: order.id.clone(),
                order_number: order.order_number.clone(),
                product_type: ProductType::TrussOffcut,
                model: model_name.clone(),
                size: format!("{}", o.size),
                quantity: o.quantity,
                total_weight: round2(o.total_weight),
                status: FinishedGoodsStatus::Available,
            })
            .collect();

        let mut finished_goods = Vec::new();
        if produced_weight > 0.0 {
            finished_goods.push(FinishedGoodsItem {
                id: new_id(id_prefixes::FINISHED_GOODS),
                production_date: now,
                production_order_id: order.id.clone(),
                order_number: order.order_number.clone(),
                product_type: ProductType::Truss,
                model: model_name,
                size: order.truss_size.clone().unwrap_or_else(|| "0".to_string()),
                quantity: pieces,
                total_weight: produced_weight,
                status: FinishedGoodsStatus::Available,
            });
        }

        order.actual_produced_quantity = Some(pieces);
        order.actual_produced_weight = Some(produced_weight);
        order.scrap_weight = data.scrap_weight;
        order.offcuts = offcuts;

        Ok(CompletionReport {
            machine: MachineType::Truss,
            produced_weight,
            scrap_weight: data.scrap_weight.unwrap_or(0.0),
            wire_draw: None,
            truss: Some(allocation),
            finished_goods,
            offcut_items,
        })
    }
}

// ==========================================
// 内部辅助
// ==========================================

fn find_index(orders: &[ProductionOrder], order_id: &str) -> ProductionResult<usize> {
    orders
        .iter()
        .position(|o| o.id == order_id)
        .ok_or_else(|| ProductionError::OrderNotFound {
            order_id: order_id.to_string(),
        })
}

fn pending_index(order: &ProductionOrder, pending_id: &str) -> ProductionResult<usize> {
    order
        .pending_package_weights
        .iter()
        .position(|p| p.id == pending_id)
        .ok_or_else(|| ProductionError::PendingPackageNotFound {
            pending_id: pending_id.to_string(),
        })
}

fn invalid(order: &ProductionOrder, action: &'static str) -> ProductionError {
    ProductionError::InvalidStateTransition {
        order_number: order.order_number.clone(),
        from: order.status,
        action,
    }
}

fn require_status(
    order: &ProductionOrder,
    status: OrderStatus,
    action: &'static str,
) -> ProductionResult<()> {
    if order.status == status {
        Ok(())
    } else {
        Err(invalid(order, action))
    }
}

fn require_machine(
    order: &ProductionOrder,
    machine: MachineType,
    action: &'static str,
) -> ProductionResult<()> {
    if order.machine == machine {
        Ok(())
    } else {
        Err(ProductionError::WrongMachine {
            order_number: order.order_number.clone(),
            machine: order.machine,
            action,
        })
    }
}

/// 关闭最近一个未关闭的停机事件
fn close_open_downtime(order: &mut ProductionOrder, now: DateTime<Utc>) -> bool {
    match order
        .downtime_events
        .iter_mut()
        .rev()
        .find(|e| e.resume_time.is_none())
    {
        Some(event) => {
            event.resume_time = Some(now);
            true
        }
        None => false,
    }
}
