// ==========================================
// 拉丝/桁架生产线 - 生产订单 API
// ==========================================
// 职责: 读取快照 -> 调用状态机 -> 逐条写回 -> 通知
// 红线: 每个命令执行前重新读取台账与订单
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::api::authorization::ManagerAuthorizer;
use crate::api::commit::CommitTracker;
use crate::api::error::{ApiError, ApiResult};
use crate::api::notification::{Notifier, Severity};
use crate::config::production_config_trait::ProductionSettings;
use crate::domain::order::{CompletionData, NewProductionOrder, ProductionOrder};
use crate::domain::shift_report::ShiftReport;
use crate::domain::types::{id_prefixes, new_id};
use crate::engine::allocator::{active_order_ids, ConsumptionAllocator};
use crate::engine::ledger::StockLedger;
use crate::engine::package_gate::{
    PackageCheck, PackageWeightGate, PackageWeightInput, PendingPackageWeight,
};
use crate::engine::production::{
    CompletionOutcome, ProductionOrderMachine, ProductionResult, StartOutcome,
};
use crate::engine::shift_report::ShiftReportGenerator;
use crate::repository::{
    FinishedGoodsRepository, ProductionOrderRepository, ShiftReportRepository,
    StockLotRepository,
};

/// 包称重结果
#[derive(Debug, Clone, PartialEq)]
pub enum PackageWeightOutcome {
    /// 已写入订单
    Recorded(ProductionOrder),
    /// 超差, 待主管授权
    PendingAuthorization(PendingPackageWeight),
}

// ==========================================
// ProductionApi - 生产订单 API
// ==========================================
pub struct ProductionApi {
    lot_repo: Arc<StockLotRepository>,
    order_repo: Arc<ProductionOrderRepository>,
    finished_goods_repo: Arc<FinishedGoodsRepository>,
    shift_report_repo: Arc<ShiftReportRepository>,
    machine: ProductionOrderMachine,
    package_gate: PackageWeightGate,
    report_generator: ShiftReportGenerator,
    authorizer: Arc<dyn ManagerAuthorizer>,
    notifier: Arc<dyn Notifier>,
}

impl ProductionApi {
    pub fn new(
        lot_repo: Arc<StockLotRepository>,
        order_repo: Arc<ProductionOrderRepository>,
        finished_goods_repo: Arc<FinishedGoodsRepository>,
        shift_report_repo: Arc<ShiftReportRepository>,
        settings: &ProductionSettings,
        authorizer: Arc<dyn ManagerAuthorizer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            lot_repo,
            order_repo,
            finished_goods_repo,
            shift_report_repo,
            machine: ProductionOrderMachine::new(
                ConsumptionAllocator::new(settings.residual_threshold_kg),
                settings.truss_catalog.clone(),
            ),
            package_gate: PackageWeightGate::new(settings.package_tolerance),
            report_generator: ShiftReportGenerator::new(settings.steel_density),
            authorizer,
            notifier,
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub async fn list_orders(&self) -> ApiResult<Vec<ProductionOrder>> {
        Ok(self.order_repo.list_all().await?)
    }

    pub async fn get_order(&self, order_id: &str) -> ApiResult<ProductionOrder> {
        Ok(self.order_repo.find_by_id(order_id).await?)
    }

    pub async fn list_shift_reports(&self, order_id: &str) -> ApiResult<Vec<ShiftReport>> {
        Ok(self.shift_report_repo.list_by_order(order_id).await?)
    }

    /// 待授权的包称重 (按提交时间)
    pub async fn pending_package_weights(&self) -> ApiResult<Vec<PendingPackageWeight>> {
        let mut pending: Vec<_> = self
            .order_repo
            .list_all()
            .await?
            .into_iter()
            .flat_map(|o| o.pending_package_weights)
            .collect();
        pending.sort_by_key(|p| p.requested_at);
        Ok(pending)
    }

    // ==========================================
    // 登记 / 删除
    // ==========================================

    /// 登记订单并占用批次
    pub async fn register_order(&self, input: NewProductionOrder) -> ApiResult<ProductionOrder> {
        let result: ApiResult<_> = async {
            let now = Utc::now();
            let mut ledger = StockLedger::from_snapshot(self.lot_repo.list_all().await?);
            let existing = self.order_repo.list_all().await?;

            let order = self.machine.register(
                &mut ledger,
                &existing,
                new_id(id_prefixes::PRODUCTION_ORDER),
                input,
                now,
            )?;

            let batch = ledger.take_batch();
            let mut tracker = CommitTracker::new();
            tracker.record(format!("order:{}", order.id), self.order_repo.insert(&order).await);
            tracker.apply_ledger_batch(&self.lot_repo, &batch).await;
            tracker.finish()?;

            self.notifier.notify(
                &format!("订单 {} 已登记, 占用 {} 个批次", order.order_number, batch.len()),
                Severity::Success,
            );
            Ok(order)
        }
        .await;
        self.notified(result)
    }

    /// 删除未完工订单并释放批次
    pub async fn delete_order(&self, order_id: &str) -> ApiResult<()> {
        let result: ApiResult<_> = async {
            let now = Utc::now();
            let order = self.order_repo.find_by_id(order_id).await?;
            let mut ledger = StockLedger::from_snapshot(self.lot_repo.list_all().await?);

            self.machine.remove(&mut ledger, &order, now)?;

            let batch = ledger.take_batch();
            let mut tracker = CommitTracker::new();
            tracker.apply_ledger_batch(&self.lot_repo, &batch).await;
            tracker.record(
                format!("order:{}", order.id),
                self.order_repo.delete(&order.id).await,
            );
            tracker.finish()?;

            self.notifier.notify(
                &format!("订单 {} 已删除", order.order_number),
                Severity::Success,
            );
            Ok(())
        }
        .await;
        self.notified(result)
    }

    // ==========================================
    // 开工 / 班次
    // ==========================================

    /// 开工; 操作工从同机组其他订单交接时, 原订单班次随之关闭
    pub async fn start_order(&self, order_id: &str, operator: &str) -> ApiResult<StartOutcome> {
        let result: ApiResult<_> = async {
            let operator = require_operator(operator)?;
            let now = Utc::now();
            let mut orders = self.order_repo.list_all().await?;

            let outcome = self.machine.start(&mut orders, order_id, operator, now)?;

            let mut tracker = CommitTracker::new();
            for order in orders.iter().filter(|o| {
                o.id == order_id || outcome.handed_over_from.as_deref() == Some(o.id.as_str())
            }) {
                tracker.record(format!("order:{}", order.id), self.order_repo.update(order).await);
            }
            tracker.finish()?;
            Ok(outcome)
        }
        .await;
        self.notified(result)
    }

    pub async fn start_shift(&self, order_id: &str, operator: &str) -> ApiResult<ProductionOrder> {
        let result: ApiResult<_> = async {
            let operator = require_operator(operator)?;
            let now = Utc::now();
            let mut orders = self.order_repo.list_all().await?;

            self.machine.start_shift(&mut orders, order_id, operator, now)?;

            let order = orders
                .into_iter()
                .find(|o| o.id == order_id)
                .ok_or_else(|| ApiError::NotFound(format!("ProductionOrder(id={})不存在", order_id)))?;
            self.order_repo.update(&order).await?;
            Ok(order)
        }
        .await;
        self.notified(result)
    }

    /// 结班并生成班次报表
    pub async fn end_shift(&self, order_id: &str, operator: &str) -> ApiResult<ShiftReport> {
        let result: ApiResult<_> = async {
            let operator = require_operator(operator)?;
            let now = Utc::now();
            let mut order = self.order_repo.find_by_id(order_id).await?;

            let log = self.machine.end_shift(&mut order, operator, now)?;
            self.order_repo.update(&order).await?;

            let report = self
                .report_generator
                .generate(&order, &log)
                .ok_or_else(|| ApiError::InternalError("班次未关闭, 无法生成报表".to_string()))?;
            self.shift_report_repo.insert(&report).await?;

            info!(
                order_number = %order.order_number,
                operator = operator,
                produced_weight = report.total_produced_weight,
                "班次报表已生成"
            );
            self.notifier.notify(
                &format!("{} 的班次已结束, 报表已生成", operator),
                Severity::Success,
            );
            Ok(report)
        }
        .await;
        self.notified(result)
    }

    /// 完工后辅助作业
    ///
    /// # 返回
    /// 被记录的订单 ID
    pub async fn log_post_production_activity(
        &self,
        operator: &str,
        description: &str,
    ) -> ApiResult<String> {
        let result: ApiResult<_> = async {
            let operator = require_operator(operator)?;
            let now = Utc::now();
            let mut orders = self.order_repo.list_all().await?;

            let order_id =
                self.machine
                    .log_post_production_activity(&mut orders, operator, description, now)?;
            if let Some(order) = orders.iter().find(|o| o.id == order_id) {
                self.order_repo.update(order).await?;
            }
            Ok(order_id)
        }
        .await;
        self.notified(result)
    }

    // ==========================================
    // 停机
    // ==========================================

    pub async fn log_downtime(&self, order_id: &str, reason: &str) -> ApiResult<ProductionOrder> {
        let result: ApiResult<_> = async {
            let now = Utc::now();
            self.update_order_with(order_id, |m, o| m.log_downtime(o, reason, now))
                .await
        }
        .await;
        self.notified(result)
    }

    pub async fn resume_production(&self, order_id: &str) -> ApiResult<ProductionOrder> {
        let result: ApiResult<_> = async {
            let now = Utc::now();
            self.update_order_with(order_id, |m, o| m.resume(o, now)).await
        }
        .await;
        self.notified(result)
    }

    // ==========================================
    // 拉丝批次加工
    // ==========================================

    pub async fn start_lot_processing(
        &self,
        order_id: &str,
        lot_id: &str,
    ) -> ApiResult<ProductionOrder> {
        let result: ApiResult<_> = async {
            let now = Utc::now();
            self.update_order_with(order_id, |m, o| m.start_lot_processing(o, lot_id, now))
                .await
        }
        .await;
        self.notified(result)
    }

    pub async fn finish_lot_processing(
        &self,
        order_id: &str,
        lot_id: &str,
    ) -> ApiResult<ProductionOrder> {
        let result: ApiResult<_> = async {
            let now = Utc::now();
            self.update_order_with(order_id, |m, o| m.finish_lot_processing(o, lot_id, now))
                .await
        }
        .await;
        self.notified(result)
    }

    pub async fn record_lot_weight(
        &self,
        order_id: &str,
        lot_id: &str,
        final_weight: f64,
        measured_gauge: Option<f64>,
    ) -> ApiResult<ProductionOrder> {
        let result = self
            .update_order_with(order_id, |m, o| {
                m.record_lot_weight(o, lot_id, final_weight, measured_gauge)
            })
            .await;
        self.notified(result)
    }

    // ==========================================
    // 桁架称重 / 计件
    // ==========================================

    /// 包称重; 超出理论重量容差时挂起待授权
    pub async fn record_package_weight(
        &self,
        order_id: &str,
        package: PackageWeightInput,
    ) -> ApiResult<PackageWeightOutcome> {
        let result: ApiResult<_> = async {
            let now = Utc::now();
            let mut order = self.order_repo.find_by_id(order_id).await?;
            self.machine.validate_package(&order, &package)?;

            let model = self.machine.package_model(&order)?;

            match self.package_gate.check(model, package.quantity, package.weight) {
                PackageCheck::OutOfTolerance {
                    expected,
                    lower_bound,
                    upper_bound,
                    deviation_pct,
                } => {
                    let pending = PendingPackageWeight {
                        id: new_id(id_prefixes::PENDING_PACKAGE),
                        order_id: order.id.clone(),
                        package,
                        expected_weight: expected,
                        lower_bound,
                        upper_bound,
                        requested_at: now,
                    };
                    // 挂起记录随订单持久化
                    self.machine.hold_package_weight(&mut order, pending.clone())?;
                    self.order_repo.update(&order).await?;

                    warn!(
                        order_number = %order.order_number,
                        package_number = pending.package.package_number,
                        weight = pending.package.weight,
                        expected = expected,
                        deviation_pct = deviation_pct,
                        "包称重超差, 等待主管授权"
                    );
                    self.notifier.notify(
                        &format!(
                            "包 {} 重量 {:.2} kg 超出范围 [{:.2}, {:.2}], 需主管授权",
                            pending.package.package_number,
                            pending.package.weight,
                            lower_bound,
                            upper_bound
                        ),
                        Severity::Warning,
                    );
                    Ok(PackageWeightOutcome::PendingAuthorization(pending))
                }
                PackageCheck::WithinTolerance { .. } => {
                    self.machine.apply_package_weight(&mut order, &package, now)?;
                    self.order_repo.update(&order).await?;
                    Ok(PackageWeightOutcome::Recorded(order))
                }
            }
        }
        .await;
        self.notified(result)
    }

    /// 主管授权挂起的包称重
    pub async fn authorize_package_weight(
        &self,
        pending_id: &str,
        credential: &str,
    ) -> ApiResult<ProductionOrder> {
        let result: ApiResult<_> = async {
            if !self.authorizer.verify(credential) {
                return Err(ApiError::AuthorizationDenied("主管口令无效".to_string()));
            }
            let mut order = self.find_order_holding(pending_id).await?;
            let pending = self
                .machine
                .authorize_package_weight(&mut order, pending_id, Utc::now())?;
            self.order_repo.update(&order).await?;

            info!(
                order_number = %order.order_number,
                package_number = pending.package.package_number,
                "超差包称重已授权"
            );
            self.notifier
                .notify("包称重已授权并写入", Severity::Success);
            Ok(order)
        }
        .await;
        self.notified(result)
    }

    /// 取消挂起的包称重
    pub async fn cancel_package_weight(&self, pending_id: &str) -> ApiResult<PendingPackageWeight> {
        let result: ApiResult<_> = async {
            let mut order = self.find_order_holding(pending_id).await?;
            let pending = self.machine.cancel_package_weight(&mut order, pending_id)?;
            self.order_repo.update(&order).await?;
            self.notifier.notify("包称重已取消", Severity::Info);
            Ok(pending)
        }
        .await;
        self.notified(result)
    }

    pub async fn update_produced_quantity(
        &self,
        order_id: &str,
        quantity: u32,
    ) -> ApiResult<ProductionOrder> {
        let result = self
            .update_order_with(order_id, |m, o| m.update_produced_quantity(o, quantity))
            .await;
        self.notified(result)
    }

    // ==========================================
    // 完工
    // ==========================================

    /// 完工结算
    ///
    /// 已完工订单重复调用返回 AlreadyCompleted, 不产生任何写入
    pub async fn complete_order(
        &self,
        order_id: &str,
        data: CompletionData,
    ) -> ApiResult<CompletionOutcome> {
        let result: ApiResult<_> = async {
            let now = Utc::now();
            let orders = self.order_repo.list_all().await?;
            let active = active_order_ids(&orders);
            let mut order = orders
                .into_iter()
                .find(|o| o.id == order_id)
                .ok_or_else(|| ApiError::NotFound(format!("ProductionOrder(id={})不存在", order_id)))?;
            let mut ledger = StockLedger::from_snapshot(self.lot_repo.list_all().await?);

            let report = match self
                .machine
                .complete(&mut ledger, &mut order, &active, data, now)?
            {
                CompletionOutcome::AlreadyCompleted => {
                    self.notifier.notify(
                        &format!("订单 {} 已完工", order.order_number),
                        Severity::Info,
                    );
                    return Ok(CompletionOutcome::AlreadyCompleted);
                }
                CompletionOutcome::Completed(report) => report,
            };

            // 订单先落库; 订单写入失败时不扣减库存, 也不生成成品
            self.order_repo.update(&order).await?;

            let batch = ledger.take_batch();
            let mut tracker = CommitTracker::new();
            tracker.record(format!("order:{}", order.id), Ok(()));
            tracker.apply_ledger_batch(&self.lot_repo, &batch).await;
            for item in report.offcut_items.iter().chain(report.finished_goods.iter()) {
                tracker.record(
                    format!("finished_goods:{}", item.id),
                    self.finished_goods_repo.insert(item).await,
                );
            }
            tracker.finish()?;

            self.notifier.notify(
                &format!(
                    "订单 {} 已完工: 产出 {:.2} kg, 废料 {:.2} kg",
                    order.order_number, report.produced_weight, report.scrap_weight
                ),
                Severity::Success,
            );
            Ok(CompletionOutcome::Completed(report))
        }
        .await;
        self.notified(result)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 读取订单 -> 状态机操作 -> 写回
    async fn update_order_with<F>(&self, order_id: &str, op: F) -> ApiResult<ProductionOrder>
    where
        F: FnOnce(&ProductionOrderMachine, &mut ProductionOrder) -> ProductionResult<()>,
    {
        let mut order = self.order_repo.find_by_id(order_id).await?;
        op(&self.machine, &mut order)?;
        self.order_repo.update(&order).await?;
        Ok(order)
    }

    /// 查找挂起该包称重的订单
    async fn find_order_holding(&self, pending_id: &str) -> ApiResult<ProductionOrder> {
        self.order_repo
            .list_all()
            .await?
            .into_iter()
            .find(|o| o.pending_package_weights.iter().any(|p| p.id == pending_id))
            .ok_or_else(|| ApiError::NotFound(format!("待授权包称重(id={})不存在", pending_id)))
    }

    /// 失败时通知用户
    fn notified<T>(&self, result: ApiResult<T>) -> ApiResult<T> {
        if let Err(e) = &result {
            self.notifier.notify(&e.to_string(), failure_severity(e));
        }
        result
    }
}

/// 失败通知级别: 严重错误与写入失败为 Error, 其余为 Warning
pub(crate) fn failure_severity(err: &ApiError) -> Severity {
    match err {
        ApiError::CriticalLookupFailure(_)
        | ApiError::PartialCommit { .. }
        | ApiError::DatabaseError(_)
        | ApiError::DatabaseConnectionError(_)
        | ApiError::InternalError(_)
        | ApiError::Other(_) => Severity::Error,
        _ => Severity::Warning,
    }
}

pub(crate) fn require_operator(operator: &str) -> ApiResult<&str> {
    let operator = operator.trim();
    if operator.is_empty() {
        return Err(ApiError::InvalidInput("操作工不能为空".to_string()));
    }
    Ok(operator)
}
