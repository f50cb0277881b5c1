// ==========================================
// 拉丝/桁架生产线 - 原料调拨 API
// ==========================================
// 流程: plan_transfer 生成默认方案 -> 用户调整 -> commit_transfer 提交
// ==========================================

use std::sync::Arc;

use chrono::Utc;

use crate::api::commit::CommitTracker;
use crate::api::error::ApiResult;
use crate::api::notification::{Notifier, Severity};
use crate::api::production_api::{failure_severity, require_operator};
use crate::domain::transfer::{TransferRecord, TransferRequest};
use crate::engine::ledger::StockLedger;
use crate::engine::transfer_planner::{TransferPlan, TransferPlanner};
use crate::repository::{StockLotRepository, TransferRepository};

pub struct TransferApi {
    lot_repo: Arc<StockLotRepository>,
    transfer_repo: Arc<TransferRepository>,
    planner: TransferPlanner,
    notifier: Arc<dyn Notifier>,
}

impl TransferApi {
    pub fn new(
        lot_repo: Arc<StockLotRepository>,
        transfer_repo: Arc<TransferRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            lot_repo,
            transfer_repo,
            planner: TransferPlanner::new(),
            notifier,
        }
    }

    /// 基于当前台账生成调拨方案 (不写入)
    pub async fn plan_transfer(&self, requests: &[TransferRequest]) -> ApiResult<TransferPlan> {
        let result: ApiResult<_> = async {
            let ledger = StockLedger::from_snapshot(self.lot_repo.list_all().await?);
            Ok(self.planner.plan(&ledger, requests)?)
        }
        .await;
        self.notified(result)
    }

    /// 按方案中已选明细提交
    pub async fn commit_transfer(
        &self,
        plan: &TransferPlan,
        destination: &str,
        operator: &str,
    ) -> ApiResult<TransferRecord> {
        self.commit_transfer_lines(&plan.selected_lines(), destination, operator)
            .await
    }

    /// 提交调拨明细 (lot_id, 数量)
    pub async fn commit_transfer_lines(
        &self,
        lines: &[(String, f64)],
        destination: &str,
        operator: &str,
    ) -> ApiResult<TransferRecord> {
        let result: ApiResult<_> = async {
            let operator = require_operator(operator)?;
            let now = Utc::now();
            // 提交前重新读取台账, 方案中的可用量可能已过期
            let mut ledger = StockLedger::from_snapshot(self.lot_repo.list_all().await?);
            let record = self
                .planner
                .commit(&mut ledger, lines, destination, operator, now)?;

            let batch = ledger.take_batch();
            let mut tracker = CommitTracker::new();
            tracker.apply_ledger_batch(&self.lot_repo, &batch).await;
            tracker.record(
                format!("transfer:{}", record.id),
                self.transfer_repo.insert_transfer(&record).await,
            );
            tracker.finish()?;

            self.notifier.notify(
                &format!(
                    "已调拨 {} 个批次共 {:.2} kg 至 {}",
                    record.transferred_lots.len(),
                    record.total_weight(),
                    record.destination_sector
                ),
                Severity::Success,
            );
            Ok(record)
        }
        .await;
        self.notified(result)
    }

    pub async fn list_transfers(&self) -> ApiResult<Vec<TransferRecord>> {
        let mut records = self.transfer_repo.list_transfers().await?;
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    fn notified<T>(&self, result: ApiResult<T>) -> ApiResult<T> {
        if let Err(e) = &result {
            self.notifier.notify(&e.to_string(), failure_severity(e));
        }
        result
    }
}
