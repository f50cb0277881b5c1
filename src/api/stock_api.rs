// ==========================================
// 拉丝/桁架生产线 - 原料库存 API
// ==========================================
// 职责: 收货核对单入账, 核对单修改/删除, 库存查询与汇总
// 红线: 核对单下存在已占用/已消耗批次时禁止修改或删除
// ==========================================

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::commit::CommitTracker;
use crate::api::error::{ApiError, ApiResult};
use crate::api::notification::{Notifier, Severity};
use crate::api::production_api::failure_severity;
use crate::domain::lot::{history_types, HistoryEvent, MaterialReceipt, StockLot};
use crate::domain::types::{id_prefixes, new_id, LotStatus, MaterialType};
use crate::engine::ledger::{round2, StockLedger};
use crate::repository::StockLotRepository;

/// 按物料+线径汇总的可用库存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSummary {
    pub material_type: MaterialType,
    pub gauge: String,
    pub lot_count: usize,
    pub total_remaining: f64,
}

pub struct StockApi {
    lot_repo: Arc<StockLotRepository>,
    notifier: Arc<dyn Notifier>,
}

impl StockApi {
    pub fn new(lot_repo: Arc<StockLotRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { lot_repo, notifier }
    }

    pub async fn list_lots(&self) -> ApiResult<Vec<StockLot>> {
        Ok(self.lot_repo.list_all().await?)
    }

    /// 指定物料+线径的可用批次 (FIFO 顺序)
    pub async fn available_lots(
        &self,
        material_type: MaterialType,
        gauge: &str,
    ) -> ApiResult<Vec<StockLot>> {
        let ledger = StockLedger::from_snapshot(self.lot_repo.list_all().await?);
        Ok(ledger
            .find_by_material_and_gauge(
                material_type,
                gauge,
                &[LotStatus::Available, LotStatus::AvailableSupport],
            )
            .into_iter()
            .cloned()
            .collect())
    }

    /// 收货核对单入账
    ///
    /// 每个批次: 状态 Available, 初始 = 剩余 = 磅秤重量, 附一条收货历史
    pub async fn receive_material(&self, receipt: MaterialReceipt) -> ApiResult<Vec<StockLot>> {
        let result: ApiResult<_> = async {
            validate_receipt(&receipt)?;
            let existing = self.lot_repo.list_all().await?;
            if existing
                .iter()
                .any(|l| l.conference_number == receipt.conference_number.trim())
            {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "核对单已入账: {}",
                    receipt.conference_number
                )));
            }

            let mut ledger = StockLedger::from_snapshot(existing);
            let lots = build_lots(&receipt);
            for lot in &lots {
                ledger.insert_new(lot.clone())?;
            }

            let batch = ledger.take_batch();
            let mut tracker = CommitTracker::new();
            tracker.apply_ledger_batch(&self.lot_repo, &batch).await;
            tracker.finish()?;

            info!(
                conference_number = %receipt.conference_number,
                lot_count = lots.len(),
                "收货入账完成"
            );
            self.notifier.notify(
                &format!(
                    "核对单 {} 已入账, 共 {} 个批次",
                    receipt.conference_number,
                    lots.len()
                ),
                Severity::Success,
            );
            Ok(lots)
        }
        .await;
        self.notified(result)
    }

    /// 删除核对单下全部批次
    ///
    /// # 返回
    /// 删除的批次数
    pub async fn delete_receipt(&self, conference_number: &str) -> ApiResult<usize> {
        let result: ApiResult<_> = async {
            self.ensure_receipt_untouched(conference_number).await?;
            let deleted = self.lot_repo.delete_by_conference(conference_number).await?;
            info!(conference_number, deleted, "核对单已删除");
            self.notifier.notify(
                &format!("核对单 {} 已删除 ({} 个批次)", conference_number, deleted),
                Severity::Success,
            );
            Ok(deleted)
        }
        .await;
        self.notified(result)
    }

    /// 以新内容替换核对单 (先删后建)
    pub async fn edit_receipt(
        &self,
        conference_number: &str,
        receipt: MaterialReceipt,
    ) -> ApiResult<Vec<StockLot>> {
        let result: ApiResult<_> = async {
            validate_receipt(&receipt)?;
            self.ensure_receipt_untouched(conference_number).await?;

            let existing = self.lot_repo.list_all().await?;
            let new_number = receipt.conference_number.trim();
            if new_number != conference_number
                && existing.iter().any(|l| l.conference_number == new_number)
            {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "核对单已入账: {}",
                    new_number
                )));
            }

            self.lot_repo.delete_by_conference(conference_number).await?;

            let lots = build_lots(&receipt);
            let mut tracker = CommitTracker::new();
            for lot in &lots {
                tracker.record(format!("lot:{}", lot.id), self.lot_repo.insert(lot).await);
            }
            tracker.finish()?;

            self.notifier.notify(
                &format!("核对单 {} 已更新", receipt.conference_number),
                Severity::Success,
            );
            Ok(lots)
        }
        .await;
        self.notified(result)
    }

    /// 可用库存汇总 (Available / AvailableSupport)
    pub async fn stock_summary(&self) -> ApiResult<Vec<StockSummary>> {
        let lots = self.lot_repo.list_all().await?;
        let mut groups: BTreeMap<(String, String), StockSummary> = BTreeMap::new();

        for lot in lots.iter().filter(|l| l.status.is_available()) {
            let entry = groups
                .entry((lot.material_type.to_string(), lot.gauge.clone()))
                .or_insert_with(|| StockSummary {
                    material_type: lot.material_type,
                    gauge: lot.gauge.clone(),
                    lot_count: 0,
                    total_remaining: 0.0,
                });
            entry.lot_count += 1;
            entry.total_remaining = round2(entry.total_remaining + lot.remaining_quantity);
        }
        Ok(groups.into_values().collect())
    }

    async fn ensure_receipt_untouched(&self, conference_number: &str) -> ApiResult<()> {
        let lots = self.lot_repo.list_all().await?;
        let mut found = false;
        for lot in lots.iter().filter(|l| l.conference_number == conference_number) {
            found = true;
            if !lot.status.is_available() || !lot.production_order_ids.is_empty() {
                return Err(ApiError::BusinessRuleViolation(format!(
                    "核对单 {} 的批次 {} 已投入使用 (status={})",
                    conference_number, lot.internal_lot, lot.status
                )));
            }
        }
        if !found {
            return Err(ApiError::NotFound(format!(
                "核对单不存在: {}",
                conference_number
            )));
        }
        Ok(())
    }

    fn notified<T>(&self, result: ApiResult<T>) -> ApiResult<T> {
        if let Err(e) = &result {
            self.notifier.notify(&e.to_string(), failure_severity(e));
        }
        result
    }
}

fn validate_receipt(receipt: &MaterialReceipt) -> ApiResult<()> {
    if receipt.conference_number.trim().is_empty() {
        return Err(ApiError::ValidationError("核对单号不能为空".to_string()));
    }
    if receipt.supplier.trim().is_empty() {
        return Err(ApiError::ValidationError("供应商不能为空".to_string()));
    }
    if receipt.lots.is_empty() {
        return Err(ApiError::ValidationError("核对单没有批次".to_string()));
    }

    let mut seen = HashSet::new();
    for lot in &receipt.lots {
        if lot.internal_lot.trim().is_empty() {
            return Err(ApiError::ValidationError("内部批次号不能为空".to_string()));
        }
        if !seen.insert(lot.internal_lot.trim()) {
            return Err(ApiError::ValidationError(format!(
                "内部批次号重复: {}",
                lot.internal_lot
            )));
        }
        if lot.gauge.trim().is_empty() {
            return Err(ApiError::ValidationError(format!(
                "批次 {} 线径不能为空",
                lot.internal_lot
            )));
        }
        if !(lot.scale_weight > 0.0) {
            return Err(ApiError::ValidationError(format!(
                "批次 {} 磅秤重量必须大于 0",
                lot.internal_lot
            )));
        }
        if lot.label_weight < 0.0 {
            return Err(ApiError::ValidationError(format!(
                "批次 {} 标签重量不能为负",
                lot.internal_lot
            )));
        }
    }
    Ok(())
}

fn build_lots(receipt: &MaterialReceipt) -> Vec<StockLot> {
    let now = Utc::now();
    receipt
        .lots
        .iter()
        .map(|r| StockLot {
            id: new_id(id_prefixes::STOCK_LOT),
            entry_date: receipt.entry_date,
            supplier: receipt.supplier.trim().to_string(),
            invoice_number: receipt.invoice_number.trim().to_string(),
            conference_number: receipt.conference_number.trim().to_string(),
            internal_lot: r.internal_lot.trim().to_string(),
            supplier_lot: r.supplier_lot.clone(),
            run_number: r.run_number.clone(),
            material_type: r.material_type,
            gauge: r.gauge.trim().to_string(),
            label_weight: r.label_weight,
            initial_quantity: r.scale_weight,
            remaining_quantity: r.scale_weight,
            status: LotStatus::Available,
            production_order_ids: Vec::new(),
            history: vec![HistoryEvent::new(history_types::RECEIPT, now)
                .with("conference_number", receipt.conference_number.trim())
                .with("scale_weight", r.scale_weight)],
        })
        .collect()
}
