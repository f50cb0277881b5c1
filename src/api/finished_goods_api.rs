// ==========================================
// 拉丝/桁架生产线 - 成品库存 API
// ==========================================
// 职责: 成品/余料查询, 按件调拨, 删除
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::api::commit::CommitTracker;
use crate::api::error::{ApiError, ApiResult};
use crate::api::notification::{Notifier, Severity};
use crate::api::production_api::{failure_severity, require_operator};
use crate::domain::finished_goods::FinishedGoodsItem;
use crate::domain::transfer::{FinishedGoodsTransferLine, FinishedGoodsTransferRecord};
use crate::engine::transfer_planner::transfer_finished_goods;
use crate::repository::{FinishedGoodsRepository, TransferRepository};

pub struct FinishedGoodsApi {
    finished_goods_repo: Arc<FinishedGoodsRepository>,
    transfer_repo: Arc<TransferRepository>,
    notifier: Arc<dyn Notifier>,
}

impl FinishedGoodsApi {
    pub fn new(
        finished_goods_repo: Arc<FinishedGoodsRepository>,
        transfer_repo: Arc<TransferRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            finished_goods_repo,
            transfer_repo,
            notifier,
        }
    }

    pub async fn list_finished_goods(&self) -> ApiResult<Vec<FinishedGoodsItem>> {
        Ok(self.finished_goods_repo.list_finished_goods().await?)
    }

    pub async fn list_offcuts(&self) -> ApiResult<Vec<FinishedGoodsItem>> {
        Ok(self.finished_goods_repo.list_offcuts().await?)
    }

    pub async fn list_transfers(&self) -> ApiResult<Vec<FinishedGoodsTransferRecord>> {
        let mut records = self.transfer_repo.list_finished_goods_transfers().await?;
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    /// 按件调拨成品/余料
    ///
    /// `destination` 为 "other" 时 `other_destination` 记录实际去向
    pub async fn transfer_finished_goods(
        &self,
        lines: &[FinishedGoodsTransferLine],
        destination: &str,
        other_destination: Option<&str>,
        operator: &str,
    ) -> ApiResult<FinishedGoodsTransferRecord> {
        let result: ApiResult<_> = async {
            let operator = require_operator(operator)?;
            let items = self.finished_goods_repo.list_all().await?;
            let (record, updated) = transfer_finished_goods(
                &items,
                lines,
                destination,
                other_destination,
                operator,
                Utc::now(),
            )?;

            let mut tracker = CommitTracker::new();
            for item in &updated {
                tracker.record(
                    format!("finished_goods:{}", item.id),
                    self.finished_goods_repo.update(item).await,
                );
            }
            tracker.record(
                format!("finished_goods_transfer:{}", record.id),
                self.transfer_repo.insert_finished_goods_transfer(&record).await,
            );
            tracker.finish()?;

            self.notifier.notify(
                &format!(
                    "已调拨 {} 项成品至 {}",
                    record.transferred_items.len(),
                    record.destination
                ),
                Severity::Success,
            );
            Ok(record)
        }
        .await;
        self.notified(result)
    }

    /// 删除成品条目; 任一 ID 不存在则不删除任何条目
    ///
    /// # 返回
    /// 删除条数
    pub async fn delete_finished_goods(&self, item_ids: &[String]) -> ApiResult<usize> {
        let result: ApiResult<_> = async {
            if item_ids.is_empty() {
                return Err(ApiError::InvalidInput("未选择成品".to_string()));
            }
            let items = self.finished_goods_repo.list_all().await?;
            // 重复 id 只删除一次
            let mut seen = HashSet::new();
            let mut targets = Vec::with_capacity(item_ids.len());
            for id in item_ids.iter().filter(|id| seen.insert(id.as_str())) {
                let item = items
                    .iter()
                    .find(|i| &i.id == id)
                    .ok_or_else(|| ApiError::NotFound(format!("成品不存在: {}", id)))?;
                targets.push(item);
            }

            let mut tracker = CommitTracker::new();
            for item in &targets {
                tracker.record(
                    format!("finished_goods:{}", item.id),
                    self.finished_goods_repo.delete(item).await,
                );
            }
            let applied = tracker.finish()?;
            info!(deleted = applied.len(), "成品条目已删除");
            self.notifier.notify(
                &format!("已删除 {} 项成品", applied.len()),
                Severity::Success,
            );
            Ok(applied.len())
        }
        .await;
        self.notified(result)
    }

    fn notified<T>(&self, result: ApiResult<T>) -> ApiResult<T> {
        if let Err(e) = &result {
            self.notifier.notify(&e.to_string(), failure_severity(e));
        }
        result
    }
}
