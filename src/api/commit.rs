// ==========================================
// 拉丝/桁架生产线 - 写入批次提交
// ==========================================
// 规则: 逐条写入, 单条失败不中断后续写入, 已写入部分不回滚
// 结果: 全部成功返回已写入清单; 否则返回 PartialCommit
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::engine::ledger::{LedgerBatch, LotWrite};
use crate::repository::error::RepositoryResult;
use crate::repository::StockLotRepository;
use tracing::{debug, error};

#[derive(Debug, Default)]
pub(crate) struct CommitTracker {
    applied: Vec<String>,
    failed: Vec<String>,
    first_cause: Option<String>,
}

impl CommitTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, label: String, result: RepositoryResult<()>) {
        match result {
            Ok(()) => {
                debug!(item = %label, "写入成功");
                self.applied.push(label);
            }
            Err(e) => {
                error!(item = %label, error = %e, "写入失败");
                if self.first_cause.is_none() {
                    self.first_cause = Some(e.to_string());
                }
                self.failed.push(label);
            }
        }
    }

    /// 写入台账批次中的全部批次
    pub(crate) async fn apply_ledger_batch(
        &mut self,
        lot_repo: &StockLotRepository,
        batch: &LedgerBatch,
    ) {
        for write in &batch.writes {
            let result = match write {
                LotWrite::Insert(lot) => lot_repo.insert(lot).await,
                LotWrite::Update(lot) => lot_repo.update(lot).await,
            };
            self.record(format!("lot:{}", write.lot_id()), result);
        }
    }

    pub(crate) fn finish(self) -> ApiResult<Vec<String>> {
        match self.first_cause {
            None => Ok(self.applied),
            Some(cause) => Err(ApiError::PartialCommit {
                applied: self.applied,
                failed: self.failed,
                cause,
            }),
        }
    }
}
