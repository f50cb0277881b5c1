// ==========================================
// 拉丝/桁架生产线 - 调拨记录仓储
// ==========================================
// 对齐: transfer_records / finished_goods_transfer_records 集合
// 说明: 调拨记录为不可变快照, 只插入不更新
// ==========================================

use crate::domain::transfer::{FinishedGoodsTransferRecord, TransferRecord};
use crate::repository::document::{load_all, to_document};
use crate::repository::error::RepositoryResult;
use crate::repository::record_store::{Collection, RecordStore};
use std::sync::Arc;

pub struct TransferRepository {
    store: Arc<dyn RecordStore>,
}

impl TransferRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    // ===== 原料调拨 =====

    pub async fn list_transfers(&self) -> RepositoryResult<Vec<TransferRecord>> {
        load_all(self.store.as_ref(), Collection::TransferRecords).await
    }

    pub async fn insert_transfer(&self, record: &TransferRecord) -> RepositoryResult<()> {
        self.store
            .insert(Collection::TransferRecords, to_document(record)?)
            .await
    }

    // ===== 成品调拨 =====

    pub async fn list_finished_goods_transfers(
        &self,
    ) -> RepositoryResult<Vec<FinishedGoodsTransferRecord>> {
        load_all(self.store.as_ref(), Collection::FinishedGoodsTransferRecords).await
    }

    pub async fn insert_finished_goods_transfer(
        &self,
        record: &FinishedGoodsTransferRecord,
    ) -> RepositoryResult<()> {
        self.store
            .insert(
                Collection::FinishedGoodsTransferRecords,
                to_document(record)?,
            )
            .await
    }
}
