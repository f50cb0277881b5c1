// ==========================================
// 拉丝/桁架生产线 - 原料批次仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 对齐: stock_lots 集合
// ==========================================

use crate::domain::lot::StockLot;
use crate::repository::document::{load_all, to_document};
use crate::repository::error::RepositoryResult;
use crate::repository::record_store::{Collection, RecordStore};
use serde_json::json;
use std::sync::Arc;

// ==========================================
// StockLotRepository - 原料批次仓储
// ==========================================
pub struct StockLotRepository {
    store: Arc<dyn RecordStore>,
}

impl StockLotRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// 全量快照 (每个命令执行前重新读取)
    pub async fn list_all(&self) -> RepositoryResult<Vec<StockLot>> {
        load_all(self.store.as_ref(), Collection::StockLots).await
    }

    pub async fn insert(&self, lot: &StockLot) -> RepositoryResult<()> {
        self.store
            .insert(Collection::StockLots, to_document(lot)?)
            .await
    }

    /// 整体覆盖写回
    pub async fn update(&self, lot: &StockLot) -> RepositoryResult<()> {
        self.store
            .update(Collection::StockLots, &lot.id, to_document(lot)?)
            .await
    }

    pub async fn delete(&self, lot_id: &str) -> RepositoryResult<()> {
        self.store.delete_by_id(Collection::StockLots, lot_id).await
    }

    /// 删除某收货核对单下的全部批次
    ///
    /// # 返回
    /// - 删除的批次数
    pub async fn delete_by_conference(&self, conference_number: &str) -> RepositoryResult<usize> {
        self.store
            .delete_where(
                Collection::StockLots,
                "conference_number",
                &json!(conference_number),
            )
            .await
    }
}
