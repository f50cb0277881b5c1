// ==========================================
// 拉丝/桁架生产线 - 生产订单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 对齐: production_orders 集合
// ==========================================

use crate::domain::order::ProductionOrder;
use crate::repository::document::{load_all, to_document};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::record_store::{Collection, RecordStore};
use std::sync::Arc;

pub struct ProductionOrderRepository {
    store: Arc<dyn RecordStore>,
}

impl ProductionOrderRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> RepositoryResult<Vec<ProductionOrder>> {
        load_all(self.store.as_ref(), Collection::ProductionOrders).await
    }

    /// 按 ID 查询
    ///
    /// # 返回
    /// - Err(NotFound): 订单不存在
    pub async fn find_by_id(&self, order_id: &str) -> RepositoryResult<ProductionOrder> {
        self.list_all()
            .await?
            .into_iter()
            .find(|o| o.id == order_id)
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "ProductionOrder".to_string(),
                id: order_id.to_string(),
            })
    }

    pub async fn insert(&self, order: &ProductionOrder) -> RepositoryResult<()> {
        self.store
            .insert(Collection::ProductionOrders, to_document(order)?)
            .await
    }

    pub async fn update(&self, order: &ProductionOrder) -> RepositoryResult<()> {
        self.store
            .update(Collection::ProductionOrders, &order.id, to_document(order)?)
            .await
    }

    pub async fn delete(&self, order_id: &str) -> RepositoryResult<()> {
        self.store
            .delete_by_id(Collection::ProductionOrders, order_id)
            .await
    }
}
