// ==========================================
// 拉丝/桁架生产线 - 成品仓储
// ==========================================
// 对齐: finished_goods (标准桁架) / offcut_items (短料) 集合
// 路由: 按 product_type 选择集合
// ==========================================

use crate::domain::finished_goods::FinishedGoodsItem;
use crate::domain::types::ProductType;
use crate::repository::document::{load_all, to_document};
use crate::repository::error::RepositoryResult;
use crate::repository::record_store::{Collection, RecordStore};
use std::sync::Arc;

pub struct FinishedGoodsRepository {
    store: Arc<dyn RecordStore>,
}

impl FinishedGoodsRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    fn collection_for(product_type: ProductType) -> Collection {
        match product_type {
            ProductType::Truss => Collection::FinishedGoods,
            ProductType::TrussOffcut => Collection::OffcutItems,
        }
    }

    /// 标准成品
    pub async fn list_finished_goods(&self) -> RepositoryResult<Vec<FinishedGoodsItem>> {
        load_all(self.store.as_ref(), Collection::FinishedGoods).await
    }

    /// 短料
    pub async fn list_offcuts(&self) -> RepositoryResult<Vec<FinishedGoodsItem>> {
        load_all(self.store.as_ref(), Collection::OffcutItems).await
    }

    /// 标准成品 + 短料
    pub async fn list_all(&self) -> RepositoryResult<Vec<FinishedGoodsItem>> {
        let mut items = self.list_finished_goods().await?;
        items.extend(self.list_offcuts().await?);
        Ok(items)
    }

    pub async fn insert(&self, item: &FinishedGoodsItem) -> RepositoryResult<()> {
        self.store
            .insert(Self::collection_for(item.product_type), to_document(item)?)
            .await
    }

    pub async fn update(&self, item: &FinishedGoodsItem) -> RepositoryResult<()> {
        self.store
            .update(
                Self::collection_for(item.product_type),
                &item.id,
                to_document(item)?,
            )
            .await
    }

    pub async fn delete(&self, item: &FinishedGoodsItem) -> RepositoryResult<()> {
        self.store
            .delete_by_id(Self::collection_for(item.product_type), &item.id)
            .await
    }
}
