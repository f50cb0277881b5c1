// ==========================================
// 拉丝/桁架生产线 - 记录存储 Trait
// ==========================================
// 职责: 定义按集合读写 JSON 文档的持久化接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 说明: 每次写入独立生效, 不提供跨写入事务
// ==========================================

use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::fmt;

// ==========================================
// Collection - 记录集合
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    StockLots,
    ProductionOrders,
    TransferRecords,
    FinishedGoods,
    OffcutItems,
    FinishedGoodsTransferRecords,
    ShiftReports,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::StockLots,
        Collection::ProductionOrders,
        Collection::TransferRecords,
        Collection::FinishedGoods,
        Collection::OffcutItems,
        Collection::FinishedGoodsTransferRecords,
        Collection::ShiftReports,
    ];

    /// 表名
    pub fn table_name(&self) -> &'static str {
        match self {
            Collection::StockLots => "stock_lots",
            Collection::ProductionOrders => "production_orders",
            Collection::TransferRecords => "transfer_records",
            Collection::FinishedGoods => "finished_goods",
            Collection::OffcutItems => "offcut_items",
            Collection::FinishedGoodsTransferRecords => "finished_goods_transfer_records",
            Collection::ShiftReports => "shift_reports",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

// ==========================================
// RecordStore Trait
// ==========================================
// 实现者: SqliteRecordStore（使用 rusqlite）
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 读取集合内全部记录 (按写入顺序)
    async fn fetch_all(&self, collection: Collection) -> RepositoryResult<Vec<JsonValue>>;

    /// 插入记录
    ///
    /// # 约束
    /// - record 必须为带字符串 `id` 的 JSON 对象
    async fn insert(&self, collection: Collection, record: JsonValue) -> RepositoryResult<()>;

    /// 局部更新: partial 的顶层字段覆盖原记录
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: JsonValue,
    ) -> RepositoryResult<()>;

    /// 按主键删除
    async fn delete_by_id(&self, collection: Collection, id: &str) -> RepositoryResult<()>;

    /// 按字段值删除
    ///
    /// # 返回
    /// - 删除的记录数
    async fn delete_where(
        &self,
        collection: Collection,
        column: &str,
        value: &JsonValue,
    ) -> RepositoryResult<usize>;

    /// 按字段值批量局部更新
    ///
    /// # 返回
    /// - 更新的记录数
    async fn update_where(
        &self,
        collection: Collection,
        column: &str,
        value: &JsonValue,
        partial: JsonValue,
    ) -> RepositoryResult<usize>;
}
