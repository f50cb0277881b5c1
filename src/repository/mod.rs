// ==========================================
// 拉丝/桁架生产线 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

mod document;
pub mod error;
pub mod finished_goods_repo;
pub mod production_order_repo;
pub mod record_store;
pub mod shift_report_repo;
pub mod sqlite_store;
pub mod stock_lot_repo;
pub mod transfer_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use finished_goods_repo::FinishedGoodsRepository;
pub use production_order_repo::ProductionOrderRepository;
pub use record_store::{Collection, RecordStore};
pub use shift_report_repo::ShiftReportRepository;
pub use sqlite_store::SqliteRecordStore;
pub use stock_lot_repo::StockLotRepository;
pub use transfer_repo::TransferRepository;
