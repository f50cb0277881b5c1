// ==========================================
// 拉丝/桁架生产线 - API 层
// ==========================================
// 职责: 命令入口; 读取快照, 调用引擎, 逐条写回并通知用户
// ==========================================

pub mod authorization;
mod commit;
pub mod error;
pub mod finished_goods_api;
pub mod notification;
pub mod production_api;
pub mod stock_api;
pub mod transfer_api;

// 重导出核心类型
pub use authorization::{ManagerAuthorizer, StaticCredentialAuthorizer};
pub use error::{ApiError, ApiResult};
pub use finished_goods_api::FinishedGoodsApi;
pub use notification::{MemoryNotifier, Notifier, Severity, TracingNotifier};
pub use production_api::{PackageWeightOutcome, ProductionApi};
pub use stock_api::{StockApi, StockSummary};
pub use transfer_api::TransferApi;
