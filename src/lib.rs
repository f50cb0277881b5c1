// ==========================================
// 拉丝/桁架生产线 - 核心库
// ==========================================
// 范围: 原料批次台账, 生产订单状态机, 消耗分配, FIFO 调拨, 班次报表
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    FinishedGoodsStatus, LotStatus, MachineType, MaterialType, OrderStatus, ProductType,
    TrussPart,
};

// 领域实体
pub use domain::finished_goods::FinishedGoodsItem;
pub use domain::lot::{MaterialReceipt, ReceivedLot, StockLot};
pub use domain::order::{CompletionData, NewProductionOrder, ProductionOrder};
pub use domain::shift_report::ShiftReport;
pub use domain::transfer::{FinishedGoodsTransferRecord, TransferRecord, TransferRequest};

// 引擎
pub use engine::allocator::ConsumptionAllocator;
pub use engine::ledger::StockLedger;
pub use engine::production::ProductionOrderMachine;
pub use engine::shift_report::ShiftReportGenerator;
pub use engine::transfer_planner::TransferPlanner;

// API
pub use api::{FinishedGoodsApi, ProductionApi, StockApi, TransferApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "拉丝/桁架生产线台账";
