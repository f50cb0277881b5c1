// ==========================================
// 拉丝/桁架生产线 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod finished_goods;
pub mod lot;
pub mod order;
pub mod shift_report;
pub mod transfer;
pub mod types;

// 重导出核心类型
pub use finished_goods::FinishedGoodsItem;
pub use lot::{history_types, HistoryEvent, MaterialReceipt, ReceivedLot, StockLot};
pub use order::{
    ActiveLotProcessing, CompletionData, DowntimeEvent, LotSelection, NewProductionOrder, Offcut,
    OperatorLog, PackageWeightInput, PendingPackageWeight, PostProductionActivity, ProcessedLot,
    ProductionOrder, RawTrussSelection, SelectedLotIdsInput, SelectionError, TrussLotSelection,
    WeighedPackage,
};
pub use shift_report::ShiftReport;
pub use transfer::{
    FinishedGoodsTransferLine, FinishedGoodsTransferRecord, TransferRecord, TransferRequest,
    TransferredFinishedGood, TransferredLot,
};
pub use types::{
    downtime_reasons, id_prefixes, new_id, FinishedGoodsStatus, LotStatus, MachineType, MaterialType, OrderStatus,
    ProductType, TrussPart,
};
