// ==========================================
// 拉丝/桁架生产线 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: Engine 只操作内存快照, 持久化由 API 层统一提交
// ==========================================

pub mod allocator;
pub mod ledger;
pub mod lot_status;
pub mod package_gate;
pub mod production;
pub mod shift_report;
pub mod transfer_planner;

#[cfg(test)]
mod tests;

// 重导出核心引擎
pub use allocator::{
    active_order_ids, natural_cmp, AllocationError, ConsumptionAllocator, LotOutcome,
    PartConsumption, TrussAllocation, WireDrawOutcome,
};
pub use ledger::{LedgerBatch, LedgerError, LotWrite, StockLedger};
pub use package_gate::{PackageCheck, PackageWeightGate, PackageWeightInput, PendingPackageWeight};
pub use production::{
    CompletionOutcome, CompletionReport, ProductionError, ProductionOrderMachine, StartOutcome,
};
pub use shift_report::ShiftReportGenerator;
pub use transfer_planner::{
    transfer_finished_goods, PlanningError, ProposedLot, RequestProposal, RoundingPolicy,
    TransferPlan, TransferPlanner,
};
