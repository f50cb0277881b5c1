// ==========================================
// 拉丝/桁架生产线 - 批次状态规则
// ==========================================
// 职责: 批次状态迁移的唯一出口
// 红线: 其他模块不得直接拼装批次状态
// ==========================================
// 迁移一览:
// - 订单占用:   -> IN_PRODUCTION_WIRE_DRAW / IN_PRODUCTION_TRUSS
// - 订单释放:   无剩余占用 -> AVAILABLE
// - 桁架消耗:   余量 <= 阈值 -> CONSUMED
//               无其他活动订单 -> AVAILABLE_SUPPORT
//               否则 -> IN_PRODUCTION_TRUSS
// - 调拨:       余量 <= 0 -> TRANSFERRED, 否则不变
// - 拉丝转化:   -> AVAILABLE
// ==========================================

use crate::domain::types::{LotStatus, MachineType};

/// 桁架消耗后视为耗尽的残余重量 (kg)
pub const DEFAULT_RESIDUAL_THRESHOLD_KG: f64 = 0.05;

/// 订单占用批次后的状态
pub fn on_claim(machine: MachineType) -> LotStatus {
    match machine {
        MachineType::WireDraw => LotStatus::InProductionWireDraw,
        MachineType::Truss => LotStatus::InProductionTruss,
    }
}

/// 订单释放批次后的状态
///
/// 仍有其他订单占用、或批次已不在生产中时保持原状态
pub fn on_release(current: LotStatus, has_remaining_claims: bool) -> LotStatus {
    let in_production = matches!(
        current,
        LotStatus::InProductionWireDraw | LotStatus::InProductionTruss
    );
    if in_production && !has_remaining_claims {
        LotStatus::Available
    } else {
        current
    }
}

/// 桁架消耗后的状态
pub fn after_truss_consumption(
    remaining: f64,
    residual_threshold: f64,
    has_other_active_orders: bool,
) -> LotStatus {
    if remaining <= residual_threshold {
        LotStatus::Consumed
    } else if has_other_active_orders {
        LotStatus::InProductionTruss
    } else {
        LotStatus::AvailableSupport
    }
}

/// 调拨扣减后的状态
pub fn after_transfer(current: LotStatus, remaining: f64) -> LotStatus {
    if remaining <= 0.0 {
        LotStatus::Transferred
    } else {
        current
    }
}

/// 拉丝转化后的状态
pub fn after_transformation() -> LotStatus {
    LotStatus::Available
}
