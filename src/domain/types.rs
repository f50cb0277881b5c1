// ==========================================
// 拉丝/桁架生产线 - 领域类型定义
// ==========================================
// 职责: 机组、物料、批次状态、订单状态等枚举
// 红线: 状态一律使用枚举,禁止字符串散落各处
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 机组类型 (Machine Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineType {
    WireDraw, // 拉丝机 (Trefila)
    Truss,    // 桁架焊接机 (Treliça)
}

impl fmt::Display for MachineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineType::WireDraw => write!(f, "WIRE_DRAW"),
            MachineType::Truss => write!(f, "TRUSS"),
        }
    }
}

// ==========================================
// 物料类型 (Material Type)
// ==========================================
// WireRod: 盘条原料 (Fio Máquina)
// Ca60: 拉丝后的 CA-60 冷拔丝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialType {
    WireRod,
    Ca60,
}

impl fmt::Display for MaterialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialType::WireRod => write!(f, "WIRE_ROD"),
            MaterialType::Ca60 => write!(f, "CA_60"),
        }
    }
}

// ==========================================
// 批次状态 (Lot Status)
// ==========================================
// 状态迁移规则统一收口在 engine::lot_status,其他模块只读
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotStatus {
    Available,            // 可用
    AvailableSupport,     // 可用 - 桁架余料 (部分消耗后回库)
    InProductionWireDraw, // 生产中 - 拉丝
    InProductionTruss,    // 生产中 - 桁架
    Transferred,          // 已调拨
    Consumed,             // 已耗尽
}

impl LotStatus {
    /// 是否可被调拨/新订单选用
    pub fn is_available(&self) -> bool {
        matches!(self, LotStatus::Available | LotStatus::AvailableSupport)
    }

    /// 桁架消耗排序中的优先状态
    pub fn is_truss_priority(&self) -> bool {
        matches!(self, LotStatus::AvailableSupport | LotStatus::InProductionTruss)
    }

    /// 转换为存储字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            LotStatus::Available => "AVAILABLE",
            LotStatus::AvailableSupport => "AVAILABLE_SUPPORT",
            LotStatus::InProductionWireDraw => "IN_PRODUCTION_WIRE_DRAW",
            LotStatus::InProductionTruss => "IN_PRODUCTION_TRUSS",
            LotStatus::Transferred => "TRANSFERRED",
            LotStatus::Consumed => "CONSUMED",
        }
    }
}

impl fmt::Display for LotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 生产订单状态 (Order Status)
// ==========================================
// 迁移: PENDING -> IN_PROGRESS -> COMPLETED (终态)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
}

impl OrderStatus {
    /// 未完成的订单仍对批次持有占用
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::InProgress)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::InProgress => write!(f, "IN_PROGRESS"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

// ==========================================
// 成品状态 (Finished Goods Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinishedGoodsStatus {
    Available,
    Sold,
    Transferred,
}

// ==========================================
// 成品类型 (Product Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    Truss,       // 标准桁架
    TrussOffcut, // 桁架短料 (Ponta)
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductType::Truss => write!(f, "TRUSS"),
            ProductType::TrussOffcut => write!(f, "TRUSS_OFFCUT"),
        }
    }
}

// ==========================================
// 桁架部件 (Truss Part)
// ==========================================
// 上弦不拆分; 下弦与斜筋各分左右两侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrussPart {
    Top,
    BottomLeft,
    BottomRight,
    DiagonalLeft,
    DiagonalRight,
}

impl TrussPart {
    pub const ALL: [TrussPart; 5] = [
        TrussPart::Top,
        TrussPart::BottomLeft,
        TrussPart::BottomRight,
        TrussPart::DiagonalLeft,
        TrussPart::DiagonalRight,
    ];
}

impl fmt::Display for TrussPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrussPart::Top => write!(f, "TOP"),
            TrussPart::BottomLeft => write!(f, "BOTTOM_LEFT"),
            TrussPart::BottomRight => write!(f, "BOTTOM_RIGHT"),
            TrussPart::DiagonalLeft => write!(f, "DIAGONAL_LEFT"),
            TrussPart::DiagonalRight => write!(f, "DIAGONAL_RIGHT"),
        }
    }
}

// ==========================================
// 停机原因 (Downtime Reason)
// ==========================================
// 系统自动产生的停机原因; 人工录入原因为自由文本
pub mod downtime_reasons {
    /// 订单已开始、尚未开机
    pub const AWAITING_START: &str = "awaiting start";
    /// 换盘/准备 (拉丝两盘之间的空档)
    pub const TOOL_CHANGE_SETUP: &str = "tool change/setup";
}

// ==========================================
// 记录 ID 生成
// ==========================================
/// 带可读前缀的记录 ID, 如 "lot-3f2a..."
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// 各集合的 ID 前缀
pub mod id_prefixes {
    pub const STOCK_LOT: &str = "lot";
    pub const PRODUCTION_ORDER: &str = "po";
    pub const TRANSFER: &str = "transf-mp";
    pub const FINISHED_GOODS_TRANSFER: &str = "transf-pa";
    pub const FINISHED_GOODS: &str = "fg";
    pub const OFFCUT: &str = "ponta";
    pub const SHIFT_REPORT: &str = "shift";
    pub const PENDING_PACKAGE: &str = "pkg";
}
