// ==========================================
// 拉丝/桁架生产线 - 生产订单领域模型
// ==========================================
// 状态机: PENDING -> IN_PROGRESS -> COMPLETED
// 红线: 同一时刻最多一个未关闭停机事件;
//       每名操作工最多一条未关闭班次记录;
//       拉丝机同一时刻最多一个在制批次
// 对齐: production_orders 集合
// ==========================================

use crate::domain::types::{MachineType, OrderStatus, TrussPart};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

// ==========================================
// ProductionOrder - 生产订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    // ===== 主键 =====
    pub id: String,
    pub order_number: String,

    // ===== 工艺信息 =====
    pub machine: MachineType,
    pub target_gauge: String,            // 目标线径
    pub truss_model: Option<String>,     // 桁架型号 (仅桁架)
    pub truss_size: Option<String>,      // 桁架长度 (m, 仅桁架)
    pub quantity_to_produce: Option<u32>,
    pub selected_lots: LotSelection,
    pub total_weight: f64,               // 计划投入原料重量
    pub planned_output_weight: Option<f64>,

    // ===== 生命周期 =====
    pub status: OrderStatus,
    pub creation_date: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    // ===== 过程记录 =====
    #[serde(default)]
    pub downtime_events: Vec<DowntimeEvent>,
    #[serde(default)]
    pub operator_logs: Vec<OperatorLog>,
    #[serde(default)]
    pub processed_lots: Vec<ProcessedLot>,
    #[serde(default)]
    pub active_lot_processing: Option<ActiveLotProcessing>,
    #[serde(default)]
    pub weighed_packages: Vec<WeighedPackage>,
    #[serde(default)]
    pub pending_package_weights: Vec<PendingPackageWeight>, // 超差待授权
    #[serde(default)]
    pub offcuts: Vec<Offcut>,

    // ===== 产出 =====
    pub actual_produced_weight: Option<f64>,
    pub actual_produced_quantity: Option<u32>,
    pub scrap_weight: Option<f64>,
}

impl ProductionOrder {
    /// 最近一个未关闭的停机事件
    pub fn open_downtime(&self) -> Option<&DowntimeEvent> {
        self.downtime_events.iter().rev().find(|e| e.resume_time.is_none())
    }

    /// 指定操作工的未关闭班次
    pub fn open_log_for(&self, operator: &str) -> Option<&OperatorLog> {
        self.operator_logs
            .iter()
            .rev()
            .find(|log| log.operator == operator && log.end_time.is_none())
    }

    /// 当前在制批次 (拉丝)
    pub fn active_lot_id(&self) -> Option<&str> {
        self.active_lot_processing.as_ref().map(|a| a.lot_id.as_str())
    }
}

// ==========================================
// LotSelection - 订单选用批次
// ==========================================
// 入口处一次性归一化, 下游不再判断形态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotSelection {
    WireDraw { lot_ids: Vec<String> },
    Truss(TrussLotSelection),
}

impl LotSelection {
    pub fn machine(&self) -> MachineType {
        match self {
            LotSelection::WireDraw { .. } => MachineType::WireDraw,
            LotSelection::Truss(_) => MachineType::Truss,
        }
    }

    /// 订单涉及的全部批次 (去重, 保持首次出现顺序)
    pub fn all_lot_ids(&self) -> Vec<String> {
        match self {
            LotSelection::WireDraw { lot_ids } => dedup_preserving_order(lot_ids.iter()),
            LotSelection::Truss(parts) => parts.all_lot_ids(),
        }
    }

    pub fn contains(&self, lot_id: &str) -> bool {
        self.all_lot_ids().iter().any(|id| id == lot_id)
    }

    /// 按机组归一化原始选择
    ///
    /// - 拉丝: 只接受平铺列表
    /// - 桁架: 接受结构化对象 (列表字段优先, 缺省回退到旧版单值字段),
    ///   或旧版按位置排列的平铺数组 [上, 下左, 下右, 斜左, 斜右]
    pub fn resolve(
        machine: MachineType,
        input: SelectedLotIdsInput,
    ) -> Result<LotSelection, SelectionError> {
        match (machine, input) {
            (MachineType::WireDraw, SelectedLotIdsInput::Flat(ids)) => {
                let ids = clean_ids(ids);
                if ids.is_empty() {
                    return Err(SelectionError::Empty);
                }
                let mut seen = HashSet::new();
                for id in &ids {
                    if !seen.insert(id.as_str()) {
                        return Err(SelectionError::DuplicateLot {
                            lot_id: id.clone(),
                        });
                    }
                }
                Ok(LotSelection::WireDraw { lot_ids: ids })
            }
            (MachineType::WireDraw, SelectedLotIdsInput::Structured(_)) => {
                Err(SelectionError::ShapeMismatch {
                    machine,
                    reason: "拉丝订单只接受平铺批次列表".to_string(),
                })
            }
            (MachineType::Truss, SelectedLotIdsInput::Flat(ids)) => {
                let pick = |i: usize| -> Vec<String> {
                    ids.get(i)
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .into_iter()
                        .collect()
                };
                let selection = TrussLotSelection {
                    top: pick(0),
                    bottom_left: pick(1),
                    bottom_right: pick(2),
                    diagonal_left: pick(3),
                    diagonal_right: pick(4),
                };
                selection.validate()?;
                Ok(LotSelection::Truss(selection))
            }
            (MachineType::Truss, SelectedLotIdsInput::Structured(raw)) => {
                let selection = raw.normalize();
                selection.validate()?;
                Ok(LotSelection::Truss(selection))
            }
        }
    }
}

// ==========================================
// TrussLotSelection - 桁架五部件选批
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrussLotSelection {
    pub top: Vec<String>,
    pub bottom_left: Vec<String>,
    pub bottom_right: Vec<String>,
    pub diagonal_left: Vec<String>,
    pub diagonal_right: Vec<String>,
}

impl TrussLotSelection {
    pub fn part(&self, part: TrussPart) -> &[String] {
        match part {
            TrussPart::Top => &self.top,
            TrussPart::BottomLeft => &self.bottom_left,
            TrussPart::BottomRight => &self.bottom_right,
            TrussPart::DiagonalLeft => &self.diagonal_left,
            TrussPart::DiagonalRight => &self.diagonal_right,
        }
    }

    pub fn all_lot_ids(&self) -> Vec<String> {
        dedup_preserving_order(TrussPart::ALL.iter().flat_map(|p| self.part(*p).iter()))
    }

    /// 每个部件至少一个批次, 且同一批次不能承担两个部件
    fn validate(&self) -> Result<(), SelectionError> {
        let mut owner: std::collections::HashMap<&str, TrussPart> = Default::default();
        for part in TrussPart::ALL {
            let ids = self.part(part);
            if ids.is_empty() {
                return Err(SelectionError::MissingPart { part });
            }
            for id in ids {
                match owner.get(id.as_str()) {
                    Some(existing) if *existing != part => {
                        return Err(SelectionError::DuplicateLot { lot_id: id.clone() });
                    }
                    _ => {
                        owner.insert(id.as_str(), part);
                    }
                }
            }
        }
        Ok(())
    }
}

// ==========================================
// 原始选择 (入参 / 旧数据)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectedLotIdsInput {
    Flat(Vec<String>),
    Structured(RawTrussSelection),
}

/// 桁架原始选择: 分侧列表字段 + 合并列表字段 + 旧版单值字段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTrussSelection {
    // 旧版单值字段
    #[serde(default, alias = "superior")]
    pub top: Option<String>,
    #[serde(default, alias = "inferior1")]
    pub bottom_1: Option<String>,
    #[serde(default, alias = "inferior2")]
    pub bottom_2: Option<String>,
    #[serde(default, alias = "senozoide1")]
    pub diagonal_1: Option<String>,
    #[serde(default, alias = "senozoide2")]
    pub diagonal_2: Option<String>,

    // 新版列表字段
    #[serde(default, alias = "allSuperior")]
    pub all_top: Vec<String>,
    #[serde(default, alias = "allInferiorLeft")]
    pub all_bottom_left: Vec<String>,
    #[serde(default, alias = "allInferiorRight")]
    pub all_bottom_right: Vec<String>,
    #[serde(default, alias = "allSenozoideLeft")]
    pub all_diagonal_left: Vec<String>,
    #[serde(default, alias = "allSenozoideRight")]
    pub all_diagonal_right: Vec<String>,

    // 合并列表字段: 偶数位为左侧, 奇数位为右侧
    #[serde(default, alias = "allInferior")]
    pub all_bottom: Vec<String>,
    #[serde(default, alias = "allSenozoide")]
    pub all_diagonal: Vec<String>,
}

impl RawTrussSelection {
    /// 取值顺序: 分侧列表 -> 合并列表 -> 单值字段
    pub fn normalize(self) -> TrussLotSelection {
        fn pick(lists: [Vec<String>; 2], single: Option<String>) -> Vec<String> {
            for list in lists {
                let list = dedup_preserving_order(clean_ids(list).iter());
                if !list.is_empty() {
                    return list;
                }
            }
            clean_ids(single.into_iter().collect())
        }

        let (bottom_left, bottom_right) = split_sides(self.all_bottom);
        let (diagonal_left, diagonal_right) = split_sides(self.all_diagonal);

        TrussLotSelection {
            top: pick([self.all_top, vec![]], self.top),
            bottom_left: pick([self.all_bottom_left, bottom_left], self.bottom_1),
            bottom_right: pick([self.all_bottom_right, bottom_right], self.bottom_2),
            diagonal_left: pick([self.all_diagonal_left, diagonal_left], self.diagonal_1),
            diagonal_right: pick([self.all_diagonal_right, diagonal_right], self.diagonal_2),
        }
    }
}

fn split_sides(ids: Vec<String>) -> (Vec<String>, Vec<String>) {
    let (left, right): (Vec<_>, Vec<_>) = clean_ids(ids)
        .into_iter()
        .enumerate()
        .partition(|(i, _)| i % 2 == 0);
    (
        left.into_iter().map(|(_, id)| id).collect(),
        right.into_iter().map(|(_, id)| id).collect(),
    )
}

fn clean_ids(ids: Vec<String>) -> Vec<String> {
    ids.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn dedup_preserving_order<'a>(ids: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// 选批归一化错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("未选择任何批次")]
    Empty,

    #[error("桁架部件未选择批次: {part}")]
    MissingPart { part: TrussPart },

    #[error("批次被重复选用: {lot_id}")]
    DuplicateLot { lot_id: String },

    #[error("选批形态与机组不符 (machine={machine}): {reason}")]
    ShapeMismatch { machine: MachineType, reason: String },
}

// ==========================================
// 过程记录
// ==========================================

/// 停机事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowntimeEvent {
    pub stop_time: DateTime<Utc>,
    pub resume_time: Option<DateTime<Utc>>,
    pub reason: String,
}

/// 操作工班次记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorLog {
    pub operator: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub post_production_activities: Vec<PostProductionActivity>,
}

/// 订单完工后、班次结束前的辅助作业
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostProductionActivity {
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

/// 拉丝已加工批次 (final_weight 待称重后补录)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedLot {
    pub lot_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub final_weight: Option<f64>,
    pub measured_gauge: Option<f64>, // 实测线径 (mm)
}

/// 拉丝在制批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLotProcessing {
    pub lot_id: String,
    pub start_time: DateTime<Utc>,
}

/// 桁架称重包
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighedPackage {
    pub package_number: u32,
    pub quantity: u32,
    pub weight: f64,
    pub timestamp: DateTime<Utc>,
}

/// 包称重入参
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageWeightInput {
    pub package_number: u32,
    pub quantity: u32,
    pub weight: f64,
}

/// 超差挂起的包称重 (待主管授权)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPackageWeight {
    pub id: String,
    pub order_id: String,
    pub package: PackageWeightInput,
    pub expected_weight: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub requested_at: DateTime<Utc>,
}

/// 桁架短料 (Ponta)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offcut {
    pub quantity: u32,
    pub size: f64,         // 长度 (m)
    pub total_weight: f64, // 总重 (kg)
}

// ==========================================
// 命令入参
// ==========================================

/// 新建生产订单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProductionOrder {
    pub order_number: String,
    pub machine: MachineType,
    pub target_gauge: String,
    pub truss_model: Option<String>,
    pub truss_size: Option<String>,
    pub quantity_to_produce: Option<u32>,
    pub selected_lot_ids: SelectedLotIdsInput,
    pub planned_output_weight: Option<f64>,
}

/// 完工数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionData {
    pub actual_produced_quantity: Option<u32>,
    pub scrap_weight: Option<f64>,
    #[serde(default)]
    pub offcuts: Vec<Offcut>,
}
