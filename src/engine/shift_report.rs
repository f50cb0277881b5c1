// ==========================================
// 拉丝/桁架生产线 - 班次报表生成
// ==========================================
// 窗口: [班次开始, 班次结束)
// 停机按 stop_time 落窗, 已加工批次按 end_time 落窗
// 拉丝米数: 体积 = 重量 / 密度, 长度 = 体积 / (π·r²), r = 线径/2000 (m)
// 废料在本报表中恒为 0
// ==========================================

use crate::domain::order::{OperatorLog, ProductionOrder};
use crate::domain::shift_report::ShiftReport;
use crate::domain::types::{id_prefixes, new_id, MachineType};
use crate::engine::ledger::parse_decimal;
use chrono::{DateTime, Utc};
use std::f64::consts::PI;

/// 钢材密度 (kg/m³)
pub const DEFAULT_STEEL_DENSITY: f64 = 7850.0;

pub struct ShiftReportGenerator {
    steel_density: f64,
}

impl Default for ShiftReportGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_STEEL_DENSITY)
    }
}

impl ShiftReportGenerator {
    pub fn new(steel_density: f64) -> Self {
        Self { steel_density }
    }

    /// 由已关闭的班次生成报表; 班次未关闭返回 None
    pub fn generate(&self, order: &ProductionOrder, log: &OperatorLog) -> Option<ShiftReport> {
        let end = log.end_time?;
        let start = log.start_time;
        let in_window = |t: DateTime<Utc>| t >= start && t < end;

        let downtime_events: Vec<_> = order
            .downtime_events
            .iter()
            .filter(|e| in_window(e.stop_time))
            .cloned()
            .collect();
        let processed_lots: Vec<_> = order
            .processed_lots
            .iter()
            .filter(|p| in_window(p.end_time))
            .cloned()
            .collect();

        let total_produced_weight: f64 =
            processed_lots.iter().filter_map(|p| p.final_weight).sum();
        let total_produced_meters = match order.machine {
            MachineType::WireDraw => {
                self.wire_length_m(total_produced_weight, &order.target_gauge)
            }
            MachineType::Truss => 0.0,
        };
        let total_scrap_weight = 0.0;
        let scrap_percentage = if total_produced_weight > 0.0 {
            total_scrap_weight / (total_produced_weight + total_scrap_weight) * 100.0
        } else {
            0.0
        };

        Some(ShiftReport {
            id: new_id(id_prefixes::SHIFT_REPORT),
            date: end,
            operator: log.operator.clone(),
            machine: order.machine,
            production_order_id: order.id.clone(),
            order_number: order.order_number.clone(),
            target_gauge: order.target_gauge.clone(),
            truss_model: order.truss_model.clone(),
            truss_size: order.truss_size.clone(),
            quantity_to_produce: order.quantity_to_produce,
            shift_start: start,
            shift_end: end,
            processed_lots,
            downtime_events,
            total_produced_weight,
            total_produced_meters,
            total_scrap_weight,
            scrap_percentage,
        })
    }

    /// 线材长度 (m); 线径无法解析时为 0
    pub fn wire_length_m(&self, weight_kg: f64, gauge_mm: &str) -> f64 {
        let Some(gauge) = parse_decimal(gauge_mm).filter(|g| *g > 0.0) else {
            return 0.0;
        };
        let radius_m = gauge / 1000.0 / 2.0;
        let area_m2 = PI * radius_m * radius_m;
        let volume_m3 = weight_kg / self.steel_density;
        volume_m3 / area_m2
    }
}
