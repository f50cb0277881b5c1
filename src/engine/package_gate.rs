// ==========================================
// 拉丝/桁架生产线 - 桁架包称重校验
// ==========================================
// 规则: 实称重量偏离理论重量 (单件重量 × 件数) 超过容差时,
//       写入被挂起, 需主管授权后方可生效
// 型号必须可查; 查找由调用方完成
// ==========================================

use crate::config::truss_catalog::TrussModel;

pub use crate::domain::order::{PackageWeightInput, PendingPackageWeight};

/// 默认容差 1%
pub const DEFAULT_PACKAGE_TOLERANCE: f64 = 0.01;

/// 校验结论
#[derive(Debug, Clone, PartialEq)]
pub enum PackageCheck {
    WithinTolerance { expected: f64 },
    OutOfTolerance {
        expected: f64,
        lower_bound: f64,
        upper_bound: f64,
        deviation_pct: f64,
    },
}

// ==========================================
// PackageWeightGate
// ==========================================
pub struct PackageWeightGate {
    tolerance: f64,
}

impl Default for PackageWeightGate {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGE_TOLERANCE)
    }
}

impl PackageWeightGate {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// 理论重量为 0 的型号行无法通过校验, 一律需授权
    pub fn check(&self, model: &TrussModel, quantity: u32, weight: f64) -> PackageCheck {
        let expected = model.theoretical_weight(quantity);
        let lower_bound = expected * (1.0 - self.tolerance);
        let upper_bound = expected * (1.0 + self.tolerance);
        if expected > 0.0 && weight >= lower_bound && weight <= upper_bound {
            return PackageCheck::WithinTolerance { expected };
        }

        let deviation_pct = if expected > 0.0 {
            (weight - expected) / expected * 100.0
        } else {
            100.0
        };
        PackageCheck::OutOfTolerance {
            expected,
            lower_bound,
            upper_bound,
            deviation_pct,
        }
    }
}
