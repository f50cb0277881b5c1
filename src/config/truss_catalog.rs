// ==========================================
// 拉丝/桁架生产线 - 桁架型号目录
// ==========================================
// 职责: 型号 + 长度 -> 各部件线径与单件理论重量
// 存储: 内置目录; config_kv.truss_models 可整表覆盖
// ==========================================

use crate::engine::ledger::parse_decimal;
use serde::{Deserialize, Serialize};

// ==========================================
// TrussModel - 桁架型号
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrussModel {
    pub code: String,
    pub model: String,
    pub size: String,            // 长度 (m)
    pub top_gauge: String,       // 上弦线径
    pub bottom_gauge: String,    // 下弦线径
    pub diagonal_gauge: String,  // 斜筋线径
    pub unit_weight: f64,        // 单件成品重量 (kg)
    pub top_weight: f64,         // 单件上弦重量 (kg)
    pub diagonal_weight: f64,    // 单件斜筋重量 (两侧合计, kg)
    pub bottom_weight: f64,      // 单件下弦重量 (两侧合计, kg)
}

impl TrussModel {
    /// 指定件数的理论重量
    pub fn theoretical_weight(&self, pieces: u32) -> f64 {
        self.unit_weight * pieces as f64
    }

    /// 每米重量
    pub fn weight_per_meter(&self) -> Option<f64> {
        let size = parse_decimal(&self.size)?;
        if size > 0.0 {
            Some(self.unit_weight / size)
        } else {
            None
        }
    }

    /// 短料重量 = 每米重量 × 长度 × 件数
    pub fn offcut_weight(&self, size_m: f64, quantity: u32) -> f64 {
        if size_m <= 0.0 {
            return 0.0;
        }
        self.weight_per_meter()
            .map(|w| w * size_m * quantity as f64)
            .unwrap_or(0.0)
    }
}

// ==========================================
// TrussModelCatalog - 型号目录
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct TrussModelCatalog {
    models: Vec<TrussModel>,
}

impl TrussModelCatalog {
    pub fn new(models: Vec<TrussModel>) -> Self {
        Self { models }
    }

    /// 内置型号表
    pub fn builtin() -> Self {
        #[rustfmt::skip]
        let rows: [(&str, &str, &str, &str, &str, &str, f64, f64, f64, f64); 17] = [
            ("H6LE12S", "H-6 LEVE (ESPAÇADOR)", "12", "5.4", "3.2", "3.2", 5.502, 2.158, 1.828, 1.517),
            ("H6_12",   "H-6",                  "12", "5.6", "3.8", "3.2", 6.288, 2.322, 1.828, 2.138),
            ("H8L6",    "H-8 LEVE",             "6",  "5.6", "3.2", "3.2", 2.898, 1.161, 0.979, 0.758),
            ("H8L12",   "H-8 LEVE",             "12", "5.6", "3.2", "3.2", 5.797, 2.322, 1.958, 1.517),
            ("H8M6",    "H-8 MÉDIA",            "6",  "5.6", "3.8", "3.2", 3.209, 1.161, 0.979, 1.069),
            ("H8M12",   "H-8 MÉDIA",            "12", "5.6", "3.8", "3.2", 6.418, 2.322, 1.958, 2.138),
            ("H8P6",    "H-8 PESADA",           "6",  "6",   "3.8", "4.2", 4.087, 1.333, 1.685, 1.069),
            ("H8P12",   "H-8 PESADA",           "12", "6",   "3.8", "4.2", 8.174, 2.665, 3.371, 2.138),
            ("H10L6",   "H-10 LEVE",            "6",  "5.8", "3.8", "3.8", 3.843, 1.246, 1.528, 1.069),
            ("H10L12",  "H-10 LEVE",            "12", "5.8", "3.8", "3.8", 7.686, 2.491, 3.057, 2.138),
            ("H10P12",  "H-10 PESADA",          "12", "6",   "4.2", "4.2", 9.057, 2.665, 3.780, 2.611),
            ("H12L6",   "H-12 LEVE",            "6",  "5.8", "3.2", "3.8", 3.522, 1.246, 1.207, 1.069),
            ("H12L12",  "H-12 LEVE",            "12", "5.8", "3.2", "3.8", 7.044, 2.491, 2.414, 2.138),
            ("H12P6",   "H-12 PESADA",          "6",  "6",   "5",   "4.2", 5.270, 1.333, 2.086, 1.852),
            ("H12P12",  "H-12 PESADA",          "12", "6",   "5",   "4.2", 10.540, 2.665, 4.172, 3.703),
            ("H16_12",  "H-16",                 "12", "6",   "5",   "4.2", 11.263, 2.665, 4.894, 3.703),
            ("H25_12",  "H-25",                 "12", "8",   "6",   "5",   20.042, 4.739, 9.973, 5.330),
        ];

        let models = rows
            .iter()
            .map(
                |&(code, model, size, top, bottom, diagonal, unit, top_w, diag_w, bottom_w)| {
                    TrussModel {
                        code: code.to_string(),
                        model: model.to_string(),
                        size: size.to_string(),
                        top_gauge: top.to_string(),
                        bottom_gauge: bottom.to_string(),
                        diagonal_gauge: diagonal.to_string(),
                        unit_weight: unit,
                        top_weight: top_w,
                        diagonal_weight: diag_w,
                        bottom_weight: bottom_w,
                    }
                },
            )
            .collect();

        Self { models }
    }

    /// 按型号 + 长度查找
    ///
    /// 型号忽略首尾空白与大小写, 长度忽略首尾空白 (数值等价亦可)
    pub fn find(&self, model: &str, size: &str) -> Option<&TrussModel> {
        let model = model.trim().to_lowercase();
        let size = size.trim();
        self.models.iter().find(|m| {
            m.model.trim().to_lowercase() == model && sizes_match(m.size.trim(), size)
        })
    }

    pub fn models(&self) -> &[TrussModel] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for TrussModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn sizes_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (parse_decimal(a), parse_decimal(b)) {
        (Some(x), Some(y)) => (x - y).abs() < 1e-9,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup_is_case_insensitive() {
        let catalog = TrussModelCatalog::builtin();

        let model = catalog.find("  h-8 pesada ", "12").unwrap();
        assert_eq!(model.code, "H8P12");
        assert_eq!(model.top_weight, 2.665);
        assert_eq!(model.bottom_weight, 2.138);

        assert_eq!(catalog.find("H-8 PESADA", "12.0").unwrap().code, "H8P12");
        assert!(catalog.find("H-8 PESADA", "8").is_none());
        assert!(catalog.find("H-99", "12").is_none());
    }

    #[test]
    fn test_offcut_weight_by_length() {
        let catalog = TrussModelCatalog::builtin();
        let model = catalog.find("H-8 LEVE", "6").unwrap();

        // 2.898 kg / 6 m = 0.483 kg/m; 3 件 × 2 m
        let w = model.offcut_weight(2.0, 3);
        assert!((w - 2.898).abs() < 1e-9);
        assert_eq!(model.offcut_weight(0.0, 3), 0.0);
    }
}
