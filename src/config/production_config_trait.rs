// ==========================================
// 拉丝/桁架生产线 - 生产配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::truss_catalog::TrussModelCatalog;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ProductionSettings - 引擎参数快照
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionSettings {
    /// 余量阈值 (kg): 剩余重量不超过该值视为耗尽
    pub residual_threshold_kg: f64,
    /// 包称重容差 (比例, 0.01 = 1%)
    pub package_tolerance: f64,
    /// 钢材密度 (kg/m³)
    pub steel_density: f64,
    pub truss_catalog: TrussModelCatalog,
}

impl Default for ProductionSettings {
    fn default() -> Self {
        Self {
            residual_threshold_kg: crate::engine::lot_status::DEFAULT_RESIDUAL_THRESHOLD_KG,
            package_tolerance: crate::engine::package_gate::DEFAULT_PACKAGE_TOLERANCE,
            steel_density: crate::engine::shift_report::DEFAULT_STEEL_DENSITY,
            truss_catalog: TrussModelCatalog::builtin(),
        }
    }
}

// ==========================================
// ProductionConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ProductionConfigReader: Send + Sync {
    /// 余量阈值 (kg)
    ///
    /// # 默认值
    /// - 0.05
    async fn get_residual_threshold_kg(&self) -> Result<f64, Box<dyn Error>>;

    /// 包称重容差
    ///
    /// # 默认值
    /// - 0.01
    async fn get_package_tolerance(&self) -> Result<f64, Box<dyn Error>>;

    /// 钢材密度 (kg/m³)
    ///
    /// # 默认值
    /// - 7850
    async fn get_steel_density(&self) -> Result<f64, Box<dyn Error>>;

    /// 桁架型号目录
    ///
    /// # 说明
    /// config_kv.truss_models 为 JSON 数组时整表覆盖, 否则使用内置目录
    async fn get_truss_catalog(&self) -> Result<TrussModelCatalog, Box<dyn Error>>;

    /// 一次性读取全部引擎参数
    async fn load_settings(&self) -> Result<ProductionSettings, Box<dyn Error>> {
        let residual_threshold_kg = self.get_residual_threshold_kg().await?;
        let package_tolerance = self.get_package_tolerance().await?;
        let steel_density = self.get_steel_density().await?;
        let truss_catalog = self.get_truss_catalog().await?;
        Ok(ProductionSettings {
            residual_threshold_kg,
            package_tolerance,
            steel_density,
            truss_catalog,
        })
    }
}
