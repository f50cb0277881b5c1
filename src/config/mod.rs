// ==========================================
// 拉丝/桁架生产线 - 配置层
// ==========================================
// 职责: 系统配置管理 + 桁架型号目录
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod production_config_trait;
pub mod truss_catalog;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use production_config_trait::{ProductionConfigReader, ProductionSettings};
pub use truss_catalog::{TrussModel, TrussModelCatalog};
