// ==========================================
// 拉丝/桁架生产线 - 应用层
// ==========================================
// 职责: 装配数据库, 配置, 仓储与 API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
