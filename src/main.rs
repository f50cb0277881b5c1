// ==========================================
// 拉丝/桁架生产线 - 命令行入口
// ==========================================
// 用法: wire-truss-ledger [数据库路径]
// 启动: 初始化日志 -> 打开数据库并建表 -> 输出库存汇总
// ==========================================

use wire_truss_ledger::app::{get_default_db_path, AppState};
use wire_truss_ledger::{logging, APP_NAME, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", APP_NAME);
    tracing::info!("系统版本: {}", VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path).await.map_err(anyhow::Error::msg)?;

    let summary = state.stock_api.stock_summary().await?;
    if summary.is_empty() {
        tracing::info!("当前无可用库存");
    }
    for row in &summary {
        tracing::info!(
            material_type = %row.material_type,
            gauge = %row.gauge,
            lot_count = row.lot_count,
            total_remaining = row.total_remaining,
            "可用库存"
        );
    }

    let orders = state.production_api.list_orders().await?;
    let active = orders.iter().filter(|o| o.status.is_active()).count();
    tracing::info!(total = orders.len(), active, "生产订单");

    Ok(())
}
