// ==========================================
// 拉丝/桁架生产线 - 班次报表仓储
// ==========================================
// 对齐: shift_reports 集合
// ==========================================

use crate::domain::shift_report::ShiftReport;
use crate::repository::document::{load_all, to_document};
use crate::repository::error::RepositoryResult;
use crate::repository::record_store::{Collection, RecordStore};
use std::sync::Arc;

pub struct ShiftReportRepository {
    store: Arc<dyn RecordStore>,
}

impl ShiftReportRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> RepositoryResult<Vec<ShiftReport>> {
        load_all(self.store.as_ref(), Collection::ShiftReports).await
    }

    /// 某订单的全部班次报表
    pub async fn list_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ShiftReport>> {
        let mut reports = self.list_all().await?;
        reports.retain(|r| r.production_order_id == order_id);
        Ok(reports)
    }

    pub async fn insert(&self, report: &ShiftReport) -> RepositoryResult<()> {
        self.store
            .insert(Collection::ShiftReports, to_document(report)?)
            .await
    }
}
