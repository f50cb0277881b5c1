// ==========================================
// 完工写入顺序测试
// ==========================================
// 测试范围:
// 1. 订单写入失败时不扣减库存, 不生成成品
// 2. 失败后重试只扣减一次
// ==========================================

mod test_helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use test_helpers::*;
use wire_truss_ledger::api::{
    ApiError, MemoryNotifier, ProductionApi, Severity, StaticCredentialAuthorizer,
};
use wire_truss_ledger::config::ProductionSettings;
use wire_truss_ledger::engine::production::CompletionOutcome;
use wire_truss_ledger::repository::{
    Collection, FinishedGoodsRepository, ProductionOrderRepository, RecordStore,
    RepositoryError, RepositoryResult, ShiftReportRepository, SqliteRecordStore,
    StockLotRepository,
};
use wire_truss_ledger::{CompletionData, LotStatus, OrderStatus};

/// 前 N 次生产订单更新失败的存储
struct FailingOrderUpdates {
    inner: SqliteRecordStore,
    remaining_failures: AtomicUsize,
}

#[async_trait]
impl RecordStore for FailingOrderUpdates {
    async fn fetch_all(&self, collection: Collection) -> RepositoryResult<Vec<JsonValue>> {
        self.inner.fetch_all(collection).await
    }

    async fn insert(&self, collection: Collection, record: JsonValue) -> RepositoryResult<()> {
        self.inner.insert(collection, record).await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: JsonValue,
    ) -> RepositoryResult<()> {
        if collection == Collection::ProductionOrders
            && self
                .remaining_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(RepositoryError::DatabaseQueryError("disk I/O error".to_string()));
        }
        self.inner.update(collection, id, partial).await
    }

    async fn delete_by_id(&self, collection: Collection, id: &str) -> RepositoryResult<()> {
        self.inner.delete_by_id(collection, id).await
    }

    async fn delete_where(
        &self,
        collection: Collection,
        column: &str,
        value: &JsonValue,
    ) -> RepositoryResult<usize> {
        self.inner.delete_where(collection, column, value).await
    }

    async fn update_where(
        &self,
        collection: Collection,
        column: &str,
        value: &JsonValue,
        partial: JsonValue,
    ) -> RepositoryResult<usize> {
        self.inner.update_where(collection, column, value, partial).await
    }
}

fn production_api_over(store: Arc<dyn RecordStore>, notifier: Arc<MemoryNotifier>) -> ProductionApi {
    ProductionApi::new(
        Arc::new(StockLotRepository::new(store.clone())),
        Arc::new(ProductionOrderRepository::new(store.clone())),
        Arc::new(FinishedGoodsRepository::new(store.clone())),
        Arc::new(ShiftReportRepository::new(store)),
        &ProductionSettings::default(),
        Arc::new(StaticCredentialAuthorizer::new(Some(MANAGER_CREDENTIAL.to_string()))),
        notifier,
    )
}

#[tokio::test]
async fn test_failed_order_write_leaves_stock_untouched_and_retry_deducts_once() {
    let env = create_test_env().await;
    let lots = receive_truss_stock(&env.state).await;
    let order = env
        .state
        .production_api
        .register_order(truss_order("OP-200", 100, &lots))
        .await
        .unwrap();
    env.state
        .production_api
        .start_order(&order.id, "Ana")
        .await
        .unwrap();

    let store: Arc<dyn RecordStore> = Arc::new(FailingOrderUpdates {
        inner: SqliteRecordStore::new(&env.db_path).unwrap(),
        remaining_failures: AtomicUsize::new(1),
    });
    let notifier = Arc::new(MemoryNotifier::new());
    let api = production_api_over(store, notifier.clone());

    let completion = || CompletionData {
        actual_produced_quantity: Some(100),
        ..Default::default()
    };

    // 第一次: 订单写入失败
    let err = api.complete_order(&order.id, completion()).await.unwrap_err();
    assert!(matches!(err, ApiError::DatabaseError(_)), "{:?}", err);
    assert_eq!(notifier.count(Severity::Error), 1);

    let top = find_lot(&env.state, &lot_id(&lots, "T1")).await;
    assert_eq!(top.remaining_quantity, 200.0);
    assert_eq!(top.status, LotStatus::InProductionTruss);
    assert!(env
        .state
        .finished_goods_api
        .list_finished_goods()
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        env.state.production_api.get_order(&order.id).await.unwrap().status,
        OrderStatus::InProgress
    );

    // 重试: 只扣减一次
    let outcome = api.complete_order(&order.id, completion()).await.unwrap();
    assert!(matches!(outcome, CompletionOutcome::Completed(_)));

    let top = find_lot(&env.state, &lot_id(&lots, "T1")).await;
    assert!(approx(top.remaining_quantity, 83.9));
    assert_eq!(
        env.state
            .finished_goods_api
            .list_finished_goods()
            .await
            .unwrap()
            .len(),
        1
    );

    // 再次调用: 已完工, 无写入
    let again = api.complete_order(&order.id, completion()).await.unwrap();
    assert_eq!(again, CompletionOutcome::AlreadyCompleted);
    let top = find_lot(&env.state, &lot_id(&lots, "T1")).await;
    assert!(approx(top.remaining_quantity, 83.9));
}
