// ==========================================
// 引擎层场景测试: 订单状态机 + 消耗分配
// ==========================================

use super::allocator::{active_order_ids, natural_cmp, AllocationError, ConsumptionAllocator};
use super::ledger::StockLedger;
use super::package_gate::{PackageWeightInput, PendingPackageWeight};
use super::production::{CompletionOutcome, ProductionError, ProductionOrderMachine};
use crate::config::truss_catalog::TrussModelCatalog;
use crate::domain::lot::{history_types, StockLot};
use crate::domain::order::{
    CompletionData, DowntimeEvent, LotSelection, NewProductionOrder, Offcut, OperatorLog,
    ProcessedLot, ProductionOrder, SelectedLotIdsInput, SelectionError, TrussLotSelection,
};
use crate::domain::types::{
    downtime_reasons, LotStatus, MachineType, MaterialType, OrderStatus, ProductType,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashSet;

// ==========================================
// 测试辅助函数
// ==========================================

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, h, m, 0).unwrap()
}

fn create_test_lot(
    id: &str,
    material: MaterialType,
    remaining: f64,
    status: LotStatus,
    claims: &[&str],
) -> StockLot {
    StockLot {
        id: id.to_string(),
        entry_date: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        supplier: "ArcelorMittal".to_string(),
        invoice_number: "NF-2001".to_string(),
        conference_number: "CONF-7".to_string(),
        internal_lot: id.to_uppercase(),
        supplier_lot: "SUP-1".to_string(),
        run_number: "RUN-1".to_string(),
        material_type: material,
        gauge: "4.20".to_string(),
        label_weight: remaining,
        initial_quantity: remaining,
        remaining_quantity: remaining,
        status,
        production_order_ids: claims.iter().map(|s| s.to_string()).collect(),
        history: vec![],
    }
}

fn ca60(id: &str, remaining: f64) -> StockLot {
    create_test_lot(id, MaterialType::Ca60, remaining, LotStatus::InProductionTruss, &["po-t"])
}

fn selection(
    top: &[&str],
    bottom_left: &[&str],
    bottom_right: &[&str],
    diagonal_left: &[&str],
    diagonal_right: &[&str],
) -> TrussLotSelection {
    let v = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    TrussLotSelection {
        top: v(top),
        bottom_left: v(bottom_left),
        bottom_right: v(bottom_right),
        diagonal_left: v(diagonal_left),
        diagonal_right: v(diagonal_right),
    }
}

fn create_test_order(id: &str, machine: MachineType, lots: LotSelection) -> ProductionOrder {
    ProductionOrder {
        id: id.to_string(),
        order_number: format!("OP-{}", id),
        machine,
        target_gauge: "4.20".to_string(),
        truss_model: None,
        truss_size: None,
        quantity_to_produce: None,
        selected_lots: lots,
        total_weight: 0.0,
        planned_output_weight: None,
        status: OrderStatus::InProgress,
        creation_date: at(6, 0),
        start_time: Some(at(6, 0)),
        end_time: None,
        downtime_events: vec![],
        operator_logs: vec![],
        processed_lots: vec![],
        active_lot_processing: None,
        weighed_packages: vec![],
        pending_package_weights: vec![],
        offcuts: vec![],
        actual_produced_weight: None,
        actual_produced_quantity: None,
        scrap_weight: None,
    }
}

/// H-8 PESADA 12m: 上弦 2.665, 斜筋 3.371, 下弦 2.138 (kg/件)
fn truss_order(lots: TrussLotSelection) -> ProductionOrder {
    let mut order = create_test_order("po-t", MachineType::Truss, LotSelection::Truss(lots));
    order.truss_model = Some("H-8 PESADA".to_string());
    order.truss_size = Some("12".to_string());
    order.quantity_to_produce = Some(100);
    order
}

fn machine() -> ProductionOrderMachine {
    ProductionOrderMachine::new(ConsumptionAllocator::default(), TrussModelCatalog::builtin())
}

fn pieces(n: u32) -> CompletionData {
    CompletionData {
        actual_produced_quantity: Some(n),
        scrap_weight: None,
        offcuts: vec![],
    }
}

fn active(orders: &[&ProductionOrder]) -> HashSet<String> {
    orders
        .iter()
        .filter(|o| o.status.is_active())
        .map(|o| o.id.clone())
        .collect()
}

// ==========================================
// 桁架完工扣减
// ==========================================

// 场景1: 100 件 × 上弦 2.665 = 266.5 kg, 上弦批次 300 kg -> 余 33.5 kg 回库为余料
#[test]
fn test_truss_top_consumption_example() {
    let mut ledger = StockLedger::from_snapshot(vec![
        ca60("t1", 300.0),
        ca60("bl", 500.0),
        ca60("br", 500.0),
        ca60("dl", 500.0),
        ca60("dr", 500.0),
    ]);
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let active_ids = active(&[&order]);

    let outcome = machine()
        .complete(&mut ledger, &mut order, &active_ids, pieces(100), at(16, 0))
        .unwrap();
    assert!(matches!(outcome, CompletionOutcome::Completed(_)));

    let top = ledger.get("t1").unwrap();
    assert!((top.remaining_quantity - 33.5).abs() < 1e-9);
    assert_eq!(top.status, LotStatus::AvailableSupport);
    assert!(top.production_order_ids.is_empty());
    assert_eq!(
        top.history.last().unwrap().event_type,
        history_types::TRUSS_CONSUMPTION
    );

    // 下弦 213.8 平分两侧
    let bl = ledger.get("bl").unwrap();
    assert!((bl.remaining_quantity - (500.0 - 106.9)).abs() < 0.01);
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.end_time, Some(at(16, 0)));
}

// 场景2: 五个部件目标恰好等于可用重量 -> 全部耗尽
#[test]
fn test_truss_exact_match_consumes_everything() {
    let mut ledger = StockLedger::from_snapshot(vec![
        ca60("t1", 266.5),
        ca60("bl", 106.9),
        ca60("br", 106.9),
        ca60("dl", 168.55),
        ca60("dr", 168.55),
    ]);
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let active_ids = active(&[&order]);
    let m = machine();
    let order_id = order.id.clone();
    m.hold_package_weight(
        &mut order,
        PendingPackageWeight {
            id: "pk-1".to_string(),
            order_id,
            package: PackageWeightInput {
                package_number: 1,
                quantity: 100,
                weight: 500.0,
            },
            expected_weight: 817.6,
            lower_bound: 776.72,
            upper_bound: 858.48,
            requested_at: at(15, 0),
        },
    )
    .unwrap();

    m.complete(&mut ledger, &mut order, &active_ids, pieces(100), at(16, 0))
        .unwrap();

    for lot in ledger.iter() {
        assert!(lot.remaining_quantity <= 0.05, "{} remaining", lot.id);
        assert_eq!(lot.status, LotStatus::Consumed, "{}", lot.id);
    }
    // 完工后挂起的包称重作废
    assert!(order.pending_package_weights.is_empty());
}

// 场景3: 型号不存在 -> 严重错误, 台账与订单均不变
#[test]
fn test_truss_unknown_model_is_critical_and_mutates_nothing() {
    let mut ledger = StockLedger::from_snapshot(vec![
        ca60("t1", 300.0),
        ca60("bl", 500.0),
        ca60("br", 500.0),
        ca60("dl", 500.0),
        ca60("dr", 500.0),
    ]);
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    order.truss_model = Some("H-99 INEXISTENTE".to_string());
    let before = order.clone();
    let active_ids = active(&[&order]);

    let err = machine()
        .complete(&mut ledger, &mut order, &active_ids, pieces(100), at(16, 0))
        .unwrap_err();

    assert!(err.is_critical());
    assert!(matches!(
        err,
        ProductionError::Allocation(AllocationError::ModelNotFound { .. })
    ));
    assert_eq!(order, before);
    assert!(ledger.take_batch().is_empty());
    assert_eq!(ledger.get("t1").unwrap().remaining_quantity, 300.0);
}

// 场景4: 余料/生产中批次优先, 其次按批次号自然序
#[test]
fn test_truss_candidate_ordering() {
    let mut l2 = ca60("l2", 100.0);
    l2.status = LotStatus::Available;
    let mut l10 = ca60("l10", 100.0);
    l10.status = LotStatus::Available;
    let support = create_test_lot("s9", MaterialType::Ca60, 50.0, LotStatus::AvailableSupport, &[]);
    let mut ledger = StockLedger::from_snapshot(vec![
        l10,
        l2,
        support,
        ca60("bl", 500.0),
        ca60("br", 500.0),
        ca60("dl", 500.0),
        ca60("dr", 500.0),
    ]);
    let order = truss_order(selection(
        &["l10", "l2", "s9"],
        &["bl"],
        &["br"],
        &["dl"],
        &["dr"],
    ));

    // 60 件: 上弦 159.9 kg -> s9 50 + l2 100 + l10 9.9
    let allocation = ConsumptionAllocator::default()
        .plan_truss(
            &ledger,
            &order,
            60,
            &[],
            &TrussModelCatalog::builtin(),
            &active(&[&order]),
        )
        .unwrap();
    let top = &allocation.parts[0];
    let order_of_draws: Vec<&str> = top.draws.iter().map(|d| d.lot_id.as_str()).collect();
    assert_eq!(order_of_draws, vec!["s9", "l2", "l10"]);
    assert!((top.draws[2].amount - 9.9).abs() < 1e-6);

    ConsumptionAllocator::default()
        .apply_truss(&mut ledger, &order, &allocation, at(16, 0))
        .unwrap();
    assert_eq!(ledger.get("s9").unwrap().status, LotStatus::Consumed);
    assert_eq!(ledger.get("l2").unwrap().status, LotStatus::Consumed);
    assert_eq!(ledger.get("l10").unwrap().status, LotStatus::AvailableSupport);
}

// 场景5: 同一批次被两个部件共用时不超扣
#[test]
fn test_truss_shared_lot_never_overdrawn() {
    let mut ledger = StockLedger::from_snapshot(vec![
        ca60("t1", 300.0),
        ca60("shared", 200.0),
        ca60("spare", 500.0),
        ca60("dl", 500.0),
        ca60("dr", 500.0),
    ]);
    let order = truss_order(selection(
        &["t1"],
        &["shared"],
        &["shared", "spare"],
        &["dl"],
        &["dr"],
    ));

    let allocation = ConsumptionAllocator::default()
        .allocate_truss(
            &mut ledger,
            &order,
            100,
            &[],
            &TrussModelCatalog::builtin(),
            &active(&[&order]),
            at(16, 0),
        )
        .unwrap();

    // 106.9 + 93.1 = 200 取自 shared, 其余 13.8 取自 spare
    let shared = ledger.get("shared").unwrap();
    assert_eq!(shared.remaining_quantity, 0.0);
    assert_eq!(shared.status, LotStatus::Consumed);
    let spare = ledger.get("spare").unwrap();
    assert!((spare.remaining_quantity - (500.0 - 13.8)).abs() < 0.01);
    assert!(allocation.parts.iter().all(|p| p.shortfall() < 1e-6));
}

// 场景6: 批次仍被其他活动订单占用 -> 保持桁架生产中
#[test]
fn test_truss_lot_with_other_active_order_stays_in_production() {
    let mut shared_top = ca60("t1", 600.0);
    shared_top.production_order_ids.push("po-other".to_string());
    let mut ledger = StockLedger::from_snapshot(vec![
        shared_top,
        ca60("bl", 500.0),
        ca60("br", 500.0),
        ca60("dl", 500.0),
        ca60("dr", 500.0),
    ]);
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let mut other = create_test_order("po-other", MachineType::Truss, order.selected_lots.clone());
    other.status = OrderStatus::Pending;
    let active_ids = active_order_ids(&[order.clone(), other]);

    machine()
        .complete(&mut ledger, &mut order, &active_ids, pieces(100), at(16, 0))
        .unwrap();

    let top = ledger.get("t1").unwrap();
    assert_eq!(top.status, LotStatus::InProductionTruss);
    assert_eq!(top.production_order_ids, vec!["po-other".to_string()]);
    assert_eq!(ledger.get("bl").unwrap().status, LotStatus::AvailableSupport);
}

// 场景7: 短料按部件占比分摊; 短料与成品各只生成一次; 重复完工为空操作
#[test]
fn test_truss_completion_creates_goods_once_and_is_idempotent() {
    let mut ledger = StockLedger::from_snapshot(vec![
        ca60("t1", 1000.0),
        ca60("bl", 1000.0),
        ca60("br", 1000.0),
        ca60("dl", 1000.0),
        ca60("dr", 1000.0),
    ]);
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let active_ids = active(&[&order]);
    let data = CompletionData {
        actual_produced_quantity: Some(10),
        scrap_weight: Some(1.5),
        offcuts: vec![
            Offcut {
                quantity: 2,
                size: 3.0,
                total_weight: 8.174,
            },
            Offcut {
                quantity: 0,
                size: 3.0,
                total_weight: 0.0,
            },
        ],
    };

    let report = match machine()
        .complete(&mut ledger, &mut order, &active_ids, data.clone(), at(16, 0))
        .unwrap()
    {
        CompletionOutcome::Completed(report) => report,
        CompletionOutcome::AlreadyCompleted => panic!("first completion must run"),
    };

    assert_eq!(report.offcut_items.len(), 1);
    assert_eq!(report.offcut_items[0].product_type, ProductType::TrussOffcut);
    assert_eq!(report.finished_goods.len(), 1);
    // 未称重 -> 回退为单件重量 × 件数
    assert!((report.finished_goods[0].total_weight - 81.74).abs() < 1e-9);
    assert_eq!(report.finished_goods[0].quantity, 10);

    // 上弦: 10 × 2.665 + 8.174 × (2.665 / 8.174) = 29.315
    let top = ledger.get("t1").unwrap();
    assert!((top.remaining_quantity - (1000.0 - 29.32)).abs() < 0.01);

    let first_batch = ledger.take_batch();
    assert_eq!(first_batch.len(), 5);

    let snapshot = order.clone();
    let again = machine()
        .complete(&mut ledger, &mut order, &active_ids, data, at(17, 0))
        .unwrap();
    assert_eq!(again, CompletionOutcome::AlreadyCompleted);
    assert_eq!(order, snapshot);
    assert!(ledger.take_batch().is_empty());
}

#[test]
fn test_truss_offcut_without_weight_uses_model_weight_per_meter() {
    let mut ledger = StockLedger::from_snapshot(vec![
        ca60("t1", 1000.0),
        ca60("bl", 1000.0),
        ca60("br", 1000.0),
        ca60("dl", 1000.0),
        ca60("dr", 1000.0),
    ]);
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let active_ids = active(&[&order]);
    let data = CompletionData {
        actual_produced_quantity: Some(10),
        scrap_weight: None,
        offcuts: vec![Offcut {
            quantity: 2,
            size: 3.0,
            total_weight: 0.0,
        }],
    };

    let report = match machine()
        .complete(&mut ledger, &mut order, &active_ids, data, at(16, 0))
        .unwrap()
    {
        CompletionOutcome::Completed(report) => report,
        CompletionOutcome::AlreadyCompleted => panic!("first completion must run"),
    };

    // H-8 PESADA 12m: 8.174 / 12 × 3m × 2 = 4.087
    assert_eq!(report.offcut_items.len(), 1);
    assert!((report.offcut_items[0].total_weight - 4.09).abs() < 1e-9);
    assert!((order.offcuts[0].total_weight - 4.09).abs() < 1e-9);
}

#[test]
fn test_truss_produced_weight_prefers_weighed_packages() {
    let mut ledger = StockLedger::from_snapshot(vec![
        ca60("t1", 1000.0),
        ca60("bl", 1000.0),
        ca60("br", 1000.0),
        ca60("dl", 1000.0),
        ca60("dr", 1000.0),
    ]);
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let m = machine();
    for (n, w) in [(1, 40.9), (2, 41.0)] {
        m.apply_package_weight(
            &mut order,
            &PackageWeightInput {
                package_number: n,
                quantity: 5,
                weight: w,
            },
            at(12, 0),
        )
        .unwrap();
    }
    let active_ids = active(&[&order]);

    let outcome = m
        .complete(&mut ledger, &mut order, &active_ids, pieces(10), at(16, 0))
        .unwrap();
    let CompletionOutcome::Completed(report) = outcome else {
        panic!("expected completion");
    };
    assert!((report.produced_weight - 81.9).abs() < 1e-9);
    assert_eq!(order.actual_produced_weight, Some(report.produced_weight));
}

// ==========================================
// 拉丝完工转化
// ==========================================

fn wire_lot(id: &str, label: f64) -> StockLot {
    create_test_lot(
        id,
        MaterialType::WireRod,
        label,
        LotStatus::InProductionWireDraw,
        &["po-w"],
    )
}

fn wire_order() -> ProductionOrder {
    create_test_order(
        "po-w",
        MachineType::WireDraw,
        LotSelection::WireDraw {
            lot_ids: vec!["w1".into(), "w2".into(), "w3".into()],
        },
    )
}

fn processed(lot_id: &str, weight: Option<f64>) -> ProcessedLot {
    ProcessedLot {
        lot_id: lot_id.to_string(),
        start_time: at(8, 0),
        end_time: at(9, 0),
        final_weight: weight,
        measured_gauge: Some(4.2),
    }
}

#[test]
fn test_wire_draw_transformation_and_scrap() {
    let mut ledger = StockLedger::from_snapshot(vec![
        wire_lot("w1", 1000.0),
        wire_lot("w2", 800.0),
        wire_lot("w3", 900.0),
    ]);
    let mut order = wire_order();
    order.processed_lots = vec![processed("w1", Some(980.0)), processed("w2", Some(790.0))];
    let active_ids = active(&[&order]);

    let outcome = machine()
        .complete(
            &mut ledger,
            &mut order,
            &active_ids,
            CompletionData::default(),
            at(16, 0),
        )
        .unwrap();
    let CompletionOutcome::Completed(report) = outcome else {
        panic!("expected completion");
    };
    let wire = report.wire_draw.unwrap();

    assert!(wire.input_label_weight >= wire.output_weight);
    assert_eq!(wire.scrap_weight, 30.0);
    assert_eq!(order.scrap_weight, Some(30.0));
    assert_eq!(order.actual_produced_weight, Some(1770.0));

    let w1 = ledger.get("w1").unwrap();
    assert_eq!(w1.material_type, MaterialType::Ca60);
    assert_eq!(w1.remaining_quantity, 980.0);
    assert_eq!(w1.status, LotStatus::Available);

    // 未加工批次释放占用
    let w3 = ledger.get("w3").unwrap();
    assert_eq!(w3.material_type, MaterialType::WireRod);
    assert_eq!(w3.status, LotStatus::Available);
    assert!(w3.production_order_ids.is_empty());
    assert_eq!(wire.released_lot_ids, vec!["w3".to_string()]);
}

#[test]
fn test_wire_draw_scrap_floors_at_zero() {
    let mut ledger = StockLedger::from_snapshot(vec![wire_lot("w1", 500.0)]);
    let mut order = wire_order();
    order.processed_lots = vec![processed("w1", Some(510.0))];

    let outcome = ConsumptionAllocator::default()
        .transform_wire_draw(&mut ledger, &order, at(16, 0))
        .unwrap();
    assert_eq!(outcome.scrap_weight, 0.0);
}

#[test]
fn test_wire_draw_missing_weight_rejected_before_mutation() {
    let mut ledger = StockLedger::from_snapshot(vec![wire_lot("w1", 1000.0), wire_lot("w2", 800.0)]);
    let mut order = wire_order();
    order.processed_lots = vec![processed("w1", Some(980.0)), processed("w2", None)];
    let active_ids = active(&[&order]);

    let err = machine()
        .complete(
            &mut ledger,
            &mut order,
            &active_ids,
            CompletionData::default(),
            at(16, 0),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ProductionError::Allocation(AllocationError::MissingFinalWeight { .. })
    ));
    assert!(!err.is_critical());
    assert_eq!(order.status, OrderStatus::InProgress);
    assert!(ledger.take_batch().is_empty());
}

#[test]
fn test_complete_pending_order_rejected() {
    let mut ledger = StockLedger::default();
    let mut order = wire_order();
    order.status = OrderStatus::Pending;

    let err = machine()
        .complete(
            &mut ledger,
            &mut order,
            &HashSet::new(),
            CompletionData::default(),
            at(16, 0),
        )
        .unwrap_err();
    assert!(matches!(err, ProductionError::InvalidStateTransition { .. }));
}

// ==========================================
// 停机 / 班次 / 批次加工
// ==========================================

// 场景8: 10:00 停机未关闭, 10:05 记录 "Setup"
#[test]
fn test_log_downtime_closes_previous_event() {
    let mut order = wire_order();
    order.downtime_events.push(DowntimeEvent {
        stop_time: at(10, 0),
        resume_time: None,
        reason: "awaiting start".to_string(),
    });

    machine().log_downtime(&mut order, "Setup", at(10, 5)).unwrap();

    assert_eq!(order.downtime_events.len(), 2);
    assert_eq!(order.downtime_events[0].resume_time, Some(at(10, 5)));
    assert_eq!(order.downtime_events[1].stop_time, at(10, 5));
    assert_eq!(order.downtime_events[1].resume_time, None);
    assert_eq!(order.downtime_events[1].reason, "Setup");
}

#[test]
fn test_start_opens_awaiting_start_and_hands_over_shift() {
    let mut running = wire_order();
    running.operator_logs.push(OperatorLog {
        operator: "ana".to_string(),
        start_time: at(6, 0),
        end_time: None,
        post_production_activities: vec![],
    });
    let mut next = create_test_order(
        "po-next",
        MachineType::WireDraw,
        LotSelection::WireDraw {
            lot_ids: vec!["x".into()],
        },
    );
    next.status = OrderStatus::Pending;
    let mut orders = vec![running, next];

    let outcome = machine().start(&mut orders, "po-next", "ana", at(11, 0)).unwrap();

    assert_eq!(outcome.handed_over_from.as_deref(), Some("po-w"));
    assert_eq!(orders[0].operator_logs[0].end_time, Some(at(11, 0)));
    let started = &orders[1];
    assert_eq!(started.status, OrderStatus::InProgress);
    assert_eq!(started.start_time, Some(at(11, 0)));
    assert_eq!(
        started.open_downtime().unwrap().reason,
        downtime_reasons::AWAITING_START
    );
    assert!(started.open_log_for("ana").is_some());

    // 重复开工被拒绝
    assert!(machine().start(&mut orders, "po-next", "ana", at(11, 5)).is_err());
}

#[test]
fn test_start_without_open_shift_opens_no_log() {
    let mut order = wire_order();
    order.status = OrderStatus::Pending;
    let mut orders = vec![order];

    let outcome = machine().start(&mut orders, "po-w", "bia", at(7, 0)).unwrap();
    assert!(outcome.handed_over_from.is_none());
    assert!(orders[0].operator_logs.is_empty());
}

#[test]
fn test_truss_shift_start_auto_resumes_only_for_system_reasons() {
    let m = machine();
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    order.downtime_events.push(DowntimeEvent {
        stop_time: at(6, 0),
        resume_time: None,
        reason: downtime_reasons::AWAITING_START.to_string(),
    });

    let mut orders = vec![order];
    m.start_shift(&mut orders, "po-t", "caio", at(6, 10)).unwrap();
    assert!(orders[0].open_downtime().is_none());
    assert!(matches!(
        m.start_shift(&mut orders, "po-t", "caio", at(6, 11)),
        Err(ProductionError::ShiftAlreadyOpen { .. })
    ));

    m.log_downtime(&mut orders[0], "Quebra de eletrodo", at(8, 0)).unwrap();
    m.start_shift(&mut orders, "po-t", "dora", at(8, 5)).unwrap();
    assert_eq!(orders[0].open_downtime().unwrap().reason, "Quebra de eletrodo");
}

#[test]
fn test_start_shift_rejects_open_log_on_other_order_of_same_machine() {
    let m = machine();
    let first = wire_order();
    let mut second = create_test_order(
        "po-w2",
        MachineType::WireDraw,
        LotSelection::WireDraw {
            lot_ids: vec!["w9".into()],
        },
    );
    second.status = OrderStatus::InProgress;
    let truss = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let mut orders = vec![first, second, truss];

    m.start_shift(&mut orders, "po-w", "ana", at(6, 0)).unwrap();
    assert!(matches!(
        m.start_shift(&mut orders, "po-w2", "ana", at(6, 5)),
        Err(ProductionError::ShiftAlreadyOpen { .. })
    ));
    assert!(orders[1].operator_logs.is_empty());

    // 其他机组不受影响
    m.start_shift(&mut orders, "po-t", "ana", at(6, 10)).unwrap();
    let open = orders
        .iter()
        .filter(|o| o.machine == MachineType::WireDraw)
        .filter(|o| o.open_log_for("ana").is_some())
        .count();
    assert_eq!(open, 1);
}

#[test]
fn test_wire_draw_lot_processing_cycle() {
    let m = machine();
    let mut order = wire_order();
    order.downtime_events.push(DowntimeEvent {
        stop_time: at(6, 0),
        resume_time: None,
        reason: downtime_reasons::AWAITING_START.to_string(),
    });

    m.start_lot_processing(&mut order, "w1", at(6, 30)).unwrap();
    assert!(order.open_downtime().is_none());
    assert!(matches!(
        m.start_lot_processing(&mut order, "w2", at(6, 31)),
        Err(ProductionError::LotAlreadyActive { .. })
    ));
    assert!(matches!(
        m.finish_lot_processing(&mut order, "w2", at(7, 0)),
        Err(ProductionError::LotNotActive { .. })
    ));

    m.finish_lot_processing(&mut order, "w1", at(8, 0)).unwrap();
    assert!(order.active_lot_processing.is_none());
    assert_eq!(order.processed_lots.len(), 1);
    assert_eq!(order.processed_lots[0].final_weight, None);
    assert_eq!(
        order.open_downtime().unwrap().reason,
        downtime_reasons::TOOL_CHANGE_SETUP
    );

    m.record_lot_weight(&mut order, "w1", 985.5, Some(4.21)).unwrap();
    assert_eq!(order.processed_lots[0].final_weight, Some(985.5));
    assert!(matches!(
        m.record_lot_weight(&mut order, "w2", 10.0, None),
        Err(ProductionError::LotNotProcessed { .. })
    ));
    assert!(matches!(
        m.start_lot_processing(&mut order, "w1", at(9, 0)),
        Err(ProductionError::LotAlreadyProcessed { .. })
    ));
    assert!(matches!(
        m.start_lot_processing(&mut order, "zz", at(9, 0)),
        Err(ProductionError::LotNotInOrder { .. })
    ));
}

#[test]
fn test_resume_wire_draw_without_active_lot_opens_tool_change() {
    let m = machine();
    let mut order = wire_order();
    m.log_downtime(&mut order, "Falta de energia", at(9, 0)).unwrap();

    m.resume(&mut order, at(9, 20)).unwrap();

    assert_eq!(order.downtime_events[0].resume_time, Some(at(9, 20)));
    assert_eq!(
        order.open_downtime().unwrap().reason,
        downtime_reasons::TOOL_CHANGE_SETUP
    );
    assert_eq!(order.downtime_events.len(), 2);
}

#[test]
fn test_lot_processing_rejected_on_truss() {
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    assert!(matches!(
        machine().start_lot_processing(&mut order, "t1", at(9, 0)),
        Err(ProductionError::WrongMachine { .. })
    ));
}

#[test]
fn test_end_shift_and_post_production_activity() {
    let m = machine();
    let mut order = wire_order();
    order.operator_logs.push(OperatorLog {
        operator: "ana".to_string(),
        start_time: at(6, 0),
        end_time: None,
        post_production_activities: vec![],
    });
    order.status = OrderStatus::Completed;
    order.end_time = Some(at(13, 0));
    let mut orders = vec![order];

    let target = m
        .log_post_production_activity(&mut orders, "ana", "Limpeza da máquina", at(13, 30))
        .unwrap();
    assert_eq!(target, "po-w");
    assert_eq!(orders[0].operator_logs[0].post_production_activities.len(), 1);

    let closed = m.end_shift(&mut orders[0], "ana", at(14, 0)).unwrap();
    assert_eq!(closed.end_time, Some(at(14, 0)));
    assert_eq!(closed.post_production_activities.len(), 1);
    assert!(matches!(
        m.end_shift(&mut orders[0], "ana", at(14, 1)),
        Err(ProductionError::NoOpenShift { .. })
    ));
    assert!(m
        .log_post_production_activity(&mut orders, "ana", "Organização", at(14, 5))
        .is_err());
}

#[test]
fn test_package_weight_upsert_sorted_by_number() {
    let m = machine();
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let package = |n, w| PackageWeightInput {
        package_number: n,
        quantity: 5,
        weight: w,
    };

    m.apply_package_weight(&mut order, &package(2, 40.0), at(9, 0)).unwrap();
    m.apply_package_weight(&mut order, &package(1, 41.0), at(9, 5)).unwrap();
    m.apply_package_weight(&mut order, &package(2, 40.8), at(9, 10)).unwrap();

    let numbers: Vec<u32> = order.weighed_packages.iter().map(|p| p.package_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert_eq!(order.weighed_packages[1].weight, 40.8);
    assert!(m.apply_package_weight(&mut order, &package(3, 0.0), at(9, 15)).is_err());

    m.update_produced_quantity(&mut order, 15).unwrap();
    assert_eq!(order.actual_produced_quantity, Some(15));
}

#[test]
fn test_held_package_weight_replaced_then_authorized_or_cancelled() {
    let m = machine();
    let mut order = truss_order(selection(&["t1"], &["bl"], &["br"], &["dl"], &["dr"]));
    let held = |id: &str, n, w| PendingPackageWeight {
        id: id.to_string(),
        order_id: "po-t".to_string(),
        package: PackageWeightInput {
            package_number: n,
            quantity: 5,
            weight: w,
        },
        expected_weight: 45.0,
        lower_bound: 42.75,
        upper_bound: 47.25,
        requested_at: at(9, 0),
    };

    m.hold_package_weight(&mut order, held("pk-1", 1, 30.0)).unwrap();
    m.hold_package_weight(&mut order, held("pk-2", 1, 31.0)).unwrap();
    m.hold_package_weight(&mut order, held("pk-3", 2, 60.0)).unwrap();
    let ids: Vec<&str> = order.pending_package_weights.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["pk-2", "pk-3"]);
    assert!(m.hold_package_weight(&mut order, held("pk-4", 3, 0.0)).is_err());

    let authorized = m.authorize_package_weight(&mut order, "pk-2", at(9, 30)).unwrap();
    assert_eq!(authorized.package.weight, 31.0);
    assert_eq!(order.weighed_packages.len(), 1);
    assert_eq!(order.weighed_packages[0].weight, 31.0);
    assert!(matches!(
        m.authorize_package_weight(&mut order, "pk-2", at(9, 31)),
        Err(ProductionError::PendingPackageNotFound { .. })
    ));

    m.cancel_package_weight(&mut order, "pk-3").unwrap();
    assert!(order.pending_package_weights.is_empty());
    assert_eq!(order.weighed_packages.len(), 1);
}

// ==========================================
// 订单登记 / 删除
// ==========================================

fn registration_ledger() -> StockLedger {
    let lot = |id: &str, w: f64| create_test_lot(id, MaterialType::Ca60, w, LotStatus::Available, &[]);
    StockLedger::from_snapshot(vec![
        lot("t1", 200.0),
        lot("b1", 50.0),
        lot("b2", 50.0),
        lot("d1", 60.0),
        lot("d2", 60.0),
    ])
}

/// H-8 LEVE 6m × 100 件: 上弦 116.1, 下弦 75.8, 斜筋 97.9
fn truss_input(number: &str, quantity: u32, lots: serde_json::Value) -> NewProductionOrder {
    NewProductionOrder {
        order_number: number.to_string(),
        machine: MachineType::Truss,
        target_gauge: "5.6".to_string(),
        truss_model: Some("H-8 LEVE".to_string()),
        truss_size: Some("6".to_string()),
        quantity_to_produce: Some(quantity),
        selected_lot_ids: serde_json::from_value::<SelectedLotIdsInput>(lots).unwrap(),
        planned_output_weight: None,
    }
}

fn legacy_lots() -> serde_json::Value {
    json!({
        "superior": "t1",
        "inferior1": "b1",
        "inferior2": "b2",
        "senozoide1": "d1",
        "senozoide2": "d2"
    })
}

#[test]
fn test_register_claims_lots_from_legacy_selection() {
    let mut ledger = registration_ledger();

    let order = machine()
        .register(
            &mut ledger,
            &[],
            "po-new".to_string(),
            truss_input(" OP-77 ", 100, legacy_lots()),
            at(7, 0),
        )
        .unwrap();

    assert_eq!(order.order_number, "OP-77");
    assert_eq!(order.status, OrderStatus::Pending);
    let LotSelection::Truss(parts) = &order.selected_lots else {
        panic!("expected truss selection");
    };
    assert_eq!(parts.bottom_left, vec!["b1".to_string()]);
    assert_eq!(parts.diagonal_right, vec!["d2".to_string()]);
    assert_eq!(order.total_weight, 420.0);

    for lot in ledger.iter() {
        assert_eq!(lot.status, LotStatus::InProductionTruss);
        assert!(lot.is_claimed_by("po-new"));
        assert_eq!(lot.history.last().unwrap().event_type, history_types::ORDER_CLAIM);
    }
}

#[test]
fn test_register_accepts_positional_array() {
    let mut ledger = registration_ledger();
    let order = machine()
        .register(
            &mut ledger,
            &[],
            "po-new".to_string(),
            truss_input("OP-78", 100, json!(["t1", "b1", "b2", "d1", "d2"])),
            at(7, 0),
        )
        .unwrap();
    let LotSelection::Truss(parts) = &order.selected_lots else {
        panic!("expected truss selection");
    };
    assert_eq!(parts.top, vec!["t1".to_string()]);
}

#[test]
fn test_register_splits_combined_bottom_and_diagonal_lists() {
    let mut ledger = registration_ledger();
    let order = machine()
        .register(
            &mut ledger,
            &[],
            "po-new".to_string(),
            truss_input(
                "OP-79",
                100,
                json!({
                    "allSuperior": ["t1"],
                    "allInferior": ["b1", "b2"],
                    "allSenozoide": ["d1", "d2"]
                }),
            ),
            at(7, 0),
        )
        .unwrap();
    let LotSelection::Truss(parts) = &order.selected_lots else {
        panic!("expected truss selection");
    };
    assert_eq!(parts.top, vec!["t1".to_string()]);
    assert_eq!(parts.bottom_left, vec!["b1".to_string()]);
    assert_eq!(parts.bottom_right, vec!["b2".to_string()]);
    assert_eq!(parts.diagonal_left, vec!["d1".to_string()]);
    assert_eq!(parts.diagonal_right, vec!["d2".to_string()]);
    assert!(ledger.iter().all(|l| l.is_claimed_by("po-new")));
}

#[test]
fn test_register_validation_errors_leave_ledger_untouched() {
    let m = machine();
    let mut ledger = registration_ledger();
    let existing = create_test_order("po-old", MachineType::Truss, LotSelection::WireDraw { lot_ids: vec![] });

    // 订单号重复 (忽略大小写)
    let err = m
        .register(
            &mut ledger,
            std::slice::from_ref(&existing),
            "po-1".to_string(),
            truss_input("op-po-old", 100, legacy_lots()),
            at(7, 0),
        )
        .unwrap_err();
    assert!(matches!(err, ProductionError::Validation(_)));

    // 同一批次承担两个部件
    let duplicate = json!({
        "superior": "t1",
        "inferior1": "t1",
        "inferior2": "b2",
        "senozoide1": "d1",
        "senozoide2": "d2"
    });
    let err = m
        .register(
            &mut ledger,
            &[],
            "po-1".to_string(),
            truss_input("OP-1", 100, duplicate),
            at(7, 0),
        )
        .unwrap_err();
    assert_eq!(
        err,
        ProductionError::Selection(SelectionError::DuplicateLot {
            lot_id: "t1".to_string()
        })
    );

    // 200 件上弦需要 232.2 kg, 只选了 200 kg
    let err = m
        .register(
            &mut ledger,
            &[],
            "po-1".to_string(),
            truss_input("OP-1", 200, legacy_lots()),
            at(7, 0),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ProductionError::InsufficientSelectedWeight { ref scope, .. } if scope == "top"
    ));

    // 件数为 0
    let err = m
        .register(
            &mut ledger,
            &[],
            "po-1".to_string(),
            truss_input("OP-1", 0, legacy_lots()),
            at(7, 0),
        )
        .unwrap_err();
    assert!(matches!(err, ProductionError::Validation(_)));

    assert!(ledger.take_batch().is_empty());
}

#[test]
fn test_remove_releases_claims() {
    let m = machine();
    let mut ledger = registration_ledger();
    let order = m
        .register(
            &mut ledger,
            &[],
            "po-new".to_string(),
            truss_input("OP-79", 100, legacy_lots()),
            at(7, 0),
        )
        .unwrap();

    m.remove(&mut ledger, &order, at(8, 0)).unwrap();

    for lot in ledger.iter() {
        assert_eq!(lot.status, LotStatus::Available);
        assert!(lot.production_order_ids.is_empty());
    }

    let mut done = order.clone();
    done.status = OrderStatus::Completed;
    assert!(matches!(
        m.remove(&mut ledger, &done, at(9, 0)),
        Err(ProductionError::InvalidStateTransition { .. })
    ));
}

#[test]
fn test_natural_order() {
    assert_eq!(natural_cmp("L2", "L10"), Ordering::Less);
    assert_eq!(natural_cmp("lote-a", "LOTE-A"), Ordering::Equal);
    assert_eq!(natural_cmp("Lote-b", "LOTE-A"), Ordering::Greater);
    assert_eq!(natural_cmp("A010", "A9"), Ordering::Greater);
    assert_eq!(natural_cmp("A", "A1"), Ordering::Less);
}
