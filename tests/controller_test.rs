mod common;

use common::{RECIPIENT, controller, drain};
use cryptonow_pos::application::controller::PaymentFlowController;
use cryptonow_pos::application::events::{FlowEvent, FlowState};
use cryptonow_pos::application::monitor::MonitorOutcome;
use cryptonow_pos::config::MonitorSettings;
use cryptonow_pos::error::PaymentError;
use cryptonow_pos::infrastructure::in_memory::InMemoryPaymentGateway;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_invalid_amounts_never_reach_the_service() {
    let gateway = InMemoryPaymentGateway::new();
    let (controller, mut events) = controller(&gateway);

    for input in ["", "  ", "abc", "0", "-5", "0.0", "NaN", "inf", "12abc"] {
        let result = controller.create_payment(input, "USDC").await;
        assert!(
            matches!(result, Err(PaymentError::ValidationError(_))),
            "expected {input:?} to fail validation, got {result:?}"
        );
    }

    assert_eq!(gateway.create_calls(), 0);
    assert_eq!(gateway.status_checks(), 0);
    assert_eq!(controller.state(), FlowState::Idle);
    let emitted = drain(&mut events);
    assert_eq!(emitted.len(), 9);
    assert!(emitted.iter().all(|event| matches!(event, FlowEvent::Error(_))));
}

#[tokio::test]
async fn test_missing_recipient_never_reaches_the_service() {
    let gateway = InMemoryPaymentGateway::new();
    let (controller, _events) =
        PaymentFlowController::new(Arc::new(gateway.clone()), MonitorSettings::default(), None);

    let result = controller.create_payment("10", "USDC").await;

    assert!(matches!(result, Err(PaymentError::ValidationError(_))));
    assert_eq!(gateway.create_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_submission_is_rejected_while_in_flight() {
    let gateway = InMemoryPaymentGateway::new();
    gateway.set_create_delay(Duration::from_secs(2)).await;
    let (controller, _events) = controller(&gateway);

    let (first, second) = tokio::join!(
        controller.create_payment("5", "USDC"),
        controller.create_payment("6", "USDC")
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(PaymentError::SubmissionInProgress)));
    assert_eq!(gateway.create_calls(), 1);

    // the gate opens again once the first call is done
    assert!(controller.create_payment("7", "USDC").await.is_ok());
    assert_eq!(gateway.create_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_submission_releases_the_gate() {
    let gateway = InMemoryPaymentGateway::new();
    gateway.set_create_delay(Duration::from_secs(30)).await;
    let (controller, _events) = controller(&gateway);

    let abandoned =
        tokio::time::timeout(Duration::from_secs(1), controller.create_payment("5", "USDC")).await;
    assert!(abandoned.is_err());

    let result = tokio::time::timeout(
        Duration::from_secs(60),
        controller.create_payment("5", "USDC"),
    )
    .await
    .expect("second submission should not be blocked");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_request_carries_order_details() {
    let gateway = InMemoryPaymentGateway::new();
    let (controller, _events) = controller(&gateway);

    let first = controller.create_payment(" 12.50 ", "SOL").await.unwrap();
    let second = controller.create_payment("3", "SOL").await.unwrap();

    let requests = gateway.created_requests().await;
    assert_eq!(requests[0].recipient_address, RECIPIENT);
    assert_eq!(requests[0].amount, dec!(12.5));
    assert_eq!(requests[0].token_symbol, "SOL");
    assert_eq!(requests[0].label, "CryptoNow Payment 12.5 SOL");
    assert_eq!(
        requests[0].message,
        "Payment of 12.5 SOL + 1 SOL CryptoNow fee"
    );
    assert_ne!(first.order_id, second.order_id);
    assert!(first.created_at <= second.created_at);
}

#[tokio::test(start_paused = true)]
async fn test_submit_runs_the_whole_flow() {
    let gateway = InMemoryPaymentGateway::new();
    gateway.settle_after(2).await;
    let (controller, mut events) = controller(&gateway);

    let (attempt, handle) = controller.submit("25", "USDC").await.unwrap();
    assert_eq!(handle.payment_id(), attempt.record.id);
    assert_eq!(controller.state(), FlowState::Monitoring);

    let outcome = handle.finished().await;
    let MonitorOutcome::Completed(settlement) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(settlement.payment_id, attempt.record.id);
    assert_eq!(gateway.status_calls(&attempt.record.id).await, 3);
    assert_eq!(controller.state(), FlowState::Completed);

    assert_eq!(
        drain(&mut events),
        vec![
            FlowEvent::Loading,
            FlowEvent::Created(attempt.record.clone()),
            FlowEvent::Completed(settlement),
        ]
    );
}

#[tokio::test]
async fn test_connectivity_failure_is_surfaced() {
    let gateway = InMemoryPaymentGateway::new();
    gateway
        .fail_next_create(PaymentError::ConnectivityError("connection refused".to_string()))
        .await;
    let (controller, mut events) = controller(&gateway);

    let result = controller.submit("5", "USDC").await;

    assert!(matches!(result, Err(PaymentError::ConnectivityError(_))));
    assert_eq!(controller.state(), FlowState::CreateFailed);
    assert!(controller.active_monitor().is_none());
    assert_eq!(
        drain(&mut events),
        vec![
            FlowEvent::Loading,
            FlowEvent::Error("Connection failed - check server status".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_check_service_reports_availability() {
    let gateway = InMemoryPaymentGateway::new();
    let (controller, _events) = controller(&gateway);

    assert!(controller.check_service().await);
    gateway.set_available(false);
    assert!(!controller.check_service().await);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_controller_cancels_monitoring() {
    let gateway = InMemoryPaymentGateway::new();
    let (controller, _events) = controller(&gateway);
    let (_, handle) = controller.submit("5", "USDC").await.unwrap();

    drop(controller);
    assert_eq!(handle.finished().await, MonitorOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_failed_creation_retires_earlier_session() {
    let gateway = InMemoryPaymentGateway::new();
    let (controller, mut events) = controller(&gateway);
    gateway.push_status("pay_old", Ok(common::pending("pay_old"))).await;
    let old = controller.start_monitoring("pay_old", chrono::Utc::now());
    tokio::time::sleep(Duration::from_secs(10)).await;

    gateway
        .fail_next_create(PaymentError::ServiceError {
            status: 500,
            body: "x".to_string(),
        })
        .await;
    let result = controller.create_payment("5", "USDC").await;
    assert!(matches!(result, Err(PaymentError::ServiceError { .. })));
    assert_eq!(old.finished().await, MonitorOutcome::Cancelled);

    let old_calls = gateway.status_calls("pay_old").await;
    tokio::time::sleep(Duration::from_secs(700)).await;

    assert_eq!(controller.state(), FlowState::CreateFailed);
    assert_eq!(gateway.status_calls("pay_old").await, old_calls);
    assert!(controller.active_monitor().is_none());
    assert_eq!(
        drain(&mut events),
        vec![
            FlowEvent::Loading,
            FlowEvent::Error("Failed to create payment: Server error: 500 - x".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_input_keeps_earlier_session() {
    let gateway = InMemoryPaymentGateway::new();
    let (controller, _events) = controller(&gateway);
    let handle = controller.start_monitoring("pay_old", chrono::Utc::now());

    assert!(controller.create_payment("abc", "USDC").await.is_err());

    assert!(!handle.is_cancelled());
    assert_eq!(controller.state(), FlowState::Monitoring);
    handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_rejected_concurrent_submission_is_reported() {
    let gateway = InMemoryPaymentGateway::new();
    gateway.set_create_delay(Duration::from_secs(2)).await;
    let (controller, mut events) = controller(&gateway);

    let (first, second) = tokio::join!(
        controller.create_payment("5", "USDC"),
        controller.create_payment("6", "USDC")
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(PaymentError::SubmissionInProgress)));

    let emitted = drain(&mut events);
    assert_eq!(
        emitted[..2],
        [
            FlowEvent::Loading,
            FlowEvent::Error("A payment is already being created".to_string()),
        ]
    );
    assert!(matches!(emitted[2], FlowEvent::Created(_)));
}
