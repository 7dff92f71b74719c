mod common;

use chrono::Duration;
use common::*;
use crm_service::models::{CalendarEvent, Invoice, InvoiceStatus, ReminderChannel};
use crm_service::scheduler::{PeriodicTask, ReminderScheduler};
use crm_service::services::{CalendarService, InMemoryStore, NotificationStore};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

fn tenant() -> Uuid {
    Uuid::new_v4()
}

// =============================================================================
// Sweep matching
// =============================================================================

#[tokio::test]
async fn invoice_due_tomorrow_is_reminded_once() {
    let store = Arc::new(InMemoryStore::new());
    let invoice = seed_invoice(
        &store,
        Invoice::new(tenant(), invoice_draft("Asha Rao", due_instant())),
    )
    .await;
    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), store.clone(), sink.clone());

    let dispatched = sweeper.sweep(sweep_now()).await;

    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].channel, ReminderChannel::InvoiceDue);
    assert_eq!(dispatched[0].related_event_id, invoice.invoice_id);

    let notifications = store.notifications().await;
    assert_eq!(notifications.len(), 1);
    let notification = &notifications[0];
    assert_eq!(notification.related_event_id, invoice.invoice_id);
    assert_eq!(notification.scheduled_at, due_instant());
    assert!(notification.is_sent);
    assert_eq!(notification.title, "Payment reminder: Asha Rao");
    assert_eq!(
        notification.message,
        "Invoice for Asha Rao of INR 562.00 is due on 2024-06-09."
    );

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "invoice-reminder");
    assert_eq!(events[0].1.id, invoice.invoice_id);
    assert_eq!(events[0].1.amount, Some(Decimal::from(562)));
}

#[tokio::test]
async fn repeated_sweeps_do_not_duplicate() {
    let store = Arc::new(InMemoryStore::new());
    seed_invoice(
        &store,
        Invoice::new(tenant(), invoice_draft("Asha Rao", due_instant())),
    )
    .await;
    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), store.clone(), sink.clone());

    let first = sweeper.sweep(sweep_now()).await;
    let second = sweeper.sweep(sweep_now() + Duration::minutes(1)).await;
    let third = sweeper.sweep(sweep_now() + Duration::hours(6)).await;

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert!(third.is_empty());
    assert_eq!(store.notifications().await.len(), 1);
    assert_eq!(sink.events().len(), 1);
}

#[tokio::test]
async fn record_before_window_is_not_reminded() {
    let store = Arc::new(InMemoryStore::new());
    seed_invoice(
        &store,
        Invoice::new(tenant(), invoice_draft("Asha Rao", due_instant())),
    )
    .await;
    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), store.clone(), sink.clone());

    let dispatched = sweeper.sweep(sweep_now() - Duration::days(1)).await;

    assert!(dispatched.is_empty());
    assert!(store.notifications().await.is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn record_due_now_is_not_reminded() {
    let store = Arc::new(InMemoryStore::new());
    seed_invoice(
        &store,
        Invoice::new(tenant(), invoice_draft("Asha Rao", due_instant())),
    )
    .await;
    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), store.clone(), sink.clone());

    assert!(sweeper.sweep(due_instant()).await.is_empty());
    assert!(store.notifications().await.is_empty());
}

#[tokio::test]
async fn calendar_event_is_pushed_on_event_channel() {
    let store = Arc::new(InMemoryStore::new());
    let event = seed_event(
        &store,
        CalendarEvent::new(tenant(), event_draft("Renewal call", due_instant())),
    )
    .await;
    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), store.clone(), sink.clone());

    let dispatched = sweeper.sweep(sweep_now()).await;

    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].channel, ReminderChannel::CalendarDue);

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, "event-reminder");
    assert_eq!(events[0].1.id, event.event_id);
    assert_eq!(events[0].1.display_name, "Vikram Shah");
    assert_eq!(events[0].1.event_title.as_deref(), Some("Renewal call"));
    assert_eq!(events[0].1.amount, None);
    assert_eq!(events[0].1.due_date, "2024-06-09");

    let notifications = store.list_for_related(event.event_id).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Upcoming event: Renewal call");
}

#[tokio::test]
async fn settled_invoices_and_cancelled_events_are_skipped() {
    let store = Arc::new(InMemoryStore::new());
    let tenant_id = tenant();

    let mut paid = Invoice::new(tenant_id, invoice_draft("Paid Co", due_instant()));
    paid.record_payment(Decimal::from(562)).unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    seed_invoice(&store, paid).await;

    let calendar = CalendarService::new(store.clone());
    let event = calendar
        .schedule(tenant_id, event_draft("Dropped demo", due_instant()))
        .await
        .unwrap();
    calendar.cancel(tenant_id, event.event_id).await.unwrap();

    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), store.clone(), sink.clone());

    assert!(sweeper.sweep(sweep_now()).await.is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test]
async fn new_due_date_is_reminded_again() {
    let store = Arc::new(InMemoryStore::new());
    let tenant_id = tenant();
    let calendar = CalendarService::new(store.clone());
    let event = calendar
        .schedule(tenant_id, event_draft("Renewal call", due_instant()))
        .await
        .unwrap();

    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), store.clone(), sink.clone());
    assert_eq!(sweeper.sweep(sweep_now()).await.len(), 1);

    let moved_to = due_instant() + Duration::days(2);
    calendar
        .reschedule(tenant_id, event.event_id, moved_to)
        .await
        .unwrap();

    let later = sweep_now() + Duration::days(2);
    assert_eq!(sweeper.sweep(later).await.len(), 1);

    let notifications = store.list_for_related(event.event_id).await.unwrap();
    assert_eq!(notifications.len(), 2);
    assert_eq!(sink.events().len(), 2);
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn failed_fetch_skips_only_that_channel() {
    let store = Arc::new(InMemoryStore::new());
    let tenant_id = tenant();
    seed_invoice(
        &store,
        Invoice::new(tenant_id, invoice_draft("Asha Rao", due_instant())),
    )
    .await;
    let event = seed_event(
        &store,
        CalendarEvent::new(tenant_id, event_draft("Renewal call", due_instant())),
    )
    .await;

    let source = Arc::new(FailingSource {
        inner: store.clone(),
        fail_invoices: true,
        fail_events: false,
    });
    let sink = RecordingSink::new();
    let sweeper = sweeper_over(source, store.clone(), sink.clone());

    let dispatched = sweeper.sweep(sweep_now()).await;

    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].related_event_id, event.event_id);
    assert_eq!(sink.events()[0].0, "event-reminder");
}

#[tokio::test]
async fn failed_record_does_not_stop_the_sweep() {
    let store = Arc::new(InMemoryStore::new());
    let tenant_id = tenant();
    let first = seed_invoice(
        &store,
        Invoice::new(tenant_id, invoice_draft("First Co", due_instant())),
    )
    .await;
    let second = seed_invoice(
        &store,
        Invoice::new(
            tenant_id,
            invoice_draft("Second Co", due_instant() + Duration::hours(1)),
        ),
    )
    .await;

    let notifications = Arc::new(FlakyNotifications {
        inner: store.clone(),
        fail_insert_for: Some(first.invoice_id),
        fail_mark_sent: false,
    });
    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), notifications, sink.clone());

    let dispatched = sweeper.sweep(sweep_now()).await;

    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].related_event_id, second.invoice_id);
    assert!(store
        .list_for_related(first.invoice_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_mark_sent_leaves_notification_unsent_without_repush() {
    let store = Arc::new(InMemoryStore::new());
    let invoice = seed_invoice(
        &store,
        Invoice::new(tenant(), invoice_draft("Asha Rao", due_instant())),
    )
    .await;

    let notifications = Arc::new(FlakyNotifications {
        inner: store.clone(),
        fail_insert_for: None,
        fail_mark_sent: true,
    });
    let sink = RecordingSink::new();
    let sweeper = sweeper_over(store.clone(), notifications, sink.clone());

    assert!(sweeper.sweep(sweep_now()).await.is_empty());
    assert!(sweeper.sweep(sweep_now()).await.is_empty());

    let stored = store.list_for_related(invoice.invoice_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].is_sent);
    assert_eq!(sink.events().len(), 1);
}

// =============================================================================
// Periodic task
// =============================================================================

#[tokio::test]
async fn scheduler_sweeps_on_start_and_stops() {
    let store = Arc::new(InMemoryStore::new());
    let invoice = seed_invoice(
        &store,
        Invoice::new(tenant(), invoice_draft("Asha Rao", due_soon())),
    )
    .await;
    let sink = RecordingSink::new();
    let sweeper = Arc::new(sweeper_over(store.clone(), store.clone(), sink.clone()));
    let scheduler = ReminderScheduler::new(sweeper, std::time::Duration::from_secs(3600));

    assert!(!scheduler.is_running());
    assert!(scheduler.start());
    assert!(!scheduler.start());
    assert!(scheduler.is_running());

    // First tick fires immediately
    for _ in 0..100 {
        if !store.notifications().await.is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let stored = store.list_for_related(invoice.invoice_id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].is_sent);

    scheduler.stop();
    assert!(!scheduler.is_running());
    assert_eq!(sink.events().len(), 1);
}

#[tokio::test]
async fn scheduler_can_restart_after_shutdown() {
    let store = Arc::new(InMemoryStore::new());
    let sink = RecordingSink::new();
    let sweeper = Arc::new(sweeper_over(store.clone(), store.clone(), sink));
    let scheduler = ReminderScheduler::new(sweeper, std::time::Duration::from_millis(10));

    assert!(scheduler.start());
    scheduler.shutdown().await;
    assert!(!scheduler.is_running());

    assert!(scheduler.start());
    assert!(scheduler.is_running());
    scheduler.stop();
}
