//! Alert engine behaviour over time, driven by a manual clock.

mod common;

use chrono::Duration;
use serde_json::json;
use std::sync::Arc;

use common::{at, co2, occupancy, verdict, FlakyAlerts, Harness, HoursUnavailable};
use office_monitor::alerts::{AlertStore, Phase};
use office_monitor::context::{OfficeHours, Reservation, SiteContext};
use office_monitor::telemetry::TelemetryReading;
use office_monitor::{AlertKind, AlertStatus, Verdict};

const OFFICE: &str = "OFFICE_1";

#[tokio::test]
async fn test_co2_opens_after_five_minutes_without_duplicates() {
    let h = Harness::new();
    h.configure_device(OFFICE).await;

    let reports = h.send(OFFICE, 0, co2(1200.0)).await;
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Pending);
    assert_eq!(verdict(&reports, AlertKind::OccupancyMax), &Verdict::Skipped);

    let reports = h.send(OFFICE, 4, co2(1250.0)).await;
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Pending);
    assert!(h.active(OFFICE).await.is_empty());

    let reports = h.send(OFFICE, 5, co2(1300.0)).await;
    let Verdict::Opened(alert) = verdict(&reports, AlertKind::Co2) else {
        panic!("expected the alert to open at five minutes");
    };
    assert_eq!(alert.started_at, at(5));
    assert_eq!(alert.meta["co2_ppm"], json!(1300.0));
    assert_eq!(alert.meta["threshold"], json!(900));

    let reports = h.send(OFFICE, 6, co2(1300.0)).await;
    assert!(matches!(verdict(&reports, AlertKind::Co2), Verdict::StillOpen(_)));

    assert_eq!(h.active(OFFICE).await.len(), 1);
    assert_eq!(h.sink.count("alert_opened"), 1);
}

#[tokio::test]
async fn test_normal_reading_restarts_the_anomaly_streak() {
    let h = Harness::new();
    h.configure_device(OFFICE).await;

    h.send(OFFICE, 0, co2(1200.0)).await;
    h.send(OFFICE, 3, co2(850.0)).await;
    h.send(OFFICE, 4, co2(1200.0)).await;

    let reports = h.send(OFFICE, 8, co2(1200.0)).await;
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Pending);

    let reports = h.send(OFFICE, 9, co2(1200.0)).await;
    assert!(matches!(verdict(&reports, AlertKind::Co2), Verdict::Opened(_)));
}

#[tokio::test]
async fn test_co2_resolves_after_two_minutes_exactly_once() {
    let h = Harness::new();
    h.configure_device(OFFICE).await;
    h.send(OFFICE, 0, co2(1200.0)).await;
    h.send(OFFICE, 5, co2(1200.0)).await;

    let reports = h.send(OFFICE, 6, co2(700.0)).await;
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Normal);
    let snapshot = h.engine.registry().snapshot(OFFICE, AlertKind::Co2).await.unwrap();
    assert_eq!(snapshot.phase(), Phase::Recovering);

    let reports = h.send(OFFICE, 7, co2(700.0)).await;
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Normal);

    let reports = h.send(OFFICE, 8, co2(700.0)).await;
    let Verdict::Resolved(alert) = verdict(&reports, AlertKind::Co2) else {
        panic!("expected the alert to resolve after two normal minutes");
    };
    assert_eq!(alert.status, AlertStatus::Resolved);
    assert_eq!(alert.resolved_at, Some(at(8)));

    for minute in [9, 12, 20] {
        let reports = h.send(OFFICE, minute, co2(700.0)).await;
        assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Normal);
    }

    assert!(h.active(OFFICE).await.is_empty());
    assert_eq!(h.sink.count("alert_resolved"), 1);
    let history = h.store.alert_history(OFFICE).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, AlertStatus::Resolved);
}

#[tokio::test]
async fn test_anomaly_during_recovery_keeps_alert_open() {
    let h = Harness::new();
    h.configure_device(OFFICE).await;
    h.send(OFFICE, 0, co2(1200.0)).await;
    h.send(OFFICE, 5, co2(1200.0)).await;

    h.send(OFFICE, 6, co2(700.0)).await;
    let reports = h.send(OFFICE, 7, co2(1100.0)).await;
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Pending);
    assert_eq!(h.active(OFFICE).await.len(), 1);

    let snapshot = h.engine.registry().snapshot(OFFICE, AlertKind::Co2).await.unwrap();
    assert_eq!(snapshot.phase(), Phase::Open);
    assert_eq!(snapshot.anomaly_since, Some(at(7)));
    assert_eq!(snapshot.normal_since, None);

    h.send(OFFICE, 8, co2(700.0)).await;
    let reports = h.send(OFFICE, 9, co2(700.0)).await;
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Normal);

    let reports = h.send(OFFICE, 10, co2(700.0)).await;
    assert!(matches!(verdict(&reports, AlertKind::Co2), Verdict::Resolved(_)));
}

#[tokio::test]
async fn test_repeat_open_keeps_started_at_and_refreshes_meta() {
    let h = Harness::new();
    h.configure_device(OFFICE).await;
    h.send(OFFICE, 0, co2(1200.0)).await;

    let reports = h.send(OFFICE, 5, co2(1200.0)).await;
    let Verdict::Opened(opened) = verdict(&reports, AlertKind::Co2).clone() else {
        panic!("expected an open");
    };

    let reports = h.send(OFFICE, 10, co2(1500.0)).await;
    let Verdict::StillOpen(current) = verdict(&reports, AlertKind::Co2) else {
        panic!("expected the existing alert");
    };
    assert_eq!(current.id, opened.id);
    assert_eq!(current.started_at, at(5));
    assert_eq!(current.meta["co2_ppm"], json!(1500.0));
    assert_eq!(current.updated_at, at(10));
}

#[tokio::test]
async fn test_co2_without_desired_config_is_skipped() {
    let h = Harness::new();

    for minute in [0, 5, 10] {
        let reports = h.send(OFFICE, minute, co2(5000.0)).await;
        assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Skipped);
    }
    assert!(h.engine.registry().is_empty().await);
}

#[tokio::test]
async fn test_occupancy_over_capacity() {
    let h = Harness::new();
    h.add_space(OFFICE, 4).await;

    let reports = h.send(OFFICE, 0, occupancy(6)).await;
    assert_eq!(verdict(&reports, AlertKind::OccupancyMax), &Verdict::Pending);
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Skipped);

    let reports = h.send(OFFICE, 1, occupancy(6)).await;
    assert_eq!(verdict(&reports, AlertKind::OccupancyMax), &Verdict::Pending);

    let reports = h.send(OFFICE, 2, occupancy(7)).await;
    let Verdict::Opened(alert) = verdict(&reports, AlertKind::OccupancyMax) else {
        panic!("expected an over-capacity alert after two minutes");
    };
    assert_eq!(alert.meta["occupancy"], json!(7));
    assert_eq!(alert.meta["capacity"], json!(4));

    let reports = h.send(OFFICE, 3, occupancy(4)).await;
    assert_eq!(verdict(&reports, AlertKind::OccupancyMax), &Verdict::Normal);
    let reports = h.send(OFFICE, 4, occupancy(4)).await;
    assert!(matches!(
        verdict(&reports, AlertKind::OccupancyMax),
        Verdict::Resolved(_)
    ));
}

#[tokio::test]
async fn test_occupancy_outside_hours_and_instant_clear() {
    let h = Harness::new();
    h.add_space(OFFICE, 10).await;
    // t0 is 12:00 UTC.
    h.store
        .set_office_hours(OFFICE, OfficeHours::parse("09:00", "11:00", "UTC").unwrap())
        .await;

    for minute in [0, 5, 9] {
        let reports = h.send(OFFICE, minute, occupancy(2)).await;
        assert_eq!(verdict(&reports, AlertKind::OccupancyUnexpected), &Verdict::Pending);
    }

    let reports = h.send(OFFICE, 10, occupancy(2)).await;
    let Verdict::Opened(alert) = verdict(&reports, AlertKind::OccupancyUnexpected) else {
        panic!("expected an unexpected-occupancy alert after ten minutes");
    };
    assert_eq!(alert.meta["reason"], json!("outside_business_hours"));
    assert_eq!(alert.meta["within_business_hours"], json!(false));
    assert!(!alert.meta.contains_key("has_active_reservation"));

    // An empty room clears at once, without the five minute window.
    let reports = h.send(OFFICE, 11, occupancy(0)).await;
    assert!(matches!(
        verdict(&reports, AlertKind::OccupancyUnexpected),
        Verdict::Resolved(_)
    ));
    assert!(h.active(OFFICE).await.is_empty());
}

#[tokio::test]
async fn test_occupancy_without_reservation_during_hours() {
    let h = Harness::new();
    let space_id = h.add_space(OFFICE, 10).await;

    h.send(OFFICE, 0, occupancy(3)).await;
    let reports = h.send(OFFICE, 10, occupancy(3)).await;
    let Verdict::Opened(alert) = verdict(&reports, AlertKind::OccupancyUnexpected) else {
        panic!("expected an alert for an unbooked room");
    };
    assert_eq!(alert.meta["reason"], json!("no_active_reservation"));
    assert_eq!(alert.meta["within_business_hours"], json!(true));
    assert_eq!(alert.meta["has_active_reservation"], json!(false));

    // A booking made late turns the readings normal; resolve waits five minutes.
    h.store
        .add_reservation(Reservation {
            id: "r-late".to_string(),
            space_id,
            starts_at: at(11),
            ends_at: at(60),
        })
        .await;

    let reports = h.send(OFFICE, 11, occupancy(3)).await;
    assert_eq!(verdict(&reports, AlertKind::OccupancyUnexpected), &Verdict::Normal);
    let reports = h.send(OFFICE, 15, occupancy(3)).await;
    assert_eq!(verdict(&reports, AlertKind::OccupancyUnexpected), &Verdict::Normal);
    let reports = h.send(OFFICE, 16, occupancy(3)).await;
    assert!(matches!(
        verdict(&reports, AlertKind::OccupancyUnexpected),
        Verdict::Resolved(_)
    ));
}

#[tokio::test]
async fn test_booked_room_during_hours_never_alerts() {
    let h = Harness::new();
    let space_id = h.add_space(OFFICE, 10).await;
    h.store
        .add_reservation(Reservation {
            id: "r-1".to_string(),
            space_id: space_id.clone(),
            starts_at: at(-30),
            ends_at: at(90),
        })
        .await;
    assert!(h.store.has_active_reservation(&space_id, at(0)).await.unwrap());

    for minute in (0..=30).step_by(5) {
        let reports = h.send(OFFICE, minute, occupancy(5)).await;
        assert_eq!(verdict(&reports, AlertKind::OccupancyUnexpected), &Verdict::Normal);
    }
    assert!(h.active(OFFICE).await.is_empty());
}

#[tokio::test]
async fn test_offices_are_tracked_independently() {
    let h = Harness::new();
    h.configure_device("OFFICE_1").await;
    h.configure_device("OFFICE_2").await;

    h.send("OFFICE_1", 0, co2(1200.0)).await;
    h.send("OFFICE_2", 0, co2(600.0)).await;
    h.send("OFFICE_2", 3, co2(1200.0)).await;

    let reports = h.send("OFFICE_1", 5, co2(1200.0)).await;
    assert!(matches!(verdict(&reports, AlertKind::Co2), Verdict::Opened(_)));

    let reports = h.send("OFFICE_2", 5, co2(1200.0)).await;
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Pending);

    assert_eq!(h.active("OFFICE_1").await.len(), 1);
    assert!(h.active("OFFICE_2").await.is_empty());
}

#[tokio::test]
async fn test_concurrent_readings_open_a_single_alert() {
    let h = Harness::new();
    h.configure_device(OFFICE).await;
    h.send(OFFICE, 0, co2(1200.0)).await;
    h.clock.set(at(5));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&h.engine);
            tokio::spawn(async move { engine.process(OFFICE, &co2(1200.0 + f64::from(i))).await })
        })
        .collect();

    let mut opened = 0;
    let mut still_open = 0;
    for handle in handles {
        let reports = handle.await.unwrap();
        match verdict(&reports, AlertKind::Co2) {
            Verdict::Opened(_) => opened += 1,
            Verdict::StillOpen(_) => still_open += 1,
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    assert_eq!(opened, 1);
    assert_eq!(still_open, 7);
    assert_eq!(h.store.alert_history(OFFICE).await.len(), 1);
    assert_eq!(h.sink.count("alert_opened"), 1);
}

#[tokio::test]
async fn test_failed_lookup_only_affects_its_detector() {
    let h = Harness::wrapped(|store| {
        let site = Arc::new(HoursUnavailable { inner: store.clone() });
        (store as Arc<dyn AlertStore>, site as Arc<dyn SiteContext>)
    });
    h.configure_device(OFFICE).await;
    h.add_space(OFFICE, 4).await;

    let reading = TelemetryReading {
        co2_ppm: Some(1200.0),
        occupancy: Some(6),
        ts: None,
    };

    let reports = h.send(OFFICE, 0, reading.clone()).await;
    assert!(matches!(
        verdict(&reports, AlertKind::OccupancyUnexpected),
        Verdict::Degraded(_)
    ));
    assert_eq!(verdict(&reports, AlertKind::Co2), &Verdict::Pending);
    assert_eq!(verdict(&reports, AlertKind::OccupancyMax), &Verdict::Pending);

    let reports = h.send(OFFICE, 5, reading).await;
    assert!(matches!(verdict(&reports, AlertKind::Co2), Verdict::Opened(_)));
    assert!(matches!(verdict(&reports, AlertKind::OccupancyMax), Verdict::Opened(_)));
    assert!(matches!(
        verdict(&reports, AlertKind::OccupancyUnexpected),
        Verdict::Degraded(_)
    ));
    assert!(h
        .engine
        .registry()
        .snapshot(OFFICE, AlertKind::OccupancyUnexpected)
        .await
        .is_none());
}

#[tokio::test]
async fn test_store_failure_keeps_timers_and_recovers() {
    let mut flaky = None;
    let h = Harness::wrapped(|store| {
        let alerts = Arc::new(FlakyAlerts::new(store.clone()));
        flaky = Some(Arc::clone(&alerts));
        (alerts as Arc<dyn AlertStore>, store as Arc<dyn SiteContext>)
    });
    let flaky = flaky.unwrap();
    h.configure_device(OFFICE).await;

    h.send(OFFICE, 0, co2(1200.0)).await;
    flaky.set_failing(true);

    let reports = h.send(OFFICE, 5, co2(1200.0)).await;
    assert!(matches!(verdict(&reports, AlertKind::Co2), Verdict::Degraded(_)));
    assert!(h.active(OFFICE).await.is_empty());
    assert_eq!(h.sink.count("alert_opened"), 0);

    let snapshot = h.engine.registry().snapshot(OFFICE, AlertKind::Co2).await.unwrap();
    assert_eq!(snapshot.anomaly_since, Some(at(0)));

    flaky.set_failing(false);
    let reports = h.send(OFFICE, 6, co2(1200.0)).await;
    let Verdict::Opened(alert) = verdict(&reports, AlertKind::Co2) else {
        panic!("expected the alert to open once the store is back");
    };
    assert_eq!(alert.started_at, at(6));
    assert_eq!(h.sink.count("alert_opened"), 1);
}

#[tokio::test]
async fn test_sweep_drops_idle_tracking_state() {
    let h = Harness::new();
    h.configure_device("OFFICE_1").await;
    h.configure_device("OFFICE_2").await;

    h.send("OFFICE_1", 0, co2(1200.0)).await;
    h.send("OFFICE_2", 23 * 60, co2(1200.0)).await;
    assert_eq!(h.engine.registry().len().await, 2);

    let evicted = h
        .engine
        .registry()
        .sweep_idle(at(25 * 60), Duration::hours(24))
        .await;

    assert_eq!(evicted, 1);
    assert!(h.engine.registry().snapshot("OFFICE_1", AlertKind::Co2).await.is_none());
    assert!(h.engine.registry().snapshot("OFFICE_2", AlertKind::Co2).await.is_some());
}
