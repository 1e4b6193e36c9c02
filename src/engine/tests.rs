use super::*;
use crate::contacts::ContactDraft;
use crate::limits::*;
use crate::revenue::DateRange;
use crate::schedule::SchedulePolicy;

const H: Minute = 60;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("slotdesk_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn new_engine(name: &str) -> Engine {
    Engine::new(test_wal_path(name), Arc::new(NotifyHub::new())).unwrap()
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn request(date: NaiveDate, start: Minute, staff: Option<Ulid>) -> NewReservation {
    NewReservation {
        date,
        start,
        end: None,
        customer: Customer {
            name: "Erika Muster".into(),
            phone: Some("+49 151 000000".into()),
            email: None,
        },
        party_size: 2,
        notes: None,
        source: "n8n".into(),
        staff_member_id: staff,
    }
}

async fn book(engine: &Engine, date: NaiveDate, start: Minute, staff: Option<Ulid>) -> Result<Reservation, EngineError> {
    engine
        .create_reservation(Ulid::new(), request(date, start, staff), &SchedulePolicy::default())
        .await
}

// ── Reservations ─────────────────────────────────────────

#[tokio::test]
async fn create_reservation_uses_default_slot_length() {
    let engine = new_engine("default_slot.wal");
    let r = book(&engine, day(14), 14 * H, None).await.unwrap();
    assert_eq!(r.span, Span::new(14 * H, 15 * H + 30));
    assert_eq!(r.status, ReservationStatus::Pending);
    assert_eq!(engine.reservations_on(day(14)).await.len(), 1);
}

#[tokio::test]
async fn overlapping_request_gets_alternatives() {
    let engine = new_engine("alternatives.wal");
    book(&engine, day(14), 14 * H, None).await.unwrap();

    let alternatives = match book(&engine, day(14), 14 * H + 30, None).await {
        Err(EngineError::SlotOccupied { alternatives }) => alternatives,
        other => panic!("expected SlotOccupied, got {other:?}"),
    };
    assert_eq!(
        alternatives,
        vec![11 * H, 11 * H + 30, 12 * H, 12 * H + 30, 15 * H + 30]
    );
    assert_eq!(engine.reservations_on(day(14)).await.len(), 1);
}

#[tokio::test]
async fn adjacent_booking_is_accepted() {
    let engine = new_engine("adjacent.wal");
    book(&engine, day(14), 14 * H, None).await.unwrap();
    book(&engine, day(14), 15 * H + 30, None).await.unwrap();
    book(&engine, day(14), 12 * H + 30, None).await.unwrap();
    assert_eq!(engine.reservations_on(day(14)).await.len(), 3);
}

#[tokio::test]
async fn other_days_do_not_conflict() {
    let engine = new_engine("other_days.wal");
    book(&engine, day(14), 18 * H, None).await.unwrap();
    book(&engine, day(15), 18 * H, None).await.unwrap();
    assert_eq!(engine.all_reservations().await.len(), 2);
}

#[tokio::test]
async fn explicit_end_time_is_stored() {
    let engine = new_engine("explicit_end.wal");
    let mut req = request(day(14), 18 * H, None);
    req.end = Some(18 * H + 45);
    let r = engine
        .create_reservation(Ulid::new(), req, &SchedulePolicy::default())
        .await
        .unwrap();
    assert_eq!(r.span, Span::new(18 * H, 18 * H + 45));
    // The short booking leaves 18:45 free.
    book(&engine, day(14), 18 * H + 45, None).await.unwrap();
}

#[tokio::test]
async fn short_end_time_does_not_shrink_the_checked_slot() {
    let engine = new_engine("short_end.wal");
    book(&engine, day(14), 15 * H, None).await.unwrap();

    let mut req = request(day(14), 14 * H, None);
    req.end = Some(14 * H + 45);
    let err = engine
        .create_reservation(Ulid::new(), req, &SchedulePolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotOccupied { .. }));
    assert_eq!(engine.reservations_on(day(14)).await.len(), 1);
}

#[tokio::test]
async fn end_time_before_start_books_one_slot() {
    let engine = new_engine("backwards_end.wal");
    let mut req = request(day(14), 14 * H, None);
    req.end = Some(13 * H);
    let r = engine
        .create_reservation(Ulid::new(), req, &SchedulePolicy::default())
        .await
        .unwrap();
    assert_eq!(r.span, Span::new(14 * H, 15 * H + 30));

    // The rest of the evening stays bookable.
    book(&engine, day(14), 19 * H, None).await.unwrap();
    book(&engine, day(14), 15 * H + 30, None).await.unwrap();
}

#[tokio::test]
async fn staff_bookings_only_conflict_with_same_staff() {
    let engine = new_engine("staff_filter.wal");
    let anna = engine.add_staff(Ulid::new(), "Anna".into(), true).await.unwrap();
    let ben = engine.add_staff(Ulid::new(), "Ben".into(), true).await.unwrap();

    book(&engine, day(14), 14 * H, Some(anna.id)).await.unwrap();
    book(&engine, day(14), 14 * H, Some(ben.id)).await.unwrap();
    let err = book(&engine, day(14), 14 * H + 30, Some(anna.id)).await.unwrap_err();
    assert!(matches!(err, EngineError::SlotOccupied { .. }));

    // Unassigned requests see every booking of the day.
    let err = book(&engine, day(14), 15 * H, None).await.unwrap_err();
    assert!(matches!(err, EngineError::SlotOccupied { .. }));
}

#[tokio::test]
async fn unknown_staff_is_rejected() {
    let engine = new_engine("unknown_staff.wal");
    let ghost = Ulid::new();
    let err = book(&engine, day(14), 14 * H, Some(ghost)).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(id) if id == ghost));
}

#[tokio::test]
async fn cancelled_bookings_free_the_slot() {
    let engine = new_engine("cancelled.wal");
    let policy = SchedulePolicy::default();
    let r = book(&engine, day(14), 14 * H, None).await.unwrap();
    let patch = ReservationPatch {
        status: Some(ReservationStatus::Cancelled),
        ..Default::default()
    };
    engine.update_reservation(r.id, patch, &policy).await.unwrap();

    let second = book(&engine, day(14), 14 * H, None).await.unwrap();

    // Reviving the cancelled one now collides with the replacement.
    let revive = ReservationPatch {
        status: Some(ReservationStatus::Confirmed),
        ..Default::default()
    };
    let err = engine.update_reservation(r.id, revive, &policy).await.unwrap_err();
    assert!(matches!(err, EngineError::SlotOccupied { .. }));
    assert_eq!(engine.get_reservation(second.id).await.unwrap().status, ReservationStatus::Pending);
}

#[tokio::test]
async fn concurrent_requests_for_one_slot_book_once() {
    let engine = Arc::new(new_engine("concurrent.wal"));
    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move { book(&engine, day(20), 19 * H, None).await }));
    }

    let mut created = 0;
    let mut occupied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(EngineError::SlotOccupied { .. }) => occupied += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(occupied, 15);
    assert_eq!(engine.reservations_on(day(20)).await.len(), 1);
}

#[tokio::test]
async fn update_reservation_sets_and_clears_pricing() {
    let engine = new_engine("pricing.wal");
    let policy = SchedulePolicy::default();
    let menu = engine.add_product(Ulid::new(), "Menü".into(), 2_000).await.unwrap();
    let r = book(&engine, day(14), 12 * H, None).await.unwrap();

    let updated = engine
        .update_reservation(
            r.id,
            ReservationPatch {
                status: Some(ReservationStatus::Completed),
                price_paid: Some(Some(4_500)),
                product_id: Some(Some(menu.id)),
            },
            &policy,
        )
        .await
        .unwrap();
    assert_eq!(updated.price_paid, Some(4_500));
    assert_eq!(updated.product_id, Some(menu.id));

    let cleared = engine
        .update_reservation(
            r.id,
            ReservationPatch {
                price_paid: Some(None),
                ..Default::default()
            },
            &policy,
        )
        .await
        .unwrap();
    assert_eq!(cleared.price_paid, None);
    assert_eq!(cleared.product_id, Some(menu.id));
    assert_eq!(cleared.status, ReservationStatus::Completed);

    let err = engine
        .update_reservation(
            r.id,
            ReservationPatch {
                product_id: Some(Some(Ulid::new())),
                ..Default::default()
            },
            &policy,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(matches!(
        engine
            .update_reservation(Ulid::new(), ReservationPatch::default(), &policy)
            .await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn revenue_uses_product_price_times_party_size() {
    let engine = new_engine("revenue.wal");
    let policy = SchedulePolicy::default();
    let menu = engine.add_product(Ulid::new(), "Menü".into(), 2_000).await.unwrap();
    let today = chrono::Local::now().date_naive();

    let mut req = request(today, 12 * H, None);
    req.party_size = 3;
    let r = engine.create_reservation(Ulid::new(), req, &policy).await.unwrap();
    engine
        .update_reservation(
            r.id,
            ReservationPatch {
                status: Some(ReservationStatus::Completed),
                product_id: Some(Some(menu.id)),
                ..Default::default()
            },
            &policy,
        )
        .await
        .unwrap();

    let stats = engine.revenue(today, DateRange::Today).await;
    assert_eq!(stats.total_revenue, 6_000);
    assert_eq!(stats.today_revenue, 6_000);
    assert_eq!(stats.today_reservation_count, 3);
}

#[tokio::test]
async fn free_windows_exclude_bookings() {
    let engine = new_engine("free_windows.wal");
    book(&engine, day(14), 14 * H, None).await.unwrap();
    let windows = engine.free_windows(day(14), None, &SchedulePolicy::default()).await;
    assert_eq!(
        windows,
        vec![Span::new(11 * H, 14 * H), Span::new(15 * H + 30, 22 * H)]
    );
    let empty_day = engine.free_windows(day(15), None, &SchedulePolicy::default()).await;
    assert_eq!(empty_day, vec![Span::new(11 * H, 22 * H)]);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let engine = new_engine("invalid.wal");
    let mut req = request(day(14), 12 * H, None);
    req.customer.name = "   ".into();
    let err = engine
        .create_reservation(Ulid::new(), req, &SchedulePolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Invalid(_)));

    let mut req = request(day(14), 12 * H, None);
    req.party_size = MAX_PARTY_SIZE + 1;
    let err = engine
        .create_reservation(Ulid::new(), req, &SchedulePolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LimitExceeded(_)));

    let mut req = request(day(14), 12 * H, None);
    req.party_size = 0;
    let r = engine
        .create_reservation(Ulid::new(), req, &SchedulePolicy::default())
        .await
        .unwrap();
    assert_eq!(r.party_size, 1);
}

// ── Staff & products ─────────────────────────────────────

#[tokio::test]
async fn inactive_staff_is_not_offered() {
    let engine = new_engine("inactive_staff.wal");
    let anna = engine.add_staff(Ulid::new(), " Anna ".into(), true).await.unwrap();
    assert_eq!(anna.name, "Anna");
    engine.add_staff(Ulid::new(), "Ben".into(), true).await.unwrap();
    engine.update_staff(anna.id, None, Some(false)).await.unwrap();

    let active: Vec<String> = engine.active_staff().into_iter().map(|s| s.name).collect();
    assert_eq!(active, vec!["Ben".to_string()]);
    assert_eq!(engine.list_staff().len(), 2);
    assert!(!engine.get_staff(&anna.id).unwrap().active);
}

#[tokio::test]
async fn product_validation() {
    let engine = new_engine("products.wal");
    assert!(matches!(
        engine.add_product(Ulid::new(), "Gratis".into(), -1).await,
        Err(EngineError::Invalid(_))
    ));
    assert!(matches!(
        engine.add_product(Ulid::new(), " ".into(), 100).await,
        Err(EngineError::Invalid(_))
    ));
    let p = engine.add_product(Ulid::new(), "Menü".into(), 2_000).await.unwrap();
    assert_eq!(engine.price_table().get(&p.id), Some(&2_000));
}

// ── Contacts ─────────────────────────────────────────────

fn draft(name: &str, phone: Option<&str>) -> ContactDraft {
    ContactDraft {
        name: name.into(),
        phone: phone.map(String::from),
        ..Default::default()
    }
}

#[tokio::test]
async fn import_contacts_in_batches() {
    let engine = new_engine("contacts_batches.wal");
    let drafts: Vec<ContactDraft> = (0..IMPORT_BATCH_SIZE * 2 + 5)
        .map(|i| draft(&format!("Kunde {i:03}"), None))
        .collect();
    let report = engine.import_contacts(drafts).await;
    assert_eq!(report.success, IMPORT_BATCH_SIZE * 2 + 5);
    assert_eq!(report.failed, 0);
    assert!(report.errors.is_empty());

    let (total, page) = engine.contact_page(None);
    assert_eq!(total, IMPORT_BATCH_SIZE * 2 + 5);
    assert_eq!(page.len(), CONTACT_PAGE_SIZE);
    assert_eq!(page[0].name, "Kunde 000");
}

#[tokio::test]
async fn failing_batch_is_reported_and_others_stored() {
    let engine = new_engine("contacts_failed_batch.wal");
    let mut drafts: Vec<ContactDraft> = (0..IMPORT_BATCH_SIZE + 1)
        .map(|i| draft(&format!("Kunde {i}"), None))
        .collect();
    drafts[3].info = Some("x".repeat(MAX_NOTES_LEN + 1));

    let report = engine.import_contacts(drafts).await;
    assert_eq!(report.success, 1);
    assert_eq!(report.failed, IMPORT_BATCH_SIZE);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Batch 1: "));
}

#[tokio::test]
async fn contact_search_and_clear() {
    let engine = new_engine("contacts_search.wal");
    engine
        .import_contacts(vec![
            draft("Erika Muster", Some("0151 111")),
            draft("Max Beispiel", Some("0160 222")),
            draft("Anna Schmidt", None),
        ])
        .await;

    let (total, page) = engine.contact_page(Some("MUSTER"));
    assert_eq!(total, 1);
    assert_eq!(page[0].name, "Erika Muster");
    let (total, _) = engine.contact_page(Some("0160"));
    assert_eq!(total, 1);

    let today = chrono::Local::now().date_naive();
    let counts = engine.contact_counts(today);
    assert_eq!(counts.total, 3);
    assert_eq!(counts.created_today, 3);

    assert_eq!(engine.clear_contacts().await.unwrap(), 3);
    assert_eq!(engine.contact_page(None).0, 0);
}

// ── Appointments ─────────────────────────────────────────

fn appointment(title: &str, start: Ms) -> Appointment {
    Appointment {
        id: Ulid::new(),
        title: title.into(),
        description: None,
        start,
        end: start + 3_600_000,
        location: None,
        status: "pending".into(),
        metadata: "{}".into(),
    }
}

#[tokio::test]
async fn appointment_lifecycle() {
    let engine = new_engine("appointments.wal");
    let a = engine.save_appointment(appointment("Beratung", 2_000_000)).await.unwrap();
    engine.save_appointment(appointment("Abholung", 1_000_000)).await.unwrap();

    let updated = engine
        .update_appointment(
            a.id,
            AppointmentPatch {
                status: Some("confirmed".into()),
                location: Some("Laden".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, "confirmed");
    assert_eq!(updated.title, "Beratung");
    assert_eq!(updated.location.as_deref(), Some("Laden"));

    let all = engine.list_appointments(&AppointmentFilter::default());
    assert_eq!(all.iter().map(|a| a.title.as_str()).collect::<Vec<_>>(), vec!["Abholung", "Beratung"]);

    let confirmed = engine.list_appointments(&AppointmentFilter {
        status: Some("confirmed".into()),
        ..Default::default()
    });
    assert_eq!(confirmed.len(), 1);
    let late = engine.list_appointments(&AppointmentFilter {
        from: Some(1_500_000),
        ..Default::default()
    });
    assert_eq!(late.len(), 1);

    engine.delete_appointment(a.id).await.unwrap();
    assert!(engine.get_appointment(&a.id).is_none());
    assert!(matches!(engine.delete_appointment(a.id).await, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn appointment_validation() {
    let engine = new_engine("appointment_validation.wal");
    let mut backwards = appointment("Rückwärts", 5_000_000);
    backwards.end = 1_000_000;
    assert!(matches!(engine.save_appointment(backwards).await, Err(EngineError::Invalid(_))));

    let batch: Vec<Appointment> = (0..MAX_SYNC_BATCH + 1)
        .map(|i| appointment("Sync", i as Ms))
        .collect();
    assert!(matches!(
        engine.sync_appointments(batch).await,
        Err(EngineError::LimitExceeded(_))
    ));
}

#[tokio::test]
async fn sync_upserts_by_id() {
    let engine = new_engine("appointment_sync.wal");
    let existing = engine.save_appointment(appointment("Alt", 1_000)).await.unwrap();
    let mut renamed = existing.clone();
    renamed.title = "Neu".into();

    let synced = engine
        .sync_appointments(vec![renamed, appointment("Zusatz", 2_000)])
        .await
        .unwrap();
    assert_eq!(synced, 2);
    assert_eq!(engine.get_appointment(&existing.id).unwrap().title, "Neu");
    assert_eq!(engine.list_appointments(&AppointmentFilter::default()).len(), 2);
}

#[tokio::test]
async fn sync_with_one_bad_entry_stores_nothing() {
    let path = test_wal_path("appointment_sync_atomic.wal");
    {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        let existing = engine.save_appointment(appointment("Alt", 1_000)).await.unwrap();
        let mut renamed = existing.clone();
        renamed.title = "Neu".into();
        let mut backwards = appointment("Rückwärts", 5_000_000);
        backwards.end = 1_000_000;

        let err = engine
            .sync_appointments(vec![renamed, appointment("Zusatz", 2_000), backwards])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Invalid(_)));
        assert_eq!(engine.list_appointments(&AppointmentFilter::default()).len(), 1);
        assert_eq!(engine.get_appointment(&existing.id).unwrap().title, "Alt");
    }

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    let all = engine.list_appointments(&AppointmentFilter::default());
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Alt");
}

#[tokio::test]
async fn synced_batch_survives_replay() {
    let path = test_wal_path("appointment_sync_replay.wal");
    {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        let synced = engine
            .sync_appointments(vec![appointment("Eins", 1_000), appointment("Zwei", 2_000)])
            .await
            .unwrap();
        assert_eq!(synced, 2);
    }
    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(engine.list_appointments(&AppointmentFilter::default()).len(), 2);
}

// ── Notifications ────────────────────────────────────────

#[tokio::test]
async fn notifications_are_broadcast_and_listed_newest_first() {
    let engine = new_engine("notifications.wal");
    let mut rx = engine.notify.subscribe();

    engine
        .post_notification("Neue Reservierung", "erste".into(), "/portal/reservations")
        .await
        .unwrap();
    engine
        .post_notification("Neue Reservierung", "zweite".into(), "/portal/reservations")
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap().message, "erste");
    assert_eq!(rx.recv().await.unwrap().message, "zweite");

    let recent = engine.recent_notifications(10);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].message, "zweite");
    assert_eq!(recent[0].kind, "info");
}

#[tokio::test]
async fn notifications_are_capped() {
    let engine = new_engine("notifications_cap.wal");
    for i in 0..MAX_NOTIFICATIONS_KEPT + 5 {
        engine
            .post_notification("Hinweis", format!("#{i}"), "/portal")
            .await
            .unwrap();
    }
    let kept = engine.recent_notifications(usize::MAX);
    assert_eq!(kept.len(), MAX_NOTIFICATIONS_KEPT);
    assert_eq!(kept.last().unwrap().message, "#5");
}

// ── Persistence ──────────────────────────────────────────

#[tokio::test]
async fn wal_replay_restores_state() {
    let path = test_wal_path("replay.wal");
    let policy = SchedulePolicy::default();
    let (staff_id, booking_id, appointment_id) = {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        let anna = engine.add_staff(Ulid::new(), "Anna".into(), true).await.unwrap();
        let r = book(&engine, day(14), 14 * H, Some(anna.id)).await.unwrap();
        engine
            .update_reservation(
                r.id,
                ReservationPatch {
                    status: Some(ReservationStatus::Confirmed),
                    price_paid: Some(Some(3_000)),
                    ..Default::default()
                },
                &policy,
            )
            .await
            .unwrap();
        engine.import_contacts(vec![draft("Erika Muster", None)]).await;
        let a = engine.save_appointment(appointment("Beratung", 1_000)).await.unwrap();
        engine.post_notification("Hinweis", "hallo".into(), "/portal").await.unwrap();
        (anna.id, r.id, a.id)
    };

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    let r = engine.get_reservation(booking_id).await.unwrap();
    assert_eq!(r.status, ReservationStatus::Confirmed);
    assert_eq!(r.price_paid, Some(3_000));
    assert_eq!(r.staff_member_id, Some(staff_id));
    assert_eq!(engine.get_staff(&staff_id).unwrap().name, "Anna");
    assert_eq!(engine.contact_page(None).0, 1);
    assert!(engine.get_appointment(&appointment_id).is_some());
    assert_eq!(engine.recent_notifications(10).len(), 1);

    // The replayed booking still blocks its slot.
    let err = book(&engine, day(14), 14 * H, Some(staff_id)).await.unwrap_err();
    assert!(matches!(err, EngineError::SlotOccupied { .. }));
}

#[tokio::test]
async fn compaction_preserves_state() {
    let path = test_wal_path("compaction.wal");
    let policy = SchedulePolicy::default();
    {
        let engine = Engine::new(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        let anna = engine.add_staff(Ulid::new(), "Anna".into(), true).await.unwrap();
        engine.update_staff(anna.id, Some("Anna K.".into()), None).await.unwrap();
        let r = book(&engine, day(14), 11 * H, None).await.unwrap();
        for status in [ReservationStatus::Confirmed, ReservationStatus::Completed] {
            engine
                .update_reservation(
                    r.id,
                    ReservationPatch {
                        status: Some(status),
                        ..Default::default()
                    },
                    &policy,
                )
                .await
                .unwrap();
        }
        engine.import_contacts(vec![draft("Erika Muster", None)]).await;
        engine.clear_contacts().await.unwrap();
        engine.import_contacts(vec![draft("Max Beispiel", None)]).await;
        let gone = engine.save_appointment(appointment("Weg", 1_000)).await.unwrap();
        engine.delete_appointment(gone.id).await.unwrap();

        assert!(engine.wal_appends_since_compact().await >= 9);
        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);

        // Appends after compaction land in the new file.
        book(&engine, day(15), 12 * H, None).await.unwrap();
    }

    let engine = Engine::new(path, Arc::new(NotifyHub::new())).unwrap();
    assert_eq!(engine.list_staff()[0].name, "Anna K.");
    let day14 = engine.reservations_on(day(14)).await;
    assert_eq!(day14.len(), 1);
    assert_eq!(day14[0].status, ReservationStatus::Completed);
    assert_eq!(engine.reservations_on(day(15)).await.len(), 1);
    let (total, contacts) = engine.contact_page(None);
    assert_eq!(total, 1);
    assert_eq!(contacts[0].name, "Max Beispiel");
    assert!(engine.list_appointments(&AppointmentFilter::default()).is_empty());
}
