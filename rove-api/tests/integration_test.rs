use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration as ChronoDuration, Utc};
use tower::ServiceExt;
use uuid::Uuid;

use rove_api::auth::issue_token;
use rove_api::state::AuthConfig;
use rove_api::{app, AppState};
use rove_booking::{
    Booking, BookingLedger, BookingRepository, BookingStatus, CreateBookingRequest,
    MockPaymentGateway, Participant, PaymentOrchestrator, ReconciliationListener, WebhookVerifier,
};
use rove_catalog::{
    Activity, ActivityPricing, Capacity, FeeSchedule, OccurrenceKey, Schedule, TimeSlot, Vendor,
};
use rove_core::identity::Caller;
use rove_core::payment::{PaymentSource, PaymentStatus};
use rove_rating::{ParticipantRating, RatingError, RatingGate, SubmitRatingRequest};
use rove_store::{EventBus, MemoryStore};
use rove_shared::pii::Masked;

struct Harness {
    store: Arc<MemoryStore>,
    ledger: Arc<BookingLedger>,
    orchestrator: Arc<PaymentOrchestrator>,
    gate: Arc<RatingGate>,
    verifier: Arc<WebhookVerifier>,
    state: AppState,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    let ledger = Arc::new(BookingLedger::new(
        store.clone(),
        store.clone(),
        FeeSchedule { platform_fee: 300, processing_fee: 150 },
    ));
    let orchestrator = Arc::new(PaymentOrchestrator::new(Arc::new(MockPaymentGateway)));
    let (listener, webhook_tx, webhook_rx) = ReconciliationListener::channel(
        ledger.clone(),
        orchestrator.clone(),
        3,
        Duration::from_millis(10),
    );
    tokio::spawn(listener.run(webhook_rx));

    let gate = Arc::new(RatingGate::new(store.clone(), ledger.clone()));
    let verifier = Arc::new(WebhookVerifier::new("whsec_test"));

    let state = AppState {
        ledger: ledger.clone(),
        orchestrator: orchestrator.clone(),
        rating_gate: gate.clone(),
        verifier: verifier.clone(),
        webhook_tx,
        events: EventBus::new(64),
        auth: AuthConfig { secret: "test-secret".to_string(), expiration: 3600 },
        gateway_timeout: Duration::from_secs(5),
    };

    Harness { store, ledger, orchestrator, gate, verifier, state }
}

async fn seed_activity(store: &MemoryStore, hours_ahead: i64, max: u32) -> (Activity, TimeSlot) {
    let starts = Utc::now() + ChronoDuration::hours(hours_ahead);
    let slot = TimeSlot {
        date: starts.date_naive(),
        start_time: starts.time(),
        end_time: (starts + ChronoDuration::hours(3)).time(),
    };
    let vendor = Vendor {
        id: Uuid::new_v4(),
        name: "Tidewater Tours".to_string(),
        is_active: true,
    };
    let activity = Activity {
        id: Uuid::new_v4(),
        vendor_id: vendor.id,
        title: "Coastal kayak tour".to_string(),
        capacity: Capacity { min: 1, max },
        schedule: Schedule::Fixed { slots: vec![slot] },
        blackout_dates: vec![],
        pricing: ActivityPricing {
            base_price: 4500,
            currency: "USD".to_string(),
            tax_rate: 0.1,
            discount: None,
        },
        cancellation_policy: Some("Free cancellation up to 48h before start".to_string()),
        is_active: true,
    };
    store.seed_activity(activity.clone(), vendor).await;
    (activity, slot)
}

fn participant(user_id: Option<Uuid>, name: &str) -> Participant {
    Participant {
        user_id,
        name: name.to_string(),
        contact: Masked(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
        requirements: None,
    }
}

fn card() -> PaymentSource {
    PaymentSource::Card {
        number: Masked("4242424242424242".to_string()),
        exp_month: 12,
        exp_year: 2028,
        cvc: Masked("123".to_string()),
    }
}

async fn pay(harness: &Harness, booking: &Booking, source: &PaymentSource) -> Booking {
    let charge = harness
        .orchestrator
        .initiate_payment(booking, source)
        .await
        .unwrap();
    harness
        .ledger
        .record_payment_initiated(booking.id, &charge, source.method())
        .await
        .unwrap();
    if charge.status != PaymentStatus::Pending {
        harness
            .ledger
            .apply_payment_status(booking.id, charge.status)
            .await
            .unwrap();
    }
    harness.ledger.get(booking.id).await.unwrap()
}

async fn wait_until<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_booking_to_rating_end_to_end() {
    let harness = harness();
    let (activity, slot) = seed_activity(&harness.store, 72, 10).await;

    let rater = Uuid::new_v4();
    let (friend_a, friend_b) = (Uuid::new_v4(), Uuid::new_v4());

    // create: two participants, 72h out
    let booking = harness
        .ledger
        .create_booking(CreateBookingRequest {
            user_id: rater,
            activity_id: activity.id,
            slot,
            participants: vec![
                participant(Some(friend_a), "Friend A"),
                participant(Some(friend_b), "Friend B"),
            ],
        })
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    // (4500 × 2) × 1.1 + 300 + 150
    assert_eq!(booking.pricing.total, 10350);

    // synchronous card payment confirms immediately
    let booking = pay(&harness, &booking, &card()).await;
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment.status, PaymentStatus::Paid);

    // after the event, the vendor marks it delivered
    let vendor = Caller::vendor(Uuid::new_v4(), activity.vendor_id);
    let booking = harness
        .ledger
        .update_status(booking.id, &vendor, BookingStatus::Completed)
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);

    // the rater scores both co-participants, the event and the partner
    let rating = harness
        .gate
        .submit(SubmitRatingRequest {
            rater_id: rater,
            occurrence: OccurrenceKey::new(activity.id, &slot),
            participant_ratings: vec![
                ParticipantRating { participant_user_id: friend_a, score: 5, comment: None },
                ParticipantRating { participant_user_id: friend_b, score: 4, comment: None },
            ],
            event_score: 5,
            partner_score: 4,
            feedback: Some("great paddling weather".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(rating.participant_ratings.len(), 2);

    // review sub-record landed on the completed booking
    let booking = harness.ledger.get(booking.id).await.unwrap();
    let review = booking.review.expect("review attached");
    assert_eq!(review.rating, 5);

    // community aggregates recomputed for both rated participants
    let a = harness.gate.community_rating(friend_a).await.unwrap();
    assert_eq!(a.average, 5.0);
    assert_eq!(a.total, 1);
    assert_eq!(a.distribution, [0, 0, 0, 0, 1]);

    let b = harness.gate.community_rating(friend_b).await.unwrap();
    assert_eq!(b.average, 4.0);
    assert_eq!(b.distribution, [0, 0, 0, 1, 0]);
}

#[tokio::test]
async fn test_concurrent_requests_never_overbook_a_slot() {
    let harness = harness();
    let (activity, slot) = seed_activity(&harness.store, 72, 10).await;

    let mut handles = Vec::new();
    for i in 0..12u32 {
        let ledger = harness.ledger.clone();
        let activity_id = activity.id;
        handles.push(tokio::spawn(async move {
            ledger
                .create_booking(CreateBookingRequest {
                    user_id: Uuid::new_v4(),
                    activity_id,
                    slot,
                    participants: vec![participant(None, &format!("Solo {}", i))],
                })
                .await
        }));
    }

    let mut accepted = 0;
    let mut slot_full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(rove_booking::LedgerError::Availability(
                rove_catalog::AvailabilityError::SlotFull { .. },
            )) => slot_full += 1,
            Err(other) => panic!("unexpected rejection: {:?}", other),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(slot_full, 2);

    let booked = harness
        .store
        .booked_participants(&OccurrenceKey::new(activity.id, &slot))
        .await
        .unwrap();
    assert_eq!(booked, 10);
}

#[tokio::test]
async fn test_webhook_confirms_pending_wallet_payment_idempotently() {
    let harness = harness();
    let (activity, slot) = seed_activity(&harness.store, 72, 10).await;
    let router = app(harness.state.clone());

    let booking = harness
        .ledger
        .create_booking(CreateBookingRequest {
            user_id: Uuid::new_v4(),
            activity_id: activity.id,
            slot,
            participants: vec![participant(None, "Wallet User")],
        })
        .await
        .unwrap();

    // mobile wallets settle asynchronously
    let wallet = PaymentSource::MobileWallet { msisdn: Masked("077123456".to_string()) };
    let booking = pay(&harness, &booking, &wallet).await;
    assert_eq!(booking.status, BookingStatus::Pending);
    let payment_id = booking.payment.gateway_payment_id.clone().unwrap();

    let body = serde_json::json!({
        "id": "evt_settle_1",
        "type": "payment.succeeded",
        "data": { "object": { "id": payment_id, "status": "succeeded", "amount": booking.pricing.total } }
    })
    .to_string();
    let signature = harness.verifier.sign(body.as_bytes());

    // tampered signature is rejected before any state change
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/webhooks/payments")
                .header("content-type", "application/json")
                .header("x-rove-signature", "deadbeef")
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        harness.ledger.get(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );

    // a properly signed delivery is accepted and applied off-path
    for _ in 0..3 {
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/webhooks/payments")
                    .header("content-type", "application/json")
                    .header("x-rove-signature", signature.clone())
                    .body(Body::from(body.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let ledger = harness.ledger.clone();
    let confirmed = wait_until(|| {
        let ledger = ledger.clone();
        let id = booking.id;
        async move { ledger.get(id).await.unwrap().status == BookingStatus::Confirmed }
    })
    .await;
    assert!(confirmed, "webhook never confirmed the booking");

    // replays changed nothing: one paid payment, still confirmed
    let booking = harness.ledger.get(booking.id).await.unwrap();
    assert_eq!(booking.payment.status, PaymentStatus::Paid);
    assert_eq!(booking.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_cancel_endpoint_refunds_paid_booking() {
    let harness = harness();
    let (activity, slot) = seed_activity(&harness.store, 72, 10).await;
    let router = app(harness.state.clone());

    let user = Uuid::new_v4();
    let booking = harness
        .ledger
        .create_booking(CreateBookingRequest {
            user_id: user,
            activity_id: activity.id,
            slot,
            participants: vec![participant(None, "Cancelling User")],
        })
        .await
        .unwrap();
    let booking = pay(&harness, &booking, &card()).await;
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let token = issue_token(&harness.state.auth, user, "CUSTOMER", None).unwrap();
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/bookings/{}/cancel", booking.id))
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from("{\"reason\":\"weather\"}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let booking = harness.ledger.get(booking.id).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(booking.payment.status, PaymentStatus::Refunded);
    let cancellation = booking.cancellation.unwrap();
    assert_eq!(cancellation.refund_amount, booking.pricing.total);
    assert!(cancellation.refund_processed);

    // a stranger cannot cancel someone else's booking
    let (activity, slot) = seed_activity(&harness.store, 72, 10).await;
    let other = harness
        .ledger
        .create_booking(CreateBookingRequest {
            user_id: Uuid::new_v4(),
            activity_id: activity.id,
            slot,
            participants: vec![participant(None, "Someone Else")],
        })
        .await
        .unwrap();
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/bookings/{}/cancel", other.id))
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rating_gate_rejections_in_order() {
    let harness = harness();
    let (activity, slot) = seed_activity(&harness.store, 72, 10).await;
    let occurrence = OccurrenceKey::new(activity.id, &slot);

    let rater = Uuid::new_v4();
    let (friend_a, friend_b) = (Uuid::new_v4(), Uuid::new_v4());

    // no qualifying booking yet
    let err = harness
        .gate
        .submit(SubmitRatingRequest {
            rater_id: rater,
            occurrence,
            participant_ratings: vec![],
            event_score: 5,
            partner_score: 5,
            feedback: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RatingError::NotAttended));

    let booking = harness
        .ledger
        .create_booking(CreateBookingRequest {
            user_id: rater,
            activity_id: activity.id,
            slot,
            participants: vec![
                participant(Some(friend_a), "Friend A"),
                participant(Some(friend_b), "Friend B"),
            ],
        })
        .await
        .unwrap();
    pay(&harness, &booking, &card()).await;

    let rate_both = |event_score: u8, scores: (u8, u8)| SubmitRatingRequest {
        rater_id: rater,
        occurrence,
        participant_ratings: vec![
            ParticipantRating { participant_user_id: friend_a, score: scores.0, comment: None },
            ParticipantRating { participant_user_id: friend_b, score: scores.1, comment: None },
        ],
        event_score,
        partner_score: 4,
        feedback: None,
    };

    // someone outside the attendee set
    let mut bad_target = rate_both(5, (5, 5));
    bad_target.participant_ratings[0].participant_user_id = Uuid::new_v4();
    assert!(matches!(
        harness.gate.submit(bad_target).await.unwrap_err(),
        RatingError::InvalidParticipant(_)
    ));

    // two other attendees exist, one rating is not enough
    let mut too_few = rate_both(5, (5, 5));
    too_few.participant_ratings.truncate(1);
    assert!(matches!(
        harness.gate.submit(too_few).await.unwrap_err(),
        RatingError::InsufficientParticipants { required: 2, provided: 1 }
    ));

    // out-of-range score
    assert!(matches!(
        harness.gate.submit(rate_both(6, (5, 5))).await.unwrap_err(),
        RatingError::OutOfRange
    ));
    assert!(matches!(
        harness.gate.submit(rate_both(5, (0, 5))).await.unwrap_err(),
        RatingError::OutOfRange
    ));

    // a valid submission, then a duplicate
    harness.gate.submit(rate_both(5, (5, 4))).await.unwrap();
    assert!(matches!(
        harness.gate.submit(rate_both(4, (4, 4))).await.unwrap_err(),
        RatingError::AlreadyRated
    ));
}

#[tokio::test]
async fn test_two_person_event_requires_single_participant_rating() {
    let harness = harness();
    let (activity, slot) = seed_activity(&harness.store, 72, 10).await;
    let rater = Uuid::new_v4();
    let only_friend = Uuid::new_v4();

    let booking = harness
        .ledger
        .create_booking(CreateBookingRequest {
            user_id: rater,
            activity_id: activity.id,
            slot,
            participants: vec![participant(Some(only_friend), "Only Friend")],
        })
        .await
        .unwrap();
    pay(&harness, &booking, &card()).await;

    // one other attendee → min(2, 1) = 1 rating required
    let rating = harness
        .gate
        .submit(SubmitRatingRequest {
            rater_id: rater,
            occurrence: OccurrenceKey::new(activity.id, &slot),
            participant_ratings: vec![ParticipantRating {
                participant_user_id: only_friend,
                score: 5,
                comment: None,
            }],
            event_score: 5,
            partner_score: 5,
            feedback: None,
        })
        .await
        .unwrap();
    assert_eq!(rating.participant_ratings.len(), 1);
}

#[tokio::test]
async fn test_community_rating_aggregate_across_events() {
    let harness = harness();
    let rated = Uuid::new_v4();
    let scores = [5u8, 5, 4];

    for score in scores {
        let (activity, slot) = seed_activity(&harness.store, 72, 10).await;
        let rater = Uuid::new_v4();
        let extra = Uuid::new_v4();
        let booking = harness
            .ledger
            .create_booking(CreateBookingRequest {
                user_id: rater,
                activity_id: activity.id,
                slot,
                participants: vec![
                    participant(Some(rated), "Rated User"),
                    participant(Some(extra), "Extra"),
                ],
            })
            .await
            .unwrap();
        pay(&harness, &booking, &card()).await;

        harness
            .gate
            .submit(SubmitRatingRequest {
                rater_id: rater,
                occurrence: OccurrenceKey::new(activity.id, &slot),
                participant_ratings: vec![
                    ParticipantRating { participant_user_id: rated, score, comment: None },
                    ParticipantRating { participant_user_id: extra, score: 3, comment: None },
                ],
                event_score: 4,
                partner_score: 4,
                feedback: None,
            })
            .await
            .unwrap();
    }

    let aggregate = harness.gate.community_rating(rated).await.unwrap();
    assert_eq!(aggregate.average, 4.67);
    assert_eq!(aggregate.total, 3);
    assert_eq!(aggregate.distribution, [0, 0, 0, 1, 2]);

    // a user nobody rated reads as empty
    let nobody = harness.gate.community_rating(Uuid::new_v4()).await.unwrap();
    assert_eq!(nobody.total, 0);
}
