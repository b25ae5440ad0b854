use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use rove_catalog::{availability, pricing, ActivityDirectory, AvailabilityError, FeeSchedule, OccurrenceKey, TimeSlot};
use rove_core::identity::Caller;
use rove_core::payment::{Charge, PaymentStatus};
use rove_core::repository::StoreError;

use crate::models::{Booking, BookingStatus, CancellationRecord, Participant, ReviewRecord};
use crate::policy::{self, PolicyError};
use crate::repository::BookingRepository;

/// Compare-and-swap updates retry this many times before surfacing the
/// conflict to the caller.
const MAX_CAS_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Booking not found")]
    NotFound,

    #[error("Activity not found")]
    ActivityNotFound,

    #[error("Vendor or activity is not active")]
    Inactive,

    #[error("Booking date is in the past")]
    PastDate,

    #[error(transparent)]
    Availability(#[from] AvailabilityError),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("Booking is already terminal ({status})")]
    AlreadyTerminal {
        status: String,
    },

    #[error("Booking can no longer be cancelled ({hours_before_start}h before start)")]
    NotCancellable {
        hours_before_start: i64,
    },

    #[error("Caller is not allowed to perform this operation")]
    Unauthorized,

    #[error("Booking is not awaiting payment")]
    BookingNotPending,

    #[error("Review can only be attached once, to a completed booking")]
    ReviewRejected,

    #[error("Concurrent update lost the race, retry with fresh data")]
    Conflict,

    #[error("Storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => LedgerError::NotFound,
            StoreError::SlotFull { requested, remaining } => {
                LedgerError::Availability(AvailabilityError::SlotFull { requested, remaining })
            }
            StoreError::VersionConflict => LedgerError::Conflict,
            other => LedgerError::Store(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub activity_id: Uuid,
    pub slot: TimeSlot,
    pub participants: Vec<Participant>,
}

/// What applying a payment event did to the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentApplied {
    /// pending → confirmed
    Confirmed,
    /// Payment state advanced without a booking transition
    Recorded,
    /// Stale or duplicate event, nothing changed
    Discarded,
}

/// Instruction for the caller to execute a gateway refund the ledger has
/// already accounted for.
#[derive(Debug, Clone)]
pub struct RefundInstruction {
    pub gateway_payment_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub refund_amount: i64,
    pub refund: Option<RefundInstruction>,
}

/// Owns every write to booking `status`. Payment status flows in through
/// `apply_payment_status` only, so the reconciliation listener and the
/// request path serialize on the same version counter.
pub struct BookingLedger {
    repo: Arc<dyn BookingRepository>,
    directory: Arc<dyn ActivityDirectory>,
    fees: FeeSchedule,
}

impl BookingLedger {
    pub fn new(
        repo: Arc<dyn BookingRepository>,
        directory: Arc<dyn ActivityDirectory>,
        fees: FeeSchedule,
    ) -> Self {
        Self { repo, directory, fees }
    }

    pub fn repository(&self) -> Arc<dyn BookingRepository> {
        self.repo.clone()
    }

    /// Create a booking in `pending` state with a frozen pricing snapshot.
    /// The final capacity check runs inside the store's conditional insert,
    /// so two concurrent creations cannot jointly overbook the slot.
    pub async fn create_booking(&self, req: CreateBookingRequest) -> Result<Booking, LedgerError> {
        let activity = self
            .directory
            .get_activity(req.activity_id)
            .await?
            .ok_or(LedgerError::ActivityNotFound)?;
        if !activity.is_active {
            return Err(LedgerError::Inactive);
        }

        let vendor = self
            .directory
            .get_vendor(activity.vendor_id)
            .await?
            .ok_or(LedgerError::Inactive)?;
        if !vendor.is_active {
            return Err(LedgerError::Inactive);
        }

        if req.slot.starts_at() <= Utc::now() {
            return Err(LedgerError::PastDate);
        }

        let participants = req.participants.len() as u32;
        let occurrence = OccurrenceKey::new(activity.id, &req.slot);
        let already_booked = self.repo.booked_participants(&occurrence).await?;
        availability::check_slot(&activity, &req.slot, participants, already_booked)?;

        let quote = pricing::quote(&activity.pricing, participants, &self.fees);
        let booking = Booking::new(req.user_id, &activity, req.slot, req.participants, quote);

        self.repo
            .insert_booking_checked(&booking, activity.capacity.max)
            .await?;

        tracing::info!(
            reference = %booking.reference,
            activity = %activity.id,
            participants,
            total = booking.pricing.total,
            "booking created"
        );
        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid) -> Result<Booking, LedgerError> {
        self.repo
            .get_booking(booking_id)
            .await?
            .ok_or(LedgerError::NotFound)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, LedgerError> {
        Ok(self.repo.list_for_user(user_id).await?)
    }

    /// Attach a freshly created gateway charge to a pending booking.
    pub async fn record_payment_initiated(
        &self,
        booking_id: Uuid,
        charge: &Charge,
        method: &str,
    ) -> Result<Booking, LedgerError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut booking = self.get(booking_id).await?;

            if booking.status != BookingStatus::Pending {
                return Err(LedgerError::BookingNotPending);
            }
            if matches!(booking.payment.status, PaymentStatus::Paid | PaymentStatus::Refunded) {
                return Err(LedgerError::BookingNotPending);
            }

            let expected = booking.version;
            booking.payment.gateway_payment_id = Some(charge.gateway_payment_id.clone());
            booking.payment.method = Some(method.to_string());
            booking.payment.brand = charge.brand.clone();
            booking.payment.last4 = charge.last4.clone();
            booking.payment.status = PaymentStatus::Pending;
            booking.payment.attempts += 1;
            booking.touch();

            match self.repo.update_booking(&booking, expected).await {
                Ok(()) => {
                    booking.version = expected + 1;
                    return Ok(booking);
                }
                Err(StoreError::VersionConflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Conflict)
    }

    /// Apply a normalized payment status to the booking, monotonically.
    /// The sole confirmation path: `paid` on a pending booking confirms it;
    /// `paid` on a cancelled booking records the payment and leaves the
    /// terminal state alone (the caller then refunds); stale events are
    /// discarded.
    pub async fn apply_payment_status(
        &self,
        booking_id: Uuid,
        incoming: PaymentStatus,
    ) -> Result<(Booking, PaymentApplied), LedgerError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut booking = self.get(booking_id).await?;
            let current = booking.payment.status;

            if incoming.rank() <= current.rank() {
                if incoming != current {
                    tracing::warn!(
                        booking = %booking.id,
                        current = current.as_str(),
                        incoming = incoming.as_str(),
                        "stale payment event discarded"
                    );
                }
                return Ok((booking, PaymentApplied::Discarded));
            }

            let expected = booking.version;
            let now = Utc::now();
            let mut applied = PaymentApplied::Recorded;

            match incoming {
                PaymentStatus::Paid => {
                    booking.payment.status = PaymentStatus::Paid;
                    booking.payment.paid_at = Some(now);
                    if booking.status == BookingStatus::Pending {
                        booking.status = BookingStatus::Confirmed;
                        applied = PaymentApplied::Confirmed;
                    }
                }
                PaymentStatus::Failed => {
                    // Booking stays pending; the customer may retry with a
                    // fresh charge.
                    booking.payment.status = PaymentStatus::Failed;
                }
                PaymentStatus::Refunded => {
                    booking.payment.status = PaymentStatus::Refunded;
                    booking.payment.refunded_at = Some(now);
                    let amount = booking
                        .cancellation
                        .as_ref()
                        .map(|c| c.refund_amount)
                        .unwrap_or(booking.pricing.total);
                    booking.payment.refund_amount = Some(amount);
                    if let Some(cancellation) = booking.cancellation.as_mut() {
                        cancellation.refund_processed = true;
                    }
                }
                PaymentStatus::Pending => {}
            }

            booking.touch();
            match self.repo.update_booking(&booking, expected).await {
                Ok(()) => {
                    booking.version = expected + 1;
                    tracing::info!(
                        booking = %booking.id,
                        payment = incoming.as_str(),
                        status = booking.status.as_str(),
                        "payment event applied"
                    );
                    return Ok((booking, applied));
                }
                Err(StoreError::VersionConflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Conflict)
    }

    /// Cancel a booking, evaluating the refund policy at this instant.
    /// Cancellation is terminal; a payment confirming afterwards is refunded
    /// by the reconciliation listener, never resurrected.
    pub async fn cancel(
        &self,
        booking_id: Uuid,
        caller: &Caller,
        reason: Option<String>,
    ) -> Result<CancellationOutcome, LedgerError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut booking = self.get(booking_id).await?;

            let authorized =
                caller.user_id == booking.user_id || caller.can_manage(booking.vendor_id);
            if !authorized {
                return Err(LedgerError::Unauthorized);
            }

            match booking.status {
                BookingStatus::Pending | BookingStatus::Confirmed => {}
                other => {
                    return Err(LedgerError::AlreadyTerminal { status: other.as_str().to_string() })
                }
            }

            let now = Utc::now();
            let refund_amount =
                policy::refund_amount(booking.pricing.total, booking.starts_at(), now).map_err(
                    |PolicyError::TooLate { hours_before_start }| LedgerError::NotCancellable {
                        hours_before_start,
                    },
                )?;

            let expected = booking.version;
            booking.status = BookingStatus::Cancelled;
            booking.cancellation = Some(CancellationRecord {
                cancelled_by: caller.user_id,
                cancelled_at: now,
                reason: reason.clone(),
                refund_amount,
                refund_processed: false,
            });
            booking.touch();

            let refund = if booking.payment.status == PaymentStatus::Paid && refund_amount > 0 {
                booking
                    .payment
                    .gateway_payment_id
                    .clone()
                    .map(|gateway_payment_id| RefundInstruction { gateway_payment_id, amount: refund_amount })
            } else {
                None
            };

            match self.repo.update_booking(&booking, expected).await {
                Ok(()) => {
                    booking.version = expected + 1;
                    tracing::info!(
                        booking = %booking.id,
                        refund_amount,
                        "booking cancelled"
                    );
                    return Ok(CancellationOutcome { booking, refund_amount, refund });
                }
                Err(StoreError::VersionConflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Conflict)
    }

    /// Vendor/admin lifecycle updates: in-progress, completed, no-show.
    /// Confirmation and cancellation travel their own paths.
    pub async fn update_status(
        &self,
        booking_id: Uuid,
        caller: &Caller,
        new_status: BookingStatus,
    ) -> Result<Booking, LedgerError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut booking = self.get(booking_id).await?;

            if !caller.can_manage(booking.vendor_id) {
                return Err(LedgerError::Unauthorized);
            }

            let allowed_target = matches!(
                new_status,
                BookingStatus::InProgress | BookingStatus::Completed | BookingStatus::NoShow
            );
            if !allowed_target || !booking.status.can_transition_to(new_status) {
                return Err(LedgerError::InvalidTransition {
                    from: booking.status.as_str().to_string(),
                    to: new_status.as_str().to_string(),
                });
            }

            let expected = booking.version;
            booking.status = new_status;
            booking.touch();

            match self.repo.update_booking(&booking, expected).await {
                Ok(()) => {
                    booking.version = expected + 1;
                    return Ok(booking);
                }
                Err(StoreError::VersionConflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Conflict)
    }

    /// Attach the post-event review sub-record. The rating gate has already
    /// validated eligibility; this only guards the booking invariants.
    pub async fn attach_review(
        &self,
        booking_id: Uuid,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Booking, LedgerError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut booking = self.get(booking_id).await?;

            if booking.status != BookingStatus::Completed || booking.review.is_some() {
                return Err(LedgerError::ReviewRejected);
            }

            let expected = booking.version;
            booking.review = Some(ReviewRecord {
                rating,
                comment: comment.clone(),
                submitted_at: Utc::now(),
            });
            booking.touch();

            match self.repo.update_booking(&booking, expected).await {
                Ok(()) => {
                    booking.version = expected + 1;
                    return Ok(booking);
                }
                Err(StoreError::VersionConflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Conflict)
    }
}
