use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCreatedEvent {
    pub booking_id: Uuid,
    pub reference: String,
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub participants: u32,
    pub total: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub gateway_payment_id: String,
    pub total: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub cancelled_by: Uuid,
    pub refund_amount: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentRecordedEvent {
    pub booking_id: Uuid,
    pub gateway_payment_id: String,
    pub status: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RatingSubmittedEvent {
    pub rating_id: Uuid,
    pub rater_id: Uuid,
    pub activity_id: Uuid,
    pub rated_participants: Vec<Uuid>,
    pub timestamp: i64,
}
