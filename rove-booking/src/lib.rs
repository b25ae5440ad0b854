pub mod models;
pub mod policy;
pub mod repository;
pub mod ledger;
pub mod orchestrator;
pub mod reconciliation;

pub use ledger::{BookingLedger, CancellationOutcome, CreateBookingRequest, LedgerError, PaymentApplied};
pub use models::{Booking, BookingStatus, CancellationRecord, Participant, PaymentRecord, ReviewRecord};
pub use orchestrator::{MockPaymentGateway, PaymentOrchestrator};
pub use reconciliation::{QueuedEvent, ReconciliationListener, WebhookEvent, WebhookVerifier};
pub use repository::BookingRepository;

#[cfg(test)]
pub(crate) mod test_support;
