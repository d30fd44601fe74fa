pub mod dispatcher;
pub mod reissue;
pub mod render;
pub mod saga;
pub mod seller;
pub mod tracker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dispatcher::{DispatchReport, JobOutcome, JobReport, NotificationDispatcher, RetryPolicy};
pub use reissue::ReissueCoordinator;
pub use render::PlainTextRenderer;
pub use saga::{BookingSaga, SagaSettings};
pub use tracker::StateTracker;

use tokio::task::JoinHandle;
use wayfare_core::TicketRecord;

/// A cached ticket plus the background task delivering its notifications.
#[derive(Debug)]
pub struct Committed {
    pub record: TicketRecord,
    /// `None` when the order was already ticketed and nothing new was sold.
    pub notifications: Option<JoinHandle<DispatchReport>>,
}
