use crate::db_types::Order;

/// Fired exactly once when an order transitions to `Success`. The ticket issuer subscribes to this to
/// render and deliver the ticket outside the webhook request.
#[derive(Debug, Clone)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}
