mod data_objects;
mod ticketing_database;

pub use data_objects::{
    CallbackSettlement,
    CallbackUpdate,
    ContactInfo,
    NewScanRecord,
    Reservation,
    SubscriptionUpsert,
};
pub use ticketing_database::TicketingDatabase;
