//! SQLite persistence module
//!
//! Repository pattern cho SQLite database access.

pub mod repos;
pub mod schema;

pub use repos::{
    create_pool, init_database, init_schema, CustomerRepo, FeeUpdate, NoteRepo, PaymentReceived,
    PaymentSent, RateConfigRepo, ReconciliationRepo, TransactionRepo, VenueRepo,
};
pub use schema::{
    CustomerRow, NoteRow, RateConfigRow, ReconciliationRow, TransactionRow, VenueRow, SCHEMA,
};
