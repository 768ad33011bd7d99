pub mod api;
pub mod availability;
pub mod confirmation;
pub mod error;
pub mod model;
pub mod role;
pub mod selection;
pub mod session;
pub mod store;
pub mod time_slot;

#[cfg(test)]
mod testing;

pub use api::BookingApi;
pub use availability::{SlotAvailability, SlotView};
pub use confirmation::{BookingConfirmation, ConfirmPhase, ConfirmedBooking};
pub use error::{ClientError, ConfirmError, SelectionError, StoreError};
pub use role::UserRole;
pub use selection::{AvailabilityTicket, BookingSelection, Field, FieldDependencyController};
pub use session::Session;
pub use store::LocalStore;
pub use time_slot::TimeSlot;
