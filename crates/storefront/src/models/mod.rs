//! Domain models for storefront.

pub mod mailing;
pub mod session;
pub mod user;

pub use mailing::{Advance, DueSchedule, Interval, MailingSchedule, NewMailing, ScheduleState};
pub use session::{CurrentUser, keys as session_keys};
pub use user::User;
