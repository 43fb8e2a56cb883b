//! In-memory stand-ins for the storefront's external collaborators.

mod mail;
mod mailings;
mod payments;
mod points;
mod users;

pub use mail::{InMemoryChapterLibrary, RecordingMailer};
pub use mailings::InMemoryMailingStore;
pub use payments::FakePaymentGateway;
pub use points::{StaticPointsSource, locker};
pub use users::InMemoryUserStore;
