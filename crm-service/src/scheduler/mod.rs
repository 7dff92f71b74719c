//! Due-date reminders: the window predicate, one sweep over all channels,
//! and the periodic task that drives it.

pub mod sweeper;
pub mod task;
pub mod window;

pub use sweeper::{DispatchedNotification, ReminderSweeper, SweepError};
pub use task::{PeriodicTask, ReminderScheduler};
pub use window::ReminderWindow;
