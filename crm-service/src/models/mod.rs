pub mod calendar_event;
pub mod invoice;
pub mod money;
pub mod notification;
pub mod reminder;

pub use calendar_event::{CalendarEvent, CreateCalendarEvent, EventStatus};
pub use invoice::{CreateInvoice, Invoice, InvoiceStatus, UpdateInvoice, DEFAULT_CURRENCY};
pub use money::{MonetaryInput, MonetaryResult, ScaledAmounts, ScaledTotals};
pub use notification::{Notification, NotificationType};
pub use reminder::{
    format_due_date, LivePayload, ReminderChannel, ReminderContent, ReminderDetail, Reminderable,
};
