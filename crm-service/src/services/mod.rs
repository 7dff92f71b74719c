pub mod calculator;
pub mod calendar;
pub mod database;
pub mod invoices;
pub mod live;
pub mod manual_reminder;
pub mod memory;
pub mod metrics;
pub mod providers;
pub mod store;

pub use calendar::CalendarService;
pub use database::CrmDb;
pub use invoices::InvoiceService;
pub use live::{LiveChannel, LiveEvent, LiveSink};
pub use manual_reminder::{ManualReminderService, ReminderDelivery, SendOutcome};
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use providers::{
    CloudApiWhatsApp, MailMessage, MailSender, MockMailer, MockWhatsApp, ProviderError,
    ProviderResponse, SmtpMailer, WhatsAppMessage, WhatsAppSender,
};
pub use store::{InsertOutcome, NotificationStore, RecordStore, ReminderSource};
