use crate::models::{CalendarEvent, EventStatus, Invoice, InvoiceStatus, Notification};
use crate::services::store::{InsertOutcome, NotificationStore, RecordStore, ReminderSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document, Uuid as BsonUuid},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use uuid::Uuid;

const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct CrmDb {
    client: MongoClient,
    db: Database,
}

impl CrmDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for crm-service");

        // Reminder sweep scans unpaid invoices by due date
        create_index(
            &self.invoices(),
            doc! { "status": 1, "due_date": 1 },
            IndexOptions::builder()
                .name("status_due_date_idx".to_string())
                .build(),
        )
        .await?;

        create_index(
            &self.invoices(),
            doc! { "tenant_id": 1, "created_utc": -1 },
            IndexOptions::builder()
                .name("tenant_created_idx".to_string())
                .build(),
        )
        .await?;

        create_index(
            &self.calendar_events(),
            doc! { "status": 1, "scheduled_at": 1 },
            IndexOptions::builder()
                .name("status_scheduled_at_idx".to_string())
                .build(),
        )
        .await?;

        // One reminder per record and due date
        create_index(
            &self.notifications(),
            doc! { "related_event_id": 1, "scheduled_at": 1 },
            IndexOptions::builder()
                .name("reminder_dedup_idx".to_string())
                .unique(true)
                .build(),
        )
        .await?;

        create_index(
            &self.notifications(),
            doc! { "tenant_id": 1, "created_utc": -1 },
            IndexOptions::builder()
                .name("tenant_created_idx".to_string())
                .build(),
        )
        .await?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    pub fn calendar_events(&self) -> Collection<CalendarEvent> {
        self.db.collection("calendar_events")
    }

    pub fn notifications(&self) -> Collection<Notification> {
        self.db.collection("notifications")
    }
}

async fn create_index<T>(
    collection: &Collection<T>,
    keys: Document,
    options: IndexOptions,
) -> Result<(), AppError>
where
    T: Send + Sync,
{
    let name = options.name.clone().unwrap_or_default();
    let index = IndexModel::builder().keys(keys).options(options).build();

    collection.create_index(index, None).await.map_err(|e| {
        tracing::error!(index = %name, "Failed to create index: {}", e);
        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
    })?;
    Ok(())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

fn db_error(action: &str, e: mongodb::error::Error) -> AppError {
    tracing::error!("Failed to {}: {}", action, e);
    AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
}

fn record_filter(id: Uuid, tenant_id: Uuid) -> Document {
    doc! {
        "_id": BsonUuid::from_uuid_1(id),
        "tenant_id": BsonUuid::from_uuid_1(tenant_id),
    }
}

#[async_trait]
impl ReminderSource for CrmDb {
    async fn unpaid_invoices_due_after(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Invoice>, AppError> {
        let filter = doc! {
            "status": InvoiceStatus::Unpaid.as_str(),
            "due_date": { "$gt": BsonDateTime::from_chrono(now) },
        };
        let options = FindOptions::builder().sort(doc! { "due_date": 1 }).build();

        let cursor = self
            .invoices()
            .find(filter, options)
            .await
            .map_err(|e| db_error("query unpaid invoices", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("collect unpaid invoices", e))
    }

    async fn scheduled_events_after(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let filter = doc! {
            "status": EventStatus::Scheduled.as_str(),
            "scheduled_at": { "$gt": BsonDateTime::from_chrono(now) },
        };
        let options = FindOptions::builder()
            .sort(doc! { "scheduled_at": 1 })
            .build();

        let cursor = self
            .calendar_events()
            .find(filter, options)
            .await
            .map_err(|e| db_error("query scheduled events", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("collect scheduled events", e))
    }
}

#[async_trait]
impl NotificationStore for CrmDb {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<InsertOutcome, AppError> {
        match self.notifications().insert_one(notification, None).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(db_error("insert notification", e)),
        }
    }

    async fn mark_sent(&self, notification_id: Uuid) -> Result<(), AppError> {
        self.notifications()
            .update_one(
                doc! {
                    "_id": BsonUuid::from_uuid_1(notification_id),
                    "is_sent": false,
                },
                doc! {
                    "$set": {
                        "is_sent": true,
                        "sent_utc": BsonDateTime::now(),
                    }
                },
                None,
            )
            .await
            .map_err(|e| db_error("mark notification sent", e))?;
        Ok(())
    }

    async fn list_for_related(
        &self,
        related_event_id: Uuid,
    ) -> Result<Vec<Notification>, AppError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_utc": -1 })
            .build();

        let cursor = self
            .notifications()
            .find(
                doc! { "related_event_id": BsonUuid::from_uuid_1(related_event_id) },
                options,
            )
            .await
            .map_err(|e| db_error("list notifications", e))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("collect notifications", e))
    }
}

#[async_trait]
impl RecordStore for CrmDb {
    async fn ping(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| db_error("ping MongoDB", e))?;
        Ok(())
    }

    async fn insert_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        self.invoices()
            .insert_one(invoice, None)
            .await
            .map_err(|e| db_error("insert invoice", e))?;
        Ok(())
    }

    async fn find_invoice(
        &self,
        tenant_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        self.invoices()
            .find_one(record_filter(invoice_id, tenant_id), None)
            .await
            .map_err(|e| db_error("find invoice", e))
    }

    async fn replace_invoice(&self, invoice: &Invoice) -> Result<(), AppError> {
        let result = self
            .invoices()
            .replace_one(
                record_filter(invoice.invoice_id, invoice.tenant_id),
                invoice,
                None,
            )
            .await
            .map_err(|e| db_error("replace invoice", e))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Invoice {} not found",
                invoice.invoice_id
            )));
        }
        Ok(())
    }

    async fn insert_event(&self, event: &CalendarEvent) -> Result<(), AppError> {
        self.calendar_events()
            .insert_one(event, None)
            .await
            .map_err(|e| db_error("insert calendar event", e))?;
        Ok(())
    }

    async fn find_event(
        &self,
        tenant_id: Uuid,
        event_id: Uuid,
    ) -> Result<Option<CalendarEvent>, AppError> {
        self.calendar_events()
            .find_one(record_filter(event_id, tenant_id), None)
            .await
            .map_err(|e| db_error("find calendar event", e))
    }

    async fn replace_event(&self, event: &CalendarEvent) -> Result<(), AppError> {
        let result = self
            .calendar_events()
            .replace_one(record_filter(event.event_id, event.tenant_id), event, None)
            .await
            .map_err(|e| db_error("replace calendar event", e))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "Calendar event {} not found",
                event.event_id
            )));
        }
        Ok(())
    }
}
