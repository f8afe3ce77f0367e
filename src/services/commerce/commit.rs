use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    cart::CartItem,
    config::AppConfig,
    entities::{invoice, order, order_item},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Durable creation of an order, its line items and its invoice once a
/// payment has been verified.
///
/// The order row is the record of authority: if it cannot be written the
/// whole commit fails. Item and invoice rows are derivable from it, so
/// their failures are logged for back-office reconciliation instead of
/// failing a payment that already went through.
#[derive(Clone)]
pub struct OrderCommitService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

/// Outcome of a commit, including any follow-up steps that failed and
/// await reconciliation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommitReceipt {
    pub order_id: Uuid,
    pub reference: String,
    pub invoice_number: String,
    pub total_amount: i64,
    pub warnings: Vec<String>,
}

impl OrderCommitService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Commits a verified payment. Steps run strictly in sequence because
    /// items and invoice reference the order's generated id. Calling again
    /// with a reference that already has an order returns that order
    /// untouched, so duplicate callbacks cannot double-write.
    #[instrument(skip(self, items))]
    pub async fn commit(
        &self,
        customer_id: Uuid,
        reference: &str,
        transaction_id: &str,
        payment_method: &str,
        items: &[CartItem],
    ) -> Result<CommitReceipt, ServiceError> {
        if let Some(existing) = self.find_by_reference(reference).await? {
            info!(reference, order_id = %existing.id, "Order already committed");
            return Ok(self.receipt_for(&existing, Vec::new()));
        }

        let order = self
            .insert_order(customer_id, reference, transaction_id, payment_method, items)
            .await?;

        let mut warnings = Vec::new();

        if let Err(e) = self.insert_items(&order, items).await {
            error!(reference, order_id = %order.id, "Order item write failed: {}", e);
            warnings.push("order items were not recorded".to_string());
            self.event_sender
                .send_or_log(Event::CommitFollowUpSkipped {
                    reference: reference.to_string(),
                    step: "order_items".to_string(),
                })
                .await;
        }

        if let Err(e) = self.insert_invoice(&order).await {
            error!(reference, order_id = %order.id, "Invoice write failed: {}", e);
            warnings.push("invoice was not recorded".to_string());
            self.event_sender
                .send_or_log(Event::CommitFollowUpSkipped {
                    reference: reference.to_string(),
                    step: "invoice".to_string(),
                })
                .await;
        }

        self.event_sender
            .send_or_log(Event::OrderCommitted {
                order_id: order.id,
                reference: reference.to_string(),
                total_amount: order.total_amount,
            })
            .await;

        Ok(self.receipt_for(&order, warnings))
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::Reference.eq(reference))
            .one(&*self.db)
            .await?)
    }

    async fn insert_order(
        &self,
        customer_id: Uuid,
        reference: &str,
        transaction_id: &str,
        payment_method: &str,
        items: &[CartItem],
    ) -> Result<order::Model, ServiceError> {
        let total_amount: i64 = items.iter().map(|item| item.price).sum();

        let model = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(customer_id),
            reference: Set(reference.to_string()),
            status: Set("completed".to_string()),
            payment_method: Set(payment_method.to_string()),
            payment_id: Set(Some(transaction_id.to_string())),
            total_amount: Set(total_amount),
            currency: Set(self.config.default_currency.clone()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        match model.insert(&*self.db).await {
            Ok(order) => Ok(order),
            // A concurrent commit for the same reference may have won the
            // unique-index race; treat its order as ours
            Err(insert_err) => match self.find_by_reference(reference).await? {
                Some(existing) => Ok(existing),
                None => Err(ServiceError::DatabaseError(insert_err)),
            },
        }
    }

    async fn insert_items(
        &self,
        order: &order::Model,
        items: &[CartItem],
    ) -> Result<(), ServiceError> {
        if items.is_empty() {
            return Ok(());
        }

        let rows: Vec<order_item::ActiveModel> = items
            .iter()
            .map(|item| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(item.id.clone()),
                product_name: Set(item.name.clone()),
                product_type: Set(item.kind.to_string()),
                price: Set(item.price),
                period: Set(item.period.to_string()),
                details: Set(serde_json::to_value(&item.details).ok()),
                created_at: Set(Utc::now()),
            })
            .collect();

        order_item::Entity::insert_many(rows).exec(&*self.db).await?;
        Ok(())
    }

    async fn insert_invoice(&self, order: &order::Model) -> Result<(), ServiceError> {
        let now = Utc::now();
        let model = invoice::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            customer_id: Set(order.customer_id),
            invoice_number: Set(invoice_number_for(&order.reference)),
            amount: Set(order.total_amount),
            currency: Set(order.currency.clone()),
            status: Set(invoice::InvoiceStatus::Paid),
            paid_date: Set(Some(now)),
            due_date: Set(now),
            created_at: Set(now),
            updated_at: Set(None),
        };
        model.insert(&*self.db).await?;
        Ok(())
    }

    fn receipt_for(&self, order: &order::Model, warnings: Vec<String>) -> CommitReceipt {
        CommitReceipt {
            order_id: order.id,
            reference: order.reference.clone(),
            invoice_number: invoice_number_for(&order.reference),
            total_amount: order.total_amount,
            warnings,
        }
    }
}

pub fn invoice_number_for(reference: &str) -> String {
    format!("INV-{}", reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{BillingPeriod, ItemDetails, ProductKind};
    use crate::services::test_support;

    fn items() -> Vec<CartItem> {
        vec![
            CartItem {
                id: "dom-1".to_string(),
                kind: ProductKind::Domain,
                name: "exemplo.ao".to_string(),
                price: 25000,
                period: BillingPeriod::Yearly,
                details: ItemDetails::for_domain("exemplo.ao"),
            },
            CartItem {
                id: "host-1".to_string(),
                kind: ProductKind::Hosting,
                name: "Plano M".to_string(),
                price: 15000,
                period: BillingPeriod::Monthly,
                details: ItemDetails::none(),
            },
        ]
    }

    async fn seeded_service() -> (OrderCommitService, Uuid, Arc<DatabaseConnection>) {
        let db = test_support::sqlite_db().await;
        let customer_id = Uuid::new_v4();
        crate::entities::customer::ActiveModel {
            id: Set(customer_id),
            name: Set("Ana Silva".to_string()),
            email: Set(format!("{}@exemplo.ao", customer_id)),
            phone: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*db)
        .await
        .unwrap();

        let config = Arc::new(AppConfig::new(
            "sqlite::memory:".to_string(),
            "redis://127.0.0.1:6379".to_string(),
            "x".repeat(64),
            3600,
            "127.0.0.1".to_string(),
            0,
            "development".to_string(),
        ));
        let service =
            OrderCommitService::new(db.clone(), test_support::detached_event_sender(), config);
        (service, customer_id, db)
    }

    #[tokio::test]
    async fn commit_writes_order_items_and_paid_invoice() {
        let (service, customer_id, db) = seeded_service().await;

        let receipt = service
            .commit(customer_id, "R1", "TX1", "emis", &items())
            .await
            .unwrap();

        assert_eq!(receipt.total_amount, 40000);
        assert_eq!(receipt.invoice_number, "INV-R1");
        assert!(receipt.warnings.is_empty());

        let order = order::Entity::find_by_id(receipt.order_id)
            .one(&*db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.reference, "R1");
        assert_eq!(order.status, "completed");
        assert_eq!(order.payment_id.as_deref(), Some("TX1"));
        assert_eq!(order.total_amount, 40000);

        let rows = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(receipt.order_id))
            .all(&*db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let items_total: i64 = rows.iter().map(|r| r.price).sum();
        assert_eq!(items_total, order.total_amount);
        let domain_row = rows.iter().find(|r| r.product_type == "domain").unwrap();
        assert_eq!(domain_row.product_name, "exemplo.ao");
        assert_eq!(domain_row.product_id, "dom-1");
        assert_eq!(domain_row.period, "yearly");

        let inv = invoice::Entity::find()
            .filter(invoice::Column::OrderId.eq(receipt.order_id))
            .one(&*db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inv.invoice_number, "INV-R1");
        assert_eq!(inv.status, invoice::InvoiceStatus::Paid);
        assert!(inv.paid_date.is_some());
        assert_eq!(inv.amount, 40000);
    }

    #[tokio::test]
    async fn commit_same_reference_twice_returns_existing_order() {
        let (service, customer_id, db) = seeded_service().await;

        let first = service
            .commit(customer_id, "R1", "TX1", "emis", &items())
            .await
            .unwrap();
        let second = service
            .commit(customer_id, "R1", "TX-OTHER", "emis", &items())
            .await
            .unwrap();

        assert_eq!(first.order_id, second.order_id);
        assert_eq!(order::Entity::find().all(&*db).await.unwrap().len(), 1);
        assert_eq!(invoice::Entity::find().all(&*db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_order_insert_leaves_no_partial_rows() {
        let (service, _customer_id, db) = seeded_service().await;

        // Unknown customer violates the orders foreign key, so step one
        // fails and nothing else may be written
        let result = service
            .commit(Uuid::new_v4(), "R9", "TX9", "emis", &items())
            .await;
        assert!(result.is_err());

        assert!(order::Entity::find().all(&*db).await.unwrap().is_empty());
        assert!(order_item::Entity::find().all(&*db).await.unwrap().is_empty());
        assert!(invoice::Entity::find().all(&*db).await.unwrap().is_empty());
    }
}
