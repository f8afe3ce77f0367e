use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{domain, hosting_service, invoice, order, order_item},
    errors::ServiceError,
};

/// An order with the lines and invoice it was committed with
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetail {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    pub invoice: Option<invoice::Model>,
}

/// Read-back over committed orders and provisioned services. Everything
/// here is scoped to one customer; there is no cross-customer view.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, customer_id: Uuid) -> Result<Vec<order::Model>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(orders)
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        self.with_lines(order).await
    }

    /// Looks an order up by its payment reference, the identifier the
    /// success view carries after the gateway round trip.
    #[instrument(skip(self))]
    pub async fn get_order_by_reference(
        &self,
        customer_id: Uuid,
        reference: &str,
    ) -> Result<OrderDetail, ServiceError> {
        let order = order::Entity::find()
            .filter(order::Column::Reference.eq(reference))
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("No order for reference {}", reference))
            })?;
        self.with_lines(order).await
    }

    async fn with_lines(&self, order: order::Model) -> Result<OrderDetail, ServiceError> {
        let items = order
            .find_related(order_item::Entity)
            .all(&*self.db)
            .await?;
        let invoice = order
            .find_related(invoice::Entity)
            .one(&*self.db)
            .await?;
        Ok(OrderDetail {
            order,
            items,
            invoice,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_domains(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<domain::Model>, ServiceError> {
        let domains = domain::Entity::find()
            .filter(domain::Column::CustomerId.eq(customer_id))
            .order_by_desc(domain::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(domains)
    }

    #[instrument(skip(self))]
    pub async fn list_hosting(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<hosting_service::Model>, ServiceError> {
        let services = hosting_service::Entity::find()
            .filter(hosting_service::Column::CustomerId.eq(customer_id))
            .order_by_desc(hosting_service::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(services)
    }
}
