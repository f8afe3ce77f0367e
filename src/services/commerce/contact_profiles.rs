use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthCustomer,
    entities::{contact_profile, customer},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Registrant identity data management.
///
/// Every domain registration must cite a contact profile, so this service
/// also owns the mapping from an authenticated caller to a customers row.
#[derive(Clone)]
pub struct ContactProfileService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateContactProfileInput {
    #[validate(length(min = 2, max = 120, message = "Name must be 2-120 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 20, message = "Phone must be 6-20 characters"))]
    pub phone: String,
    pub address: Option<String>,
    pub city: Option<String>,
    #[serde(default = "default_country")]
    pub country: String,
    #[validate(length(min = 8, max = 20, message = "NIF must be 8-20 characters"))]
    pub nif: Option<String>,
}

fn default_country() -> String {
    "AO".to_string()
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateContactProfileInput {
    #[validate(length(min = 2, max = 120, message = "Name must be 2-120 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 20, message = "Phone must be 6-20 characters"))]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    #[validate(length(min = 8, max = 20, message = "NIF must be 8-20 characters"))]
    pub nif: Option<String>,
}

impl ContactProfileService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Makes sure a customers row exists for the authenticated caller,
    /// creating one from the token identity on first contact.
    #[instrument(skip(self, caller))]
    pub async fn ensure_customer(
        &self,
        caller: &AuthCustomer,
    ) -> Result<customer::Model, ServiceError> {
        if let Some(existing) = customer::Entity::find_by_id(caller.customer_id)
            .one(&*self.db)
            .await?
        {
            return Ok(existing);
        }

        let model = customer::ActiveModel {
            id: Set(caller.customer_id),
            name: Set(caller
                .name
                .clone()
                .unwrap_or_else(|| "Cliente".to_string())),
            email: Set(caller
                .email
                .clone()
                .unwrap_or_else(|| format!("{}@clientes.angohost.ao", caller.customer_id))),
            phone: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        match model.insert(&*self.db).await {
            Ok(created) => {
                info!(customer_id = %caller.customer_id, "Created customer record");
                Ok(created)
            }
            // A concurrent request may have created the row between the
            // lookup and the insert
            Err(insert_err) => {
                if let Some(existing) = customer::Entity::find_by_id(caller.customer_id)
                    .one(&*self.db)
                    .await?
                {
                    warn!(customer_id = %caller.customer_id, "Customer created concurrently");
                    Ok(existing)
                } else {
                    Err(ServiceError::DatabaseError(insert_err))
                }
            }
        }
    }

    #[instrument(skip(self, caller, input))]
    pub async fn create_profile(
        &self,
        caller: &AuthCustomer,
        input: CreateContactProfileInput,
    ) -> Result<contact_profile::Model, ServiceError> {
        input.validate()?;
        self.ensure_customer(caller).await?;

        let profile = contact_profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            customer_id: Set(caller.customer_id),
            name: Set(input.name),
            email: Set(input.email),
            phone: Set(input.phone),
            address: Set(input.address),
            city: Set(input.city),
            country: Set(input.country),
            nif: Set(input.nif),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let profile = profile.insert(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ContactProfileSaved(profile.id))
            .await;
        Ok(profile)
    }

    #[instrument(skip(self))]
    pub async fn list_profiles(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<contact_profile::Model>, ServiceError> {
        Ok(contact_profile::Entity::find()
            .filter(contact_profile::Column::CustomerId.eq(customer_id))
            .order_by_asc(contact_profile::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Fetches one profile, scoped to the owning customer so ids from
    /// other accounts read as absent.
    #[instrument(skip(self))]
    pub async fn get_profile(
        &self,
        customer_id: Uuid,
        profile_id: Uuid,
    ) -> Result<contact_profile::Model, ServiceError> {
        contact_profile::Entity::find_by_id(profile_id)
            .filter(contact_profile::Column::CustomerId.eq(customer_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Contact profile {} not found", profile_id))
            })
    }

    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        customer_id: Uuid,
        profile_id: Uuid,
        input: UpdateContactProfileInput,
    ) -> Result<contact_profile::Model, ServiceError> {
        input.validate()?;
        let existing = self.get_profile(customer_id, profile_id).await?;

        let mut active: contact_profile::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(email) = input.email {
            active.email = Set(email);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(phone);
        }
        if let Some(address) = input.address {
            active.address = Set(Some(address));
        }
        if let Some(city) = input.city {
            active.city = Set(Some(city));
        }
        if let Some(country) = input.country {
            active.country = Set(country);
        }
        if let Some(nif) = input.nif {
            active.nif = Set(Some(nif));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ContactProfileSaved(updated.id))
            .await;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_profile(
        &self,
        customer_id: Uuid,
        profile_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = self.get_profile(customer_id, profile_id).await?;
        existing.delete(&*self.db).await?;
        Ok(())
    }
}
