use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, Mutex};
use tracing::{error, warn};

use super::item::{CartItem, CartItemPatch, ProductKind};
use super::storage::CartStorage;
use crate::errors::ServiceError;

/// What `add_item` did with the incoming line
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub item_id: String,
    /// True when an existing `(kind, name)` entry was replaced in place
    pub merged: bool,
}

/// Ordered line items for one browsing session.
///
/// Every mutation persists the full snapshot and publishes the new item
/// sequence on a watch channel, so render layers subscribe instead of
/// polling shared state. Persistence failures are logged and swallowed:
/// the in-memory cart stays usable and the next mutation retries the write.
pub struct CartStore {
    session_id: String,
    items: Vec<CartItem>,
    storage: Arc<dyn CartStorage>,
    changes: watch::Sender<Vec<CartItem>>,
}

impl CartStore {
    /// Rehydrates the session's cart from storage. A missing, unreadable or
    /// corrupt snapshot yields an empty cart; this never fails.
    pub async fn load(session_id: String, storage: Arc<dyn CartStorage>) -> Self {
        let items = match storage.load(&session_id).await {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<CartItem>>(&payload) {
                Ok(items) => items,
                Err(e) => {
                    warn!(
                        session_id,
                        "Discarding corrupt cart snapshot: {}", e
                    );
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(session_id, "Cart snapshot unavailable: {}", e);
                Vec::new()
            }
        };

        let (changes, _) = watch::channel(items.clone());
        Self {
            session_id,
            items,
            storage,
            changes,
        }
    }

    /// Subscribes to item-sequence changes. The receiver always holds the
    /// latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Vec<CartItem>> {
        self.changes.subscribe()
    }

    /// Adds a line. An existing entry with the same `(kind, name)` is
    /// replaced in place, keeping its position; the incoming fields win.
    pub async fn add_item(&mut self, item: CartItem) -> Result<AddOutcome, ServiceError> {
        item.validate().map_err(ServiceError::InvalidInput)?;

        let item_id = item.id.clone();
        let merged = match self
            .items
            .iter_mut()
            .find(|existing| existing.merge_key() == item.merge_key())
        {
            Some(existing) => {
                *existing = item;
                true
            }
            None => {
                self.items.push(item);
                false
            }
        };

        self.persist().await;
        self.notify();
        Ok(AddOutcome { item_id, merged })
    }

    /// Drops a line by id. Absent ids are a no-op, not an error.
    pub async fn remove_item(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        let removed = self.items.len() != before;
        if removed {
            self.persist().await;
            self.notify();
        }
        removed
    }

    /// Shallow-merges the patch into the line with the given id. Returns
    /// false (without touching anything) when the id is absent.
    pub async fn update_item(
        &mut self,
        id: &str,
        patch: &CartItemPatch,
    ) -> Result<bool, ServiceError> {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return Ok(false);
        };

        let mut updated = self.items[index].clone();
        patch.apply(&mut updated);
        updated.validate().map_err(ServiceError::InvalidInput)?;

        self.items[index] = updated;
        self.persist().await;
        self.notify();
        Ok(true)
    }

    pub async fn clear(&mut self) {
        self.items.clear();
        self.persist().await;
        self.notify();
    }

    pub fn total_price(&self) -> i64 {
        self.items.iter().map(|item| item.price).sum()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Names of every domain being registered in this cart
    pub fn domain_names(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.kind == ProductKind::Domain)
            .filter_map(|item| item.details.domain_name())
            .map(str::to_string)
            .collect()
    }

    pub fn has_kind(&self, kind: ProductKind) -> bool {
        self.items.iter().any(|item| item.kind == kind)
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Owned copy of the sequence, taken at checkout so later cart edits
    /// cannot alter an in-flight payment.
    pub fn snapshot(&self) -> Vec<CartItem> {
        self.items.clone()
    }

    async fn persist(&self) {
        let payload = match serde_json::to_string(&self.items) {
            Ok(payload) => payload,
            Err(e) => {
                error!(session_id = %self.session_id, "Failed to serialize cart: {}", e);
                return;
            }
        };
        if let Err(e) = self.storage.save(&self.session_id, &payload).await {
            error!(session_id = %self.session_id, "Failed to persist cart: {}", e);
        }
    }

    fn notify(&self) {
        self.changes.send_replace(self.items.clone());
    }
}

/// Registry handing out the single [`CartStore`] owned by each session.
/// First access rehydrates from storage; later accesses share the same
/// store behind a mutex.
pub struct CartSessions {
    storage: Arc<dyn CartStorage>,
    carts: DashMap<String, Arc<Mutex<CartStore>>>,
}

impl CartSessions {
    pub fn new(storage: Arc<dyn CartStorage>) -> Self {
        Self {
            storage,
            carts: DashMap::new(),
        }
    }

    pub async fn cart(&self, session_id: &str) -> Arc<Mutex<CartStore>> {
        if let Some(cart) = self.carts.get(session_id) {
            return cart.clone();
        }

        let store = CartStore::load(session_id.to_string(), self.storage.clone()).await;
        self.carts
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(store)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::item::{BillingPeriod, ItemDetails};
    use crate::cart::storage::InMemoryCartStorage;

    fn domain_item(id: &str, name: &str, price: i64) -> CartItem {
        CartItem {
            id: id.to_string(),
            kind: ProductKind::Domain,
            name: name.to_string(),
            price,
            period: BillingPeriod::Yearly,
            details: ItemDetails::for_domain(name),
        }
    }

    fn hosting_item(id: &str, name: &str, price: i64) -> CartItem {
        CartItem {
            id: id.to_string(),
            kind: ProductKind::Hosting,
            name: name.to_string(),
            price,
            period: BillingPeriod::Yearly,
            details: ItemDetails::none(),
        }
    }

    async fn empty_store() -> CartStore {
        CartStore::load("sess-1".to_string(), Arc::new(InMemoryCartStorage::new())).await
    }

    // ==================== Merge Tests ====================

    #[tokio::test]
    async fn adding_same_kind_and_name_replaces_in_place() {
        let mut store = empty_store().await;
        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();
        store
            .add_item(hosting_item("b", "Plano M", 15000))
            .await
            .unwrap();

        let outcome = store
            .add_item(domain_item("c", "exemplo.ao", 45000))
            .await
            .unwrap();

        assert!(outcome.merged);
        assert_eq!(store.item_count(), 2);
        // Position preserved, fields from the latest call
        assert_eq!(store.items()[0].id, "c");
        assert_eq!(store.items()[0].price, 45000);
        assert_eq!(store.items()[1].name, "Plano M");
    }

    #[tokio::test]
    async fn distinct_names_append_in_order() {
        let mut store = empty_store().await;
        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();
        store
            .add_item(domain_item("b", "outro.co.ao", 35000))
            .await
            .unwrap();

        assert_eq!(store.item_count(), 2);
        assert_eq!(store.items()[0].name, "exemplo.ao");
        assert_eq!(store.items()[1].name, "outro.co.ao");
    }

    #[tokio::test]
    async fn same_name_different_kind_does_not_merge() {
        let mut store = empty_store().await;
        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();
        store
            .add_item(hosting_item("b", "exemplo.ao", 15000))
            .await
            .unwrap();

        assert_eq!(store.item_count(), 2);
    }

    // ==================== Mutation Tests ====================

    #[tokio::test]
    async fn remove_item_is_idempotent() {
        let mut store = empty_store().await;
        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();

        assert!(store.remove_item("a").await);
        assert!(!store.remove_item("a").await);
        assert!(!store.remove_item("never-existed").await);
        assert_eq!(store.item_count(), 0);
    }

    #[tokio::test]
    async fn update_item_applies_partial_fields() {
        let mut store = empty_store().await;
        store
            .add_item(hosting_item("h", "Plano M", 15000))
            .await
            .unwrap();

        let patch = CartItemPatch {
            price: Some(12000),
            period: Some(BillingPeriod::Monthly),
            ..Default::default()
        };
        assert!(store.update_item("h", &patch).await.unwrap());

        assert_eq!(store.items()[0].price, 12000);
        assert_eq!(store.items()[0].period, BillingPeriod::Monthly);
        assert_eq!(store.items()[0].name, "Plano M");
    }

    #[tokio::test]
    async fn update_item_absent_id_is_noop() {
        let mut store = empty_store().await;
        store
            .add_item(hosting_item("h", "Plano M", 15000))
            .await
            .unwrap();

        let patch = CartItemPatch {
            price: Some(1),
            ..Default::default()
        };
        assert!(!store.update_item("missing", &patch).await.unwrap());
        assert_eq!(store.items()[0].price, 15000);
    }

    #[tokio::test]
    async fn update_rejects_patch_producing_invalid_item() {
        let mut store = empty_store().await;
        store
            .add_item(hosting_item("h", "Plano M", 15000))
            .await
            .unwrap();

        // Turning a hosting line into a domain line without registration
        // details must not go through
        let patch = CartItemPatch {
            kind: Some(ProductKind::Domain),
            ..Default::default()
        };
        assert!(store.update_item("h", &patch).await.is_err());
        assert_eq!(store.items()[0].kind, ProductKind::Hosting);
    }

    #[tokio::test]
    async fn add_rejects_domain_item_without_registration_details() {
        let mut store = empty_store().await;
        let mut item = domain_item("a", "exemplo.ao", 25000);
        item.details = ItemDetails::none();
        assert!(store.add_item(item).await.is_err());
        assert!(store.is_empty());
    }

    // ==================== Aggregate Tests ====================

    #[tokio::test]
    async fn total_price_is_sum_of_item_prices() {
        let mut store = empty_store().await;
        assert_eq!(store.total_price(), 0);

        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();
        store
            .add_item(hosting_item("b", "Plano M", 15000))
            .await
            .unwrap();
        assert_eq!(store.total_price(), 40000);

        store.remove_item("b").await;
        assert_eq!(store.total_price(), 25000);
    }

    #[tokio::test]
    async fn domain_names_lists_only_domain_items() {
        let mut store = empty_store().await;
        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();
        store
            .add_item(hosting_item("b", "Plano M", 15000))
            .await
            .unwrap();
        store
            .add_item(domain_item("c", "outro.co.ao", 35000))
            .await
            .unwrap();

        assert_eq!(store.domain_names(), vec!["exemplo.ao", "outro.co.ao"]);
        assert!(store.has_kind(ProductKind::Domain));
        assert!(!store.has_kind(ProductKind::Email));
    }

    // ==================== Persistence Tests ====================

    #[tokio::test]
    async fn cart_survives_reload_from_storage() {
        let storage: Arc<dyn CartStorage> = Arc::new(InMemoryCartStorage::new());

        let mut store = CartStore::load("sess-1".to_string(), storage.clone()).await;
        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();
        store
            .add_item(hosting_item("b", "Plano M", 15000))
            .await
            .unwrap();

        let rehydrated = CartStore::load("sess-1".to_string(), storage).await;
        assert_eq!(rehydrated.items(), store.items());
    }

    #[tokio::test]
    async fn corrupt_snapshot_falls_back_to_empty_cart() {
        let storage: Arc<dyn CartStorage> = Arc::new(InMemoryCartStorage::new());
        storage.save("sess-1", "{not json").await.unwrap();

        let store = CartStore::load("sess-1".to_string(), storage).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn clear_persists_the_empty_sequence() {
        let storage: Arc<dyn CartStorage> = Arc::new(InMemoryCartStorage::new());
        let mut store = CartStore::load("sess-1".to_string(), storage.clone()).await;
        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();

        store.clear().await;

        assert_eq!(store.item_count(), 0);
        let rehydrated = CartStore::load("sess-1".to_string(), storage).await;
        assert!(rehydrated.is_empty());
    }

    // ==================== Notification Tests ====================

    #[tokio::test]
    async fn mutations_publish_the_new_item_sequence() {
        let mut store = empty_store().await;
        let mut changes = store.subscribe();
        assert!(changes.borrow().is_empty());

        store
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();

        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().len(), 1);

        store.clear().await;
        assert!(changes.borrow().is_empty());
    }

    #[tokio::test]
    async fn sessions_registry_returns_same_store_per_session() {
        let sessions = CartSessions::new(Arc::new(InMemoryCartStorage::new()));

        let cart = sessions.cart("sess-1").await;
        cart.lock()
            .await
            .add_item(domain_item("a", "exemplo.ao", 25000))
            .await
            .unwrap();

        let same = sessions.cart("sess-1").await;
        assert_eq!(same.lock().await.item_count(), 1);

        let other = sessions.cart("sess-2").await;
        assert_eq!(other.lock().await.item_count(), 0);
    }
}
