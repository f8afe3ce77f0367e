use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Product category of a cart line. Also the merge axis: a cart never holds
/// two items with the same `(kind, name)` pair.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProductKind {
    Domain,
    Hosting,
    Vps,
    Email,
}

/// Commitment period the line was priced for
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    #[default]
    Yearly,
}

/// Extra data a domain-registration line carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainDetails {
    pub domain_name: String,
    /// Domain registry rules require registrant identity data
    #[serde(default = "default_true")]
    pub requires_titularity: bool,
}

/// Extra data a hosting line carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostingDetails {
    /// Plan is bound to a domain the customer already owns, so no
    /// registration happens as part of this purchase
    pub existing_domain: bool,
}

/// Per-kind payload of a cart line. Serialized untagged so the persisted
/// shape stays a plain JSON object; the variant is recovered from its
/// distinguishing field on rehydration. Objects that match no known shape
/// are carried through unchanged rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ItemDetails {
    Domain(DomainDetails),
    Hosting(HostingDetails),
    #[schema(value_type = Object)]
    Other(serde_json::Map<String, serde_json::Value>),
}

impl ItemDetails {
    pub fn none() -> Self {
        ItemDetails::Other(serde_json::Map::new())
    }

    pub fn for_domain(domain_name: impl Into<String>) -> Self {
        ItemDetails::Domain(DomainDetails {
            domain_name: domain_name.into(),
            requires_titularity: true,
        })
    }

    pub fn domain_name(&self) -> Option<&str> {
        match self {
            ItemDetails::Domain(d) => Some(d.domain_name.as_str()),
            _ => None,
        }
    }

    pub fn is_existing_domain(&self) -> bool {
        matches!(self, ItemDetails::Hosting(h) if h.existing_domain)
    }
}

fn default_true() -> bool {
    true
}

/// One purchasable line held client-side before any order exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProductKind,
    pub name: String,
    /// Kwanza, integer, no minor units
    pub price: i64,
    pub period: BillingPeriod,
    pub details: ItemDetails,
}

impl CartItem {
    /// Checks that the details payload matches the product kind. A domain
    /// line without a `domainName` cannot be registered, and a registration
    /// payload on a non-domain line would corrupt the profile gate.
    pub fn validate(&self) -> Result<(), String> {
        match (self.kind, &self.details) {
            (ProductKind::Domain, ItemDetails::Domain(_)) => Ok(()),
            (ProductKind::Domain, _) => {
                Err("domain items must carry a domainName in details".to_string())
            }
            (_, ItemDetails::Domain(_)) => Err(format!(
                "{} items cannot carry domain registration details",
                self.kind
            )),
            _ => Ok(()),
        }
    }

    pub fn merge_key(&self) -> (ProductKind, &str) {
        (self.kind, self.name.as_str())
    }
}

/// Partial update applied to an existing line, shallow per field
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CartItemPatch {
    #[serde(rename = "type")]
    pub kind: Option<ProductKind>,
    pub name: Option<String>,
    pub price: Option<i64>,
    pub period: Option<BillingPeriod>,
    pub details: Option<ItemDetails>,
}

impl CartItemPatch {
    pub fn apply(&self, item: &mut CartItem) {
        if let Some(kind) = self.kind {
            item.kind = kind;
        }
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(period) = self.period {
            item.period = period;
        }
        if let Some(details) = &self.details {
            item.details = details.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.name.is_none()
            && self.price.is_none()
            && self.period.is_none()
            && self.details.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_details_deserialize_without_titularity_flag() {
        let item: CartItem = serde_json::from_str(
            r#"{"id":"d1","type":"domain","name":"exemplo.ao","price":25000,
                "period":"yearly","details":{"domainName":"exemplo.ao"}}"#,
        )
        .unwrap();

        assert_eq!(item.kind, ProductKind::Domain);
        assert_eq!(item.details.domain_name(), Some("exemplo.ao"));
        match &item.details {
            ItemDetails::Domain(d) => assert!(d.requires_titularity),
            other => panic!("expected domain details, got {:?}", other),
        }
    }

    #[test]
    fn hosting_details_recover_existing_domain_flag() {
        let item: CartItem = serde_json::from_str(
            r#"{"id":"h1","type":"hosting","name":"Plano M","price":15000,
                "period":"yearly","details":{"existingDomain":true}}"#,
        )
        .unwrap();

        assert!(item.details.is_existing_domain());
    }

    #[test]
    fn unknown_details_survive_round_trip() {
        let raw = r#"{"id":"v1","type":"vps","name":"VPS Start","price":30000,
                "period":"monthly","details":{"cpuCores":2}}"#;
        let item: CartItem = serde_json::from_str(raw).unwrap();
        match &item.details {
            ItemDetails::Other(map) => {
                assert_eq!(map.get("cpuCores"), Some(&serde_json::json!(2)))
            }
            other => panic!("expected passthrough details, got {:?}", other),
        }

        let reencoded = serde_json::to_value(&item).unwrap();
        assert_eq!(reencoded["details"]["cpuCores"], serde_json::json!(2));
    }

    #[test]
    fn validate_rejects_domain_item_without_domain_name() {
        let item = CartItem {
            id: "d1".to_string(),
            kind: ProductKind::Domain,
            name: "exemplo.ao".to_string(),
            price: 25000,
            period: BillingPeriod::Yearly,
            details: ItemDetails::none(),
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn validate_rejects_registration_details_on_hosting_item() {
        let item = CartItem {
            id: "h1".to_string(),
            kind: ProductKind::Hosting,
            name: "Plano M".to_string(),
            price: 15000,
            period: BillingPeriod::Yearly,
            details: ItemDetails::for_domain("exemplo.ao"),
        };
        assert!(item.validate().is_err());
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut item = CartItem {
            id: "d1".to_string(),
            kind: ProductKind::Domain,
            name: "exemplo.ao".to_string(),
            price: 25000,
            period: BillingPeriod::Yearly,
            details: ItemDetails::for_domain("exemplo.ao"),
        };

        let patch = CartItemPatch {
            price: Some(45000),
            ..Default::default()
        };
        patch.apply(&mut item);

        assert_eq!(item.price, 45000);
        assert_eq!(item.name, "exemplo.ao");
        assert_eq!(item.period, BillingPeriod::Yearly);
    }

    #[test]
    fn product_kind_display_matches_wire_form() {
        assert_eq!(ProductKind::Domain.to_string(), "domain");
        assert_eq!(ProductKind::Vps.to_string(), "vps");
        assert_eq!(BillingPeriod::Yearly.to_string(), "yearly");
    }
}
