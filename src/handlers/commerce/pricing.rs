use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    errors::ServiceError,
    services::commerce::pricing,
    ApiResponse, ApiResult, AppState,
};

fn default_years() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DomainQuoteQuery {
    /// Full domain, e.g. `exemplo.co.ao`
    #[validate(length(min = 4, max = 80, message = "Domain must be 4-80 characters"))]
    pub name: String,
    #[serde(default = "default_years")]
    #[validate(range(min = 1, max = 10, message = "Years must be 1-10"))]
    pub years: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DomainQuote {
    pub domain: String,
    pub label: String,
    pub extension: String,
    /// Kwanza per year for this name
    pub annual_price: i64,
    pub years: u32,
    /// Registration prices multiply linearly; no multi-year discount
    pub total: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TermQuoteQuery {
    /// Annual plan price in Kwanza
    #[validate(range(min = 0, message = "Annual price cannot be negative"))]
    pub annual_price: i64,
    #[serde(default = "default_years")]
    #[validate(range(min = 1, max = 3, message = "Terms run 1-3 years"))]
    pub years: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TermQuote {
    pub annual_price: i64,
    pub years: u32,
    /// Discounted total, rounded half away from zero to whole Kwanza
    pub total: i64,
}

/// Quote a domain registration
#[utoipa::path(
    get,
    path = "/api/v1/pricing/domains",
    summary = "Quote domain registration",
    params(
        ("name" = String, Query, description = "Full domain name"),
        ("years" = Option<u32>, Query, description = "Registration length (default 1)"),
    ),
    responses(
        (status = 200, description = "Registration quote", body = ApiResponse<DomainQuote>),
        (status = 400, description = "Unsupported extension or malformed name"),
    )
)]
pub async fn quote_domain(
    State(_state): State<Arc<AppState>>,
    Query(query): Query<DomainQuoteQuery>,
) -> ApiResult<DomainQuote> {
    query.validate()?;

    let (label, extension) = pricing::parse_domain(&query.name).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "{} is not a registrable .ao domain",
            query.name
        ))
    })?;
    let annual_price = pricing::domain_annual_rate(&label, &extension).ok_or_else(|| {
        ServiceError::InvalidInput(format!("No pricing for extension {}", extension))
    })?;
    let total = pricing::domain_price(&label, &extension, query.years).unwrap_or(annual_price);

    Ok(Json(ApiResponse::success(DomainQuote {
        domain: format!("{}.{}", label, extension),
        label,
        extension,
        annual_price,
        years: query.years,
        total,
    })))
}

/// Quote a multi-year hosting or email term
#[utoipa::path(
    get,
    path = "/api/v1/pricing/term",
    summary = "Quote a multi-year term",
    params(
        ("annual_price" = i64, Query, description = "Annual price in Kwanza"),
        ("years" = Option<u32>, Query, description = "Term length 1-3 (default 1)"),
    ),
    responses(
        (status = 200, description = "Term quote with discount applied", body = ApiResponse<TermQuote>),
        (status = 400, description = "Out-of-range parameters"),
    )
)]
pub async fn quote_term(
    State(_state): State<Arc<AppState>>,
    Query(query): Query<TermQuoteQuery>,
) -> ApiResult<TermQuote> {
    query.validate()?;

    Ok(Json(ApiResponse::success(TermQuote {
        annual_price: query.annual_price,
        years: query.years,
        total: pricing::term_price(query.annual_price, query.years),
    })))
}
