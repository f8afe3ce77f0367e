use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AngoHost Storefront API",
        version = "1.0.0",
        description = r#"
# AngoHost Storefront API

Cart, checkout and payment pipeline for .ao domain registrations and web
hosting plans. All amounts are integer Kwanza (AOA); there are no decimal
minor units anywhere in the API.

## Sessions and authentication

Cart and pricing endpoints identify the browser with the `x-session-id`
header and work without a login. Checkout, payment, profile and order
endpoints additionally require a customer JWT:

```
Authorization: Bearer <your-jwt-token>
```

## Checkout preconditions

`POST /api/v1/checkout` reports exactly one blocking condition at a time,
in this order: `EMPTY_CART`, then `NOT_AUTHENTICATED`, then
`MISSING_CONTACT_PROFILE`. Clients resolve one and retry.

## Rate limiting

Responses carry rate limit headers when limiting is enabled:
- `X-RateLimit-Limit`: maximum requests per window
- `X-RateLimit-Remaining`: remaining requests in the current window
- `X-RateLimit-Reset`: seconds until the window resets
        "#,
        contact(
            name = "AngoHost Suporte",
            email = "suporte@angohost.ao",
            url = "https://angohost.ao"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://api.angohost.ao", description = "Production server"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Cart", description = "Session cart management"),
        (name = "Pricing", description = "Domain and term price quotes"),
        (name = "Checkout", description = "Checkout orchestration"),
        (name = "Payments", description = "Payment method selection and gateway callback"),
        (name = "Profiles", description = "Billing contact profiles"),
        (name = "Orders", description = "Paid orders and provisioned services")
    ),
    paths(
        // Cart
        crate::handlers::commerce::cart::get_cart,
        crate::handlers::commerce::cart::add_item,
        crate::handlers::commerce::cart::update_item,

        // Pricing
        crate::handlers::commerce::pricing::quote_domain,
        crate::handlers::commerce::pricing::quote_term,

        // Checkout
        crate::handlers::commerce::checkout::start_checkout,
        crate::handlers::commerce::checkout::abandon_checkout,

        // Payments
        crate::handlers::commerce::payment::select_method,
        crate::handlers::commerce::payment::payment_callback,

        // Profiles
        crate::handlers::commerce::profiles::list_profiles,
        crate::handlers::commerce::profiles::create_profile,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,

            // Cart types
            crate::cart::CartItem,
            crate::cart::CartItemPatch,
            crate::cart::ItemDetails,
            crate::handlers::commerce::cart::CartView,
            crate::handlers::commerce::cart::AddItemResponse,
            crate::handlers::commerce::cart::RemoveItemResponse,

            // Pricing types
            crate::handlers::commerce::pricing::DomainQuote,
            crate::handlers::commerce::pricing::TermQuote,

            // Checkout and payment types
            crate::handlers::commerce::checkout::StartCheckoutRequest,
            crate::services::commerce::PaymentHandoff,
            crate::handlers::commerce::payment::SelectMethodRequest,
            crate::handlers::commerce::payment::PaymentInfoView,
            crate::services::commerce::PaymentMethod,
            crate::services::commerce::MethodSelection,
            crate::services::commerce::PaymentOutcome,
            crate::services::commerce::CommitReceipt,

            // Profile types
            crate::services::commerce::CreateContactProfileInput,
            crate::services::commerce::UpdateContactProfileInput,
            crate::entities::contact_profile::Model,

            // Order types
            crate::entities::order::Model,
            crate::entities::order_item::Model,
            crate::entities::invoice::Model,
            crate::services::orders::OrderDetail,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_covers_the_purchase_funnel() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("AngoHost Storefront API"));
        assert!(json.contains("/api/v1/cart"));
        assert!(json.contains("/api/v1/checkout"));
        assert!(json.contains("/api/v1/checkout/payment/callback"));
        assert!(json.contains("/api/v1/orders"));
    }
}
