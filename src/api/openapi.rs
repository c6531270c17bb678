//! OpenAPI document assembled from the handler annotations.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::auth::API_KEY_HEADER;
use super::dto::{
    AccountHealthDto, BalancesResponse, BoostStatusResponse, EngagementRequest,
    EngagementResponse, GrantRequest, GrantResponse, InternalBoostRequest, LinkIdentityRequest,
    PlaceOrderRequest, RedeemBoostRequest, RedeemBoostResponse, StatsResponse, WebhookAck,
};
use super::handlers::{boost, ledger, system, webhook};
use crate::error::{ErrorBody, ErrorResponse};

/// The gateway's OpenAPI document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "boost-gateway",
        description = "Payment webhooks, balance redemption and resilient social posting for sponsored boosts."
    ),
    paths(
        system::health_handler,
        system::account_health_handler,
        system::stats_handler,
        boost::place_order,
        boost::get_boost,
        boost::redeem,
        boost::publish_internal,
        webhook::payment_webhook,
        ledger::get_balances,
        ledger::grant_balance,
        ledger::record_engagement,
        ledger::link_identity,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        PlaceOrderRequest,
        BoostStatusResponse,
        RedeemBoostRequest,
        RedeemBoostResponse,
        InternalBoostRequest,
        WebhookAck,
        BalancesResponse,
        GrantRequest,
        GrantResponse,
        EngagementRequest,
        EngagementResponse,
        LinkIdentityRequest,
        StatsResponse,
        AccountHealthDto,
    )),
    modifiers(&ApiKeyScheme),
    tags(
        (name = "Boosts", description = "Boost orders, status and redemption"),
        (name = "Webhooks", description = "Payment provider callbacks"),
        (name = "Balances", description = "Subscription credits and reward points"),
        (name = "Rewards", description = "Engagement rewards"),
        (name = "System", description = "Health and diagnostics"),
    )
)]
pub struct ApiDoc;

#[derive(Debug)]
struct ApiKeyScheme;

impl Modify for ApiKeyScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}
