//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use benefactor_payments::{CheckoutGateway, RedirectUrls, WebhookOutcome};
use benefactor_records::{
    Customer, Donation, DonationUpdate, EmailEntry, LineItem, NewDonation, Order, OrderUpdate,
    RecordStatus,
};
use benefactor_shop::{CartPricing, DashboardSummary, normalize_lines, summarize};

use crate::auth::AdminAccess;
use crate::error::ApiError;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub admin_configured: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationCheckoutRequest {
    #[serde(flatten)]
    pub donation: NewDonation,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationCheckoutResponse {
    pub session_id: String,
    pub url: String,
    pub donation_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRequest {
    pub items: Vec<LineItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<LineItem>,
    pub pricing: CartPricing,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCheckoutRequest {
    pub items: Vec<LineItem>,
    pub customer: Customer,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCheckoutResponse {
    pub session_id: String,
    pub url: String,
    pub order_id: String,
    pub pricing: CartPricing,
}

/// What the success page may learn about a session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub kind: &'static str,
    pub id: String,
    pub status: RecordStatus,
    pub amount: Decimal,
    pub is_monthly: bool,
}

/// Donor wall entry
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDonation {
    pub name: String,
    pub amount: Decimal,
    pub is_monthly: bool,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRequest {
    pub kind: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    #[serde(flatten)]
    pub outcome: WebhookOutcome,
}

// ============================================================================
// Helpers
// ============================================================================

fn gateway(state: &AppState) -> Result<&dyn CheckoutGateway, ApiError> {
    state
        .gateway
        .as_deref()
        .ok_or_else(ApiError::payments_disabled)
}

/// Caller-supplied redirect, allowed only back onto our own site
fn redirect_url(state: &AppState, requested: Option<String>, default_path: &str) -> Result<String, ApiError> {
    let site = state.config.site_url.as_str();
    match requested {
        None => Ok(format!("{site}{default_path}")),
        Some(url) if url == site || url.starts_with(&format!("{site}/")) => Ok(url),
        Some(url) => Err(ApiError::bad_request(
            "INVALID_REDIRECT",
            format!("redirect URL must stay on {site}, got {url}"),
        )),
    }
}

fn newest_first<T, F>(mut records: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    records.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    records
}

// ============================================================================
// Public Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.gateway.is_some(),
        admin_configured: state.config.admin_key.is_some(),
    })
}

/// Start a donation checkout
pub async fn create_donation_checkout(
    State(state): State<AppState>,
    payload: Result<Json<DonationCheckoutRequest>, JsonRejection>,
) -> ApiResult<DonationCheckoutResponse> {
    let Json(payload) = payload?;
    let gateway = gateway(&state)?;

    let urls = RedirectUrls {
        success_url: redirect_url(
            &state,
            payload.success_url,
            "/donate/success?session_id={CHECKOUT_SESSION_ID}",
        )?,
        cancel_url: redirect_url(&state, payload.cancel_url, "/donate")?,
    };

    let mut donation = Donation::new(payload.donation)?;
    let session = gateway.create_donation_session(&donation, &urls).await?;

    donation.stripe_session_id = Some(session.id.clone());
    let donation = state.donations.insert(donation).await?;

    tracing::info!(
        donation_id = %donation.id,
        amount = %donation.amount,
        monthly = donation.is_monthly,
        "Donation pending"
    );

    Ok(Json(DonationCheckoutResponse {
        session_id: session.id,
        url: session.checkout_url,
        donation_id: donation.id,
    }))
}

/// Price a cart without starting checkout
pub async fn price_cart(
    State(state): State<AppState>,
    payload: Result<Json<CartRequest>, JsonRejection>,
) -> ApiResult<CartResponse> {
    let Json(payload) = payload?;
    let items = normalize_lines(payload.items);
    let pricing = state.config.bundle.price(&items)?;
    Ok(Json(CartResponse { items, pricing }))
}

/// Start a store checkout. Prices are recomputed here, never taken from the client.
pub async fn create_store_checkout(
    State(state): State<AppState>,
    payload: Result<Json<StoreCheckoutRequest>, JsonRejection>,
) -> ApiResult<StoreCheckoutResponse> {
    let Json(payload) = payload?;
    let gateway = gateway(&state)?;

    let urls = RedirectUrls {
        success_url: redirect_url(
            &state,
            payload.success_url,
            "/store/success?session_id={CHECKOUT_SESSION_ID}",
        )?,
        cancel_url: redirect_url(&state, payload.cancel_url, "/store/cart")?,
    };

    let items = normalize_lines(payload.items);
    let pricing = state.config.bundle.price(&items)?;
    let mut order = Order::new(
        items,
        payload.customer,
        payload.notes,
        pricing.totals(),
        state.config.currency.as_str(),
    )?;

    let session = gateway.create_order_session(&order, &urls).await?;
    order.stripe_session_id = Some(session.id.clone());
    let order = state.orders.insert(order).await?;

    tracing::info!(
        order_id = %order.id,
        total = %order.total,
        discount = %pricing.bundle_discount,
        "Order pending"
    );

    Ok(Json(StoreCheckoutResponse {
        session_id: session.id,
        url: session.checkout_url,
        order_id: order.id,
        pricing,
    }))
}

/// Status lookup for the checkout success page
pub async fn checkout_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionStatusResponse> {
    if let Some(d) = state.donations.find_by_session(&session_id).await? {
        return Ok(Json(SessionStatusResponse {
            kind: "donation",
            id: d.id,
            status: d.status,
            amount: d.amount,
            is_monthly: d.is_monthly,
        }));
    }
    if let Some(o) = state.orders.find_by_session(&session_id).await? {
        return Ok(Json(SessionStatusResponse {
            kind: "order",
            id: o.id,
            status: o.status,
            amount: o.total,
            is_monthly: false,
        }));
    }
    Err(ApiError::not_found("Checkout session", &session_id))
}

/// Completed donations whose donors opted into the public wall
pub async fn public_donations(State(state): State<AppState>) -> ApiResult<Vec<PublicDonation>> {
    let donations = state
        .donations
        .list()
        .await?
        .into_iter()
        .filter(|d| d.is_public && d.status == RecordStatus::Completed)
        .collect();

    let wall = newest_first(donations, |d: &Donation| d.created_at)
        .into_iter()
        .map(|d| PublicDonation {
            name: d.donor_info.full_name(),
            amount: d.amount,
            is_monthly: d.is_monthly,
            message: d.message,
            created_at: d.created_at,
        })
        .collect();

    Ok(Json(wall))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<WebhookResponse> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(ApiError::payments_disabled)?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("MISSING_SIGNATURE", "Missing Stripe signature"))?;

    let handler = state.webhook_handler();
    let event = handler.parse_event(&body, signature, secret)?;

    let outcome = handler.handle(&event).await.map_err(|e| {
        tracing::error!(error = %e, event_type = %event.name(), "Webhook processing error");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "WEBHOOK_ERROR",
            "Webhook processing failed",
        )
    })?;

    Ok(Json(WebhookResponse {
        received: true,
        outcome,
    }))
}

// ============================================================================
// Admin Handlers
// ============================================================================

pub async fn list_donations(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> ApiResult<Vec<Donation>> {
    let donations = state.donations.list().await?;
    Ok(Json(newest_first(donations, |d: &Donation| d.created_at)))
}

pub async fn get_donation(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Donation> {
    state
        .donations
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Donation", &id))
}

pub async fn update_donation(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<DonationUpdate>, JsonRejection>,
) -> ApiResult<Donation> {
    let Json(update) = payload?;
    let (donation, ()) = state.donations.update(&id, |d| update.apply(d)).await?;
    tracing::info!(donation_id = %id, status = %donation.status, "Donation updated by admin");
    Ok(Json(donation))
}

pub async fn delete_donation(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    if state.donations.delete(&id).await? {
        Ok(Json(DeleteResponse { deleted: true, id }))
    } else {
        Err(ApiError::not_found("Donation", &id))
    }
}

pub async fn list_orders(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> ApiResult<Vec<Order>> {
    let orders = state.orders.list().await?;
    Ok(Json(newest_first(orders, |o: &Order| o.created_at)))
}

pub async fn get_order(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    state
        .orders
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Order", &id))
}

pub async fn update_order(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<OrderUpdate>, JsonRejection>,
) -> ApiResult<Order> {
    let Json(update) = payload?;
    let (order, ()) = state.orders.update(&id, |o| update.apply(o)).await?;
    tracing::info!(
        order_id = %id,
        status = %order.status,
        delivery_status = %order.delivery_status,
        "Order updated by admin"
    );
    Ok(Json(order))
}

pub async fn delete_order(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    if state.orders.delete(&id).await? {
        Ok(Json(DeleteResponse { deleted: true, id }))
    } else {
        Err(ApiError::not_found("Order", &id))
    }
}

/// Log an email sent to the customer
pub async fn record_order_email(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let Json(request) = payload?;
    if request.kind.trim().is_empty() {
        return Err(ApiError::bad_request("VALIDATION_ERROR", "email kind is required"));
    }

    let (order, ()) = state
        .orders
        .update(&id, |o| {
            let to = request.to.unwrap_or_else(|| o.customer.email.clone());
            o.record_email(EmailEntry {
                kind: request.kind,
                to,
                sent_at: Utc::now(),
                note: request.note,
            });
            Ok(())
        })
        .await?;
    Ok(Json(order))
}

pub async fn dashboard(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> ApiResult<DashboardSummary> {
    let orders = state.orders.list().await?;
    let donations = state.donations.list().await?;
    Ok(Json(summarize(&orders, &donations)))
}
