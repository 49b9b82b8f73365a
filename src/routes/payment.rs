use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::payment::{CreatePaymentUrlRequest, PaymentCallbackResponse, PaymentUrlResponse},
    error::AppResult,
    middleware::{auth::AuthUser, client_ip::ClientIp},
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-payment-url", post(create_payment_url))
        .route("/vnpay-callback", get(vnpay_callback))
}

#[utoipa::path(
    post,
    path = "/api/payment/create-payment-url",
    request_body = CreatePaymentUrlRequest,
    responses(
        (status = 200, description = "Signed VNPay redirect URL", body = ApiResponse<PaymentUrlResponse>),
        (status = 400, description = "Order is not pending"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payment"
)]
pub async fn create_payment_url(
    State(state): State<AppState>,
    user: AuthUser,
    ClientIp(ip): ClientIp,
    Json(payload): Json<CreatePaymentUrlRequest>,
) -> AppResult<Json<ApiResponse<PaymentUrlResponse>>> {
    let resp = payment_service::create_payment_url(&state, &user, ip, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/payment/vnpay-callback",
    params(
        ("vnp_SecureHash" = String, Query, description = "HMAC-SHA512 over the other vnp_* parameters"),
        ("vnp_OrderInfo" = String, Query, description = "Contains the order id"),
        ("vnp_ResponseCode" = String, Query, description = "00 on success"),
        ("vnp_TransactionNo" = Option<String>, Query, description = "Gateway transaction number"),
    ),
    responses(
        (status = 200, description = "Payment outcome applied", body = ApiResponse<PaymentCallbackResponse>),
        (status = 400, description = "Invalid signature or order not pending"),
    ),
    security(()),
    tag = "Payment"
)]
pub async fn vnpay_callback(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> AppResult<Json<ApiResponse<PaymentCallbackResponse>>> {
    let resp = payment_service::handle_callback(&state, query).await?;
    Ok(Json(resp))
}
