use std::collections::HashMap;

use chrono::Utc;

use crate::{
    audit,
    dto::payment::{CreatePaymentUrlRequest, PaymentCallbackResponse, PaymentUrlResponse},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::OrderStatus,
    response::{ApiResponse, Meta},
    services::order_service,
    state::AppState,
    vnpay::{self, PaymentRequest, SignatureError},
};

pub async fn create_payment_url(
    state: &AppState,
    user: &AuthUser,
    client_ip: String,
    payload: CreatePaymentUrlRequest,
) -> AppResult<ApiResponse<PaymentUrlResponse>> {
    ensure_gateway(state)?;

    let order = order_service::find_user_order(state, user.user_id, payload.order_id).await?;
    if order.status != OrderStatus::Pending.as_str() {
        return Err(AppError::BadRequest(
            "Order is not in pending payment status".into(),
        ));
    }

    let now = Utc::now();
    let request = PaymentRequest {
        order_id: order.id,
        amount: order.total_amount,
        ip_addr: client_ip,
        txn_ref: now.timestamp_millis().to_string(),
        created_at: now,
    };
    let payment_url =
        vnpay::build_payment_url(&state.vnpay, &request).map_err(|e| match e {
            SignatureError::Amount => {
                AppError::BadRequest("Order amount is out of range for the gateway".into())
            }
            e => AppError::Internal(anyhow::anyhow!("payment url signing failed: {e}")),
        })?;

    tracing::info!(order_id = %order.id, txn_ref = %request.txn_ref, "payment url created");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "payment_url_created",
        "orders",
        serde_json::json!({ "order_id": order.id, "txn_ref": request.txn_ref }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment URL created",
        PaymentUrlResponse { payment_url },
        Some(Meta::empty()),
    ))
}

/// Verify a gateway redirect and apply its outcome to the order.
pub async fn handle_callback(
    state: &AppState,
    query: HashMap<String, String>,
) -> AppResult<ApiResponse<PaymentCallbackResponse>> {
    ensure_gateway(state)?;

    let callback = vnpay::verify_callback(&state.vnpay.hash_secret, &query).map_err(|e| {
        tracing::warn!(error = %e, txn_ref = ?query.get("vnp_TxnRef"), "rejected payment callback");
        AppError::BadRequest("Invalid payment signature".into())
    })?;

    let order_id = callback.order_id.ok_or_else(|| {
        AppError::BadRequest("Callback does not reference an order".into())
    })?;
    let succeeded = callback.is_success();

    let order = order_service::apply_payment_result(
        state,
        order_id,
        succeeded,
        callback.transaction_no.clone(),
        callback.card_type.clone(),
    )
    .await?;

    if let Some(amount) = callback.amount.filter(|amount| *amount != order.total_amount) {
        tracing::warn!(
            order_id = %order.id,
            expected = order.total_amount,
            reported = amount,
            "callback amount differs from order total"
        );
    }

    audit::record(
        &state.pool,
        Some(order.user_id),
        if succeeded { "payment_succeeded" } else { "payment_failed" },
        "orders",
        serde_json::json!({
            "order_id": order.id,
            "response_code": callback.response_code,
            "transaction_no": callback.transaction_no,
        }),
    )
    .await;

    let message = if succeeded {
        "Payment successful"
    } else {
        "Payment failed"
    };

    Ok(ApiResponse::success(
        message,
        PaymentCallbackResponse {
            success: succeeded,
            order_id: order.id,
            transaction_id: callback.transaction_no,
            response_code: callback.response_code,
            message: message.to_string(),
        },
        Some(Meta::empty()),
    ))
}

fn ensure_gateway(state: &AppState) -> AppResult<()> {
    if !state.vnpay.is_configured() {
        return Err(AppError::Internal(anyhow::anyhow!(
            "VNPay gateway is not configured"
        )));
    }
    Ok(())
}
