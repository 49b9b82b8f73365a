use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentUrlRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentUrlResponse {
    pub payment_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentCallbackResponse {
    pub success: bool,
    pub order_id: Uuid,
    pub transaction_id: Option<String>,
    pub response_code: String,
    pub message: String,
}
