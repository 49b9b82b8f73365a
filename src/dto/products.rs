use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::Product;

/// Upper bound on a product price, in VND.
pub const MAX_PRICE: i64 = 1_000_000_000;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 2, max = 100, message = "name must be 2-100 characters"))]
    pub name: String,
    #[validate(length(min = 10, max = 500, message = "description must be 10-500 characters"))]
    pub description: String,
    #[validate(range(
        min = 1,
        max = MAX_PRICE,
        message = "price must be between 1 and 1000000000"
    ))]
    pub price: i64,
    #[validate(url(message = "image_url must be a valid URL"), length(max = 500))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 2, max = 100, message = "name must be 2-100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 10, max = 500, message = "description must be 10-500 characters"))]
    pub description: Option<String>,
    #[validate(range(
        min = 1,
        max = MAX_PRICE,
        message = "price must be between 1 and 1000000000"
    ))]
    pub price: Option<i64>,
    #[validate(url(message = "image_url must be a valid URL"), length(max = 500))]
    pub image_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedImage {
    pub key: String,
    pub url: String,
}

/// Multipart body of `POST /api/products/with-image`.
#[derive(ToSchema)]
pub struct ProductImageForm {
    pub name: String,
    pub description: String,
    pub price: i64,
    #[schema(value_type = Option<String>, format = Binary)]
    pub image: Option<Vec<u8>>,
}

/// Multipart body of `POST /api/products/images`.
#[derive(ToSchema)]
pub struct ImageUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}
