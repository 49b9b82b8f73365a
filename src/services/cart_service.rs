use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList, ClearCartResult, UpdateCartItemRequest},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems, Model as CartModel},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_cart(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CartList>> {
    let (page, limit, offset) = pagination.normalize();

    let total = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .count(&state.orm)
        .await? as i64;

    let items = CartItems::find()
        .find_also_related(Products)
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_desc(CartCol::CreatedAt)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .filter_map(|(item, product)| product.map(|product| cart_line(item, product)))
        .collect::<AppResult<Vec<CartItemDto>>>()?;

    let subtotal = items
        .iter()
        .try_fold(0i64, |total, line| total.checked_add(line.line_total))
        .ok_or_else(amount_too_large)?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "OK",
        CartList { items, subtotal },
        Some(meta),
    ))
}

/// Adds `quantity` to the user's line for the product, creating the line when missing.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItemDto>> {
    payload.validate()?;

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("product not found".to_string()))?;

    let existing = CartItems::find()
        .filter(line_condition(user.user_id, payload.product_id))
        .one(&state.orm)
        .await?;

    let item = match existing {
        Some(item) => CartItems::update_many()
            .col_expr(
                CartCol::Quantity,
                Expr::col(CartCol::Quantity).add(payload.quantity),
            )
            .col_expr(CartCol::UpdatedAt, Expr::value(Utc::now()))
            .filter(CartCol::Id.eq(item.id))
            .exec_with_returning(&state.orm)
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::NotFound)?,
        None => {
            CartActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                product_id: Set(payload.product_id),
                quantity: Set(payload.quantity),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(&state.orm)
            .await?
        }
    };

    tracing::debug!(
        user_id = %user.user_id,
        product_id = %item.product_id,
        quantity = item.quantity,
        "cart line updated"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", cart_line(item, product)?, None))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItemDto>> {
    payload.validate()?;

    let item = CartItems::update_many()
        .col_expr(CartCol::Quantity, Expr::value(payload.quantity))
        .col_expr(CartCol::UpdatedAt, Expr::value(Utc::now()))
        .filter(line_condition(user.user_id, product_id))
        .exec_with_returning(&state.orm)
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound)?;

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("Cart updated", cart_line(item, product)?, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = CartItems::delete_many()
        .filter(line_condition(user.user_id, product_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<ClearCartResult>> {
    let result = CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        "cart_clear",
        "cart_items",
        serde_json::json!({ "removed": result.rows_affected }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart cleared",
        ClearCartResult {
            removed: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}

fn line_condition(user_id: Uuid, product_id: Uuid) -> Condition {
    Condition::all()
        .add(CartCol::UserId.eq(user_id))
        .add(CartCol::ProductId.eq(product_id))
}

fn amount_too_large() -> AppError {
    AppError::BadRequest("Cart amount is too large".into())
}

fn cart_line(item: CartModel, product: ProductModel) -> AppResult<CartItemDto> {
    let line_total = product
        .price
        .checked_mul(i64::from(item.quantity))
        .ok_or_else(amount_too_large)?;
    Ok(CartItemDto {
        id: item.id,
        product_id: product.id,
        line_total,
        name: product.name,
        description: product.description,
        price: product.price,
        image_url: product.image_url,
        quantity: item.quantity,
        created_at: item.created_at.with_timezone(&Utc),
        updated_at: item.updated_at.with_timezone(&Utc),
    })
}
