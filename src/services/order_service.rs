use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// Σ price × quantity over `(price, quantity)` pairs; `None` on overflow.
pub fn order_total<I>(lines: I) -> Option<i64>
where
    I: IntoIterator<Item = (i64, i32)>,
{
    lines.into_iter().try_fold(0i64, |total, (price, quantity)| {
        price
            .checked_mul(i64::from(quantity))
            .and_then(|line| total.checked_add(line))
    })
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        let status: OrderStatus = status.parse().map_err(AppError::BadRequest)?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Turns the user's cart into a `pending` order with snapshotted items, then empties the cart.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    payload.validate()?;

    let txn = state.orm.begin().await?;

    let lines: Vec<_> = CartItems::find()
        .find_also_related(Products)
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .all(&txn)
        .await?
        .into_iter()
        .filter_map(|(item, product)| product.map(|product| (item, product)))
        .collect();

    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let total_amount = order_total(
        lines
            .iter()
            .map(|(item, product)| (product.price, item.quantity)),
    )
    .ok_or_else(|| AppError::BadRequest("Order total is too large".into()))?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending.to_string()),
        payment_method: Set(Some(payload.payment_method)),
        payment_id: Set(None),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for (item, product) in lines {
        let row = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            product_name: Set(product.name),
            product_price: Set(product.price),
            quantity: Set(item.quantity),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(OrderItem::from(row));
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, user_id = %user.user_id, total_amount, "order created");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_user_order(state, user.user_id, id).await?;
    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// The order if it belongs to `user_id`; 404 otherwise.
pub async fn find_user_order(state: &AppState, user_id: Uuid, id: Uuid) -> AppResult<Order> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .map(Order::from)
        .ok_or(AppError::NotFound)
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let status: OrderStatus = payload.status.parse().map_err(AppError::BadRequest)?;

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let previous = order.status.clone();
    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(status.to_string());
    if let Some(payment_id) = payload.payment_id.filter(|p| !p.trim().is_empty()) {
        active.payment_id = Set(Some(payment_id));
    }
    if status == OrderStatus::Paid {
        active.paid_at = Set(Some(now.into()));
    }
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;
    let items = load_items(&txn, order.id).await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, from = %previous, to = %status, "order status updated");
    audit::record(
        &state.pool,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": previous, "to": status.as_str() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Records a gateway outcome. Only a `pending` order may move, to `paid` or `failed`.
pub async fn apply_payment_result(
    state: &AppState,
    order_id: Uuid,
    succeeded: bool,
    payment_id: Option<String>,
    payment_method: Option<String>,
) -> AppResult<Order> {
    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if order.status != OrderStatus::Pending.as_str() {
        return Err(AppError::BadRequest(format!(
            "Order is already {}",
            order.status
        )));
    }

    let now = Utc::now();
    let status = if succeeded {
        OrderStatus::Paid
    } else {
        OrderStatus::Failed
    };

    let mut active: OrderActive = order.into();
    active.status = Set(status.to_string());
    if let Some(payment_id) = payment_id.filter(|p| !p.is_empty()) {
        active.payment_id = Set(Some(payment_id));
    }
    if let Some(method) = payment_method.filter(|m| !m.is_empty()) {
        active.payment_method = Set(Some(method));
    }
    if succeeded {
        active.paid_at = Set(Some(now.into()));
    }
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    tracing::info!(order_id = %order.id, status = %status, "payment result applied");
    Ok(Order::from(order))
}

async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect())
}
