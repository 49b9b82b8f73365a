use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartItemDto, CartList, ClearCartResult, UpdateCartItemRequest},
        orders::{CreateOrderRequest, OrderList, OrderWithItems, UpdateOrderStatusRequest},
        payment::{CreatePaymentUrlRequest, PaymentCallbackResponse, PaymentUrlResponse},
        products::{
            CreateProductRequest, ImageUploadForm, ProductImageForm, ProductList,
            UpdateProductRequest, UploadedImage,
        },
    },
    models::{Order, OrderItem, OrderStatus, Product},
    response::{ApiResponse, Meta},
    routes::{cart, health, orders, params, payment, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Storefront API", description = "Catalog, cart, orders and VNPay payments"),
    paths(
        health::health_check,
        products::list_products,
        products::get_product,
        products::create_product,
        products::create_product_with_image,
        products::upload_image,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        cart::clear_cart,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order_status,
        payment::create_payment_url,
        payment::vnpay_callback
    ),
    components(
        schemas(
            Product,
            Order,
            OrderItem,
            OrderStatus,
            CreateProductRequest,
            UpdateProductRequest,
            ProductImageForm,
            ImageUploadForm,
            UploadedImage,
            ProductList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartItemDto,
            CartList,
            ClearCartResult,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            CreatePaymentUrlRequest,
            PaymentUrlResponse,
            PaymentCallbackResponse,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<PaymentUrlResponse>,
            ApiResponse<PaymentCallbackResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product catalog and images"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payment", description = "VNPay payment endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
