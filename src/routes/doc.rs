use utoipa::{OpenApi, openapi::OpenApi as OpenApiSpec};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::cart::{ItemList, MergeQuery},
    models::{Cart, Item},
    response::{ApiResponse, Meta},
    routes::{cart, health},
};

#[derive(OpenApi)]
#[openapi(
    info(title = "sockshop-carts", description = "Shopping cart service"),
    paths(
        health::health_check,
        cart::get_cart,
        cart::delete_cart,
        cart::merge_carts,
        cart::list_items,
        cart::add_item,
        cart::update_item,
        cart::get_item,
        cart::delete_item
    ),
    components(
        schemas(
            Cart,
            Item,
            ItemList,
            MergeQuery,
            health::HealthData,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<Item>,
            ApiResponse<ItemList>
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Carts", description = "Shopping cart endpoints"),
        (name = "Items", description = "Cart item endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
