//! Catalog handlers: product search, product lookup, sellers and shops
//!
//! Author: Shoparena developers

use crate::auth::{AccountView, AuthenticatedAccount};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shoparena_core::{Product, Role, SearchParams};
use std::sync::Arc;
use utoipa::ToSchema;

/// Product as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductView {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub price: i64,
    pub quantity: i32,
    pub seller_id: i64,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            title: p.title,
            description: p.description,
            price: p.price,
            quantity: p.quantity,
            seller_id: p.seller_id,
            category_id: p.category_id,
            created_at: p.created_at,
        }
    }
}

/// A seller together with everything they list
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SellerShop {
    pub seller: AccountView,
    pub products: Vec<ProductView>,
}

/// Search products
///
/// Every parameter is optional and the supplied ones are combined with AND.
/// Empty values and a price of `0` are ignored.
#[utoipa::path(
    get,
    path = "/api/v1/searchproducts",
    tag = "products",
    params(
        ("lower_price" = Option<String>, Query, description = "Inclusive minimum price"),
        ("upper_price" = Option<String>, Query, description = "Inclusive maximum price"),
        ("category" = Option<String>, Query, description = "Exact category name"),
        ("name" = Option<String>, Query, description = "Substring of the product title"),
    ),
    responses(
        (status = 200, description = "Matching products", body = [ProductView]),
        (status = 400, description = "Malformed price", body = crate::error::ApiError),
        (status = 404, description = "Unknown category", body = crate::error::ApiError),
    )
)]
pub async fn search_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let products = state.search.search(&params).await?;

    Ok(Json(
        products.into_iter().map(ProductView::from).collect::<Vec<_>>(),
    ))
}

/// Product by id
#[utoipa::path(
    get,
    path = "/api/v1/product/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ProductView),
        (status = 404, description = "No such product", body = crate::error::ApiError),
    )
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .catalog
        .find_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))?;

    Ok(Json(ProductView::from(product)))
}

/// Active sellers
#[utoipa::path(
    get,
    path = "/api/v1/sellers",
    tag = "products",
    responses(
        (status = 200, description = "Sellers", body = [AccountView]),
    )
)]
pub async fn list_sellers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let sellers = state
        .accounts
        .for_role(Role::Seller)
        .list()
        .await?
        .into_iter()
        .filter(|a| a.is_active)
        .map(|a| AccountView::new(a, Role::Seller))
        .collect::<Vec<_>>();

    Ok(Json(sellers))
}

/// The authenticated seller's shop
#[utoipa::path(
    get,
    path = "/api/v1/seller/shop",
    tag = "products",
    responses(
        (status = 200, description = "Seller and their products", body = SellerShop),
        (status = 401, description = "Not authenticated as a seller", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn seller_shop(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthenticatedAccount>,
) -> Result<impl IntoResponse, AppError> {
    let products = state.search.seller_products(auth.account.id).await?;

    Ok(Json(SellerShop {
        seller: AccountView::new(auth.account, auth.role),
        products: products.into_iter().map(ProductView::from).collect(),
    }))
}
