//! Catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use domain::{Money, Product, ProductUpdate};
use serde::{Deserialize, Serialize};
use store::OrderStore;

use super::identity::Identity;
use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    pub price_minor: i64,
    #[serde(default)]
    pub stock: u32,
    pub active: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price_minor: Option<i64>,
    pub active: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price_minor: i64,
    pub stock: u32,
    pub active: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            category: product.category,
            price_minor: product.price.minor(),
            stock: product.stock,
            active: product.active,
            description: product.description,
            image_url: product.image_url,
        }
    }
}

// -- Handlers --

/// POST /products: add a product to the catalog.
#[tracing::instrument(skip(state, actor, req))]
pub async fn create<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let mut product = Product::new(
        req.name,
        req.category,
        Money::from_minor(req.price_minor),
        req.stock,
    );
    product.active = req.active.unwrap_or(true);
    product.description = req.description;
    product.image_url = req.image_url;

    let product = state.engine.create_product(&actor, product).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/{id}: read a product.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    let product = state.engine.get_product(product_id).await?;
    Ok(Json(product.into()))
}

/// PATCH /products/{id}: edit descriptive fields, price or the active flag.
#[tracing::instrument(skip(state, actor, req))]
pub async fn update<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    let update = ProductUpdate {
        name: req.name,
        category: req.category,
        price: req.price_minor.map(Money::from_minor),
        active: req.active,
        description: req.description,
        image_url: req.image_url,
    };

    let product = state
        .engine
        .update_product(&actor, product_id, update)
        .await?;
    Ok(Json(product.into()))
}

/// POST /products/{id}/restock: add stock through the inventory ledger.
#[tracing::instrument(skip(state, actor, req))]
pub async fn restock<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Identity(actor): Identity,
    Path(id): Path<String>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id("product", &id)?;
    let product = state
        .engine
        .restock(&actor, product_id, req.quantity)
        .await?;
    Ok(Json(product.into()))
}
