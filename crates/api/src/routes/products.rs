//! Product catalog handlers.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use mercantile_core::{Category, ProductId};

use crate::db::products::{NewProduct, ProductFilter, ProductPatch, ProductSort};
use crate::db::{ProductRepository, ProductSelector};
use crate::error::{AppError, Result};
use crate::services::media::PRODUCT_IMAGE_SIZE;
use crate::state::AppState;

const DEFAULT_PRODUCT_IMAGE: &str = "https://images.mercantile.example/defaults/product.jpg";

/// Catalog listing query: filters, sort, pagination.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    category: Option<Category>,
    brand: Option<String>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    in_stock: Option<bool>,
    featured: Option<bool>,
    search: Option<String>,
    sort: Option<ProductSort>,
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductPayload {
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    discount: Option<Decimal>,
    #[serde(default)]
    category: Category,
    brand: Option<String>,
    image_cover: Option<String>,
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductPayload {
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    stock: Option<i32>,
    discount: Option<Decimal>,
    category: Option<Category>,
    brand: Option<String>,
}

/// Catalog listing.
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<serde_json::Value>> {
    let filter = ProductFilter {
        category: query.category,
        brand: query.brand,
        min_price: query.min_price,
        max_price: query.max_price,
        in_stock: query.in_stock,
        featured: query.featured,
        search: query.search,
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (products, total) = ProductRepository::new(state.pool())
        .list(&filter, query.sort.unwrap_or_default(), page, limit)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "results": products.len(),
        "total": total,
        "data": { "products": products }
    })))
}

/// One product, addressed by numeric id or slug.
///
/// # Errors
///
/// Returns 404 for an unknown product.
pub async fn show(
    State(state): State<AppState>,
    Path(selector): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let product = ProductRepository::new(state.pool())
        .get(&ProductSelector::from(selector))
        .await?
        .ok_or_else(|| AppError::NotFound("No product found with that ID".to_owned()))?;
    Ok(Json(
        json!({ "status": "success", "data": { "product": product } }),
    ))
}

/// Create a product (admin).
///
/// # Errors
///
/// Fails validation or name-uniqueness errors.
pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductPayload>,
) -> Result<impl IntoResponse> {
    let product = ProductRepository::new(state.pool())
        .create(NewProduct {
            name: payload.name,
            description: payload.description,
            price: payload.price,
            stock: payload.stock,
            discount: payload.discount,
            category: payload.category,
            brand: payload.brand,
            image_cover: payload
                .image_cover
                .unwrap_or_else(|| DEFAULT_PRODUCT_IMAGE.to_owned()),
            images: payload.images,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "product": product } })),
    ))
}

/// Partially update a product (admin).
///
/// # Errors
///
/// Fails on validation errors or an unknown product.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(payload): Json<UpdateProductPayload>,
) -> Result<Json<serde_json::Value>> {
    let product = ProductRepository::new(state.pool())
        .update(
            id,
            ProductPatch {
                name: payload.name,
                description: payload.description,
                price: payload.price,
                stock: payload.stock,
                discount: payload.discount,
                category: payload.category,
                brand: payload.brand,
            },
        )
        .await?;
    Ok(Json(
        json!({ "status": "success", "data": { "product": product } }),
    ))
}

/// Delete a product (admin). Refused while stock remains.
///
/// # Errors
///
/// Returns 400 while stocked, 404 for an unknown product.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    ProductRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Upload product images (admin).
///
/// Multipart fields: `cover` replaces the cover image, each `images` field
/// appends to the gallery. All are resized and re-encoded before upload.
///
/// # Errors
///
/// Fails when uploads aren't configured, a part isn't an image, or the
/// product doesn't exist.
pub async fn upload_images(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    let media = state.media().ok_or_else(|| {
        AppError::BadRequest("image uploads are not configured on this server".to_owned())
    })?;

    let mut cover: Option<String> = None;
    let mut gallery: Vec<String> = Vec::new();
    let mut index = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        match name.as_str() {
            "cover" => {
                let url = media
                    .upload(&bytes, &format!("product-{id}-cover.jpg"), PRODUCT_IMAGE_SIZE)
                    .await?;
                cover = Some(url);
            }
            "images" => {
                index += 1;
                let url = media
                    .upload(
                        &bytes,
                        &format!("product-{id}-{index}.jpg"),
                        PRODUCT_IMAGE_SIZE,
                    )
                    .await?;
                gallery.push(url);
            }
            other => {
                return Err(AppError::BadRequest(format!(
                    "unexpected multipart field: {other}"
                )));
            }
        }
    }

    if cover.is_none() && gallery.is_empty() {
        return Err(AppError::BadRequest("no images in upload".to_owned()));
    }

    let product = ProductRepository::new(state.pool())
        .update_images(
            id,
            cover.as_deref(),
            if gallery.is_empty() {
                None
            } else {
                Some(&gallery)
            },
        )
        .await?;
    Ok(Json(
        json!({ "status": "success", "data": { "product": product } }),
    ))
}
