//! Product catalog of the resolved tenant
//!
//! Requires an active `INVENTORY` subscription.
//!
//! - `GET /api/products?min_price=&max_price=&page=&page_size=`
//! - `POST /api/products`
//!
//! Both are also served under `/api/t/:tenant/...`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use erp_shared::data::{execute_in_transaction, DataBackend, DataError, Entity, Repository};
use erp_shared::models::module::codes;
use erp_shared::models::{CreateProduct, Product};
use erp_shared::specification::catalog::products_in_price_range;
use erp_shared::specification::{field, Page, Specification};
use erp_shared::tenancy::{TenantContext, ValidatedTenant};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::tenant::RequestTenant,
};

/// Product list filters; both bounds are inclusive
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

async fn inventory_access<B: DataBackend>(
    state: &AppState<B>,
    context: &TenantContext,
) -> ApiResult<ValidatedTenant> {
    let tenant = context.validate_tenant_access(&state.resolver).await?;
    tenant.require_module(codes::INVENTORY, Utc::now())?;
    Ok(tenant)
}

/// Active products in a price range, cheapest first
pub async fn list_products<B: DataBackend>(
    State(state): State<AppState<B>>,
    RequestTenant(context): RequestTenant,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Page<Product>>> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price) {
        if min > max {
            return Err(ApiError::BadRequest(
                "invalid_query",
                "min_price must not exceed max_price".to_string(),
            ));
        }
    }

    let tenant = inventory_access(&state, &context).await?;
    let page = state.page_request(query.page, query.page_size);
    let spec = products_in_price_range(query.min_price, query.max_price).as_no_tracking();

    let mut uow = state.backend.tenant(&tenant).await?;
    let products = uow.products().find_paged(&spec, page).await?;
    Ok(Json(products))
}

/// Creates a product; the SKU must be unused
pub async fn create_product<B: DataBackend>(
    State(state): State<AppState<B>>,
    RequestTenant(context): RequestTenant,
    Json(input): Json<CreateProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let tenant = inventory_access(&state, &context).await?;
    let product = Product::create(input)?;

    let mut uow = state.backend.tenant(&tenant).await?;
    let product = execute_in_transaction(&mut uow, &state.config.retry.strategy(), |uow| {
        let product = product.clone();
        Box::pin(async move {
            let repo = uow.products();
            let by_sku = Specification::with_criteria(field("sku").eq(product.sku.as_str()));
            if repo.any(&by_sku).await? {
                return Err(DataError::Conflict {
                    entity: Product::NAME,
                    id: product.sku.clone(),
                });
            }
            repo.add(&product).await?;
            Ok::<_, DataError>(product)
        })
    })
    .await?;

    info!(tenant_code = %tenant.code(), sku = %product.sku, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}
