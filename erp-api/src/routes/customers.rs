//! Customers of the resolved tenant
//!
//! Requires an active `CRM` subscription.
//!
//! - `GET /api/customers?credit_exceeded=true&page=&page_size=`
//! - `POST /api/customers`

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use erp_shared::data::{execute_in_transaction, DataBackend, DataError, Entity, Repository};
use erp_shared::models::module::codes;
use erp_shared::models::{CreateCustomer, Customer};
use erp_shared::specification::catalog::customers_with_credit_exceeded;
use erp_shared::specification::{field, Page, Specification};
use serde::Deserialize;
use tracing::info;

use crate::{app::AppState, error::ApiResult, middleware::tenant::RequestTenant};

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    /// Only active customers whose balance exceeds their credit limit
    #[serde(default)]
    pub credit_exceeded: bool,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Customers by code
pub async fn list_customers<B: DataBackend>(
    State(state): State<AppState<B>>,
    RequestTenant(context): RequestTenant,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Json<Page<Customer>>> {
    let tenant = context.validate_tenant_access(&state.resolver).await?;
    tenant.require_module(codes::CRM, Utc::now())?;

    let spec = if query.credit_exceeded {
        customers_with_credit_exceeded()
    } else {
        Specification::new().order_by(field("code"))
    }
    .as_no_tracking();
    let page = state.page_request(query.page, query.page_size);

    let mut uow = state.backend.tenant(&tenant).await?;
    Ok(Json(uow.customers().find_paged(&spec, page).await?))
}

/// Creates a customer; the code must be unused
pub async fn create_customer<B: DataBackend>(
    State(state): State<AppState<B>>,
    RequestTenant(context): RequestTenant,
    Json(input): Json<CreateCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let tenant = context.validate_tenant_access(&state.resolver).await?;
    tenant.require_module(codes::CRM, Utc::now())?;
    let customer = Customer::create(input)?;

    let mut uow = state.backend.tenant(&tenant).await?;
    let customer = execute_in_transaction(&mut uow, &state.config.retry.strategy(), |uow| {
        let customer = customer.clone();
        Box::pin(async move {
            let repo = uow.customers();
            let by_code = Specification::with_criteria(field("code").eq(customer.code.as_str()));
            if repo.any(&by_code).await? {
                return Err(DataError::Conflict {
                    entity: Customer::NAME,
                    id: customer.code.clone(),
                });
            }
            repo.add(&customer).await?;
            Ok::<_, DataError>(customer)
        })
    })
    .await?;

    info!(tenant_code = %tenant.code(), code = %customer.code, "Customer created");
    Ok((StatusCode::CREATED, Json(customer)))
}
