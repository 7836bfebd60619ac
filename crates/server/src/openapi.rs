use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(ToSchema)]
pub struct ServiceDescriptorDoc { pub name: String, pub version: String, pub url: String }

#[derive(ToSchema)]
pub struct ErrorDoc { pub error: String }

#[derive(ToSchema)]
pub struct AccountDoc {
    pub id: u64,
    pub name: String,
    /// Decimal string, e.g. `"-12.50"`.
    pub balance: String,
    pub active: bool,
}

/// All three fields are required; absent or null ones are reported in a 400.
#[derive(ToSchema)]
pub struct AccountInputDoc {
    pub name: Option<String>,
    /// Number or decimal string.
    pub balance: Option<String>,
    pub active: Option<bool>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::index,
        crate::routes::health,
        crate::routes::accounts::list,
        crate::routes::accounts::get,
        crate::routes::accounts::create,
        crate::routes::accounts::update,
        crate::routes::accounts::deactivate,
        crate::routes::accounts::delete,
    ),
    components(
        schemas(
            HealthResponse,
            ServiceDescriptorDoc,
            ErrorDoc,
            AccountDoc,
            AccountInputDoc,
        )
    ),
    tags(
        (name = "service"),
        (name = "accounts")
    )
)]
pub struct ApiDoc;
