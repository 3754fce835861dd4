use utoipa::OpenApi;

use crate::routes::{generate, health, models, tasks};

#[derive(OpenApi)]
#[openapi(info(
    title = "motion3d-server",
    description = "Motion transfer inference API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(generate::GenerateApi::openapi());
    root.merge(tasks::TasksApi::openapi());
    root.merge(models::ModelsApi::openapi());
    root
}
