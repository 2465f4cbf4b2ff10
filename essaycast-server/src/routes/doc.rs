use utoipa::OpenApi;

use crate::routes::{generate, health};

#[derive(OpenApi)]
#[openapi(info(
    title = "essaycast-server",
    description = "Turn a topic into a narrated, illustrated video",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(generate::GenerateApi::openapi());
    root
}
