//! API registrar
//!
//! Resource groups (named collections of routes) are registered here during
//! bootstrap. The registrar merges them into one router and publishes the
//! OpenAPI document describing them.

use axum::Router;
use utoipa::openapi::tag::TagBuilder;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Settings;
use crate::error::BootstrapError;
use crate::openapi::ApiDoc;

/// Path of the generated OpenAPI document
pub const OPENAPI_PATH: &str = "/openapi.json";
/// Path of the Swagger UI
pub const SWAGGER_UI_PATH: &str = "/swagger-ui";

/// One route exposed by a resource group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: &'static str,
    pub path: &'static str,
}

/// A named collection of request handlers
#[derive(Clone)]
pub struct ResourceGroup {
    name: String,
    description: String,
    url_prefix: Option<String>,
    routes: Vec<RouteInfo>,
    router: Router,
}

impl ResourceGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>, router: Router) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url_prefix: None,
            routes: Vec::new(),
            router,
        }
    }

    /// Mount every route of the group under `prefix`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = Some(prefix.into());
        self
    }

    /// Declare the routes the group serves, for listings
    pub fn with_routes(mut self, routes: &[RouteInfo]) -> Self {
        self.routes.extend_from_slice(routes);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn url_prefix(&self) -> Option<&str> {
        self.url_prefix.as_deref()
    }

    /// Declared routes with the group prefix applied
    pub fn routes(&self) -> Vec<(&'static str, String)> {
        let prefix = self.url_prefix.as_deref().unwrap_or("");
        self.routes
            .iter()
            .map(|r| (r.method, format!("{prefix}{}", r.path)))
            .collect()
    }
}

impl std::fmt::Debug for ResourceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceGroup")
            .field("name", &self.name)
            .field("url_prefix", &self.url_prefix)
            .field("routes", &self.routes.len())
            .finish()
    }
}

/// Registry of resource groups plus API metadata
#[derive(Debug, Clone)]
pub struct ApiRegistrar {
    title: String,
    version: String,
    groups: Vec<ResourceGroup>,
}

impl ApiRegistrar {
    /// Create an empty registrar titled from the profile
    pub fn new(settings: &Settings) -> Self {
        Self {
            title: settings.api_title.clone(),
            version: settings.api_version.clone(),
            groups: Vec::new(),
        }
    }

    /// Register a group; names must be unique
    pub fn register(&mut self, group: ResourceGroup) -> Result<(), BootstrapError> {
        if self.group(group.name()).is_some() {
            return Err(BootstrapError::DuplicateGroup(group.name().to_string()));
        }

        tracing::info!(
            group = group.name(),
            routes = group.routes.len(),
            "Registered resource group"
        );
        self.groups.push(group);
        Ok(())
    }

    pub fn groups(&self) -> &[ResourceGroup] {
        &self.groups
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(ResourceGroup::name).collect()
    }

    pub fn group(&self, name: &str) -> Option<&ResourceGroup> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// OpenAPI document with this registrar's title, version and group tags
    pub fn openapi(&self) -> utoipa::openapi::OpenApi {
        let mut doc = ApiDoc::openapi();
        doc.info.title = self.title.clone();
        doc.info.version = self.version.clone();
        doc.tags = Some(
            self.groups
                .iter()
                .map(|g| {
                    TagBuilder::new()
                        .name(g.name())
                        .description(Some(g.description()))
                        .build()
                })
                .collect(),
        );
        doc
    }

    /// Router serving every registered group plus the API documentation
    pub fn router(&self) -> Router {
        let router = self
            .groups
            .iter()
            .fold(Router::new(), |router, group| match group.url_prefix() {
                Some(prefix) => router.nest(prefix, group.router.clone()),
                None => router.merge(group.router.clone()),
            });

        router.merge(SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_PATH, self.openapi()))
    }
}
