use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use rusqlite::Connection;
use tower_http::cors::{Any, CorsLayer};

use memoria_blob::BlobStore;
use memoria_buffer::Buffer;
use memoria_context::ContextAssembler;
use memoria_core::config::{EffectiveConfig, EmbeddingProvider, MemoriaConfig};
use memoria_event::EventStore;
use memoria_llm::{
    CompletionOutcome, CompletionRequest, EmbedRequest, JinaEmbeddingGateway, LlmEventEmbedder,
    LlmGateway, OpenAiCompatGateway, UsageSink,
};
use memoria_kv::{DistributedLock, InProcessCache, InProcessLock, TtlCache};
use memoria_pipeline::config::ProjectConfigProvider;
use memoria_pipeline::ChatFlusher;
use memoria_profile::ProfileStore;

use crate::project::ProjectStore;
use crate::telemetry::{self, TelemetryUsageSink};
use crate::users::UserStore;

/// Everything a handler needs, built once at startup and shared behind an
/// `Arc`.
pub struct AppState {
    pub config: MemoriaConfig,
    pub blobs: Arc<BlobStore>,
    pub buffer: Arc<Buffer>,
    pub profiles: Arc<ProfileStore>,
    pub events: Arc<EventStore>,
    pub llm: Arc<dyn LlmGateway>,
    pub context: Arc<ContextAssembler>,
    pub projects: Arc<ProjectStore>,
    pub users: Arc<UserStore>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub async fn new(config: MemoriaConfig) -> anyhow::Result<Arc<Self>> {
        let metrics = telemetry::install();

        let projects = Arc::new(ProjectStore::new(open_conn(&config.database.path)?)?);
        let users = Arc::new(UserStore::new(open_conn(&config.database.path)?)?);
        let blobs = Arc::new(BlobStore::new(open_conn(&config.database.path)?)?);

        let cache: Arc<dyn TtlCache> = Arc::new(InProcessCache::new());
        let profiles = Arc::new(ProfileStore::new(
            open_conn(&config.database.path)?,
            cache,
            Duration::from_secs(config.cache_user_profiles_ttl.max(0) as u64),
        )?);

        let http_client = reqwest::Client::new();
        let usage_sink: Arc<dyn UsageSink> = Arc::new(TelemetryUsageSink::new(projects.clone()));

        let completion_gateway = Arc::new(
            OpenAiCompatGateway::new(
                http_client.clone(),
                config.providers.llm_base_url.clone(),
                config.providers.llm_api_key.clone(),
                config.best_llm_model.clone(),
                config.embedding_model.clone(),
            )
            .with_usage_sink(usage_sink.clone()),
        );

        let embedding_gateway: Option<Arc<dyn LlmGateway>> = match config.providers.embedding_provider {
            Some(EmbeddingProvider::Jina) => Some(Arc::new(
                JinaEmbeddingGateway::new(
                    http_client.clone(),
                    config.providers.embedding_base_url.clone(),
                    config.providers.embedding_api_key.clone().unwrap_or_default(),
                    config.embedding_model.clone(),
                )
                .with_usage_sink(usage_sink.clone()),
            )),
            Some(EmbeddingProvider::OpenAi) => Some(Arc::new(
                OpenAiCompatGateway::new(
                    http_client.clone(),
                    config.providers.embedding_base_url.clone(),
                    config
                        .providers
                        .embedding_api_key
                        .clone()
                        .unwrap_or_else(|| config.providers.llm_api_key.clone()),
                    config.best_llm_model.clone(),
                    config.embedding_model.clone(),
                )
                .with_usage_sink(usage_sink.clone()),
            ) as Arc<dyn LlmGateway>),
            None => None,
        };

        let llm: Arc<dyn LlmGateway> = Arc::new(CompositeLlmGateway {
            completion: completion_gateway,
            embedding: embedding_gateway,
        });

        let lock: Arc<dyn DistributedLock> = Arc::new(InProcessLock::new());

        let event_embedder: Option<Arc<dyn memoria_event::EventEmbedder>> = if config.enable_event_embedding {
            Some(Arc::new(LlmEventEmbedder::new(
                llm.clone(),
                memoria_core::types::ROOT_PROJECT_ID,
                Some(config.embedding_model.clone()),
            )))
        } else {
            None
        };
        let events = Arc::new(EventStore::new(
            open_conn(&config.database.path)?,
            event_embedder,
            config.embedding_dim,
        )?);

        let config_provider: Arc<dyn ProjectConfigProvider> = Arc::new(ServerConfigProvider {
            global: config.clone(),
            projects: projects.clone(),
        });
        let flusher = Arc::new(ChatFlusher::new(
            profiles.clone(),
            events.clone(),
            llm.clone(),
            config_provider,
            config.llm_tab_separator.clone(),
            config.max_profile_subtopics,
            config.max_pre_profile_token_size,
            config.best_llm_model.clone(),
            config.summary_llm_model.clone(),
        ));

        let buffer_store = memoria_buffer::BufferStore::new(open_conn(&config.database.path)?)?;
        let buffer = Arc::new(Buffer::new(
            buffer_store,
            blobs.clone(),
            lock,
            flusher as Arc<dyn memoria_buffer::BlobProcessor>,
            config.buffer_flush_interval,
            config.max_chat_blob_buffer_token_size as i64,
            Duration::from_secs(config.user_lock_ttl_secs),
            Duration::from_secs(config.user_lock_max_wait_secs),
            config.persistent_chat_blobs,
        ));

        let context = Arc::new(ContextAssembler::new(
            profiles.clone(),
            events.clone(),
            llm.clone(),
            config.enable_event_embedding,
        ));

        Ok(Arc::new(Self {
            config,
            blobs,
            buffer,
            profiles,
            events,
            llm,
            context,
            projects,
            users,
            metrics,
        }))
    }
}

fn open_conn(path: &str) -> rusqlite::Result<Connection> {
    Connection::open(path)
}

/// Forwards completions to a primary provider and embeddings to an optional
/// secondary one. Falls back to the primary for
/// embeddings when no secondary is configured.
struct CompositeLlmGateway {
    completion: Arc<OpenAiCompatGateway>,
    embedding: Option<Arc<dyn LlmGateway>>,
}

#[async_trait::async_trait]
impl LlmGateway for CompositeLlmGateway {
    async fn complete(&self, req: CompletionRequest) -> memoria_llm::Result<CompletionOutcome> {
        self.completion.complete(req).await
    }

    async fn embed(&self, req: EmbedRequest) -> memoria_llm::Result<Vec<Vec<f32>>> {
        match &self.embedding {
            Some(gateway) => gateway.embed(req).await,
            None => self.completion.embed(req).await,
        }
    }
}

/// Bridges the project registry to `memoria-pipeline`'s config seam:
/// resolves a project's stored `profile_config` against the global
/// defaults on every pipeline run.
struct ServerConfigProvider {
    global: MemoriaConfig,
    projects: Arc<ProjectStore>,
}

#[async_trait::async_trait]
impl ProjectConfigProvider for ServerConfigProvider {
    async fn resolve(&self, project_id: &str) -> memoria_pipeline::Result<EffectiveConfig> {
        let project_config = self
            .projects
            .profile_config(project_id)
            .map_err(memoria_pipeline::PipelineError::Core)?;
        Ok(memoria_core::config::ConfigResolver::resolve(&self.global, Some(&project_config)))
    }
}

/// Assembles the full Axum router. `/healthcheck`
/// and `/metrics` stay outside `require_auth` since they carry no project
/// scope.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, "x-project-id".parse().unwrap()]);

    let authed = Router::new()
        .route("/users", post(crate::http::users::create_user))
        .route(
            "/users/{uid}",
            get(crate::http::users::get_user)
                .put(crate::http::users::update_user)
                .delete(crate::http::users::delete_user),
        )
        .route("/users/blobs/{uid}/{blob_type}", get(crate::http::blobs::list_blobs))
        .route("/blobs/insert/{uid}", post(crate::http::blobs::insert_blob))
        .route(
            "/blobs/{uid}/{bid}",
            get(crate::http::blobs::get_blob).delete(crate::http::blobs::delete_blob),
        )
        .route("/users/buffer/{uid}/{blob_type}", post(crate::http::buffer::flush_buffer))
        .route(
            "/users/profile/{uid}",
            get(crate::http::profile::list_profiles).post(crate::http::profile::add_profile),
        )
        .route(
            "/users/profile/{uid}/{pid}",
            get(crate::http::profile::get_profile)
                .put(crate::http::profile::update_profile)
                .delete(crate::http::profile::delete_profile),
        )
        .route(
            "/users/event/{uid}",
            get(crate::http::event::list_events),
        )
        .route(
            "/users/event/{uid}/{eid}",
            get(crate::http::event::get_event)
                .put(crate::http::event::update_event)
                .delete(crate::http::event::delete_event),
        )
        .route("/users/event/search/{uid}", get(crate::http::event::search_events))
        .route("/users/context/{uid}", get(crate::http::context::assemble_context))
        .route(
            "/project/profile_config",
            get(crate::http::project::get_profile_config).post(crate::http::project::set_profile_config),
        )
        .route("/project/billing", get(crate::http::project::billing))
        // telemetry applied first so it nests inside auth and can read the
        // `AuthedProject` extension auth stashes before calling `next`.
        .route_layer(middleware::from_fn(telemetry::track_authed))
        .route_layer(middleware::from_fn_with_state(state.clone(), crate::auth::require_auth));

    let anonymous = Router::new()
        .route("/healthcheck", get(crate::http::health::health_handler))
        .route("/metrics", get(crate::http::health::metrics_handler))
        .route_layer(middleware::from_fn(telemetry::track_anonymous));

    Router::new()
        .merge(anonymous)
        .merge(authed)
        .with_state(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
