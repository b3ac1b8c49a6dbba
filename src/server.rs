//! Plugin protocol server.
//!
//! [`ProviderService`] is the provider-facing trait, expressed in JSON values
//! and schema types. [`serve`] and friends bind a TCP listener, print the
//! handshake line on stdout and run the gRPC `Provider` service until SIGTERM
//! or SIGINT arrives. In-flight requests then get
//! [`ServeOptions::shutdown_timeout`] to finish before [`ProviderService::stop`]
//! is called.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as pb;
use crate::schema::{BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION};

/// Error returned by the serve functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Operations a provider implements. The gRPC layer translates to and from
/// protobuf messages around it.
///
/// `read` returns `Ok(None)` when the remote object is gone or has drifted
/// beyond repair; the host then drops it from state and plans a create.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Provider, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Resource and data source names, derived from [`Self::schema`].
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        ProviderMetadata {
            resources: schema.resources.keys().cloned().collect(),
            data_sources: schema.data_sources.keys().cloned().collect(),
            capabilities: Default::default(),
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Migrate state written by an older schema version. Identity by default.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Option<Value>, ProviderError>;

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            resource_type
        )))
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

// =============================================================================
// Wire conversions
// =============================================================================

/// Decode a JSON payload. Empty bytes decode to null.
fn decode(bytes: &[u8], what: &str) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes)
        .map_err(|e| ProviderError::InvalidRequest(format!("{} is not valid JSON: {}", what, e)))
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| pb::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => pb::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_proto(err: &ProviderError) -> Vec<pb::Diagnostic> {
    diagnostics_to_proto(vec![Diagnostic::error(err.to_string())])
}

fn schema_to_proto(schema: &crate::schema::Schema) -> pb::Schema {
    pb::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &crate::schema::Block) -> pb::Block {
    pb::Block {
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| pb::Attribute {
                name: name.clone(),
                r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                description: attr.description.clone().unwrap_or_default(),
                force_new: attr.force_new,
                default_value: attr.default.as_ref().map(encode).unwrap_or_default(),
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|(name, nested)| pb::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: match nested.nesting_mode {
                    BlockNestingMode::Single => pb::nested_block::NestingMode::Single as i32,
                    BlockNestingMode::List => pb::nested_block::NestingMode::List as i32,
                    BlockNestingMode::Set => pb::nested_block::NestingMode::Set as i32,
                    BlockNestingMode::Map => pb::nested_block::NestingMode::Map as i32,
                },
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

fn log_diagnostics(operation: &str, kind: &str, diagnostics: &[Diagnostic]) {
    if diagnostics.iter().any(Diagnostic::is_error) {
        warn!(kind, diagnostics = diagnostics.len(), "{} reported errors", operation);
    } else {
        debug!(kind, "{} passed", operation);
    }
}

// =============================================================================
// gRPC adapter
// =============================================================================

/// Adapts a [`ProviderService`] to the generated `Provider` gRPC trait.
struct GrpcProvider<P: ProviderService> {
    provider: Arc<P>,
}

impl<P: ProviderService> GrpcProvider<P> {
    fn check(
        &self,
        operation: &str,
        kind: &str,
        result: Result<Vec<Diagnostic>, ProviderError>,
    ) -> Vec<pb::Diagnostic> {
        match result {
            Ok(diagnostics) => {
                log_diagnostics(operation, kind, &diagnostics);
                diagnostics_to_proto(diagnostics)
            },
            Err(e) => {
                error!(kind, error = %e, "{} failed", operation);
                error_to_proto(&e)
            },
        }
    }
}

#[tonic::async_trait]
impl<P: ProviderService> pb::provider_server::Provider for GrpcProvider<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<pb::GetMetadataRequest>,
    ) -> Result<Response<pb::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "metadata served"
        );
        Ok(Response::new(pb::GetMetadataResponse {
            server_capabilities: Some(pb::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<pb::GetSchemaRequest>,
    ) -> Result<Response<pb::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "schema served"
        );
        Ok(Response::new(pb::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<pb::ValidateProviderConfigRequest>,
    ) -> Result<Response<pb::ValidateProviderConfigResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => self.provider.validate_provider_config(config).await,
            Err(e) => Err(e),
        };
        let diagnostics = self.check("ValidateProviderConfig", "provider", result);
        Ok(Response::new(pb::ValidateProviderConfigResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<pb::ConfigureRequest>,
    ) -> Result<Response<pb::ConfigureResponse>, Status> {
        let req = request.into_inner();
        let result = match decode(&req.config, "config") {
            Ok(config) => self.provider.configure(config).await,
            Err(e) => Err(e),
        };
        let diagnostics = self.check("Configure", "provider", result);
        if diagnostics.is_empty() {
            info!("provider configured");
        }
        Ok(Response::new(pb::ConfigureResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(&self, _request: Request<pb::StopRequest>) -> Result<Response<pb::StopResponse>, Status> {
        info!("stop requested");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "stop failed");
                e.to_string()
            },
        };
        Ok(Response::new(pb::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type))]
    async fn validate_resource_config(
        &self,
        request: Request<pb::ValidateResourceConfigRequest>,
    ) -> Result<Response<pb::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = match decode(&req.config, "config") {
            Ok(config) => {
                self.provider
                    .validate_resource_config(&req.resource_type, config)
                    .await
            },
            Err(e) => Err(e),
        };
        let diagnostics = self
            .check("ValidateResourceConfig", &req.resource_type, result);
        Ok(Response::new(pb::ValidateResourceConfigResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state", fields(resource_type, version))]
    async fn upgrade_resource_state(
        &self,
        request: Request<pb::UpgradeResourceStateRequest>,
    ) -> Result<Response<pb::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("version", req.version);

        let result = match decode(&req.raw_state, "raw_state") {
            Ok(state) => {
                self.provider
                    .upgrade_resource_state(&req.resource_type, req.version, state)
                    .await
            },
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(upgraded) => pb::UpgradeResourceStateResponse {
                upgraded_state: encode(&upgraded),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "state upgrade failed");
                pb::UpgradeResourceStateResponse {
                    upgraded_state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type))]
    async fn plan(&self, request: Request<pb::PlanRequest>) -> Result<Response<pb::PlanResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let inputs = (|| {
            let prior = match decode(&req.prior_state, "prior_state")? {
                Value::Null => None,
                v => Some(v),
            };
            let proposed = decode(&req.proposed_state, "proposed_state")?;
            let config = decode(&req.config, "config")?;
            Ok::<_, ProviderError>((prior, proposed, config))
        })();

        let result = match inputs {
            Ok((prior, proposed, config)) => {
                self.provider
                    .plan(&req.resource_type, prior, proposed, config)
                    .await
            },
            Err(e) => Err(e),
        };

        let response = match result {
            Ok(plan) => {
                debug!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "planned"
                );
                pb::PlanResponse {
                    planned_state: encode(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "plan failed");
                pb::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type))]
    async fn create(&self, request: Request<pb::CreateRequest>) -> Result<Response<pb::CreateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let result = match decode(&req.planned_state, "planned_state") {
            Ok(planned) => self.provider.create(&req.resource_type, planned).await,
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(state) => {
                info!("created");
                pb::CreateResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "create failed");
                pb::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type))]
    async fn read(&self, request: Request<pb::ReadRequest>) -> Result<Response<pb::ReadResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let result = match decode(&req.current_state, "current_state") {
            Ok(current) => self.provider.read(&req.resource_type, current).await,
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(Some(state)) => pb::ReadResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Ok(None) => {
                info!("remote object gone, dropping from state");
                pb::ReadResponse {
                    state: vec![],
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "read failed");
                pb::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type))]
    async fn update(&self, request: Request<pb::UpdateRequest>) -> Result<Response<pb::UpdateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let inputs = decode(&req.prior_state, "prior_state")
            .and_then(|prior| Ok((prior, decode(&req.planned_state, "planned_state")?)));
        let result = match inputs {
            Ok((prior, planned)) => {
                self.provider
                    .update(&req.resource_type, prior, planned)
                    .await
            },
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(state) => {
                info!("updated");
                pb::UpdateResponse {
                    state: encode(&state),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "update failed");
                pb::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type))]
    async fn delete(&self, request: Request<pb::DeleteRequest>) -> Result<Response<pb::DeleteResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());

        let result = match decode(&req.current_state, "current_state") {
            Ok(current) => self.provider.delete(&req.resource_type, current).await,
            Err(e) => Err(e),
        };
        let diagnostics = match result {
            Ok(()) => {
                info!("deleted");
                vec![]
            },
            Err(e) => {
                error!(error = %e, "delete failed");
                error_to_proto(&e)
            },
        };
        Ok(Response::new(pb::DeleteResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type, id))]
    async fn import_resource_state(
        &self,
        request: Request<pb::ImportResourceStateRequest>,
    ) -> Result<Response<pb::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("id", req.id.as_str());

        let response = match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => {
                info!(count = imported.len(), "imported");
                pb::ImportResourceStateResponse {
                    imported: imported
                        .into_iter()
                        .map(|r| pb::ImportedResource {
                            resource_type: r.resource_type,
                            state: encode(&r.state),
                        })
                        .collect(),
                    diagnostics: vec![],
                }
            },
            Err(e) => {
                error!(error = %e, "import failed");
                pb::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type))]
    async fn validate_data_source_config(
        &self,
        request: Request<pb::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<pb::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());

        let result = match decode(&req.config, "config") {
            Ok(config) => {
                self.provider
                    .validate_data_source_config(&req.data_source_type, config)
                    .await
            },
            Err(e) => Err(e),
        };
        let diagnostics = self
            .check("ValidateDataSourceConfig", &req.data_source_type, result);
        Ok(Response::new(pb::ValidateDataSourceConfigResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type))]
    async fn read_data_source(
        &self,
        request: Request<pb::ReadDataSourceRequest>,
    ) -> Result<Response<pb::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());

        let result = match decode(&req.config, "config") {
            Ok(config) => {
                self.provider
                    .read_data_source(&req.data_source_type, config)
                    .await
            },
            Err(e) => Err(e),
        };
        let response = match result {
            Ok(state) => pb::ReadDataSourceResponse {
                state: encode(&state),
                diagnostics: vec![],
            },
            Err(e) => {
                error!(error = %e, "data source read failed");
                pb::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_proto(&e),
                }
            },
        };
        Ok(Response::new(response))
    }
}

// =============================================================================
// Serving
// =============================================================================

/// Server settings.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolves on SIGTERM or SIGINT (CTRL+C elsewhere). If the handlers cannot
/// be installed the server runs until killed.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut term), Ok(mut int)) => {
                tokio::select! {
                    _ = term.recv() => info!("received SIGTERM, shutting down"),
                    _ = int.recv() => info!("received SIGINT, shutting down"),
                }
            },
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "could not install signal handlers");
                std::future::pending::<()>().await;
            },
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received CTRL+C, shutting down"),
            Err(e) => {
                warn!(error = %e, "could not install CTRL+C handler");
                std::future::pending::<()>().await;
            },
        }
    }
}

/// Serve on an ephemeral localhost port with default options.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), BoxError> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// Serve on an ephemeral localhost port.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), BoxError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_listener(provider, listener, options, shutdown_signal()).await
}

/// Serve on a fixed address with default options.
pub async fn serve_on<P: ProviderService>(provider: P, addr: SocketAddr) -> Result<(), BoxError> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// Serve on a fixed address.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), BoxError> {
    let listener = TcpListener::bind(addr).await?;
    serve_listener(provider, listener, options, shutdown_signal()).await
}

async fn serve_listener<P, F>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
    shutdown: F,
) -> Result<(), BoxError>
where
    P: ProviderService,
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    println!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr);
    info!(address = %addr, "provider listening");

    let provider = Arc::new(provider);
    let service = pb::provider_server::ProviderServer::new(GrpcProvider {
        provider: Arc::clone(&provider),
    });

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(
        Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(
                tokio_stream::wrappers::TcpListenerStream::new(listener),
                async move {
                    let _ = drain_rx.await;
                },
            ),
    );

    tokio::select! {
        finished = &mut server => {
            finished??;
            warn!("server stopped without a shutdown signal");
        },
        _ = shutdown => {
            let _ = drain_tx.send(());
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(finished) => finished??,
                Err(_) => {
                    warn!(timeout = ?options.shutdown_timeout, "in-flight requests did not finish in time");
                    server.abort();
                },
            }
        },
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "provider stop failed");
    }
    info!("provider shut down");
    Ok(())
}
