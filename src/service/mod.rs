//! The exposed service: descriptor, handlers, registration.
//!
//! Three operations are published under the configured service id:
//!
//! | operation    | params            | returns |
//! |--------------|-------------------|---------|
//! | `get_docs`   | `artifact`        | string  |
//! | `get_schema` | `artifact`        | object  |
//! | `query`      | `artifact`, `sql` | object  |
//!
//! Registration is idempotent per session: the context's registration flag
//! is claimed before the call and released again if the call fails.

pub mod ops;

use std::sync::Arc;

use futures::FutureExt;
use serde::Deserialize;
use tracing::info;

use crate::artifact::ArtifactStore;
use crate::config::ServiceSettings;
use crate::rpc::protocol::{
    FunctionDescriptor, ParamDescriptor, ReturnDescriptor, ServiceConfig, ServiceDescriptor,
};
use crate::rpc::{RpcClient, RpcResult, ServiceHandler};
use crate::session::SessionContext;

#[derive(Deserialize)]
struct ArtifactParams {
    artifact: String,
}

#[derive(Deserialize)]
struct QueryParams {
    artifact: String,
    #[serde(default)]
    sql: String,
}

/// Build the service descriptor from the configured identity.
pub fn descriptor(service: &ServiceSettings) -> ServiceDescriptor {
    let artifact_param = ParamDescriptor {
        name: "artifact".to_string(),
        param_type: "string".to_string(),
    };

    ServiceDescriptor {
        id: service.id.clone(),
        name: service.name.clone(),
        description: service.description.clone(),
        config: ServiceConfig {
            visibility: service.visibility.clone(),
        },
        functions: vec![
            FunctionDescriptor {
                name: "get_docs".to_string(),
                docs: "Fetch the dataset's documentation file".to_string(),
                params: vec![artifact_param.clone()],
                returns: ReturnDescriptor {
                    return_type: "string".to_string(),
                },
            },
            FunctionDescriptor {
                name: "get_schema".to_string(),
                docs: "Introspect the dataset's column structure".to_string(),
                params: vec![artifact_param.clone()],
                returns: ReturnDescriptor {
                    return_type: "object".to_string(),
                },
            },
            FunctionDescriptor {
                name: "query".to_string(),
                docs: "Run SQL against the dataset".to_string(),
                params: vec![
                    artifact_param,
                    ParamDescriptor {
                        name: "sql".to_string(),
                        param_type: "string".to_string(),
                    },
                ],
                returns: ReturnDescriptor {
                    return_type: "object".to_string(),
                },
            },
        ],
    }
}

/// Build the JSON handlers for the three operations.
pub fn handlers(
    session: Arc<SessionContext>,
    store: Arc<dyn ArtifactStore>,
) -> Vec<(String, ServiceHandler)> {
    let docs_handler: ServiceHandler = {
        let session = session.clone();
        let store = store.clone();
        Arc::new(move |params| {
            let session = session.clone();
            let store = store.clone();
            async move {
                let params: ArtifactParams =
                    serde_json::from_value(params).map_err(|e| e.to_string())?;
                let docs = ops::get_docs(&session, &store, &params.artifact)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(serde_json::Value::String(docs))
            }
            .boxed()
        })
    };

    let schema_handler: ServiceHandler = {
        let session = session.clone();
        let store = store.clone();
        Arc::new(move |params| {
            let session = session.clone();
            let store = store.clone();
            async move {
                let params: ArtifactParams =
                    serde_json::from_value(params).map_err(|e| e.to_string())?;
                let schema = ops::get_schema(&session, &store, &params.artifact)
                    .await
                    .map_err(|e| e.to_string())?;
                serde_json::to_value(schema).map_err(|e| e.to_string())
            }
            .boxed()
        })
    };

    let query_handler: ServiceHandler = Arc::new(move |params| {
        let session = session.clone();
        let store = store.clone();
        async move {
            let params: QueryParams =
                serde_json::from_value(params).map_err(|e| e.to_string())?;
            let result = ops::query(&session, &store, &params.artifact, &params.sql)
                .await
                .map_err(|e| e.to_string())?;
            serde_json::to_value(result).map_err(|e| e.to_string())
        }
        .boxed()
    });

    vec![
        ("get_docs".to_string(), docs_handler),
        ("get_schema".to_string(), schema_handler),
        ("query".to_string(), query_handler),
    ]
}

/// Register the session's service with the server, at most once per session.
///
/// Returns false when the service was already registered; the registration
/// claim is released on failure so a later call can retry.
pub async fn register_session_service(
    client: &RpcClient,
    session: Arc<SessionContext>,
    store: Arc<dyn ArtifactStore>,
) -> RpcResult<bool> {
    if !session.begin_service_registration() {
        info!("service already registered for this session");
        return Ok(false);
    }

    let descriptor = descriptor(&session.settings().service);
    let handlers = handlers(session.clone(), store);
    match client.register_service(descriptor, handlers).await {
        Ok(_) => Ok(true),
        Err(e) => {
            session.abort_service_registration();
            Err(e)
        }
    }
}
