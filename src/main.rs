use std::sync::Arc;

use tracing::{info, warn};

use tcm_graphrag::config::AppConfig;
use tcm_graphrag::graph::GraphClient;
use tcm_graphrag::http::{AppState, HttpServer};
use tcm_graphrag::nlq::{generator, Pipeline};
use tcm_graphrag::schema::GraphSchema;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env();
    info!(version = tcm_graphrag::VERSION, "TCM GraphRAG gateway starting");

    // Collaborator outages degrade the service instead of aborting startup;
    // /health reports what is actually reachable.
    let graph = match GraphClient::connect(&config.graph).await {
        Ok(client) => Some(client),
        Err(e) => {
            warn!(error = %e, uri = %config.graph.uri, "Neo4j unavailable, queries will fail until restart");
            None
        }
    };

    let generator = match generator::build(&config.generator) {
        Ok(Some(g)) => {
            info!(model = %config.generator.model, "Cypher generator ready");
            Some(g)
        }
        Ok(None) => {
            warn!("no generator API key configured, only template questions will be answerable");
            None
        }
        Err(e) => {
            warn!(error = %e, "generator setup failed");
            None
        }
    };

    let pipeline = Pipeline::new(GraphSchema::tcm_cases(), generator, graph);
    let state = Arc::new(AppState {
        pipeline,
        neo4j_uri: config.graph.uri.clone(),
        model: config.generator.model.clone(),
    });

    let server = HttpServer::new(state, config.bind_addr.clone(), config.port);
    server.start().await?;
    Ok(())
}
