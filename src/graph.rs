//! Neo4j access: pooled connection, read-only execution, schema-on-read rows.

use indexmap::IndexMap;
use neo4rs::{ConfigBuilder, Graph, Query};
use thiserror::Error;
use tracing::info;

/// One result record: column name → value, in query projection order.
/// Columns are unknown ahead of time; values may be scalars, arrays or null.
pub type ResultRow = IndexMap<String, serde_json::Value>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),
    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),
    #[error("row decode error: {0}")]
    Row(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Connection settings for the case-graph store.
///
/// The credentials are expected to be provisioned read-only server-side;
/// the in-process safety gate is not a substitute for that.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "test12345".to_string(),
            max_connections: 16,
            fetch_size: 256,
        }
    }
}

/// Thread-safe Neo4j client. Clone is cheap (the pool is shared).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect and ping.
    ///
    /// neo4rs pools lazily, so `Graph::connect` alone succeeds even when the
    /// server is down; the `RETURN 1` forces a real bolt handshake and turns
    /// an unreachable store into a startup-time failure the health endpoint
    /// can report.
    pub async fn connect(config: &GraphConfig) -> GraphResult<Self> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        info!(uri = %config.uri, user = %config.user, "connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a read-only statement and collect every row.
    ///
    /// An empty result set is a normal outcome, not an error.
    pub async fn run_read(&self, cypher: &str) -> GraphResult<Vec<ResultRow>> {
        let mut stream = self.graph.execute(Query::new(cypher.to_string())).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            let record: ResultRow = row.to().map_err(|e| GraphError::Row(e.to_string()))?;
            rows.push(record);
        }
        Ok(rows)
    }
}
