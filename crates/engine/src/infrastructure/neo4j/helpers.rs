//! Neo4j deserialization helpers for row conversion functions.

use neo4rs::{Graph, Neo4jClientErrorKind, Neo4jErrorKind, Node, Query};
use uuid::Uuid;

use crate::infrastructure::ports::RepoError;

// =============================================================================
// Graph Extension Trait (Error Mapping)
// =============================================================================

/// Extension trait for Neo4j Graph with standardized error mapping to RepoError.
///
/// Replaces the common pattern of:
/// ```ignore
/// graph.run(query).await.map_err(|e| RepoError::database("query", e))?;
/// ```
///
/// `execute` is not wrapped because neo4rs 0.8 doesn't export
/// `DetachedRowStream` publicly.
#[async_trait::async_trait]
pub trait GraphExt {
    /// Execute a query that doesn't return results (MERGE, SET, CREATE).
    async fn run_or_err(&self, operation: &'static str, query: Query) -> Result<(), RepoError>;
}

#[async_trait::async_trait]
impl GraphExt for Graph {
    async fn run_or_err(&self, operation: &'static str, query: Query) -> Result<(), RepoError> {
        self.run(query)
            .await
            .map_err(|e| repo_error(operation, e))
    }
}

/// Map a driver error, marking lost connections and transient server
/// errors as retryable.
pub fn repo_error(operation: &'static str, e: neo4rs::Error) -> RepoError {
    let transient = match &e {
        neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => true,
        neo4rs::Error::Neo4j(inner) => matches!(
            inner.kind(),
            Neo4jErrorKind::Transient | Neo4jErrorKind::Client(Neo4jClientErrorKind::SessionExpired)
        ),
        _ => false,
    };
    if transient {
        RepoError::connection(operation, e)
    } else {
        RepoError::database(operation, e)
    }
}

/// Extension trait for Neo4j Node with fail-fast field access.
pub trait NodeExt {
    /// Get a required string field.
    fn get_string_strict(&self, field: &str) -> Result<String, RepoError>;

    /// Get a required JSON-encoded string field and deserialize it.
    fn get_json_strict<T: serde::de::DeserializeOwned>(&self, field: &str) -> Result<T, RepoError>;

    /// Get a required UUID-valued field as a typed id.
    fn get_typed_id<T: From<Uuid>>(&self, field: &str) -> Result<T, RepoError>;

    /// Get a non-negative integer field with a default value if missing.
    fn get_u32_or(&self, field: &str, default: u32) -> u32;
}

impl NodeExt for Node {
    fn get_string_strict(&self, field: &str) -> Result<String, RepoError> {
        self.get(field).map_err(|e| {
            RepoError::database(
                "query",
                format!("Missing required field '{}': {}", field, e),
            )
        })
    }

    fn get_json_strict<T: serde::de::DeserializeOwned>(&self, field: &str) -> Result<T, RepoError> {
        let s = self.get_string_strict(field)?;
        serde_json::from_str(&s).map_err(|e| {
            RepoError::serialization(format!("Invalid JSON in field '{}': {}", field, e))
        })
    }

    fn get_typed_id<T: From<Uuid>>(&self, field: &str) -> Result<T, RepoError> {
        let s = self.get_string_strict(field)?;
        Uuid::parse_str(&s).map(T::from).map_err(|e| {
            RepoError::database(
                "parse",
                format!("Invalid UUID in field '{}': {} (value: '{}')", field, e, s),
            )
        })
    }

    fn get_u32_or(&self, field: &str, default: u32) -> u32 {
        self.get::<i64>(field)
            .ok()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(default)
    }
}

/// Serialize a value for storage in a string property.
pub fn to_json_param<T: serde::Serialize>(value: &T) -> Result<String, RepoError> {
    serde_json::to_string(value).map_err(RepoError::serialization)
}
