//! SQLite storage interface
//!
//! One `nodes` and one `edges` table keyed by canonical URI. Each `enrich`
//! runs in a single transaction, so a failed write leaves the store as it
//! was.

use super::error::{StorageError, StorageResult};
use super::memory::strip_query_annotations;
use crate::component::{
    CancellationToken, ComponentError, ComponentResult, InterfaceConfiguration, QueryRequest,
    StorageInterface,
};
use crate::graph::time::{format_timestamp, parse_timestamp};
use crate::graph::{Edge, EdgeUri, Graph, Node, NodeUri};
use crate::query::BoundedTraversal;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// SQLite-backed storage interface
///
/// Thread-safe via internal mutex on the connection. Reads and writes run
/// on the blocking pool.
pub struct SqliteStorage {
    name: String,
    conn: Arc<Mutex<Connection>>,
    location: Option<PathBuf>,
}

impl SqliteStorage {
    /// Open (creating if needed) a database file
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path.as_ref())?;
        Self::init_schema(&conn)?;

        Ok(Self {
            name: name.into(),
            conn: Arc::new(Mutex::new(conn)),
            location: Some(path.as_ref().to_path_buf()),
        })
    }

    pub fn open_in_memory(name: impl Into<String>) -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            name: name.into(),
            conn: Arc::new(Mutex::new(conn)),
            location: None,
        })
    }

    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS nodes (
                uri TEXT PRIMARY KEY,
                class TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                start_time TEXT,
                finish_time TEXT,
                properties_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_key ON nodes(key);

            CREATE TABLE IF NOT EXISTS edges (
                uri TEXT PRIMARY KEY,
                source_uri TEXT NOT NULL,
                dest_uri TEXT NOT NULL,
                relationship TEXT NOT NULL,
                chain_json TEXT NOT NULL,
                origin TEXT NOT NULL,
                start_time TEXT,
                finish_time TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_uri);
            CREATE INDEX IF NOT EXISTS idx_edges_dest ON edges(dest_uri);

            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    // --- Row conversion ---

    fn load_node(conn: &Connection, uri: &str) -> StorageResult<Option<Node>> {
        let row: Option<(String, String, String, String, Option<String>, Option<String>, String)> = conn
            .query_row(
                "SELECT uri, class, key, value, start_time, finish_time, properties_json
                 FROM nodes WHERE uri = ?1",
                params![uri],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((uri, class, key, value, start, finish, properties)) = row else {
            return Ok(None);
        };
        Ok(Some(Node {
            uri: NodeUri::from_string(uri),
            class,
            key,
            value,
            start_time: parse_optional(start)?,
            finish_time: parse_optional(finish)?,
            properties: serde_json::from_str(&properties)?,
        }))
    }

    fn save_node(conn: &Connection, node: &Node) -> StorageResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO nodes
             (uri, class, key, value, start_time, finish_time, properties_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                node.uri.as_str(),
                node.class,
                node.key,
                node.value,
                node.start_time.as_ref().map(format_timestamp),
                node.finish_time.as_ref().map(format_timestamp),
                serde_json::to_string(&node.properties)?,
            ],
        )?;
        Ok(())
    }

    /// Edges with `uri` as source or destination
    fn load_incident_edges(conn: &Connection, uri: &str) -> StorageResult<Vec<Edge>> {
        let mut stmt = conn.prepare(
            "SELECT uri, source_uri, dest_uri, relationship, chain_json, origin, start_time, finish_time
             FROM edges WHERE source_uri = ?1 OR dest_uri = ?1",
        )?;
        let rows = stmt
            .query_map(params![uri], |row| {
                Ok(EdgeRow {
                    uri: row.get(0)?,
                    source_uri: row.get(1)?,
                    dest_uri: row.get(2)?,
                    relationship: row.get(3)?,
                    chain_json: row.get(4)?,
                    origin: row.get(5)?,
                    start_time: row.get(6)?,
                    finish_time: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(EdgeRow::into_edge).collect()
    }

    fn load_edge(conn: &Connection, uri: &EdgeUri) -> StorageResult<Option<Edge>> {
        let row = conn
            .query_row(
                "SELECT uri, source_uri, dest_uri, relationship, chain_json, origin, start_time, finish_time
                 FROM edges WHERE uri = ?1",
                params![uri.as_str()],
                |row| {
                    Ok(EdgeRow {
                        uri: row.get(0)?,
                        source_uri: row.get(1)?,
                        dest_uri: row.get(2)?,
                        relationship: row.get(3)?,
                        chain_json: row.get(4)?,
                        origin: row.get(5)?,
                        start_time: row.get(6)?,
                        finish_time: row.get(7)?,
                    })
                },
            )
            .optional()?;
        row.map(EdgeRow::into_edge).transpose()
    }

    fn save_edge(conn: &Connection, edge: &Edge) -> StorageResult<()> {
        conn.execute(
            "INSERT OR REPLACE INTO edges
             (uri, source_uri, dest_uri, relationship, chain_json, origin, start_time, finish_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                edge.uri.as_str(),
                edge.source_uri.as_str(),
                edge.dest_uri.as_str(),
                edge.relationship,
                serde_json::to_string(&edge.relationship_chain)?,
                edge.origin,
                edge.start_time.as_ref().map(format_timestamp),
                edge.finish_time.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    fn node_exists(conn: &Connection, uri: &NodeUri) -> StorageResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM nodes WHERE uri = ?1",
                params![uri.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // --- Operations ---

    fn enrich_blocking(
        conn: &Mutex<Connection>,
        name: &str,
        mut fragment: Graph,
        cancel: &CancellationToken,
    ) -> StorageResult<()> {
        strip_query_annotations(&mut fragment);

        let mut conn = lock(conn);
        let tx = conn.transaction()?;

        for node in fragment.nodes() {
            let merged = match Self::load_node(&tx, node.uri.as_str())? {
                Some(mut existing) => {
                    existing.absorb(node);
                    existing
                }
                None => node.clone(),
            };
            Self::save_node(&tx, &merged)?;
        }

        for edge in fragment.edges() {
            for endpoint in [&edge.source_uri, &edge.dest_uri] {
                if !Self::node_exists(&tx, endpoint)? {
                    // Dropping `tx` rolls back everything above
                    return Err(StorageError::DanglingEdge {
                        edge: edge.uri.to_string(),
                        missing: endpoint.to_string(),
                    });
                }
            }
            let merged = match Self::load_edge(&tx, &edge.uri)? {
                Some(mut existing) => {
                    existing.absorb(edge);
                    existing
                }
                None => edge.clone(),
            };
            Self::save_edge(&tx, &merged)?;
        }

        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        tx.commit()?;
        debug!(
            interface = %name,
            nodes = fragment.node_count(),
            edges = fragment.edge_count(),
            "sqlite enrich committed"
        );
        Ok(())
    }

    /// Load the crossable neighbourhood around the topic, then run the
    /// shared traversal over it.
    fn query_blocking(
        conn: &Mutex<Connection>,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> StorageResult<Graph> {
        let traversal = BoundedTraversal::from_request(request);
        let conn = lock(conn);

        let mut nodes: HashMap<NodeUri, Node> = HashMap::new();
        let mut edges: HashMap<EdgeUri, Edge> = HashMap::new();
        let mut frontier: Vec<NodeUri> = Vec::new();
        for seed in request.topic.nodes() {
            if nodes.contains_key(&seed.uri) {
                continue;
            }
            if let Some(node) = Self::load_node(&conn, seed.uri.as_str())? {
                frontier.push(node.uri.clone());
                nodes.insert(node.uri.clone(), node);
            }
        }

        // Expand every level, including the last, so edges between
        // boundary nodes are loaded too
        let mut expanded: HashSet<NodeUri> = HashSet::new();
        for depth in 0..=request.max_depth {
            if frontier.is_empty() {
                break;
            }
            if cancel.is_cancelled() {
                return Err(StorageError::Cancelled);
            }
            let mut next = Vec::new();
            for uri in &frontier {
                if !expanded.insert(uri.clone()) {
                    continue;
                }
                for edge in Self::load_incident_edges(&conn, uri.as_str())? {
                    let Some(far_uri) = edge.other_end(uri).cloned() else {
                        continue;
                    };
                    if !nodes.contains_key(&far_uri) {
                        if depth == request.max_depth {
                            continue;
                        }
                        let Some(far) = Self::load_node(&conn, far_uri.as_str())? else {
                            continue;
                        };
                        if !traversal.can_cross(&edge, &far) {
                            continue;
                        }
                        nodes.insert(far_uri.clone(), far);
                        next.push(far_uri);
                    }
                    edges.insert(edge.uri.clone(), edge);
                }
            }
            frontier = next;
        }
        drop(conn);

        let mut local = Graph::new();
        for node in nodes.into_values() {
            local.add_node(node);
        }
        for edge in edges.into_values() {
            local.add_edge(edge)?;
        }
        Ok(traversal.execute(&local, &request.topic))
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Raw `edges` row
struct EdgeRow {
    uri: String,
    source_uri: String,
    dest_uri: String,
    relationship: String,
    chain_json: String,
    origin: String,
    start_time: Option<String>,
    finish_time: Option<String>,
}

impl EdgeRow {
    fn into_edge(self) -> StorageResult<Edge> {
        Ok(Edge {
            uri: EdgeUri::from_string(self.uri),
            source_uri: NodeUri::from_string(self.source_uri),
            dest_uri: NodeUri::from_string(self.dest_uri),
            relationship: self.relationship,
            relationship_chain: serde_json::from_str(&self.chain_json)?,
            origin: self.origin,
            start_time: parse_optional(self.start_time)?,
            finish_time: parse_optional(self.finish_time)?,
        })
    }
}

fn parse_optional(raw: Option<String>) -> StorageResult<Option<chrono::DateTime<chrono::Utc>>> {
    match raw {
        Some(s) => Ok(parse_timestamp(&s)?),
        None => Ok(None),
    }
}

#[async_trait]
impl StorageInterface for SqliteStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn configure(&self) -> ComponentResult<InterfaceConfiguration> {
        let description = match &self.location {
            Some(path) => format!("SQLite graph store at {}", path.display()),
            None => "SQLite graph store (in memory)".to_string(),
        };
        Ok(InterfaceConfiguration {
            configured: true,
            description,
            cost: 2,
            speed: 3,
        })
    }

    async fn enrich(&self, graph: &Graph, cancel: &CancellationToken) -> ComponentResult<()> {
        if cancel.is_cancelled() {
            return Err(StorageError::Cancelled.into_write_error());
        }
        let conn = Arc::clone(&self.conn);
        let name = self.name.clone();
        let fragment = graph.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || Self::enrich_blocking(&conn, &name, fragment, &cancel))
            .await
            .map_err(|e| ComponentError::StorageWrite(format!("write task failed: {}", e)))?
            .map_err(StorageError::into_write_error)
    }

    async fn query(
        &self,
        request: &QueryRequest,
        cancel: &CancellationToken,
    ) -> ComponentResult<Graph> {
        let conn = Arc::clone(&self.conn);
        let request = request.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || Self::query_blocking(&conn, &request, &cancel))
            .await
            .map_err(|e| ComponentError::Invocation(format!("query task failed: {}", e)))?
            .map_err(StorageError::into_query_error)
    }
}
