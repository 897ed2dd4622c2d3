//! Router tree and path index
//!
//! A router is an immutable record mapping names to procedures or nested
//! routers. Lookup goes through a flat index from dotted paths
//! (`"user.profile"`) to procedures, built lazily on first use and memoized
//! per router instance; once a router exists the index never changes.
//!
//! # Example
//!
//! ```rust,ignore
//! let router = Router::builder()
//!     .procedure("hello", hello)
//!     .nest("user", Router::builder().procedure("profile", profile).build())
//!     .build();
//!
//! let procedure = router.procedure_at_path(&["user", "profile"]);
//! ```

use crate::procedure::Procedure;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// A router entry: either a procedure leaf or a nested router.
pub enum Node<Ctx> {
    /// A callable procedure
    Procedure(Procedure<Ctx>),
    /// A nested router grouping further entries
    Router(Router<Ctx>),
}

impl<Ctx> Clone for Node<Ctx> {
    fn clone(&self) -> Self {
        match self {
            Self::Procedure(p) => Self::Procedure(p.clone()),
            Self::Router(r) => Self::Router(r.clone()),
        }
    }
}

impl<Ctx> Node<Ctx> {
    /// The node kind tag (`"procedure"` or `"router"`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Procedure(_) => "procedure",
            Self::Router(_) => "router",
        }
    }
}

struct RouterIndex<Ctx> {
    procedures: HashMap<String, Procedure<Ctx>>,
    routers: HashMap<String, Router<Ctx>>,
}

struct RouterInner<Ctx> {
    record: HashMap<String, Node<Ctx>>,
    index: OnceLock<RouterIndex<Ctx>>,
}

/// Immutable tree of procedures and nested routers.
///
/// Cheap to clone and safe to share across concurrent requests; the record
/// is frozen at construction and the lazily-built index is memoized per
/// router instance.
pub struct Router<Ctx> {
    inner: Arc<RouterInner<Ctx>>,
}

impl<Ctx> Clone for Router<Ctx> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Ctx> Router<Ctx> {
    /// Start building a router.
    pub fn builder() -> RouterBuilder<Ctx> {
        RouterBuilder {
            record: HashMap::new(),
        }
    }

    /// The node kind tag.
    pub fn kind(&self) -> &'static str {
        "router"
    }

    /// Look up a direct entry by name.
    pub fn get(&self, name: &str) -> Option<&Node<Ctx>> {
        self.inner.record.get(name)
    }

    /// Number of direct entries.
    pub fn len(&self) -> usize {
        self.inner.record.len()
    }

    /// Returns true if the router has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.record.is_empty()
    }

    fn index(&self) -> &RouterIndex<Ctx> {
        self.inner.index.get_or_init(|| {
            let mut index = RouterIndex {
                procedures: HashMap::new(),
                routers: HashMap::new(),
            };
            collect(&self.inner.record, "", &mut index);
            debug!(
                procedures = index.procedures.len(),
                routers = index.routers.len(),
                "Router index built"
            );
            index
        })
    }

    /// Resolve a procedure by its path segments.
    ///
    /// Lookup is exact string equality on the joined dotted key, so a leaf
    /// registered under the full dotted name wins over a same-prefix nested
    /// router.
    pub fn procedure_at_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<Procedure<Ctx>> {
        let key = join(segments);
        trace!(path = %key, "Resolving procedure");
        self.index().procedures.get(&key).cloned()
    }

    /// Resolve a nested router by its path segments.
    pub fn router_at_path<S: AsRef<str>>(&self, segments: &[S]) -> Option<Router<Ctx>> {
        let key = join(segments);
        self.index().routers.get(&key).cloned()
    }

    /// Sorted list of all registered dotted procedure paths.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.index().procedures.keys().cloned().collect();
        paths.sort();
        paths
    }
}

fn join<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(".")
}

fn collect<Ctx>(record: &HashMap<String, Node<Ctx>>, prefix: &str, index: &mut RouterIndex<Ctx>) {
    for (name, node) in record {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", prefix, name)
        };
        match node {
            Node::Procedure(procedure) => {
                index.procedures.insert(path, procedure.clone());
            }
            Node::Router(router) => {
                collect(&router.inner.record, &path, index);
                index.routers.insert(path, router.clone());
            }
        }
    }
}

/// Builder assembling a router record before it is frozen.
pub struct RouterBuilder<Ctx> {
    record: HashMap<String, Node<Ctx>>,
}

impl<Ctx> RouterBuilder<Ctx> {
    /// Register a procedure under a name.
    ///
    /// # Panics
    ///
    /// Panics if the name is empty or contains a `.` — entry names are
    /// single path segments; nesting comes from [`RouterBuilder::nest`].
    pub fn procedure(mut self, name: impl Into<String>, procedure: Procedure<Ctx>) -> Self {
        let name = validate_name(name.into());
        self.record.insert(name, Node::Procedure(procedure));
        self
    }

    /// Nest a router under a name.
    ///
    /// # Panics
    ///
    /// Panics if the name is empty or contains a `.`.
    pub fn nest(mut self, name: impl Into<String>, router: Router<Ctx>) -> Self {
        let name = validate_name(name.into());
        self.record.insert(name, Node::Router(router));
        self
    }

    /// Freeze the record into an immutable router.
    pub fn build(self) -> Router<Ctx> {
        Router {
            inner: Arc::new(RouterInner {
                record: self.record,
                index: OnceLock::new(),
            }),
        }
    }
}

fn validate_name(name: String) -> String {
    assert!(!name.is_empty(), "router entry name must be non-empty");
    assert!(
        !name.contains('.'),
        "router entry name '{}' must not contain '.'",
        name
    );
    name
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::procedure::{ProcedureBuilder, ProcedureType};
    use serde_json::{json, Value};

    #[derive(Clone)]
    struct TestCtx;

    fn answer(reply: &'static str) -> Procedure<TestCtx> {
        ProcedureBuilder::new()
            .query(move |_ctx: TestCtx, _input: Value| async move { Envelope::ok(json!(reply)) })
    }

    fn sample_router() -> Router<TestCtx> {
        Router::builder()
            .procedure("hello", answer("hello"))
            .nest(
                "user",
                Router::builder()
                    .procedure("profile", answer("profile"))
                    .nest(
                        "settings",
                        Router::builder().procedure("get", answer("settings.get")).build(),
                    )
                    .build(),
            )
            .build()
    }

    async fn reply_of(router: &Router<TestCtx>, segments: &[&str]) -> Value {
        let procedure = router.procedure_at_path(segments).expect("procedure");
        let Envelope::Success { data, .. } = procedure.call(TestCtx, json!(null)).await else {
            panic!("expected success");
        };
        data
    }

    #[tokio::test]
    async fn test_flat_and_nested_lookup() {
        let router = sample_router();
        assert_eq!(reply_of(&router, &["hello"]).await, json!("hello"));
        assert_eq!(reply_of(&router, &["user", "profile"]).await, json!("profile"));
        assert_eq!(
            reply_of(&router, &["user", "settings", "get"]).await,
            json!("settings.get")
        );
    }

    #[test]
    fn test_unknown_paths_resolve_to_none() {
        let router = sample_router();
        assert!(router.procedure_at_path(&["missing"]).is_none());
        assert!(router.procedure_at_path(&["user"]).is_none());
        assert!(router.procedure_at_path(&["user", "profile", "extra"]).is_none());
        assert!(router.procedure_at_path::<&str>(&[]).is_none());
    }

    #[test]
    fn test_router_map_in_index() {
        let router = sample_router();
        assert!(router.router_at_path(&["user"]).is_some());
        assert!(router.router_at_path(&["user", "settings"]).is_some());
        assert!(router.router_at_path(&["hello"]).is_none());
    }

    #[test]
    fn test_lookup_is_by_joined_key() {
        let router = Router::builder()
            .nest(
                "user",
                Router::builder().procedure("profile", answer("leaf")).build(),
            )
            .build();
        assert!(router.procedure_at_path(&["user", "profile"]).is_some());
        // The joined dotted key is authoritative: no tree walk, one map hit.
        assert!(router.procedure_at_path(&["user.profile"]).is_some());
    }

    #[test]
    fn test_paths_are_sorted() {
        let router = sample_router();
        assert_eq!(
            router.paths(),
            vec!["hello", "user.profile", "user.settings.get"]
        );
    }

    #[test]
    fn test_index_is_stable_across_lookups() {
        let router = sample_router();
        let first = router.procedure_at_path(&["hello"]).expect("procedure");
        let second = router.procedure_at_path(&["hello"]).expect("procedure");
        assert_eq!(first.proc_type(), ProcedureType::Query);
        assert_eq!(second.proc_type(), ProcedureType::Query);
        assert_eq!(router.paths(), router.paths());
    }

    #[test]
    fn test_each_router_owns_its_index() {
        let child = Router::builder().procedure("inner", answer("inner")).build();
        let parent = Router::builder().nest("ns", child.clone()).build();

        assert!(parent.procedure_at_path(&["ns", "inner"]).is_some());
        // The child resolves relative to itself, unaffected by the parent.
        assert!(child.procedure_at_path(&["inner"]).is_some());
        assert!(child.procedure_at_path(&["ns", "inner"]).is_none());
    }

    #[test]
    fn test_concurrent_first_lookup_is_idempotent() {
        let router = Arc::new(sample_router());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let router = Arc::clone(&router);
                std::thread::spawn(move || router.paths())
            })
            .collect();
        let mut results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        results.dedup();
        assert_eq!(results.len(), 1);
    }

    #[test]
    #[should_panic(expected = "must not contain '.'")]
    fn test_dotted_entry_name_panics() {
        let _ = Router::builder().procedure("a.b", answer("x"));
    }

    #[test]
    #[should_panic(expected = "must be non-empty")]
    fn test_empty_entry_name_panics() {
        let _ = Router::builder().procedure("", answer("x"));
    }

    #[test]
    fn test_kind_tags() {
        let router = sample_router();
        assert_eq!(router.kind(), "router");
        assert_eq!(router.get("hello").map(Node::kind), Some("procedure"));
        assert_eq!(router.get("user").map(Node::kind), Some("router"));
    }
}
