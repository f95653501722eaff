//! Pattern table.
//!
//! # Responsibilities
//! - Parse `"[METHOD ]/path"` patterns
//! - Store endpoints per path in a `matchit` radix tree
//! - Resolve a method + path to a handler, 404 or 405
//!
//! # Design Decisions
//! - Path syntax is `matchit`'s: `{name}` segments and `{*rest}` catch-alls
//! - A pattern without a method answers every method
//! - `GET` endpoints also answer `HEAD`
//! - The root fallback lives outside the tree since `{*rest}` never matches
//!   an empty remainder

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::error::{Error, Result};
use crate::routing::handler::{BoxHandler, MethodNotAllowed, NotFound, PathParams};

/// Outcome of a lookup.
#[derive(Clone)]
pub struct Resolved {
    pub handler: BoxHandler,
    /// Registered pattern, empty for the built-in 404/405 handlers.
    pub pattern: String,
    pub params: PathParams,
}

#[derive(Clone)]
struct Endpoint {
    pattern: String,
    handler: BoxHandler,
}

#[derive(Default)]
struct PathRoutes {
    any: Option<Endpoint>,
    methods: Vec<(Method, Endpoint)>,
}

impl PathRoutes {
    fn lookup(&self, method: &Method) -> Option<&Endpoint> {
        let exact = self
            .methods
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, endpoint)| endpoint);

        exact
            .or_else(|| {
                if method == Method::HEAD {
                    self.methods
                        .iter()
                        .find(|(m, _)| m == Method::GET)
                        .map(|(_, endpoint)| endpoint)
                } else {
                    None
                }
            })
            .or(self.any.as_ref())
    }

    fn allow(&self) -> String {
        let mut allowed: Vec<&str> = self.methods.iter().map(|(m, _)| m.as_str()).collect();
        if allowed.contains(&"GET") && !allowed.contains(&"HEAD") {
            allowed.push("HEAD");
        }
        allowed.join(", ")
    }
}

pub struct RouteTable {
    tree: matchit::Router<usize>,
    routes: Vec<PathRoutes>,
    index: HashMap<String, usize>,
    fallback: Option<Endpoint>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            tree: matchit::Router::new(),
            routes: Vec::new(),
            index: HashMap::new(),
            fallback: None,
        }
    }

    /// Register `handler` under `pattern`.
    pub fn insert(&mut self, pattern: &str, handler: BoxHandler) -> Result<()> {
        let (method, path) = parse_pattern(pattern)?;
        let endpoint = Endpoint {
            pattern: pattern.to_string(),
            handler,
        };

        let slot = match self.index.get(path) {
            Some(&slot) => slot,
            None => {
                let slot = self.routes.len();
                self.tree.insert(path, slot).map_err(|e| insert_error(pattern, e))?;
                self.routes.push(PathRoutes::default());
                self.index.insert(path.to_string(), slot);
                slot
            }
        };

        let routes = &mut self.routes[slot];
        match method {
            None => {
                if let Some(existing) = &routes.any {
                    return Err(conflict(pattern, &existing.pattern));
                }
                routes.any = Some(endpoint);
            }
            Some(method) => {
                if let Some((_, existing)) = routes.methods.iter().find(|(m, _)| *m == method) {
                    return Err(conflict(pattern, &existing.pattern));
                }
                routes.methods.push((method, endpoint));
            }
        }

        tracing::debug!(pattern = %pattern, "Route registered");
        Ok(())
    }

    /// Install the handler that receives every request no pattern claims.
    pub fn set_fallback(&mut self, pattern: &str, handler: BoxHandler) -> Result<()> {
        if let Some(existing) = &self.fallback {
            return Err(conflict(pattern, &existing.pattern));
        }
        self.fallback = Some(Endpoint {
            pattern: pattern.to_string(),
            handler,
        });
        Ok(())
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Resolved {
        let Ok(matched) = self.tree.at(path) else {
            return self.unmatched(|| Arc::new(NotFound));
        };

        let routes = &self.routes[*matched.value];
        match routes.lookup(method) {
            Some(endpoint) => Resolved {
                handler: endpoint.handler.clone(),
                pattern: endpoint.pattern.clone(),
                params: PathParams::new(
                    matched
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                ),
            },
            None => {
                let allow = routes.allow();
                self.unmatched(move || Arc::new(MethodNotAllowed::new(allow)))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.fallback.is_none()
    }

    fn unmatched(&self, builtin: impl FnOnce() -> BoxHandler) -> Resolved {
        match &self.fallback {
            Some(endpoint) => Resolved {
                handler: endpoint.handler.clone(),
                pattern: endpoint.pattern.clone(),
                params: PathParams::default(),
            },
            None => Resolved {
                handler: builtin(),
                pattern: String::new(),
                params: PathParams::default(),
            },
        }
    }
}

/// Split `"[METHOD ]/path"` into its parts.
fn parse_pattern(pattern: &str) -> Result<(Option<Method>, &str)> {
    let invalid = || Error::InvalidPattern(pattern.to_string());

    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let (method, path) = match trimmed.split_once(char::is_whitespace) {
        Some((method, path)) if !trimmed.starts_with('/') => {
            let method = Method::from_bytes(method.as_bytes()).map_err(|_| invalid())?;
            (Some(method), path.trim_start())
        }
        _ => (None, trimmed),
    };

    if !path.starts_with('/') || path.contains(char::is_whitespace) {
        return Err(invalid());
    }
    Ok((method, path))
}

fn insert_error(pattern: &str, err: matchit::InsertError) -> Error {
    match err {
        matchit::InsertError::Conflict { with } => conflict(pattern, &with),
        _ => Error::InvalidPattern(pattern.to_string()),
    }
}

fn conflict(pattern: &str, existing: &str) -> Error {
    Error::RouteConflict {
        pattern: pattern.to_string(),
        reason: format!("already registered as {existing:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::handler::handler_fn;

    fn noop() -> BoxHandler {
        Arc::new(handler_fn(|_w, _req| Box::pin(async {})))
    }

    #[test]
    fn test_parse_pattern() {
        let (method, path) = parse_pattern("GET /users/{id}").unwrap();
        assert_eq!(method, Some(Method::GET));
        assert_eq!(path, "/users/{id}");

        let (method, path) = parse_pattern("/static/{*file}").unwrap();
        assert_eq!(method, None);
        assert_eq!(path, "/static/{*file}");
    }

    #[test]
    fn test_malformed_patterns_rejected() {
        for pattern in ["", "   ", "GET", "users", "GET users", "/a b", "G(T /x"] {
            let err = parse_pattern(pattern).unwrap_err();
            assert!(matches!(err, Error::InvalidPattern(_)), "{pattern:?}");
        }
    }

    #[test]
    fn test_duplicate_registration_conflicts() {
        let mut table = RouteTable::new();
        table.insert("GET /users", noop()).unwrap();
        table.insert("POST /users", noop()).unwrap();

        let err = table.insert("GET /users", noop()).unwrap_err();
        assert!(matches!(err, Error::RouteConflict { .. }));

        table.insert("/any", noop()).unwrap();
        assert!(table.insert("/any", noop()).is_err());
    }

    #[test]
    fn test_param_name_conflict() {
        let mut table = RouteTable::new();
        table.insert("/users/{id}", noop()).unwrap();
        let err = table.insert("/users/{name}", noop()).unwrap_err();
        assert!(matches!(err, Error::RouteConflict { .. }));
    }

    #[test]
    fn test_resolve_with_params() {
        let mut table = RouteTable::new();
        table.insert("GET /users/{id}", noop()).unwrap();

        let resolved = table.resolve(&Method::GET, "/users/42");
        assert_eq!(resolved.pattern, "GET /users/{id}");
        assert_eq!(resolved.params.get("id"), Some("42"));
    }

    #[test]
    fn test_get_answers_head() {
        let mut table = RouteTable::new();
        table.insert("GET /page", noop()).unwrap();
        assert_eq!(table.resolve(&Method::HEAD, "/page").pattern, "GET /page");
    }

    #[test]
    fn test_method_mismatch_and_missing_path() {
        let mut table = RouteTable::new();
        table.insert("GET /items", noop()).unwrap();
        table.insert("DELETE /items", noop()).unwrap();

        let resolved = table.resolve(&Method::PUT, "/items");
        assert_eq!(resolved.pattern, "");
        assert_eq!(table.routes[0].allow(), "GET, DELETE, HEAD");

        assert_eq!(table.resolve(&Method::GET, "/missing").pattern, "");
    }

    #[test]
    fn test_methodless_pattern_answers_everything() {
        let mut table = RouteTable::new();
        table.insert("GET /mixed", noop()).unwrap();
        table.insert("/mixed", noop()).unwrap();

        assert_eq!(table.resolve(&Method::GET, "/mixed").pattern, "GET /mixed");
        assert_eq!(table.resolve(&Method::PATCH, "/mixed").pattern, "/mixed");
    }

    #[test]
    fn test_fallback_claims_unmatched() {
        let mut table = RouteTable::new();
        table.insert("GET /known", noop()).unwrap();
        table.set_fallback("/", noop()).unwrap();

        assert_eq!(table.resolve(&Method::GET, "/unknown").pattern, "/");
        assert_eq!(table.resolve(&Method::POST, "/known").pattern, "/");
        assert!(table.set_fallback("/", noop()).is_err());
    }
}
