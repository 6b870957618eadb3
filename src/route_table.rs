//! Route table: path-prefix groups partitioned into public and protected tiers.
//!
//! A protected mount may carve exact public sub-routes out of its prefix. The carve-out
//! is declared on the mount itself, next to the prefix rule it overrides, so whether a
//! path is gated never depends on the order in which groups were registered.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use axum::{
    Router,
    handler::Handler,
    http::Method,
    routing::{self, MethodRouter},
};
use thiserror::Error;

use crate::{AppState, roles::RoleSet};

/// Tier
///
/// `Public` mounts dispatch without an identity. `Protected` mounts require an
/// authenticated identity whose role is in the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Public,
    Protected(RoleSet),
}

/// What the access gate must do for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Open,
    Restricted(RoleSet),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("prefix '{0}' must start with '/' and must not end with '/'")]
    InvalidPrefix(String),

    #[error("prefix '{first}' overlaps prefix '{second}'")]
    OverlappingPrefix { first: String, second: String },

    #[error("public exception path '{0}' must start with '/'")]
    InvalidExceptionPath(String),

    #[error("conflicting routes under '{prefix}': {detail}")]
    RouteConflict { prefix: String, detail: String },
}

/// PublicRoute
///
/// One exact (method, path) pair under a protected prefix that is reachable without
/// an identity, together with the handler serving it.
pub struct PublicRoute {
    method: Method,
    path: &'static str,
    handler: MethodRouter<AppState>,
}

impl PublicRoute {
    pub fn get<H, T>(path: &'static str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self {
            method: Method::GET,
            path,
            handler: routing::get(handler),
        }
    }

    pub fn post<H, T>(path: &'static str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self {
            method: Method::POST,
            path,
            handler: routing::post(handler),
        }
    }
}

struct Mount {
    prefix: &'static str,
    tier: Tier,
    exceptions: Vec<PublicRoute>,
    group: Router<AppState>,
}

/// RouteTable
///
/// Registrations are collected first and turned into a router in one step by
/// [`RouteTable::build`], which rejects ambiguous tables instead of silently
/// letting one registration shadow another.
#[derive(Default)]
pub struct RouteTable {
    mounts: Vec<Mount>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public(mut self, prefix: &'static str, group: Router<AppState>) -> Self {
        self.mounts.push(Mount {
            prefix,
            tier: Tier::Public,
            exceptions: Vec::new(),
            group,
        });
        self
    }

    pub fn protected(self, prefix: &'static str, roles: RoleSet, group: Router<AppState>) -> Self {
        self.protected_except(prefix, roles, Vec::new(), group)
    }

    /// Protected mount whose `exceptions` stay public. Exception paths are relative
    /// to `prefix` and must not also be routed by `group` for the same method.
    pub fn protected_except(
        mut self,
        prefix: &'static str,
        roles: RoleSet,
        exceptions: Vec<PublicRoute>,
        group: Router<AppState>,
    ) -> Self {
        self.mounts.push(Mount {
            prefix,
            tier: Tier::Protected(roles),
            exceptions,
            group,
        });
        self
    }

    pub fn build(self) -> Result<(Router<AppState>, AccessPolicy), RouteTableError> {
        self.validate()?;

        let mut router = Router::new();
        let mut rules = Vec::with_capacity(self.mounts.len());

        for mount in self.mounts {
            let mut group = mount.group;
            let mut open = Vec::with_capacity(mount.exceptions.len());

            for exception in mount.exceptions {
                open.push((exception.method, format!("{}{}", mount.prefix, exception.path)));
                // One trailing slash reaches the same handler.
                let handler = exception.handler;
                let slashed = format!("{}/", exception.path);
                group = checked(mount.prefix, move || {
                    let group = group.route(exception.path, handler.clone());
                    if exception.path.ends_with('/') {
                        group
                    } else {
                        group.route(&slashed, handler)
                    }
                })?;
            }

            tracing::debug!(prefix = mount.prefix, tier = ?mount.tier, "mounting route group");
            router = router.nest(mount.prefix, group);
            rules.push(PolicyRule {
                prefix: mount.prefix,
                tier: mount.tier,
                open,
            });
        }

        Ok((router, AccessPolicy { rules: rules.into() }))
    }

    fn validate(&self) -> Result<(), RouteTableError> {
        for (i, mount) in self.mounts.iter().enumerate() {
            let prefix = mount.prefix;
            if !prefix.starts_with('/') || prefix.ends_with('/') {
                return Err(RouteTableError::InvalidPrefix(prefix.to_string()));
            }

            for exception in &mount.exceptions {
                if !exception.path.starts_with('/') {
                    return Err(RouteTableError::InvalidExceptionPath(exception.path.to_string()));
                }
            }

            for other in &self.mounts[..i] {
                if under_prefix(other.prefix, prefix) || under_prefix(prefix, other.prefix) {
                    return Err(RouteTableError::OverlappingPrefix {
                        first: other.prefix.to_string(),
                        second: prefix.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// merge_checked
///
/// Merges `supplied` into `builtin` for the group mounted at `prefix`. Both routing the
/// same method on the same path is reported instead of panicking.
pub fn merge_checked(
    prefix: &'static str,
    builtin: Router<AppState>,
    supplied: Router<AppState>,
) -> Result<Router<AppState>, RouteTableError> {
    checked(prefix, move || builtin.merge(supplied))
}

/// Axum rejects a duplicate method and path by panicking; this turns that into a
/// `RouteConflict`.
fn checked<F>(prefix: &str, register: F) -> Result<Router<AppState>, RouteTableError>
where
    F: FnOnce() -> Router<AppState>,
{
    panic::catch_unwind(AssertUnwindSafe(register)).map_err(|payload| {
        let detail = payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "duplicate route".to_string());
        RouteTableError::RouteConflict {
            prefix: prefix.to_string(),
            detail,
        }
    })
}

/// `path` lies under `prefix` when it equals it or continues with a new segment.
fn under_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[derive(Debug)]
struct PolicyRule {
    prefix: &'static str,
    tier: Tier,
    open: Vec<(Method, String)>,
}

/// AccessPolicy
///
/// The tier rules extracted from a built [`RouteTable`], consulted by the access
/// gate for every request before dispatch. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Arc<[PolicyRule]>,
}

impl AccessPolicy {
    pub fn resolve(&self, method: &Method, path: &str) -> Access {
        let Some(rule) = self.rules.iter().find(|rule| under_prefix(rule.prefix, path)) else {
            return Access::Open;
        };

        match rule.tier {
            Tier::Public => Access::Open,
            Tier::Protected(roles) => {
                let bare = path.strip_suffix('/').unwrap_or(path);
                let carved_out = rule
                    .open
                    .iter()
                    .any(|(open_method, open_path)| {
                        open_method == method && (open_path == path || open_path == bare)
                    });
                if carved_out {
                    Access::Open
                } else {
                    Access::Restricted(roles)
                }
            }
        }
    }
}
