//! Display names for route identifiers, memoized in an injected cache.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::identifiers::RouteIdentifier;
use crate::models::traits::RouteStore;
use crate::models::types::TransitError;
use crate::network::traits::Cache;
use crate::provider::Generation;

pub struct RouteNames {
    routes: Arc<dyn RouteStore>,
    cache: Arc<dyn Cache<Arc<str>>>,
    generation: Generation,
}

impl RouteNames {
    pub fn new(routes: Arc<dyn RouteStore>, cache: Arc<dyn Cache<Arc<str>>>) -> Self {
        Self {
            routes,
            cache,
            generation: Generation::new(),
        }
    }

    /// Display name of `id`, falling back to the identifier itself when the
    /// route is unknown or the store fails. Fallbacks are not cached.
    pub async fn resolve(&self, id: &RouteIdentifier) -> Arc<str> {
        let key = format!("route:{id}");
        if let Some(name) = self.cache.get(&key) {
            return name;
        }

        let seen = self.generation.current();
        match self.routes.route(id).await {
            Ok(route) => {
                self.generation
                    .memoize(self.cache.as_ref(), seen, &key, route.name.clone());
                route.name
            }
            Err(TransitError::RouteNotFound(_)) => {
                debug!(route = %id, "no route record, using identifier as name");
                id.as_str().into()
            }
            Err(e) => {
                warn!(route = %id, error = %e, "route lookup failed");
                id.as_str().into()
            }
        }
    }

    /// Forget every memoized name
    pub fn invalidate(&self) {
        self.generation.advance();
        self.cache.clear();
    }
}
