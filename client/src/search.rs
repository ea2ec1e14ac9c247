//! Search and filtering
//!
//! Builds the search query surface: the filter set and its URL encoding,
//! parameter validation, autocomplete with its short-term short circuit,
//! debounced execution, and the locally persisted recent-search and
//! search-log lists.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::form_urlencoded;

use common::clock::Clock;
use common::storage::KeyValueStore;

use crate::endpoints;
use crate::error::{ApiError, ApiResult};
use crate::gateway::{decode, ApiGateway};
use crate::models::{Articulo, PaginatedResponse};

pub const RECENT_SEARCHES_KEY: &str = "recent_searches";
pub const SEARCH_LOGS_KEY: &str = "search_logs";

const MAX_RECENT_SEARCHES: usize = 10;
const MAX_SEARCH_LOGS: usize = 100;
const MIN_AUTOCOMPLETE_CHARS: usize = 2;
const DEFAULT_AUTOCOMPLETE_LIMIT: u32 = 10;

/// Starter suggestions shown before the user has any history
pub const POPULAR_SEARCHES: &[&str] = &["BMW", "Mercedes", "Audi", "Toyota", "Pickup", "SUV"];

/// Everything the search surface can filter on; unset fields are simply
/// not sent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub query: Option<String>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub ano_min: Option<i64>,
    pub ano_max: Option<i64>,
    pub precio_min: Option<f64>,
    pub precio_max: Option<f64>,
    pub categoria_id: Option<i64>,
    pub subcategoria_id: Option<i64>,
    pub estado_id: Option<i64>,
    pub municipio_id: Option<i64>,
    pub ubicacion: Option<String>,
    pub combustible: Option<String>,
    pub transmision: Option<String>,
    pub kilometraje_max: Option<i64>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl SearchFilters {
    /// Wire parameters in a stable order, skipping unset fields
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if let Some(v) = &self.marca {
            params.push(("marca", v.clone()));
        }
        if let Some(v) = &self.modelo {
            params.push(("modelo", v.clone()));
        }
        if let Some(v) = self.ano_min {
            params.push(("anoMin", v.to_string()));
        }
        if let Some(v) = self.ano_max {
            params.push(("anoMax", v.to_string()));
        }
        if let Some(v) = self.precio_min {
            params.push(("precioMin", v.to_string()));
        }
        if let Some(v) = self.precio_max {
            params.push(("precioMax", v.to_string()));
        }
        if let Some(v) = self.categoria_id {
            params.push(("categoriaID", v.to_string()));
        }
        if let Some(v) = self.subcategoria_id {
            params.push(("subcategoriaID", v.to_string()));
        }
        if let Some(v) = self.estado_id {
            params.push(("estadoID", v.to_string()));
        }
        if let Some(v) = self.municipio_id {
            params.push(("municipioID", v.to_string()));
        }
        if let Some(v) = &self.ubicacion {
            params.push(("ubicacion", v.clone()));
        }
        if let Some(v) = &self.combustible {
            params.push(("combustible", v.clone()));
        }
        if let Some(v) = &self.transmision {
            params.push(("transmision", v.clone()));
        }
        if let Some(v) = self.kilometraje_max {
            params.push(("kilometrajeMax", v.to_string()));
        }
        if let Some(v) = &self.sort_by {
            params.push(("sortBy", v.clone()));
        }
        if let Some(v) = self.page {
            params.push(("page", v.to_string()));
        }
        if let Some(v) = self.page_size {
            params.push(("pageSize", v.to_string()));
        }

        params
    }

    /// Number of restricting filters; the query text, sort order and
    /// pagination do not count
    pub fn active_filter_count(&self) -> usize {
        [
            self.marca.is_some(),
            self.modelo.is_some(),
            self.ano_min.is_some(),
            self.ano_max.is_some(),
            self.precio_min.is_some(),
            self.precio_max.is_some(),
            self.categoria_id.is_some(),
            self.subcategoria_id.is_some(),
            self.estado_id.is_some(),
            self.municipio_id.is_some(),
            self.ubicacion.is_some(),
            self.combustible.is_some(),
            self.transmision.is_some(),
            self.kilometraje_max.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// Range and pagination sanity checks, before any request is built.
    /// All problems are collected into one error rather than stopping at
    /// the first.
    pub fn validate(&self) -> ApiResult<()> {
        let mut problems = Vec::new();

        if let (Some(min), Some(max)) = (self.precio_min, self.precio_max) {
            if min > max {
                problems.push("precioMin must not exceed precioMax");
            }
        }
        if let (Some(min), Some(max)) = (self.ano_min, self.ano_max) {
            if min > max {
                problems.push("anoMin must not exceed anoMax");
            }
        }
        if self.page.is_some_and(|page| page < 1) {
            problems.push("page must be at least 1");
        }
        if self.page_size.is_some_and(|size| !(1..=100).contains(&size)) {
            problems.push("pageSize must be between 1 and 100");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(problems.join("; ")))
        }
    }

    /// Rebuild filters from a URL query string; unknown keys are ignored
    pub fn from_query_string(raw: &str) -> Self {
        let mut filters = SearchFilters::default();

        for (key, value) in form_urlencoded::parse(raw.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "q" | "query" => filters.query = Some(value.into_owned()),
                "marca" => filters.marca = Some(value.into_owned()),
                "modelo" => filters.modelo = Some(value.into_owned()),
                "anoMin" => filters.ano_min = value.parse().ok(),
                "anoMax" => filters.ano_max = value.parse().ok(),
                "precioMin" => filters.precio_min = value.parse().ok(),
                "precioMax" => filters.precio_max = value.parse().ok(),
                "categoriaID" => filters.categoria_id = value.parse().ok(),
                "subcategoriaID" => filters.subcategoria_id = value.parse().ok(),
                "estadoID" => filters.estado_id = value.parse().ok(),
                "municipioID" => filters.municipio_id = value.parse().ok(),
                "ubicacion" => filters.ubicacion = Some(value.into_owned()),
                "combustible" => filters.combustible = Some(value.into_owned()),
                "transmision" => filters.transmision = Some(value.into_owned()),
                "kilometrajeMax" => filters.kilometraje_max = value.parse().ok(),
                "sortBy" => filters.sort_by = Some(value.into_owned()),
                "page" => filters.page = value.parse().ok(),
                "pageSize" => filters.page_size = value.parse().ok(),
                _ => {}
            }
        }

        filters
    }
}

/// One persisted search-log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchLogEntry {
    pub term: String,
    /// Encoded filter params active for this search, if any
    #[serde(default)]
    pub filters: Option<String>,
    pub timestamp: String,
    pub results: u64,
}

/// Drops rapid-fire invocations, keeping only the latest.
///
/// Each call bumps the generation; after the delay the call only proceeds
/// if no newer call arrived in the meantime.
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    /// Await the delay, then run `fut` unless a newer call superseded this
    /// one
    pub async fn run<T>(&self, fut: impl std::future::Future<Output = T>) -> Option<T> {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.generation.load(Ordering::SeqCst) != my_generation {
            return None;
        }
        Some(fut.await)
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(300))
    }
}

/// Search over the gateway plus the locally persisted history
pub struct SearchService {
    gateway: Arc<ApiGateway>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl SearchService {
    pub fn new(
        gateway: Arc<ApiGateway>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        SearchService {
            gateway,
            store,
            clock,
        }
    }

    /// Full-text search with filters; records the term and logs the result
    /// count
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> ApiResult<PaginatedResponse<Articulo>> {
        filters.validate()?;

        let params = filters.to_params();
        let url = endpoints::build_search_url(query, &params);
        let body = self.gateway.get(&url).await?;
        let page: PaginatedResponse<Articulo> = decode(body)?;

        self.add_recent_search(query);
        let encoded_filters = if params.is_empty() {
            None
        } else {
            Some(
                params
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("&"),
            )
        };
        self.log_search(query, encoded_filters, page.datos.len() as u64);
        Ok(page)
    }

    /// Filter-only browse across all active articles
    pub async fn advanced_search(
        &self,
        filters: &SearchFilters,
    ) -> ApiResult<PaginatedResponse<Articulo>> {
        filters.validate()?;

        let url = endpoints::build_url(endpoints::GET_ALL_ACTIVE, &filters.to_params());
        let body = self.gateway.get(&url).await?;
        decode(body)
    }

    pub async fn get_all_active(
        &self,
        page: u32,
        page_size: u32,
    ) -> ApiResult<PaginatedResponse<Articulo>> {
        let url = endpoints::build_paginated_url(endpoints::GET_ALL_ACTIVE, page, page_size);
        let body = self.gateway.get(&url).await?;
        decode(body)
    }

    /// Term suggestions; terms under two characters return empty without
    /// touching the network
    pub async fn autocomplete(&self, term: &str, limit: Option<u32>) -> ApiResult<Vec<String>> {
        let term = term.trim();
        if term.chars().count() < MIN_AUTOCOMPLETE_CHARS {
            return Ok(Vec::new());
        }

        let url =
            endpoints::build_autocomplete_url(term, limit.unwrap_or(DEFAULT_AUTOCOMPLETE_LIMIT));
        let body = self.gateway.get(&url).await?;
        decode(body)
    }

    /// Most recent search terms, newest first
    pub fn recent_searches(&self) -> Vec<String> {
        self.store
            .get(RECENT_SEARCHES_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Remember a search term: duplicates move to the front, the list caps
    /// at ten
    pub fn add_recent_search(&self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }

        let mut recents = self.recent_searches();
        recents.retain(|existing| !existing.eq_ignore_ascii_case(term));
        recents.insert(0, term.to_string());
        recents.truncate(MAX_RECENT_SEARCHES);

        if let Ok(serialized) = serde_json::to_string(&recents) {
            self.store.set(RECENT_SEARCHES_KEY, &serialized);
        }
    }

    pub fn clear_recent_searches(&self) {
        self.store.remove(RECENT_SEARCHES_KEY);
    }

    /// Suggestions to show with no history yet
    pub fn popular_searches(&self) -> Vec<String> {
        POPULAR_SEARCHES.iter().map(|s| s.to_string()).collect()
    }

    pub fn search_logs(&self) -> Vec<SearchLogEntry> {
        self.store
            .get(SEARCH_LOGS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Append to the local search log, newest first, capped at one hundred
    /// entries
    fn log_search(&self, term: &str, filters: Option<String>, results: u64) {
        let mut logs = self.search_logs();
        logs.insert(
            0,
            SearchLogEntry {
                term: term.to_string(),
                filters,
                timestamp: self.clock.now().to_rfc3339(),
                results,
            },
        );
        logs.truncate(MAX_SEARCH_LOGS);

        debug!(term, results, "search logged");
        if let Ok(serialized) = serde_json::to_string(&logs) {
            self.store.set(SEARCH_LOGS_KEY, &serialized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthSession;
    use crate::config::ClientConfig;
    use common::clock::ManualClock;
    use common::storage::MemoryStore;

    fn service() -> (SearchService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let config = ClientConfig::with_base_url("http://localhost:0");
        let session = Arc::new(AuthSession::new(
            &config,
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let gateway = Arc::new(ApiGateway::new(
            &config,
            session,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let service = SearchService::new(
            gateway,
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            clock,
        );
        (service, store)
    }

    #[test]
    fn params_skip_unset_fields() {
        let filters = SearchFilters {
            marca: Some("BMW".to_string()),
            ano_min: Some(2015),
            ..Default::default()
        };
        assert_eq!(
            filters.to_params(),
            vec![("marca", "BMW".to_string()), ("anoMin", "2015".to_string())]
        );
    }

    #[test]
    fn filter_count_ignores_query_sort_and_paging() {
        let filters = SearchFilters {
            query: Some("bmw".to_string()),
            sort_by: Some("precio".to_string()),
            page: Some(2),
            page_size: Some(20),
            marca: Some("BMW".to_string()),
            precio_max: Some(500_000.0),
            ..Default::default()
        };
        assert_eq!(filters.active_filter_count(), 2);
    }

    #[test]
    fn validation_rejects_inverted_ranges() {
        let filters = SearchFilters {
            precio_min: Some(100_000.0),
            precio_max: Some(50_000.0),
            ..Default::default()
        };
        assert!(filters.validate().is_err());

        let filters = SearchFilters {
            ano_min: Some(2020),
            ano_max: Some(2015),
            ..Default::default()
        };
        assert!(filters.validate().is_err());

        let filters = SearchFilters {
            page_size: Some(500),
            ..Default::default()
        };
        assert!(filters.validate().is_err());

        assert!(SearchFilters::default().validate().is_ok());
    }

    #[test]
    fn query_string_round_trip() {
        let filters =
            SearchFilters::from_query_string("?marca=BMW&anoMin=2015&pageSize=20&bogus=1");
        assert_eq!(filters.marca.as_deref(), Some("BMW"));
        assert_eq!(filters.ano_min, Some(2015));
        assert_eq!(filters.page_size, Some(20));
        assert_eq!(filters.modelo, None);
    }

    #[test]
    fn recent_searches_dedup_to_front() {
        let (service, _store) = service();

        service.add_recent_search("bmw");
        service.add_recent_search("audi");
        service.add_recent_search("BMW");

        assert_eq!(service.recent_searches(), vec!["BMW", "audi"]);
    }

    #[test]
    fn recent_searches_cap_at_ten() {
        let (service, _store) = service();

        for i in 0..11 {
            service.add_recent_search(&format!("term-{i}"));
        }

        let recents = service.recent_searches();
        assert_eq!(recents.len(), 10);
        assert_eq!(recents.first().map(String::as_str), Some("term-10"));
        // oldest entry fell off
        assert!(!recents.iter().any(|t| t == "term-0"));
    }

    #[test]
    fn search_log_caps_at_one_hundred() {
        let (service, _store) = service();

        for i in 0..105 {
            service.log_search(&format!("t{i}"), None, i);
        }

        let logs = service.search_logs();
        assert_eq!(logs.len(), 100);
        assert_eq!(logs[0].term, "t104");
    }

    #[tokio::test]
    async fn short_autocomplete_terms_skip_the_network() {
        // base URL is unroutable; a network attempt would error
        let (service, _store) = service();

        assert_eq!(
            service.autocomplete("b", None).await.unwrap(),
            Vec::<String>::new()
        );
        assert_eq!(
            service.autocomplete("  a  ", Some(5)).await.unwrap(),
            Vec::<String>::new()
        );
    }

    #[tokio::test]
    async fn debouncer_drops_superseded_calls() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(20)));

        let first = {
            let debouncer = Arc::clone(&debouncer);
            tokio::spawn(async move { debouncer.run(async { 1 }).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = {
            let debouncer = Arc::clone(&debouncer);
            tokio::spawn(async move { debouncer.run(async { 2 }).await })
        };

        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second.await.unwrap(), Some(2));
    }
}
