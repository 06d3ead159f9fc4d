use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::request::RequestExecutor;

/// Fields requested from the details endpoint. Requesting a fixed list keeps
/// billing predictable.
const DETAIL_FIELDS: &str = "name,formatted_address,formatted_phone_number,website,rating,url,international_phone_number,place_id,types";

/// Sydney Opera House; a stable id used only to verify the API key works.
const CONNECTIVITY_PROBE_PLACE_ID: &str = "ChIJN1t_tDeuEmsRUsoyG83frY4";

/// One page of text-search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub results: Vec<RawPlace>,
    pub next_page_token: Option<String>,
}

/// A search result. Only the id matters; everything else comes from the
/// follow-up details lookup.
#[derive(Debug, Clone)]
pub struct RawPlace {
    pub place_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceDetail {
    pub name: Option<String>,
    pub formatted_address: Option<String>,
    pub formatted_phone_number: Option<String>,
    pub international_phone_number: Option<String>,
    pub website: Option<String>,
    pub rating: Option<f64>,
    pub url: Option<String>,
    pub place_id: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
}

impl PlaceDetail {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.formatted_address.is_none()
            && self.formatted_phone_number.is_none()
            && self.international_phone_number.is_none()
            && self.website.is_none()
            && self.rating.is_none()
            && self.url.is_none()
            && self.place_id.is_none()
            && self.types.is_empty()
    }
}

/// Seam between the scanners and the upstream API. Both operations swallow
/// their own failures: a failed query means "no results here", never an
/// aborted scan.
#[async_trait]
pub trait PlacesApi: Send + Sync {
    async fn search(
        &self,
        locality: &str,
        region: &str,
        term: &str,
        page_token: Option<&str>,
    ) -> SearchPage;

    async fn fetch_detail(&self, place_id: &str) -> Option<PlaceDetail>;
}

pub struct HttpPlacesClient {
    executor: Arc<RequestExecutor>,
    api_key: SecretString,
    api_base: String,
}

impl HttpPlacesClient {
    pub fn new(executor: Arc<RequestExecutor>, api_key: SecretString, config: &AppConfig) -> Self {
        Self {
            executor,
            api_key,
            api_base: config.places_api_base.clone(),
        }
    }

    /// Verifies the API key with a minimal details lookup before a scan
    /// starts burning quota on real queries.
    pub async fn check_connection(&self) -> bool {
        info!("verifying Google Maps API connection");
        let url = match self.endpoint("details/json") {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("place_id", CONNECTIVITY_PROBE_PLACE_ID)
                    .append_pair("fields", "name")
                    .append_pair("key", self.api_key.expose_secret());
                url
            }
            Err(err) => {
                error!(%err, "invalid places API base URL");
                return false;
            }
        };

        match self.executor.execute(url.as_str()).await {
            Ok(value) => {
                if value["result"]["name"].is_string() {
                    info!("connection OK; API key is valid");
                    true
                } else {
                    error!("connection succeeded but the response is missing expected data");
                    false
                }
            }
            Err(err) => {
                error!(%err, "connection check failed");
                false
            }
        }
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        Url::parse(&format!("{}/{path}", self.api_base))
            .map_err(|err| AppError::Config(format!("invalid places API base URL: {err}")))
    }
}

#[async_trait]
impl PlacesApi for HttpPlacesClient {
    async fn search(
        &self,
        locality: &str,
        region: &str,
        term: &str,
        page_token: Option<&str>,
    ) -> SearchPage {
        let mut url = match self.endpoint("textsearch/json") {
            Ok(url) => url,
            Err(err) => {
                warn!(%err, term, locality, "cannot build search URL");
                return SearchPage::default();
            }
        };
        url.query_pairs_mut()
            .append_pair("query", &format!("{term} en {locality}, {region}"))
            .append_pair("language", "es")
            .append_pair("key", self.api_key.expose_secret());
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pagetoken", token);
        }

        match self.executor.execute(url.as_str()).await {
            Ok(value) => parse_search_page(&value),
            Err(err) => {
                warn!(%err, term, locality, "search failed; continuing with empty results");
                SearchPage::default()
            }
        }
    }

    async fn fetch_detail(&self, place_id: &str) -> Option<PlaceDetail> {
        let mut url = match self.endpoint("details/json") {
            Ok(url) => url,
            Err(err) => {
                warn!(%err, place_id, "cannot build details URL");
                return None;
            }
        };
        url.query_pairs_mut()
            .append_pair("place_id", place_id)
            .append_pair("fields", DETAIL_FIELDS)
            .append_pair("language", "es")
            .append_pair("key", self.api_key.expose_secret());

        match self.executor.execute(url.as_str()).await {
            Ok(value) => parse_detail(&value),
            Err(err) => {
                warn!(%err, place_id, "details lookup failed; skipping place");
                None
            }
        }
    }
}

fn parse_search_page(value: &Value) -> SearchPage {
    let results = value["results"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry["place_id"].as_str())
                .map(|id| RawPlace {
                    place_id: id.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();
    let next_page_token = value["next_page_token"].as_str().map(str::to_string);
    SearchPage {
        results,
        next_page_token,
    }
}

fn parse_detail(value: &Value) -> Option<PlaceDetail> {
    let result = value.get("result")?;
    if result.as_object().is_none_or(|map| map.is_empty()) {
        return None;
    }
    serde_json::from_value(result.clone()).ok()
}

#[cfg(test)]
mod tests {
    use httptest::matchers::{all_of, contains, request, url_decoded};
    use httptest::responders::{json_encoded, status_code};
    use httptest::{Expectation, Server};
    use serde_json::json;

    use super::*;

    fn client_against(server: &Server) -> HttpPlacesClient {
        let config = AppConfig {
            google_places_api_key: None,
            places_api_base: server.url("/place").to_string(),
            max_requests_per_day: 100,
            max_pages_per_term: 10,
            tls_no_verify: false,
            output_dir: "resultados".into(),
            scan_plan_path: None,
        };
        let executor = Arc::new(RequestExecutor::new(&config).unwrap());
        HttpPlacesClient::new(executor, SecretString::from("test-key".to_string()), &config)
    }

    #[tokio::test]
    async fn search_builds_spanish_query_and_parses_page() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/place/textsearch/json"),
                request::query(url_decoded(contains((
                    "query",
                    "ferreterías en San Telmo, Ciudad Autónoma de Buenos Aires"
                )))),
                request::query(url_decoded(contains(("language", "es")))),
            ])
            .respond_with(json_encoded(json!({
                "status": "OK",
                "results": [
                    {"place_id": "id-1", "name": "A"},
                    {"name": "missing id, skipped"},
                    {"place_id": "id-2"}
                ],
                "next_page_token": "tok-2"
            }))),
        );

        let client = client_against(&server);
        let page = client
            .search(
                "San Telmo",
                "Ciudad Autónoma de Buenos Aires",
                "ferreterías",
                None,
            )
            .await;
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].place_id, "id-1");
        assert_eq!(page.next_page_token.as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn search_passes_page_token_through() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/place/textsearch/json"),
                request::query(url_decoded(contains(("pagetoken", "opaque-token")))),
            ])
            .respond_with(json_encoded(json!({"status": "OK", "results": []}))),
        );

        let client = client_against(&server);
        let page = client
            .search("Palermo", "CABA", "cafés", Some("opaque-token"))
            .await;
        assert!(page.results.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn search_swallows_failures_into_empty_page() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/place/textsearch/json"))
                .respond_with(status_code(500).body("boom")),
        );

        let client = client_against(&server);
        let page = client.search("Flores", "CABA", "librerías", None).await;
        assert!(page.results.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn detail_parses_full_record() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/place/details/json"),
                request::query(url_decoded(contains(("place_id", "id-1")))),
                request::query(url_decoded(contains(("fields", DETAIL_FIELDS)))),
            ])
            .respond_with(json_encoded(json!({
                "status": "OK",
                "result": {
                    "name": "Taller Norte",
                    "formatted_address": "Av. Cabildo 1234",
                    "rating": 4.5,
                    "types": ["electronics_store", "point_of_interest"]
                }
            }))),
        );

        let client = client_against(&server);
        let detail = client.fetch_detail("id-1").await.unwrap();
        assert_eq!(detail.name.as_deref(), Some("Taller Norte"));
        assert_eq!(detail.rating, Some(4.5));
        assert_eq!(detail.types.len(), 2);
    }

    #[tokio::test]
    async fn detail_returns_none_for_missing_or_empty_result() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/place/details/json"))
                .times(2)
                .respond_with(json_encoded(json!({"status": "ZERO_RESULTS", "result": {}}))),
        );

        let client = client_against(&server);
        assert!(client.fetch_detail("id-1").await.is_none());
        assert!(client.fetch_detail("id-2").await.is_none());
    }

    #[tokio::test]
    async fn detail_swallows_failures_into_none() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/place/details/json"))
                .respond_with(status_code(403).body("denied")),
        );

        let client = client_against(&server);
        assert!(client.fetch_detail("id-1").await.is_none());
    }

    #[tokio::test]
    async fn connection_check_reports_key_validity() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/place/details/json"),
                request::query(url_decoded(contains((
                    "place_id",
                    CONNECTIVITY_PROBE_PLACE_ID
                )))),
            ])
            .respond_with(json_encoded(
                json!({"status": "OK", "result": {"name": "Sydney Opera House"}}),
            )),
        );

        let client = client_against(&server);
        assert!(client.check_connection().await);
    }
}
