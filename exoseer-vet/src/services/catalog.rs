//! Catalog service: target lookup in an exoplanet archive
//!
//! [`ExoplanetArchiveClient`] queries the NASA Exoplanet Archive TAP service
//! (`ps` table, JSON output) and, for TIC identifiers, the MAST TESS data
//! validation service. [`StaticCatalog`] serves a fixed candidate list.
//!
//! Searches return every unique match; callers apply any result limit.
//!
//! # API Reference
//! - Endpoint: `{tap_url}/sync?query=<ADQL>&format=json`
//! - Documentation: https://exoplanetarchive.ipac.caltech.edu/docs/TAP/usingTAP.html
//! - TESS DV: `{mast_url}/api/v0.1/dvdata/tess/{tic_id}/info/`

use crate::types::{Candidate, CandidateParameters};
use async_trait::async_trait;
use exoseer_common::config::CatalogConfig;
use reqwest::{header, Client};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// User-Agent header sent with every request
const USER_AGENT: &str = concat!("exoseer-vet/", env!("CARGO_PKG_VERSION"));

/// Catalog score given to TESS data validation candidates
const TESS_DV_CONFIDENCE: f64 = 0.8;

/// Below this many hits the host-prefix strategy is tried
const HOST_FALLBACK_THRESHOLD: usize = 5;

/// Columns selected for search results
const COLUMNS: &str = "pl_name, hostname, discoverymethod, disc_year, pl_rade, pl_masse, \
                       pl_orbper, pl_orbsmax, pl_trandep, st_teff, st_rad, st_mass, ra, dec";

/// Identifier prefixes that trigger a numeric-id search
const ID_PREFIXES: [&str; 4] = ["TIC", "TOI", "KOI", "K2"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Target not found in catalog: {0}")]
    NotFound(String),

    #[error("Catalog network error: {0}")]
    Network(String),

    #[error("Catalog API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Catalog response parse error: {0}")]
    Parse(String),
}

/// Target lookup
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Candidates whose planet or host name matches `name`
    async fn search(&self, name: &str) -> Result<Vec<Candidate>, CatalogError>;

    /// Exact lookup of one planet
    async fn details(&self, name: &str) -> Result<Candidate, CatalogError>;
}

/// One `ps` table row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveRow {
    pub pl_name: Option<String>,
    pub hostname: Option<String>,
    pub discoverymethod: Option<String>,
    pub disc_year: Option<i32>,
    pub pl_rade: Option<f64>,
    pub pl_masse: Option<f64>,
    pub pl_orbper: Option<f64>,
    pub pl_orbsmax: Option<f64>,
    pub pl_trandep: Option<f64>,
    pub st_teff: Option<f64>,
    pub st_rad: Option<f64>,
    pub st_mass: Option<f64>,
    pub ra: Option<f64>,
    pub dec: Option<f64>,
}

/// Completeness score of a catalog row, in [0, 1]
pub fn catalog_confidence(row: &ArchiveRow) -> f64 {
    let mut score = 0.0;
    let max_score = 0.2 + 0.2 + 0.3 + 0.15 + 0.15;

    if row.pl_rade.is_some() {
        score += 0.2;
    }
    if row.pl_orbper.is_some() {
        score += 0.2;
    }
    if let Some(method) = &row.discoverymethod {
        let method = method.to_lowercase();
        score += if method.contains("transit") {
            0.3
        } else if method.contains("radial") {
            0.25
        } else {
            0.15
        };
    }
    if row.st_teff.is_some() && row.st_rad.is_some() {
        score += 0.15;
    }
    match row.disc_year {
        Some(year) if year >= 2015 => score += 0.15,
        Some(year) if year >= 2010 => score += 0.1,
        _ => {}
    }

    score / max_score
}

impl ArchiveRow {
    /// Convert to a candidate; rows without a planet name are skipped
    pub fn into_candidate(self) -> Option<Candidate> {
        let confidence = catalog_confidence(&self);
        let status = if self.pl_rade.is_some() && self.pl_orbper.is_some() {
            "confirmed"
        } else {
            "candidate"
        };
        let name = self.pl_name.filter(|n| !n.trim().is_empty())?;

        Some(Candidate {
            host_star: self.hostname.unwrap_or_default(),
            parameters: CandidateParameters {
                orbital_period: self.pl_orbper,
                star_temperature: self.st_teff,
                star_radius: self.st_rad,
                star_mass: self.st_mass,
                discovery_method: self.discoverymethod,
            },
            discovery_year: self.disc_year,
            radius_earth: self.pl_rade,
            mass_earth: self.pl_masse,
            semi_major_axis: self.pl_orbsmax,
            transit_depth: self.pl_trandep,
            ra: self.ra,
            dec: self.dec,
            tic_id: tic_id_of(&name),
            confidence_score: Some(confidence),
            status: status.to_string(),
            name,
        })
    }
}

fn tic_id_of(name: &str) -> Option<u64> {
    let rest = name.trim().strip_prefix("TIC")?;
    let digits: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// TIC id for a MAST lookup, for names mentioning TIC or purely numeric names
///
/// `TIC <digits>` is preferred; otherwise all digits in the name are joined.
pub fn tess_lookup_id(name: &str) -> Option<u64> {
    let upper = name.trim().to_uppercase();
    let numeric = !upper.is_empty() && upper.chars().all(|c| c.is_ascii_digit());
    let Some(pos) = upper.find("TIC") else {
        return if numeric { upper.parse().ok() } else { None };
    };

    let direct: String = upper[pos + 3..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if !direct.is_empty() {
        return direct.parse().ok();
    }
    let joined: String = upper.chars().filter(|c| c.is_ascii_digit()).collect();
    joined.parse().ok()
}

/// MAST TESS data validation summary
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TessDvInfo {
    #[serde(rename = "DV Data Header")]
    pub header: Option<TessDvHeader>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TessDvHeader {
    #[serde(rename = "PRADIUS")]
    pub planet_radius: Option<f64>,
    #[serde(rename = "PPERIOD")]
    pub period: Option<f64>,
    #[serde(rename = "PDEPTH")]
    pub depth: Option<f64>,
}

impl TessDvInfo {
    /// Candidates described by the summary (at most one, the `.01` signal)
    pub fn into_candidates(self, tic_id: u64) -> Vec<Candidate> {
        let Some(header) = self.header else {
            return Vec::new();
        };

        let mut candidate = Candidate::named(format!("TIC {}.01", tic_id));
        candidate.host_star = format!("TIC {}", tic_id);
        candidate.parameters.orbital_period = header.period;
        candidate.parameters.discovery_method = Some("Transit".to_string());
        candidate.radius_earth = header.planet_radius;
        candidate.transit_depth = header.depth;
        candidate.tic_id = Some(tic_id);
        candidate.confidence_score = Some(TESS_DV_CONFIDENCE);
        vec![candidate]
    }
}

/// Escape a value for use inside an ADQL string literal
pub fn escape_adql(value: &str) -> String {
    value.replace('\'', "''")
}

/// First run of digits in `name`, when it looks like a catalog identifier
fn catalog_number(name: &str) -> Option<String> {
    let upper = name.to_uppercase();
    if !ID_PREFIXES.iter().any(|prefix| upper.contains(prefix)) {
        return None;
    }
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    (!digits.is_empty()).then_some(digits)
}

/// ADQL queries tried by a search, in order
pub fn search_queries(name: &str) -> (String, Option<String>, String) {
    let clean = escape_adql(&name.trim().replace('_', " "));
    let by_name = format!(
        "SELECT {COLUMNS} FROM ps WHERE (UPPER(pl_name) LIKE UPPER('%{clean}%') \
         OR UPPER(hostname) LIKE UPPER('%{clean}%')) AND default_flag = 1 \
         ORDER BY disc_year DESC"
    );
    let by_number = catalog_number(name).map(|id| {
        format!(
            "SELECT {COLUMNS} FROM ps WHERE (pl_name LIKE '%{id}%' OR hostname LIKE '%{id}%') \
             AND default_flag = 1 ORDER BY disc_year DESC"
        )
    });
    let host = clean.split_whitespace().next().unwrap_or_default();
    let by_host = format!(
        "SELECT {COLUMNS} FROM ps WHERE UPPER(hostname) LIKE UPPER('%{host}%') \
         AND default_flag = 1 ORDER BY disc_year DESC"
    );
    (by_name, by_number, by_host)
}

/// Append candidates whose names are not already present
fn merge(candidates: &mut Vec<Candidate>, found: impl IntoIterator<Item = Candidate>) {
    for candidate in found {
        if !candidates.iter().any(|c| c.name == candidate.name) {
            candidates.push(candidate);
        }
    }
}

fn rows_to_candidates(rows: Vec<ArchiveRow>) -> impl Iterator<Item = Candidate> {
    rows.into_iter().filter_map(ArchiveRow::into_candidate)
}

/// NASA Exoplanet Archive TAP client
pub struct ExoplanetArchiveClient {
    http_client: Client,
    sync_url: String,
    mast_url: String,
}

impl ExoplanetArchiveClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        let http_client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| CatalogError::Network(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            sync_url: format!("{}/sync", config.tap_url.trim_end_matches('/')),
            mast_url: config.mast_url.trim_end_matches('/').to_string(),
        })
    }

    /// Run one ADQL query
    async fn query(&self, adql: &str) -> Result<Vec<ArchiveRow>, CatalogError> {
        debug!(query = %adql, "Executing TAP query");

        let response = self
            .http_client
            .get(&self.sync_url)
            .query(&[("query", adql), ("format", "json")])
            .send()
            .await
            .map_err(|e| CatalogError::Network(format!("TAP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api { status, message });
        }

        let rows: Vec<ArchiveRow> = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(format!("Failed to parse TAP response: {}", e)))?;

        debug!(rows = rows.len(), "TAP query complete");
        Ok(rows)
    }

    /// TESS data validation candidates for a TIC id
    async fn tess_candidates(&self, tic_id: u64) -> Result<Vec<Candidate>, CatalogError> {
        let url = format!("{}/api/v0.1/dvdata/tess/{}/info/", self.mast_url, tic_id);
        debug!(tic_id, "Querying MAST TESS data validation");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| CatalogError::Network(format!("MAST request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api { status, message });
        }

        let info: TessDvInfo = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(format!("Failed to parse MAST response: {}", e)))?;
        Ok(info.into_candidates(tic_id))
    }
}

#[async_trait]
impl CatalogService for ExoplanetArchiveClient {
    async fn search(&self, name: &str) -> Result<Vec<Candidate>, CatalogError> {
        let (by_name, by_number, by_host) = search_queries(name);
        let mut candidates = Vec::new();

        merge(&mut candidates, rows_to_candidates(self.query(&by_name).await?));

        if let Some(query) = by_number {
            match self.query(&query).await {
                Ok(rows) => merge(&mut candidates, rows_to_candidates(rows)),
                Err(e) => warn!(target_name = %name, error = %e, "Catalog id search failed"),
            }
        }

        if candidates.len() < HOST_FALLBACK_THRESHOLD {
            match self.query(&by_host).await {
                Ok(rows) => merge(&mut candidates, rows_to_candidates(rows)),
                Err(e) => warn!(target_name = %name, error = %e, "Catalog host search failed"),
            }
        }

        if let Some(tic_id) = tess_lookup_id(name) {
            match self.tess_candidates(tic_id).await {
                Ok(found) => merge(&mut candidates, found),
                Err(e) => warn!(tic_id, error = %e, "TESS candidate search failed"),
            }
        }

        Ok(candidates)
    }

    async fn details(&self, name: &str) -> Result<Candidate, CatalogError> {
        let query = format!(
            "SELECT {COLUMNS} FROM ps WHERE pl_name = '{}' AND default_flag = 1",
            escape_adql(name.trim())
        );

        self.query(&query)
            .await?
            .into_iter()
            .find_map(ArchiveRow::into_candidate)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }
}

/// Fixed in-memory catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    candidates: Vec<Candidate>,
}

impl StaticCatalog {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn search(&self, name: &str) -> Result<Vec<Candidate>, CatalogError> {
        let needle = name.trim().replace('_', " ").to_lowercase();
        Ok(self
            .candidates
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&needle)
                    || c.host_star.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn details(&self, name: &str) -> Result<Candidate, CatalogError> {
        self.candidates
            .iter()
            .find(|c| c.name == name.trim())
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_row() -> ArchiveRow {
        ArchiveRow {
            pl_name: Some("TOI-700 d".to_string()),
            hostname: Some("TOI-700".to_string()),
            discoverymethod: Some("Transit".to_string()),
            disc_year: Some(2020),
            pl_rade: Some(1.19),
            pl_orbper: Some(37.42),
            st_teff: Some(3480.0),
            st_rad: Some(0.42),
            st_mass: Some(0.41),
            ..ArchiveRow::default()
        }
    }

    #[test]
    fn test_complete_row_scores_one() {
        assert!((catalog_confidence(&full_row()) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partial_row_score() {
        let row = ArchiveRow {
            pl_name: Some("HD 1 b".to_string()),
            discoverymethod: Some("Radial Velocity".to_string()),
            disc_year: Some(2012),
            pl_orbper: Some(4.0),
            ..ArchiveRow::default()
        };
        // 0.2 period + 0.25 radial + 0.1 year
        assert!((catalog_confidence(&row) - 0.55).abs() < 1e-12);

        let candidate = row.into_candidate().unwrap();
        assert_eq!(candidate.status, "candidate");
    }

    #[test]
    fn test_row_conversion() {
        let candidate = full_row().into_candidate().unwrap();
        assert_eq!(candidate.name, "TOI-700 d");
        assert_eq!(candidate.status, "confirmed");
        assert_eq!(candidate.parameters.star_radius, Some(0.42));
        assert!(ArchiveRow::default().into_candidate().is_none());
    }

    #[test]
    fn test_tap_json_rows_parse() {
        let json = r#"[{"pl_name":"Kepler-22 b","hostname":"Kepler-22","discoverymethod":"Transit",
                        "disc_year":2011,"pl_rade":2.1,"pl_masse":null,"pl_orbper":289.86,
                        "st_teff":5518,"st_rad":0.98}]"#;
        let rows: Vec<ArchiveRow> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].st_teff, Some(5518.0));
        assert_eq!(rows[0].pl_masse, None);
    }

    #[test]
    fn test_search_queries_escape_and_strategies() {
        let (by_name, by_number, by_host) = search_queries("O'Brien_1");
        assert!(by_name.contains("O''Brien 1"));
        assert!(by_number.is_none());
        assert!(by_host.contains("'%O''Brien%'"));

        let (_, by_number, _) = search_queries("TOI-700");
        assert!(by_number.unwrap().contains("'%700%'"));
    }

    #[test]
    fn test_tic_id_extracted() {
        assert_eq!(tic_id_of("TIC 150428135.01"), Some(150428135));
        assert_eq!(tic_id_of("Kepler-22 b"), None);
    }

    #[test]
    fn test_tess_lookup_id() {
        assert_eq!(tess_lookup_id("TIC 150428135"), Some(150428135));
        assert_eq!(tess_lookup_id("tic150428135"), Some(150428135));
        assert_eq!(tess_lookup_id("150428135"), Some(150428135));
        assert_eq!(tess_lookup_id("TIC-42"), Some(42));
        assert_eq!(tess_lookup_id("TOI-700"), None);
        assert_eq!(tess_lookup_id("TIC"), None);
    }

    #[test]
    fn test_tess_dv_summary_to_candidate() {
        let json = r#"{"DV Data Header": {"PRADIUS": 2.3, "PPERIOD": 5.1, "PDEPTH": 850.0, "TESSMAG": 9.1}}"#;
        let info: TessDvInfo = serde_json::from_str(json).unwrap();
        let candidates = info.into_candidates(150428135);

        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.name, "TIC 150428135.01");
        assert_eq!(candidate.host_star, "TIC 150428135");
        assert_eq!(candidate.parameters.orbital_period, Some(5.1));
        assert_eq!(candidate.radius_earth, Some(2.3));
        assert_eq!(candidate.transit_depth, Some(850.0));
        assert_eq!(candidate.confidence_score, Some(0.8));
        assert_eq!(candidate.status, "candidate");

        let empty: TessDvInfo = serde_json::from_str("{}").unwrap();
        assert!(empty.into_candidates(1).is_empty());
    }

    #[test]
    fn test_merge_skips_duplicate_names() {
        let mut candidates = vec![Candidate::named("TIC 1.01")];
        merge(
            &mut candidates,
            vec![Candidate::named("TIC 1.01"), Candidate::named("TIC 2.01")],
        );
        let names: Vec<_> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["TIC 1.01", "TIC 2.01"]);
    }

    #[tokio::test]
    async fn test_static_catalog() {
        let catalog = StaticCatalog::new(vec![full_row().into_candidate().unwrap()]);
        assert_eq!(catalog.search("toi-700").await.unwrap().len(), 1);
        assert!(catalog.search("Kepler").await.unwrap().is_empty());
        assert!(matches!(
            catalog.details("TOI-700 b").await,
            Err(CatalogError::NotFound(_))
        ));
    }
}
