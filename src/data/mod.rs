use crate::stats::{CaseCounts, Count, Named};
use geojson::{GeoJson, JsonObject, JsonValue, Value};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// A closed ring of (lon, lat) points
pub type Ring = Vec<(f64, f64)>;

/// Exterior ring followed by any holes
pub type Polygon = Vec<Ring>;

/// One region (a US state) with its case history and outline
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    pub cases_by_date: BTreeMap<String, Count>,
    pub polygons: Vec<Polygon>,
}

impl Feature {
    pub fn has_geometry(&self) -> bool {
        self.polygons.iter().any(|p| p.first().is_some_and(|ring| ring.len() >= 3))
    }
}

impl CaseCounts for Feature {
    fn count_on(&self, date: &str) -> Option<Count> {
        self.cases_by_date.get(date).copied()
    }
}

impl Named for Feature {
    fn name(&self) -> &str {
        &self.name
    }
}

/// The decoded feature collection; read-only once built
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    features: Vec<Feature>,
}

impl Dataset {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, idx: usize) -> Option<&Feature> {
        self.features.get(idx)
    }

    /// First feature whose name matches, ignoring ASCII case
    pub fn find(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Property fields consulted, in order, for a region's display name
#[derive(Debug, Clone)]
pub struct NameFields {
    pub fields: Vec<String>,
    pub fallback: String,
}

impl NameFields {
    /// First non-empty string among the configured fields
    pub fn resolve(&self, props: Option<&JsonObject>) -> String {
        props
            .and_then(|p| {
                self.fields
                    .iter()
                    .filter_map(|f| p.get(f).and_then(JsonValue::as_str))
                    .find(|s| !s.is_empty())
            })
            .unwrap_or(self.fallback.as_str())
            .to_string()
    }
}

impl Default for NameFields {
    fn default() -> Self {
        Self {
            fields: vec!["state".to_string(), "NAME_left".to_string()],
            fallback: "State".to_string(),
        }
    }
}

/// Where the dataset comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Url(String),
    File(PathBuf),
}

impl Source {
    pub fn parse(s: &str) -> Self {
        if s.starts_with("http://") || s.starts_with("https://") {
            Source::Url(s.to_string())
        } else {
            Source::File(PathBuf::from(s))
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Url(url) => f.write_str(url),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] simd_json::Error),
    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("expected a FeatureCollection, found a {0}")]
    NotACollection(&'static str),
    #[error("loader stopped before producing a dataset")]
    Interrupted,
}

/// Fetch the raw payload: one GET for URLs, one read for files
pub async fn fetch(source: &Source) -> Result<Vec<u8>, LoadError> {
    match source {
        Source::Url(url) => {
            let http = |source| LoadError::Http {
                url: url.clone(),
                source,
            };
            let response = reqwest::get(url).await.map_err(http)?;
            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::Status {
                    url: url.clone(),
                    status,
                });
            }
            let body = response.bytes().await.map_err(http)?;
            Ok(body.to_vec())
        }
        Source::File(path) => tokio::fs::read(path).await.map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        }),
    }
}

/// Fetch and decode in one step
pub async fn load(source: &Source, names: &NameFields) -> Result<Dataset, LoadError> {
    info!("Fetching dataset from {}", source);
    let bytes = fetch(source).await?;
    let dataset = decode(bytes, names)?;
    info!("Loaded {} features from {}", dataset.len(), source);
    Ok(dataset)
}

/// Decode a GeoJSON FeatureCollection into a dataset
pub fn decode(mut bytes: Vec<u8>, names: &NameFields) -> Result<Dataset, LoadError> {
    let value: JsonValue = simd_json::serde::from_slice(&mut bytes)?;
    let geojson = GeoJson::from_json_value(value)?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(_) => return Err(LoadError::NotACollection("Feature")),
        GeoJson::Geometry(_) => return Err(LoadError::NotACollection("Geometry")),
    };

    let mut features = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        let props = feature.properties.as_ref();
        let name = names.resolve(props);

        let cases_by_date = props
            .map(|p| {
                p.iter()
                    .filter_map(|(key, value)| coerce_count(value).map(|n| (key.clone(), n)))
                    .collect()
            })
            .unwrap_or_default();

        let polygons = feature
            .geometry
            .map(|g| polygons_of(&g.value))
            .unwrap_or_default();

        let feature = Feature {
            name,
            cases_by_date,
            polygons,
        };
        if !feature.has_geometry() {
            warn!("Feature '{}' has no polygon geometry; it will not be drawn", feature.name);
        }
        features.push(feature);
    }

    Ok(Dataset::new(features))
}

/// Read a property value as a count: numbers and numeric strings only
pub fn coerce_count(value: &JsonValue) -> Option<Count> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|u| Count::try_from(u).unwrap_or(Count::MAX)))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as Count)),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<Count>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as Count)
            })
        }
        _ => None,
    }
}

fn polygons_of(value: &Value) -> Vec<Polygon> {
    let to_ring = |coords: &Vec<Vec<f64>>| -> Ring {
        coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| (c[0], c[1]))
            .collect()
    };

    match value {
        Value::Polygon(rings) => vec![rings.iter().map(to_ring).collect()],
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .map(|rings| rings.iter().map(to_ring).collect())
            .collect(),
        Value::GeometryCollection(geometries) => geometries
            .iter()
            .flat_map(|g| polygons_of(&g.value))
            .collect(),
        _ => Vec::new(),
    }
}
