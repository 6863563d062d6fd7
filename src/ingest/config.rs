// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_FIELD_ALIASES_PATH: &str = "FIELD_ALIASES_PATH";

/// Ordered candidate keys for every canonical field.
///
/// Lookup takes the first key that is present with a non-null, non-blank value,
/// so order matters. Supporting a new payload shape means editing this table
/// (or an override file), not the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAliases {
    /// Keys that may wrap the item array in an object payload.
    pub containers: Vec<String>,
    pub state: Vec<String>,
    pub brand: Vec<String>,
    pub station_name: Vec<String>,
    pub address: Vec<String>,
    pub lat: Vec<String>,
    pub lng: Vec<String>,
    pub fuel_type: Vec<String>,
    pub price: Vec<String>,
    pub currency: Vec<String>,
    pub ext_station_id: Vec<String>,
    pub source_updated: Vec<String>,
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for FieldAliases {
    fn default() -> Self {
        Self {
            containers: keys(&["items", "data", "results", "prices"]),
            state: keys(&["state", "State", "region"]),
            brand: keys(&["brand", "Brand"]),
            station_name: keys(&["name", "station", "SiteName"]),
            address: keys(&["address", "Address"]),
            lat: keys(&["lat", "latitude"]),
            lng: keys(&["lng", "longitude"]),
            fuel_type: keys(&["fuel", "FuelType", "type"]),
            price: keys(&["price", "Price"]),
            currency: keys(&["currency"]),
            ext_station_id: keys(&["station_id", "id", "SiteId", "StationCode"]),
            source_updated: keys(&["last_updated", "Updated", "timestamp"]),
        }
    }
}

/// Partial table read from disk. Fields that are present replace the defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AliasOverrides {
    containers: Option<Vec<String>>,
    state: Option<Vec<String>>,
    brand: Option<Vec<String>>,
    station_name: Option<Vec<String>>,
    address: Option<Vec<String>>,
    lat: Option<Vec<String>>,
    lng: Option<Vec<String>>,
    fuel_type: Option<Vec<String>>,
    price: Option<Vec<String>>,
    currency: Option<Vec<String>>,
    ext_station_id: Option<Vec<String>>,
    source_updated: Option<Vec<String>>,
}

impl AliasOverrides {
    fn apply(self, base: FieldAliases) -> FieldAliases {
        fn pick(over: Option<Vec<String>>, default: Vec<String>) -> Vec<String> {
            match over.map(clean_list) {
                Some(v) if !v.is_empty() => v,
                _ => default,
            }
        }
        FieldAliases {
            containers: pick(self.containers, base.containers),
            state: pick(self.state, base.state),
            brand: pick(self.brand, base.brand),
            station_name: pick(self.station_name, base.station_name),
            address: pick(self.address, base.address),
            lat: pick(self.lat, base.lat),
            lng: pick(self.lng, base.lng),
            fuel_type: pick(self.fuel_type, base.fuel_type),
            price: pick(self.price, base.price),
            currency: pick(self.currency, base.currency),
            ext_station_id: pick(self.ext_station_id, base.ext_station_id),
            source_updated: pick(self.source_updated, base.source_updated),
        }
    }
}

/// Load alias overrides from an explicit path. Supports TOML or JSON formats.
pub fn load_aliases_from(path: &Path) -> Result<FieldAliases> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading field aliases from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_aliases(&content, ext.as_str())
        .with_context(|| format!("parsing field aliases in {}", path.display()))
}

/// Load aliases using env var + fallbacks:
/// 1) $FIELD_ALIASES_PATH
/// 2) config/field_aliases.toml
/// 3) config/field_aliases.json
/// 4) built-in defaults
pub fn load_aliases_default() -> Result<FieldAliases> {
    if let Ok(p) = std::env::var(ENV_FIELD_ALIASES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_aliases_from(&pb);
        } else {
            return Err(anyhow!("FIELD_ALIASES_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/field_aliases.toml");
    if toml_p.exists() {
        return load_aliases_from(&toml_p);
    }
    let json_p = PathBuf::from("config/field_aliases.json");
    if json_p.exists() {
        return load_aliases_from(&json_p);
    }
    Ok(FieldAliases::default())
}

fn parse_aliases(s: &str, hint_ext: &str) -> Result<FieldAliases> {
    let overrides: AliasOverrides = match hint_ext {
        "toml" => toml::from_str(s)?,
        "json" => serde_json::from_str(s)?,
        // No usable extension: JSON objects start with '{', everything else is tried as TOML.
        _ if s.trim_start().starts_with('{') => serde_json::from_str(s)?,
        _ => toml::from_str(s)?,
    };
    Ok(overrides.apply(FieldAliases::default()))
}

/// Trim, drop blanks and duplicates. Keeps first-seen order since lookup is ordered.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if !t.is_empty() && !out.iter().any(|o| o == t) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_listed_fields() {
        let toml = r#"
state = [" territory ", "", "state", "state"]
"#;
        let a = parse_aliases(toml, "toml").unwrap();
        assert_eq!(a.state, vec!["territory".to_string(), "state".to_string()]);
        assert_eq!(a.price, FieldAliases::default().price);
    }

    #[test]
    fn json_without_extension_is_detected() {
        let json = r#"{"price": ["cost", "Price"]}"#;
        let a = parse_aliases(json, "").unwrap();
        assert_eq!(a.price, vec!["cost".to_string(), "Price".to_string()]);
    }

    #[test]
    fn blank_override_keeps_defaults() {
        let a = parse_aliases(r#"brand = ["  ", ""]"#, "toml").unwrap();
        assert_eq!(a.brand, FieldAliases::default().brand);
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(parse_aliases(r#"colour = ["red"]"#, "toml").is_err());
    }
}
