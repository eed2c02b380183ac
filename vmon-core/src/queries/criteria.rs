//! Query parameter parsing and distributed switch port criteria validation.

use crate::error::CheckError;
use crate::types::ApiVersion;
use serde::{Deserialize, Serialize};

/// One `name:value` pair of a custom query key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
    pub name: String,
    pub value: String,
}

impl QueryParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Split a query key into `name:value` pairs.
///
/// Pairs are comma separated; the value is everything after the first colon
/// and may be empty. An empty key yields no pairs. A pair with an empty name,
/// no colon, or an empty segment between commas rejects the whole key. A
/// single trailing comma is tolerated.
pub fn parse_params(key: &str) -> Result<Vec<QueryParam>, CheckError> {
    if key.is_empty() {
        return Ok(Vec::new());
    }

    let body = key.strip_suffix(',').unwrap_or(key);
    body.split(',')
        .map(|pair| match pair.split_once(':') {
            Some((name, value)) if !name.is_empty() => Ok(QueryParam::new(name, value)),
            _ => Err(CheckError::InvalidPortCriteria),
        })
        .collect()
}

const BOOLEAN_CRITERIA: &[&str] = &["active", "connected", "inside", "nsxPort", "uplinkPort"];
const STRING_CRITERIA: &[&str] = &["host", "portgroupKey", "portKey"];

/// Lowest API version accepting a criterion, if it is gated.
fn minimum_version(name: &str) -> Option<u32> {
    match name {
        "host" => Some(65),
        "nsxPort" => Some(70),
        _ => None,
    }
}

/// Validate port criteria for a distributed switch port query.
///
/// Every name must be known, boolean criteria must be `true` or `false`, and
/// version-gated criteria require a recent enough endpoint.
pub fn validate_port_criteria(params: &[QueryParam], version: ApiVersion) -> Result<(), CheckError> {
    for param in params {
        let name = param.name.as_str();
        if BOOLEAN_CRITERIA.contains(&name) {
            if param.value != "true" && param.value != "false" {
                return Err(CheckError::InvalidPortCriteria);
            }
        } else if !STRING_CRITERIA.contains(&name) {
            return Err(CheckError::InvalidPortCriteria);
        }

        if minimum_version(name).is_some_and(|min| version.as_number() < min) {
            return Err(CheckError::InvalidPortCriteria);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const V70: ApiVersion = ApiVersion { major: 7, minor: 0 };
    const V60: ApiVersion = ApiVersion { major: 6, minor: 0 };

    #[test]
    fn test_parse_two_pairs() {
        let params = parse_params("host:esx1,active:true").unwrap();
        assert_eq!(params, vec![QueryParam::new("host", "esx1"), QueryParam::new("active", "true")]);
    }

    #[test]
    fn test_parse_edge_cases() {
        assert_eq!(parse_params("").unwrap(), Vec::new());
        assert_eq!(parse_params("portKey:").unwrap(), vec![QueryParam::new("portKey", "")]);
        assert_eq!(parse_params("portKey:a:b").unwrap(), vec![QueryParam::new("portKey", "a:b")]);
        assert_eq!(parse_params("active:true,").unwrap().len(), 1);

        for bad in [":true", "active", ",active:true", "active:true,,inside:false", ","] {
            assert_eq!(parse_params(bad), Err(CheckError::InvalidPortCriteria), "key {bad:?}");
        }
    }

    #[test]
    fn test_boolean_values_are_checked() {
        let ok = parse_params("active:true,uplinkPort:false").unwrap();
        assert_eq!(validate_port_criteria(&ok, V70), Ok(()));

        let bad = parse_params("active:maybe").unwrap();
        assert_eq!(validate_port_criteria(&bad, V70), Err(CheckError::InvalidPortCriteria));
    }

    #[test]
    fn test_unknown_names_rejected() {
        let params = parse_params("vlan:12").unwrap();
        assert_eq!(validate_port_criteria(&params, V70), Err(CheckError::InvalidPortCriteria));
    }

    #[test]
    fn test_version_gates() {
        let host = parse_params("host:esx1").unwrap();
        assert_eq!(validate_port_criteria(&host, V60), Err(CheckError::InvalidPortCriteria));
        assert_eq!(validate_port_criteria(&host, ApiVersion::new(6, 5)), Ok(()));

        let nsx = parse_params("nsxPort:true").unwrap();
        assert_eq!(validate_port_criteria(&nsx, ApiVersion::new(6, 7)), Err(CheckError::InvalidPortCriteria));
        assert_eq!(validate_port_criteria(&nsx, V70), Ok(()));
    }
}
