use crate::series::DailySeries;
use serde::{Deserialize, Serialize};

/// Location identifier of the synthetic national aggregate.
pub const USA_ID: &str = "USA";

/// Width of a normalized county location code.
pub const LOCATION_CODE_WIDTH: usize = 5;

/// Granularity of a location record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    County,
    State,
    Nation,
}

/// One county, state or the national aggregate with its cumulative counts.
///
/// - `id`: 5-digit county code, state name, or [`USA_ID`]
/// - `name`: county name for counties, the state name otherwise
/// - `cumulative`: running total as of each day, contiguous from its start date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: String,
    pub name: String,
    pub state: String,
    pub population: u64,
    pub granularity: Granularity,
    pub cumulative: DailySeries,
}

impl LocationRecord {
    /// Label used in selection lists and detail headers.
    ///
    /// Counties render as "Larimer County, Colorado"; states and the nation
    /// render as their name.
    pub fn display_name(&self) -> String {
        match self.granularity {
            Granularity::County => county_display_name(&self.name, &self.state),
            Granularity::State | Granularity::Nation => self.name.clone(),
        }
    }

    /// Whether per-100k rates can be computed for this location.
    pub fn has_population(&self) -> bool {
        self.population > 0
    }
}

pub fn county_display_name(county: &str, state: &str) -> String {
    format!("{} County, {}", county, state)
}

/// Normalize a raw location code ("1001", "1001.0", "01001") to the
/// 5-character zero-padded form.
pub fn normalize_location_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let code: i64 = match trimmed.parse::<i64>() {
        Ok(code) => code,
        Err(_) => {
            let float: f64 = trimmed.parse().ok()?;
            if !float.is_finite() || float.fract() != 0.0 {
                return None;
            }
            float as i64
        }
    };
    if !(0..100_000).contains(&code) {
        return None;
    }
    Some(format!("{:0width$}", code, width = LOCATION_CODE_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_normalize_location_code() {
        assert_eq!(normalize_location_code("1001"), Some("01001".to_string()));
        assert_eq!(normalize_location_code("1001.0"), Some("01001".to_string()));
        assert_eq!(normalize_location_code(" 53033 "), Some("53033".to_string()));
        assert_eq!(normalize_location_code("01001"), Some("01001".to_string()));
        assert_eq!(normalize_location_code(""), None);
        assert_eq!(normalize_location_code("abc"), None);
        assert_eq!(normalize_location_code("1001.5"), None);
        assert_eq!(normalize_location_code("-4"), None);
        assert_eq!(normalize_location_code("100000"), None);
    }

    #[test]
    fn test_display_name() {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let county = LocationRecord {
            id: "08069".to_string(),
            name: "Larimer".to_string(),
            state: "Colorado".to_string(),
            population: 356_899,
            granularity: Granularity::County,
            cumulative: DailySeries::empty(start),
        };
        assert_eq!(county.display_name(), "Larimer County, Colorado");
        assert!(county.has_population());

        let state = LocationRecord {
            id: "Colorado".to_string(),
            name: "Colorado".to_string(),
            state: "Colorado".to_string(),
            population: 0,
            granularity: Granularity::State,
            cumulative: DailySeries::empty(start),
        };
        assert_eq!(state.display_name(), "Colorado");
        assert!(!state.has_population());
    }
}
