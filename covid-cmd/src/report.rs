//! Read-only views over persisted artifacts.

use crate::config::StoreArgs;
use chrono::Utc;
use covid_data::detail::{trend_direction, DetailRow, LocationDetail};
use covid_data::snapshot::FreshDataSnapshot;
use covid_data::summary::{custom_number_str, MapSummaryRow};
use covid_db::artifacts::{load_snapshot, load_table, COUNTY_MAP, STATE_MAP};
use covid_jhu::location::{county_display_name, normalize_location_code, USA_ID};
use covid_jhu::series::DailySeries;
use covid_utils::dates::format_date;
use std::cmp::Ordering;

fn or_na(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), custom_number_str)
}

fn row_title(row: &MapSummaryRow, states: bool) -> String {
    if states {
        row.name.clone()
    } else {
        county_display_name(&row.name, &row.state)
    }
}

/// Rows with a value for the chosen metric, highest first. The national
/// row is never ranked.
pub fn ranked_rows(rows: &[MapSummaryRow], limit: usize, by_rate: bool) -> Vec<&MapSummaryRow> {
    let metric = |row: &MapSummaryRow| {
        if by_rate {
            row.average_rate
        } else {
            row.week_average
        }
    };
    let mut ranked: Vec<&MapSummaryRow> = rows
        .iter()
        .filter(|row| row.location_id != USA_ID && metric(row).is_some())
        .collect();
    ranked.sort_by(|a, b| {
        metric(b)
            .partial_cmp(&metric(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.location_id.cmp(&b.location_id))
    });
    ranked.truncate(limit);
    ranked
}

pub fn summary_lines(rows: &[MapSummaryRow], states: bool, limit: usize, by_rate: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<40}{:>16}{:>12}",
        if states { "State" } else { "County" },
        "Avg. Daily Cases",
        "Per 100k"
    )];
    for row in ranked_rows(rows, limit, by_rate) {
        lines.push(format!(
            "{:<40}{:>16}{:>12}",
            row_title(row, states),
            or_na(row.week_average),
            or_na(row.average_rate)
        ));
    }
    lines
}

pub async fn run_summary(store: StoreArgs, states: bool, limit: usize, by_rate: bool) -> anyhow::Result<()> {
    let rows = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<MapSummaryRow>> {
        let artifacts = store.artifact_store()?;
        let name = if states { STATE_MAP } else { COUNTY_MAP };
        Ok(load_table(artifacts.as_ref(), name)?)
    })
    .await??;
    for line in summary_lines(&rows, states, limit, by_rate) {
        println!("{}", line);
    }
    Ok(())
}

struct ResolvedLocation<'a> {
    title: String,
    series: &'a DailySeries,
    detail: LocationDetail,
}

/// A county code ("8069" or "08069") first, then a state name or USA.
fn resolve<'a>(snapshot: &'a FreshDataSnapshot, id: &str) -> Option<ResolvedLocation<'a>> {
    if let Some(code) = normalize_location_code(id) {
        if let (Some(series), Some(detail)) =
            (snapshot.county_new_cases.get(&code), snapshot.county_detail(&code))
        {
            let title = snapshot.county_name(&code).unwrap_or(code);
            return Some(ResolvedLocation {
                title,
                series,
                detail,
            });
        }
    }
    Some(ResolvedLocation {
        title: id.to_string(),
        series: snapshot.state_new_cases.get(id)?,
        detail: snapshot.state_detail(id)?,
    })
}

fn detail_line(row: &DetailRow) -> String {
    format!(
        "{:<12}{:>10}{:>12}{:>12}{:>16}",
        format_date(&row.date),
        custom_number_str(row.cases),
        custom_number_str(row.cases_ave),
        or_na(row.cases_rate),
        or_na(row.cases_rate_ave)
    )
}

/// Trend and the last `days` detail rows of a location.
pub fn location_lines(snapshot: &FreshDataSnapshot, id: &str, days: usize) -> anyhow::Result<Vec<String>> {
    let Some(location) = resolve(snapshot, id) else {
        anyhow::bail!("Unknown location '{}'", id);
    };
    let mut lines = vec![location.title.clone()];
    let rows = match &location.detail {
        LocationDetail::NoRecordedCases => {
            lines.push(format!("No recorded positive cases in {}", location.title));
            return Ok(lines);
        }
        LocationDetail::Reported(rows) => rows,
    };

    if let Some(trend) = snapshot.trend(id).or_else(|| {
        normalize_location_code(id).and_then(|code| snapshot.trend(&code))
    }) {
        for (heading, value) in trend.table() {
            lines.push(format!("{}: {}", heading, value));
        }
    }
    if let Some(direction) = trend_direction(location.series) {
        lines.push(format!("Week over week: {}", direction));
    }

    lines.push(format!(
        "{:<12}{:>10}{:>12}{:>12}{:>16}",
        "Date", "Cases", "7-Day Avg", "Per 100k", "Avg. Per 100k"
    ));
    let skip = rows.len().saturating_sub(days);
    lines.extend(rows[skip..].iter().map(detail_line));
    Ok(lines)
}

pub async fn run_location(store: StoreArgs, id: String, days: usize) -> anyhow::Result<()> {
    let lines = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<String>> {
        let artifacts = store.artifact_store()?;
        let snapshot = load_snapshot(artifacts.as_ref(), Utc::now())?;
        location_lines(&snapshot, &id, days)
    })
    .await??;
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::tests::{CASES_CSV, DEATHS_CSV};
    use covid_data::pipeline::{run_pipeline, PipelineOptions};
    use covid_jhu::source::StaticSource;

    fn snapshot() -> FreshDataSnapshot {
        let source = StaticSource::new(CASES_CSV, DEATHS_CSV);
        run_pipeline(&source, &PipelineOptions::default(), Utc::now()).unwrap()
    }

    #[test]
    fn counties_ranked_by_average() {
        let snapshot = snapshot();
        let ranked = ranked_rows(&snapshot.county_map, 10, false);
        let ids: Vec<&str> = ranked.iter().map(|row| row.location_id.as_str()).collect();
        // Adams never had a case and is left out
        assert_eq!(ids, vec!["08069", "01001"]);
    }

    #[test]
    fn counties_ranked_by_rate() {
        let snapshot = snapshot();
        let ranked = ranked_rows(&snapshot.county_map, 1, true);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].location_id, "01001");
    }

    #[test]
    fn state_summary_skips_usa() {
        let snapshot = snapshot();
        let lines = summary_lines(&snapshot.state_map, true, 10, false);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Colorado"));
        assert!(lines[2].starts_with("Alabama"));
        assert!(lines.iter().all(|line| !line.starts_with(USA_ID)));
    }

    #[test]
    fn county_summary_formats_values() {
        let snapshot = snapshot();
        let lines = summary_lines(&snapshot.county_map, false, 10, false);
        assert!(lines[1].starts_with("Larimer County, Colorado"));
        assert!(lines[1].trim_end().ends_with("10"));
        assert!(lines[2].starts_with("Autauga County, Alabama"));
        assert!(lines[2].contains("1.0"));
    }

    #[test]
    fn location_lines_for_county_code() {
        let snapshot = snapshot();
        let lines = location_lines(&snapshot, "8069", 3).unwrap();
        assert_eq!(lines[0], "Larimer County, Colorado");
        // Title, header, then the last three days
        assert_eq!(lines.len(), 5);
        assert!(lines[4].starts_with("2020-03-09"));
    }

    #[test]
    fn location_lines_for_state_and_usa() {
        let snapshot = snapshot();
        assert_eq!(location_lines(&snapshot, "Colorado", 1).unwrap()[0], "Colorado");
        let usa = location_lines(&snapshot, USA_ID, 14).unwrap();
        assert_eq!(usa[0], USA_ID);
        // 9 days of new cases leave 3 days with a full weekly average
        assert_eq!(usa.len(), 5);
    }

    #[test]
    fn location_without_cases() {
        let snapshot = snapshot();
        let lines = location_lines(&snapshot, "08001", 14).unwrap();
        assert_eq!(
            lines,
            vec![
                "Adams County, Colorado".to_string(),
                "No recorded positive cases in Adams County, Colorado".to_string()
            ]
        );
    }

    #[test]
    fn unknown_location_is_an_error() {
        let snapshot = snapshot();
        assert!(location_lines(&snapshot, "99999", 14).is_err());
        assert!(location_lines(&snapshot, "Atlantis", 14).is_err());
    }
}
