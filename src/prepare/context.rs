//! Rich prompt-context builders: the seven-section data digest and the
//! per-shore digests fed to the LLM specialists. All times render in HST.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::types::{Metadata, SwellEvent};

/// Hawaii Standard Time: fixed UTC−10, no DST.
fn hst() -> FixedOffset {
    FixedOffset::west_opt(10 * 3600).expect("static offset")
}

/// Render a timestamp as "YYYY-MM-DD HH:MM HST".
pub fn format_hst(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.with_timezone(&hst()).format("%Y-%m-%d %H:%M HST").to_string(),
        None => "n/a".to_string(),
    }
}

/// `H1/10 ≈ 1.3 × H1/3` for mixed seas.
pub fn estimate_h10(h13: f64) -> f64 {
    if h13 <= 0.0 {
        0.0
    } else {
        (h13 * 1.3 * 10.0).round() / 10.0
    }
}

/// Goddard-Caldwell historical surf climatology lookup.
///
/// Backed by a JSON file keyed `shore → month-name → {daily, monthly_*}`.
#[derive(Debug, Clone, Default)]
pub struct ClimatologyLookup {
    data: Value,
}

impl ClimatologyLookup {
    pub fn load(path: &Path) -> Self {
        let data = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(Value::Null);
        if data.is_null() {
            warn!(path = %path.display(), "Climatology lookup unavailable");
        }
        Self { data }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null()
    }

    /// Historical H1/10 average/record for a shore on a given date:
    /// `(avg_ft, record_ft, record_year)`.
    fn daily(&self, shore: &str, date: DateTime<Utc>) -> Option<(f64, f64, String)> {
        let month_name = month_name(date.with_timezone(&hst()).month());
        let day = date.with_timezone(&hst()).day().to_string();
        let month = self.data.get(shore)?.get(month_name)?;

        let daily = month.get("daily").and_then(|d| d.get(day.as_str()));
        let avg = daily
            .and_then(|d| d.get("avg"))
            .or_else(|| month.get("monthly_average_h1_10"))
            .and_then(Value::as_f64)?;
        let max = daily
            .and_then(|d| d.get("max"))
            .or_else(|| month.get("monthly_record_h1_10"))
            .and_then(Value::as_f64)
            .unwrap_or(avg);
        let year = daily
            .and_then(|d| d.get("max_year"))
            .or_else(|| month.get("monthly_record_year"))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        Some((avg, max, year))
    }

    /// Historical context block for today's date, for the digest.
    pub fn historical_context(&self, now: DateTime<Utc>) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let local = now.with_timezone(&hst());
        let mut lines = vec![
            "HISTORICAL CONTEXT (Goddard-Caldwell Database, 1968-present):".to_string(),
            format!("Date: {}", local.format("%B %d")),
        ];

        for (shore_key, label) in [("north_shore", "NORTH SHORE"), ("south_shore", "SOUTH SHORE")] {
            if let Some((avg, max, year)) = self.daily(shore_key, now) {
                lines.push(String::new());
                lines.push(format!("{label} on {}:", local.format("%b %d")));
                lines.push(format!(
                    "  - Historical H1/10 average: {avg:.1} ft ({:.0}' peak face)",
                    avg * 2.0
                ));
                lines.push(format!(
                    "  - Largest on this date: {max:.0} ft H1/10 ({:.0}' peak face) in {year}",
                    max * 2.0
                ));
            }
        }

        (lines.len() > 2).then(|| lines.join("\n"))
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "january",
        2 => "february",
        3 => "march",
        4 => "april",
        5 => "may",
        6 => "june",
        7 => "july",
        8 => "august",
        9 => "september",
        10 => "october",
        11 => "november",
        _ => "december",
    }
}

/// Shore view consumed by the digest builders.
#[derive(Debug, Clone)]
pub struct ShoreView {
    pub name: String,
    pub shore_key: String,
    pub events: Vec<SwellEvent>,
    pub metadata: Metadata,
}

/// Build the overall data digest: quality & confidence, data gaps, swell
/// matrix, 3-day timeline, weather snapshot, tides, upper-air, climatology,
/// and tropical notes.
pub fn build_data_digest(
    metadata: &Metadata,
    confidence: Option<&Value>,
    events: &[SwellEvent],
    climatology: &ClimatologyLookup,
    now: DateTime<Utc>,
) -> String {
    let sections = [
        "=== DATA QUALITY & CONFIDENCE ===".to_string(),
        build_overview(metadata, confidence, events),
        build_data_gaps(metadata),
        String::new(),
        "=== SWELL MATRIX (HST) ===".to_string(),
        build_swell_matrix(events),
        String::new(),
        "=== 3-DAY TIMELINE ESTIMATE (HST) ===".to_string(),
        build_timeline(events),
        String::new(),
        "=== WEATHER SNAPSHOT ===".to_string(),
        build_weather_snapshot(metadata),
        String::new(),
        "=== TIDES ===".to_string(),
        build_tides(metadata),
        String::new(),
        "=== UPPER-AIR DIAGNOSTICS ===".to_string(),
        build_upper_air(metadata),
        String::new(),
        "=== CLIMATOLOGY REFERENCES ===".to_string(),
        build_climatology(metadata, climatology, now),
        String::new(),
        "=== TROPICAL & SYNOPTIC NOTES ===".to_string(),
        build_tropical(metadata),
    ];

    sections.join("\n")
}

fn build_overview(metadata: &Metadata, confidence: Option<&Value>, events: &[SwellEvent]) -> String {
    let score_line = confidence
        .and_then(|c| {
            let score = c.get("overall_score").and_then(Value::as_f64)?;
            let category = c.get("category").and_then(Value::as_str).unwrap_or("unknown");
            Some(format!("Confidence: {score:.2}/1.00 ({category})."))
        })
        .unwrap_or_else(|| "Confidence: unavailable.".to_string());

    let coverage_line = match metadata.get("agent_results").and_then(Value::as_object) {
        Some(results) if !results.is_empty() => {
            let parts: Vec<String> = results
                .iter()
                .map(|(name, stats)| {
                    let total = stats.get("total").and_then(Value::as_u64).unwrap_or(0);
                    let success = stats.get("successful").and_then(Value::as_u64).unwrap_or(0);
                    format!("{name}: {success}/{total} successful")
                })
                .collect();
            parts.join(", ")
        }
        _ => "No collector stats provided.".to_string(),
    };

    format!(
        "{score_line}\nSource coverage: {coverage_line}.\nDetected swell events: {} (pre-filtered and fused).",
        events.len()
    )
}

fn build_data_gaps(metadata: &Metadata) -> String {
    let Some(results) = metadata.get("agent_results").and_then(Value::as_object) else {
        return "Data coverage notes unavailable (collector telemetry missing).".to_string();
    };
    let missing: Vec<&String> = results
        .iter()
        .filter(|(_, stats)| stats.get("successful").and_then(Value::as_u64).unwrap_or(0) == 0)
        .map(|(name, _)| name)
        .collect();
    if missing.is_empty() {
        "All configured collectors reported successfully.".to_string()
    } else {
        let mut names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
        names.sort();
        format!("Missing feeds: {}.", names.join(", "))
    }
}

fn event_period(event: &SwellEvent) -> f64 {
    let p = event.dominant_period();
    if p > 0.0 {
        p
    } else {
        0.0
    }
}

fn exposure_summary(event: &SwellEvent) -> String {
    let mut exposures: Vec<String> = event
        .metadata
        .iter()
        .filter_map(|(key, value)| {
            let shore = key.strip_prefix("exposure_")?;
            let factor = value.as_f64()?;
            (factor > 0.0).then(|| {
                let name = shore
                    .split('_')
                    .map(|w| {
                        let mut c = w.chars();
                        c.next().map(|f| f.to_uppercase().collect::<String>() + c.as_str()).unwrap_or_default()
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{name} ({factor:.2})")
            })
        })
        .collect();
    exposures.sort();
    if exposures.is_empty() {
        "Exposure weights unavailable.".to_string()
    } else {
        format!("Exposure: {}", exposures.join(", "))
    }
}

fn build_swell_matrix(events: &[SwellEvent]) -> String {
    let mut sorted: Vec<&SwellEvent> = events.iter().collect();
    sorted.sort_by(|a, b| {
        b.hawaii_scale
            .unwrap_or(0.0)
            .partial_cmp(&a.hawaii_scale.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let rows: Vec<String> = sorted
        .iter()
        .take(12)
        .map(|event| {
            let direction = event.primary_direction_cardinal().unwrap_or("Unknown");
            let deg = event.primary_direction.unwrap_or(0.0);
            let height = event.hawaii_scale.unwrap_or(0.0);
            let h10 = estimate_h10(height);
            let period = event_period(event);
            let source = event
                .metadata
                .get("source_details")
                .and_then(|d| d.get("buoy_id"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| event.source.clone());
            format!(
                "- {direction} ({deg:.0}°) {height:.1}ft H1/3 ≈ {h10:.1}ft H1/10, period {period:.1}s. Window: {} → {}. Source: {source}. {} Significance: {:.2}.",
                format_hst(event.start_time),
                format_hst(event.peak_time),
                exposure_summary(event),
                event.significance,
            )
        })
        .collect();

    if rows.is_empty() {
        "No swell events available.".to_string()
    } else {
        rows.join("\n")
    }
}

fn build_timeline(events: &[SwellEvent]) -> String {
    let mut by_day: BTreeMap<chrono::NaiveDate, Vec<&SwellEvent>> = BTreeMap::new();
    for event in events {
        for time in [event.start_time, event.peak_time, event.end_time].into_iter().flatten() {
            let day = time.with_timezone(&hst()).date_naive();
            by_day.entry(day).or_default().push(event);
        }
    }

    if by_day.is_empty() {
        return "Timeline data unavailable; feeds lacked temporal metadata.".to_string();
    }

    by_day
        .iter()
        .take(6)
        .map(|(day, day_events)| {
            let dominant = day_events
                .iter()
                .max_by(|a, b| {
                    a.hawaii_scale
                        .unwrap_or(0.0)
                        .partial_cmp(&b.hawaii_scale.unwrap_or(0.0))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .expect("day bins are created non-empty");
            let height = dominant.hawaii_scale.unwrap_or(0.0);
            let mut line = format!(
                "{}: dominant {} {height:.1}ft H1/3 ({:.1}ft H1/10 est) @ {:.1}s.",
                day.format("%a %b %d"),
                dominant.primary_direction_cardinal().unwrap_or("Unknown"),
                estimate_h10(height),
                event_period(dominant),
            );

            let secondary: Vec<String> = day_events
                .iter()
                .filter(|e| e.event_id != dominant.event_id && e.hawaii_scale.unwrap_or(0.0) >= 1.0)
                .map(|e| {
                    format!(
                        "{} {:.1}ft @{:.0}s",
                        e.primary_direction_cardinal().unwrap_or("Unknown"),
                        e.hawaii_scale.unwrap_or(0.0),
                        event_period(e)
                    )
                })
                .collect();
            if !secondary.is_empty() {
                line.push_str(&format!(" Secondary energy: {}.", secondary.join("; ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_weather_snapshot(metadata: &Metadata) -> String {
    let Some(weather) = metadata.get("weather").and_then(Value::as_object) else {
        return "Weather data unavailable.".to_string();
    };

    let wind_dir = weather
        .get("wind_direction")
        .and_then(Value::as_f64)
        .map(|d| format!("{d:.0}"))
        .unwrap_or_else(|| "n/a".to_string());
    let wind_part = match weather.get("wind_speed_ms").and_then(Value::as_f64) {
        Some(ms) => format!("Wind {wind_dir}° at {:.1} kt", ms * 1.94384),
        None => format!("Wind direction {wind_dir}° (speed n/a)"),
    };

    let metar = weather.get("metar").and_then(Value::as_object);
    let conditions = metar
        .and_then(|m| m.get("metar"))
        .and_then(Value::as_str)
        .unwrap_or("Conditions n/a");
    let issued = metar
        .and_then(|m| m.get("issued"))
        .and_then(Value::as_str)
        .and_then(crate::types::parse_rfc3339)
        .map(|t| format_hst(Some(t)))
        .unwrap_or_else(|| "Time n/a".to_string());

    format!("{wind_part}. METAR issued {issued}: {conditions}.")
}

fn build_tides(metadata: &Metadata) -> String {
    let Some(tides) = metadata.get("tides").and_then(Value::as_object) else {
        return "Tide data unavailable.".to_string();
    };

    let render = |key: &str| -> Option<String> {
        let entries = tides.get(key)?.as_array()?;
        let parts: Vec<String> = entries
            .iter()
            .take(3)
            .filter_map(|pair| {
                let pair = pair.as_array()?;
                let time = pair.first()?.as_str()?;
                let height = pair.get(1)?.as_f64()?;
                let hst_time = crate::types::parse_rfc3339(time)
                    .map(|t| format_hst(Some(t)))
                    .unwrap_or_else(|| time.to_string());
                Some(format!("{hst_time} ({height:.2} ft)"))
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    };

    let mut lines = Vec::new();
    if let Some(highs) = render("high_tide") {
        lines.push(format!("High: {highs}"));
    }
    if let Some(lows) = render("low_tide") {
        lines.push(format!("Low: {lows}"));
    }
    if let Some(station) = tides.get("station").and_then(Value::as_str) {
        lines.push(format!("NOAA Station: {station}"));
    }
    if let Some(latest) = tides.get("latest_water_level").and_then(Value::as_object) {
        let time = latest
            .get("time")
            .and_then(Value::as_str)
            .and_then(crate::types::parse_rfc3339)
            .map(|t| format_hst(Some(t)))
            .unwrap_or_else(|| "n/a".to_string());
        let height = latest
            .get("height_ft")
            .and_then(Value::as_f64)
            .map(|h| format!("{h}"))
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!("Latest obs {time}: {height} ft"));
    }

    if lines.is_empty() {
        "Tide data unavailable.".to_string()
    } else {
        lines.join("\n")
    }
}

fn build_upper_air(metadata: &Metadata) -> String {
    match metadata.get("upper_air_summary").and_then(Value::as_array) {
        Some(lines) if !lines.is_empty() => lines
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "Upper-air analyses unavailable.".to_string(),
    }
}

fn build_climatology(
    metadata: &Metadata,
    climatology: &ClimatologyLookup,
    now: DateTime<Utc>,
) -> String {
    let mut lines = Vec::new();

    if let Some(historical) = climatology.historical_context(now) {
        lines.push(historical);
    }

    if let Some(references) = metadata.get("climatology").and_then(Value::as_array) {
        if !references.is_empty() {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push("Available climatology references:".to_string());
            for entry in references {
                let source = entry
                    .get("source_id")
                    .or_else(|| entry.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown source");
                let description = entry
                    .get("description")
                    .or_else(|| entry.get("summary"))
                    .and_then(Value::as_str)
                    .unwrap_or("reference dataset");
                let format = entry
                    .get("format")
                    .or_else(|| entry.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or("text");
                lines.push(format!("  - {source}: {description} (format: {format})."));
            }
        }
    }

    if lines.is_empty() {
        "Climatology references unavailable.".to_string()
    } else {
        lines.join("\n")
    }
}

fn build_tropical(metadata: &Metadata) -> String {
    let Some(tropical) = metadata.get("tropical").and_then(Value::as_object) else {
        return "No active tropical advisories impacting the forecast window.".to_string();
    };

    let mut lines = Vec::new();
    if let Some(headline) = tropical.get("headline").and_then(Value::as_str) {
        lines.push(headline.to_string());
    }
    if let Some(entries) = tropical.get("entries").and_then(Value::as_array) {
        for entry in entries.iter().take(2) {
            if let Some(summary) = entry.get("summary").and_then(Value::as_str) {
                let stripped = strip_html(summary);
                if !stripped.trim().is_empty() {
                    lines.push(stripped.trim().to_string());
                }
            }
        }
    }

    if lines.is_empty() {
        "No active tropical advisories impacting the forecast window.".to_string()
    } else {
        lines.join("\n")
    }
}

/// Per-shore digest: top swell drivers by Hawaiian height with windows and
/// exposure weights.
pub fn build_shore_digest(shore: &ShoreView) -> String {
    let mut events: Vec<&SwellEvent> = shore.events.iter().collect();
    events.sort_by(|a, b| {
        b.hawaii_scale
            .unwrap_or(0.0)
            .partial_cmp(&a.hawaii_scale.unwrap_or(0.0))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if events.is_empty() {
        return format!("{}: No active swell events in fused dataset.", shore.name);
    }

    let mut lines = vec![format!("{} active swell drivers:", shore.name)];
    for event in events.iter().take(6) {
        let exposure = event
            .metadata
            .get(&format!("exposure_{}", shore.shore_key))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        lines.push(format!(
            "- {} {:.1}ft (H1/3) @ {:.1}s, window {} → {}, exposure weight {exposure:.2}",
            event.primary_direction_cardinal().unwrap_or("Unknown"),
            event.hawaii_scale.unwrap_or(0.0),
            event_period(event),
            format_hst(event.start_time),
            format_hst(event.peak_time),
        ));
    }

    if let Some(quality) = shore.metadata.get("overall_quality").and_then(Value::as_f64) {
        lines.push(format!("Quality index: {quality:.2} (1.0 = premium conditions)."));
    }
    if let Some(breaks) = shore.metadata.get("popular_breaks").and_then(Value::as_array) {
        let names: Vec<&str> = breaks.iter().filter_map(Value::as_str).collect();
        if !names.is_empty() {
            lines.push(format!("Key breaks: {}", names.join(", ")));
        }
    }

    lines.join("\n")
}

fn strip_html(value: &str) -> String {
    let br = regex::Regex::new(r"<br\s*/?>").expect("static regex");
    let tags = regex::Regex::new(r"<[^>]+>").expect("static regex");
    let with_newlines = br.replace_all(value, "\n");
    tags.replace_all(&with_newlines, "").to_string()
}
