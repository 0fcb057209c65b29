//! Renderers for command results.
//!
//! Every renderer returns the text to print so it can be checked without
//! capturing stdout.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::Local;
use clap::ValueEnum;
use serde::Serialize;

use grabbit_core::{
    AddedTorrent, BuildInfo, GrabOutcome, PurgeReport, SearchPlugin, SearchResultRecord,
    TorrentInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to format JSON")
}

pub fn render_search(results: &[SearchResultRecord], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(results);
    }

    let mut out = String::new();
    writeln!(out, "{:>6} {:>6} {:>10}  NAME", "SEEDS", "LEECH", "SIZE")?;
    for hit in results {
        writeln!(
            out,
            "{:>6} {:>6} {:>10}  {}",
            count(hit.seeders),
            count(hit.leechers),
            hit.size_bytes.map(format_size).unwrap_or_else(|| "-".into()),
            hit.name
        )?;
    }
    write!(out, "{} result(s)", results.len())?;
    Ok(out)
}

pub fn render_grab(outcome: &GrabOutcome, format: OutputFormat) -> Result<String> {
    match (format, outcome) {
        (OutputFormat::Json, _) => to_json(outcome),
        (OutputFormat::Table, GrabOutcome::Added { hit, torrent }) => {
            let mut out = format!("added: {}", hit.name);
            if let Some(hash) = &torrent.hash {
                write!(out, "\nhash: {}", hash)?;
            }
            Ok(out)
        }
        (OutputFormat::Table, GrabOutcome::NoResults { pattern }) => {
            Ok(format!("no results for '{}'", pattern))
        }
    }
}

pub fn render_plugins(plugins: &[SearchPlugin], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(plugins);
    }

    let mut out = String::new();
    writeln!(out, "{:<24} {:<8} {:<10} URL", "NAME", "ENABLED", "VERSION")?;
    for plugin in plugins {
        writeln!(
            out,
            "{:<24} {:<8} {:<10} {}",
            plugin.name,
            if plugin.enabled { "yes" } else { "no" },
            plugin.version,
            plugin.url
        )?;
    }
    write!(out, "{} plugin(s)", plugins.len())?;
    Ok(out)
}

pub fn render_added(torrent: &AddedTorrent, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(torrent);
    }

    let mut out = format!("added: {}", torrent.source);
    if let Some(hash) = &torrent.hash {
        write!(out, "\nhash: {}", hash)?;
    }
    Ok(out)
}

pub fn render_torrents(torrents: &[TorrentInfo], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(torrents);
    }

    let mut out = String::new();
    writeln!(
        out,
        "{:<40} {:<12} {:>7} {:>10} {:<16} NAME",
        "HASH", "STATE", "PROG", "SIZE", "COMPLETED"
    )?;
    for torrent in torrents {
        writeln!(
            out,
            "{:<40} {:<12} {:>7} {:>10} {:<16} {}",
            torrent.hash,
            torrent.state.as_str(),
            format!("{:.1}%", torrent.progress * 100.0),
            format_size(torrent.size_bytes),
            completed(torrent),
            torrent.name
        )?;
    }
    write!(out, "{} torrent(s)", torrents.len())?;
    Ok(out)
}

pub fn render_purge(report: &PurgeReport, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(report);
    }

    let verb = if report.dry_run { "would remove" } else { "removed" };
    let mut out = format!(
        "cutoff: {} ({} day(s))\n{} {} torrent(s)",
        report.cutoff.format("%Y-%m-%d %H:%M"),
        report.retention_days,
        verb,
        report.torrents.len()
    );
    for torrent in &report.torrents {
        write!(out, "\n  {}  {}  {}", torrent.hash, completed(torrent), torrent.name)?;
    }
    Ok(out)
}

pub fn render_build_info(
    cli_version: &str,
    build: &BuildInfo,
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(&serde_json::json!({
            "version": cli_version,
            "qbittorrent": build,
        }));
    }

    let mut out = format!(
        "grabbit {}\nqBittorrent {} (WebUI API {})",
        cli_version, build.app_version, build.web_api_version
    );
    for (name, version) in &build.details {
        write!(out, "\n  {}: {}", name, version)?;
    }
    Ok(out)
}

fn count(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn completed(torrent: &TorrentInfo) -> String {
    torrent
        .completed_at()
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".into())
}

/// Human readable size with binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grabbit_core::testing::fixtures;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2.0 GiB");
    }

    #[test]
    fn test_search_table_keeps_client_order() {
        let results = vec![
            fixtures::search_hit("Heat (1995) [1080p]", "aaa"),
            fixtures::search_hit("Heat (1995) [720p]", "bbb"),
        ];
        let text = render_search(&results, OutputFormat::Table).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].contains("SEEDS"));
        assert!(lines[1].ends_with("Heat (1995) [1080p]"));
        assert!(lines[1].contains("2.0 GiB"));
        assert!(lines[2].ends_with("Heat (1995) [720p]"));
        assert_eq!(lines[3], "2 result(s)");
    }

    #[test]
    fn test_search_json_is_an_array() {
        let results = vec![fixtures::search_hit("Heat", "aaa")];
        let text = render_search(&results, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["download_url"], "magnet:?xt=urn:btih:aaa");
    }

    #[test]
    fn test_grab_no_results_table() {
        let outcome = GrabOutcome::NoResults {
            pattern: "nothing".into(),
        };
        assert_eq!(
            render_grab(&outcome, OutputFormat::Table).unwrap(),
            "no results for 'nothing'"
        );
        let json: serde_json::Value =
            serde_json::from_str(&render_grab(&outcome, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["outcome"], "no_results");
    }

    #[test]
    fn test_torrents_table_marks_never_completed() {
        let torrents = vec![fixtures::torrent("ccc", "C", 0)];
        let text = render_torrents(&torrents, OutputFormat::Table).unwrap();
        assert!(text.lines().nth(1).unwrap().contains("never"));
        assert!(text.contains("40.0%"));
    }

    #[test]
    fn test_plugins_table() {
        let plugins = vec![fixtures::plugin("yts_mx", true), fixtures::plugin("eztv", false)];
        let text = render_plugins(&plugins, OutputFormat::Table).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("yts_mx"));
        assert!(text.lines().nth(2).unwrap().contains(" no "));
        assert!(text.ends_with("2 plugin(s)"));
    }
}
