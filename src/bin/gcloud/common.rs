//! # Shared command plumbing
//!
//! The per-invocation [`Ctx`], table and JSON rendering, confirmation
//! prompts, and small parsing helpers the command modules share.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use clap::ValueEnum;
use itertools::Itertools;
use serde::Serialize;

use gcloud::config::{ConfigStore, Property};
use gcloud::resource::{Fallthrough, ReleaseTrack, resolve_project};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables and messages.
    Default,
    /// The decoded API responses, pretty-printed.
    Json,
}

/// Everything global flags and the release track decide, passed to every
/// command.
pub struct Ctx {
    pub track: ReleaseTrack,
    pub store: ConfigStore,
    pub project: Option<String>,
    pub format: OutputFormat,
    pub quiet: bool,
    pub timeout: Duration,
}

impl Ctx {
    /// The project for this invocation (`--project` flag, then
    /// `core/project`).
    pub fn project(&self) -> Result<String> {
        Ok(resolve_project(&self.store, self.project.as_deref())?)
    }

    pub fn json_output(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Fallthrough list for the `project` attribute of resource parsers.
    pub fn project_sources(&self) -> Vec<Fallthrough<'_>> {
        vec![
            Fallthrough::Flag(self.project.as_deref(), "--project"),
            Fallthrough::Property(&self.store, "core/project"),
        ]
    }

    fn prompts_disabled(&self) -> Result<bool> {
        if self.quiet {
            return Ok(true);
        }
        let disabled = self
            .store
            .get(&Property::parse("disable_prompts")?)?
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"));
        Ok(disabled)
    }

    /// Prints `message` and asks for confirmation. `--quiet` and
    /// `core/disable_prompts` answer yes; declining (or EOF) aborts.
    pub fn confirm(&self, message: &str) -> Result<()> {
        if self.prompts_disabled()? {
            return Ok(());
        }
        // Prompts share stderr with status messages; stdout stays data-only.
        eprint!("{message}\n\nDo you want to continue (Y/n)?  ");
        std::io::stderr().flush()?;
        let mut line = String::new();
        let read = std::io::stdin().read_line(&mut line)?;
        let answer = line.trim();
        if read > 0
            && (answer.is_empty()
                || answer.eq_ignore_ascii_case("y")
                || answer.eq_ignore_ascii_case("yes"))
        {
            Ok(())
        } else {
            bail!("Aborted by user.")
        }
    }
}

/// Renders a fixed-width table: auto-sized columns, two-space gutters, a
/// dashed rule under the header.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let mut out = String::new();
    for (i, h) in headers.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(&format!("{:width$}", h, width = widths[i]));
    }
    out.push('\n');

    for (i, w) in widths.iter().enumerate() {
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(&"-".repeat(*w));
    }
    out.push('\n');

    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            if i > 0 {
                out.push_str("  ");
            }
            out.push_str(&format!("{:width$}", cell, width = widths[i]));
        }
        out.push('\n');
    }
    out
}

pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Pretty-prints a decoded response. Key order is whatever the server
/// sent.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends a rough "time ago" to an RFC 3339 timestamp, for table columns
/// where the relative age matters more than the instant. Unparseable
/// values pass through unchanged.
pub fn enrich_datetime(value: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        let ago = HumanTime::from(Utc::now().naive_utc() - parsed.naive_utc()).to_text_en(
            chrono_humanize::Accuracy::Rough,
            chrono_humanize::Tense::Past,
        );
        format!("{value} ({ago})")
    } else {
        value.to_string()
    }
}

/// Parses one `KEY=VALUE` item.
pub fn parse_kv(item: &str) -> Result<(String, String)> {
    match item.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("Invalid value [{item}]; expected KEY=VALUE"),
    }
}

/// Parses the `--labels` form, `k1=v1,k2=v2`.
pub fn parse_kv_map(spec: &str) -> Result<HashMap<String, String>> {
    spec.split(',').filter(|s| !s.is_empty()).map(parse_kv).collect()
}

/// Renders a label map as a stable `k=v,k2=v2` cell.
pub fn format_labels(labels: &HashMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .sorted()
        .join(",")
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_sizes_columns_to_content() {
        let out = render_table(
            &["NAME", "STATUS"],
            &[
                vec!["vm".to_string(), "RUNNING".to_string()],
                vec!["a-much-longer-name".to_string(), "STOPPED".to_string()],
            ],
        );
        assert_eq!(
            out,
            "NAME                STATUS \n\
             ------------------  -------\n\
             vm                  RUNNING\n\
             a-much-longer-name  STOPPED\n"
        );
    }

    #[test]
    fn kv_parsing() {
        assert_eq!(
            parse_kv("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        // values may contain '='
        assert_eq!(
            parse_kv("expr=a=b").unwrap(),
            ("expr".to_string(), "a=b".to_string())
        );
        assert!(parse_kv("no-separator").is_err());
        assert!(parse_kv("=value").is_err());

        let map = parse_kv_map("env=prod,team=infra").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["team"], "infra");
        assert_eq!(format_labels(&map), "env=prod,team=infra");
    }

    #[test]
    fn enrich_leaves_unparseable_values_alone() {
        assert_eq!(enrich_datetime("not-a-date"), "not-a-date");
        let enriched = enrich_datetime("2020-01-01T00:00:00Z");
        assert!(enriched.starts_with("2020-01-01T00:00:00Z ("), "{enriched}");
        assert!(enriched.ends_with(" ago)"), "{enriched}");
    }
}
