//! Output formatting and management

pub mod progress;

use crate::network::provider::HostingInfo;
use crate::scanner::{PortState, ScanResult};
use crate::services::service_name;
use crate::ScanError;
use chrono::{DateTime, Utc};
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const RULE_WIDTH: usize = 50;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    /// Machine formats must not be interleaved with progress output.
    pub fn is_machine_readable(&self) -> bool {
        !matches!(self, OutputFormat::Text)
    }
}

impl FromStr for OutputFormat {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(ScanError::OutputError(format!("Unknown output format '{}'", other))),
        }
    }
}

/// Everything known about one finished scan, ready to render or store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Target exactly as the user supplied it
    pub url: String,
    pub ip_address: String,
    pub hosting_provider: Option<HostingInfo>,
    /// `default`, `important` or `custom`
    pub scan_type: String,
    pub open_ports: Vec<u16>,
    pub closed_ports: Vec<u16>,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl ScanReport {
    pub fn new(
        url: impl Into<String>,
        ip_address: impl Into<String>,
        scan_type: impl Into<String>,
        result: ScanResult,
        duration: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            ip_address: ip_address.into(),
            hosting_provider: None,
            scan_type: scan_type.into(),
            open_ports: result.open_ports,
            closed_ports: result.closed_ports,
            duration_seconds: duration.as_secs_f64(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_hosting(mut self, info: HostingInfo) -> Self {
        self.hosting_provider = Some(info);
        self
    }

    /// Ports in display order: open first, then closed.
    pub fn rows(&self) -> impl Iterator<Item = (u16, PortState)> + '_ {
        self.open_ports
            .iter()
            .map(|&p| (p, PortState::Open))
            .chain(self.closed_ports.iter().map(|&p| (p, PortState::Closed)))
    }
}

/// Render `report` in the requested format.
pub fn render(report: &ScanReport, format: OutputFormat) -> crate::Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report, true)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Csv => render_csv(report),
    }
}

/// Render and either print to stdout or write to `path`.
pub fn emit(report: &ScanReport, format: OutputFormat, path: Option<&Path>) -> crate::Result<()> {
    match path {
        Some(path) => {
            // Files never carry terminal escapes.
            let rendered = match format {
                OutputFormat::Text => render_text(report, false),
                _ => render(report, format)?,
            };
            fs::write(path, rendered)?;
            log::info!("Results written to {}", path.display());
        }
        None => println!("{}", render(report, format)?),
    }

    Ok(())
}

fn render_text(report: &ScanReport, color: bool) -> String {
    let paint = |text: String, style: fn(ColoredString) -> ColoredString| {
        if color {
            style(text.normal()).to_string()
        } else {
            text
        }
    };

    let mut out = String::new();
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    out.push_str(&format!("{}\n", heavy));
    out.push_str(&format!("Target: {}\n", paint(report.url.clone(), |s| s.bright_cyan())));
    out.push_str(&format!(
        "IP Address Resolved: {}\n",
        paint(report.ip_address.clone(), |s| s.bright_cyan())
    ));
    if let Some(ref info) = report.hosting_provider {
        out.push_str(&format!(
            "Hosting Provider: {} ({}), {}, {}\n",
            info.org, info.isp, info.city, info.country
        ));
    }
    out.push_str(&format!("{}\n\n", heavy));

    out.push_str("Scan Results:\n");
    out.push_str(&format!("{}\n", light));
    for (port, state) in report.rows() {
        let label = format!("{:<8}", state.to_string().to_uppercase());
        let label = match state {
            PortState::Open => paint(label, |s| s.bright_green().bold()),
            PortState::Closed => paint(label, |s| s.bright_red()),
        };
        out.push_str(&format!(
            "Port {:<5} | {} | ({})\n",
            port,
            label,
            service_name(port)
        ));
    }
    out.push_str(&format!("{}\n\n", light));

    out.push_str("Scan Complete.\n");
    out.push_str(&format!(
        "Summary: {} open, {} closed/filtered in {:.2}s",
        paint(report.open_ports.len().to_string(), |s| s.bright_green()),
        paint(report.closed_ports.len().to_string(), |s| s.bright_red()),
        report.duration_seconds
    ));

    out
}

fn render_csv(report: &ScanReport) -> crate::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| ScanError::OutputError(e.to_string());

    writer.write_record(["port", "state", "service"]).map_err(csv_err)?;
    for (port, state) in report.rows() {
        writer
            .write_record([port.to_string(), state.to_string(), service_name(port).to_string()])
            .map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ScanError::OutputError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ScanError::OutputError(e.to_string()))
}
