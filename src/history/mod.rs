//! Scan history management

use crate::output::ScanReport;
use crate::services::service_name;
use crate::ScanError;
use colored::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Scan history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanHistoryEntry {
    pub id: String,
    #[serde(flatten)]
    pub report: ScanReport,
}

/// History manager
pub struct HistoryManager {
    history_dir: PathBuf,
}

impl HistoryManager {
    /// History under `~/.portscout/history`
    pub fn new() -> crate::Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ScanError::HistoryError("Home directory not found".to_string()))?;

        Self::with_dir(home.join(".portscout").join("history"))
    }

    /// History under an arbitrary directory, created if missing
    pub fn with_dir(history_dir: impl Into<PathBuf>) -> crate::Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)?;
        Ok(Self { history_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.history_dir
    }

    /// Save a report and return its new id
    pub fn save(&self, report: &ScanReport) -> crate::Result<String> {
        let id = Uuid::new_v4().to_string();
        let entry = ScanHistoryEntry {
            id: id.clone(),
            report: report.clone(),
        };

        let json = serde_json::to_string_pretty(&entry)?;
        let mut file = File::create(self.entry_path(&id)?)?;
        file.write_all(json.as_bytes())?;

        log::debug!("Saved scan of {} to history as {}", report.url, id);
        Ok(id)
    }

    /// All saved scans, newest first. Unreadable files are skipped.
    pub fn list(&self) -> crate::Result<Vec<ScanHistoryEntry>> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.history_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(ScanError::from)
                .and_then(|content| Ok(serde_json::from_str::<ScanHistoryEntry>(&content)?));
            match parsed {
                Ok(scan_entry) => entries.push(scan_entry),
                Err(e) => log::warn!("Skipping unreadable history file {}: {}", path.display(), e),
            }
        }

        entries.sort_by(|a, b| b.report.timestamp.cmp(&a.report.timestamp));
        Ok(entries)
    }

    /// Get specific scan by ID
    pub fn get(&self, id: &str) -> crate::Result<ScanHistoryEntry> {
        let path = self.existing_entry_path(id)?;
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Remove a saved scan
    pub fn delete(&self, id: &str) -> crate::Result<()> {
        let path = self.existing_entry_path(id)?;
        fs::remove_file(path)?;
        log::debug!("Deleted history entry {}", id);
        Ok(())
    }

    /// Print scan history list
    pub fn print_list(&self) -> crate::Result<()> {
        let entries = self.list()?;

        if entries.is_empty() {
            println!("{}", "No scan history found.".yellow());
            return Ok(());
        }

        println!("{}", "Scan History:".bright_cyan().bold());
        println!();

        for entry in entries {
            let report = &entry.report;
            println!("{} {}", "ID:".bright_white().bold(), entry.id.bright_yellow());
            println!("  Target: {} ({})", report.url.bright_cyan(), report.ip_address);
            println!("  Time: {}", report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Scan Type: {}", report.scan_type);
            println!(
                "  Open Ports: {}",
                report.open_ports.len().to_string().bright_green()
            );
            println!("  Duration: {:.2}s", report.duration_seconds);
            println!();
        }

        Ok(())
    }

    /// Print scan details
    pub fn print_scan(&self, id: &str) -> crate::Result<()> {
        let entry = self.get(id)?;
        let report = &entry.report;

        println!("{}", "Scan Details:".bright_cyan().bold());
        println!();
        println!("{} {}", "ID:".bright_white().bold(), entry.id.bright_yellow());
        println!("{} {}", "Target:".bright_white().bold(), report.url.bright_cyan());
        println!("{} {}", "IP Address:".bright_white().bold(), report.ip_address);
        if let Some(ref info) = report.hosting_provider {
            println!(
                "{} {} ({}), {}, {}",
                "Hosting:".bright_white().bold(),
                info.org,
                info.isp,
                info.city,
                info.country
            );
        }
        println!(
            "{} {}",
            "Time:".bright_white().bold(),
            report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("{} {:.2}s", "Duration:".bright_white().bold(), report.duration_seconds);
        println!();

        if report.open_ports.is_empty() {
            println!("{}", "No open ports.".yellow());
        } else {
            println!("{}", "Open Ports:".bright_green().bold());
            for &port in &report.open_ports {
                println!("  {}/tcp - {}", port, service_name(port).bright_yellow());
            }
        }
        println!(
            "{} {}",
            "Closed/Filtered:".bright_white().bold(),
            report.closed_ports.len()
        );

        Ok(())
    }

    /// Ids are UUIDs; anything else cannot name a file we wrote.
    fn entry_path(&self, id: &str) -> crate::Result<PathBuf> {
        let id = Uuid::parse_str(id)
            .map_err(|_| ScanError::HistoryError(format!("Invalid history id '{}'", id)))?;
        Ok(self.history_dir.join(format!("{}.json", id)))
    }

    fn existing_entry_path(&self, id: &str) -> crate::Result<PathBuf> {
        let path = self.entry_path(id)?;
        if !path.is_file() {
            return Err(ScanError::HistoryError(format!(
                "No scan with id '{}' in history",
                id
            )));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::ScanResult;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn report(url: &str) -> ScanReport {
        let result = ScanResult {
            open_ports: vec![22],
            closed_ports: vec![21, 80, 443],
        };
        ScanReport::new(url, "127.0.0.1", "default", result, Duration::from_millis(300))
    }

    #[test]
    fn save_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let manager = HistoryManager::with_dir(dir.path()).unwrap();

        let original = report("localhost");
        let id = manager.save(&original).unwrap();
        assert!(Uuid::parse_str(&id).is_ok());

        let entry = manager.get(&id).unwrap();
        assert_eq!(entry.id, id);
        assert_eq!(entry.report, original);
    }

    #[test]
    fn list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let manager = HistoryManager::with_dir(dir.path()).unwrap();

        let mut older = report("older.example");
        older.timestamp = older.timestamp - ChronoDuration::hours(1);
        manager.save(&older).unwrap();
        manager.save(&report("newer.example")).unwrap();

        let urls: Vec<String> = manager.list().unwrap().into_iter().map(|e| e.report.url).collect();
        assert_eq!(urls, vec!["newer.example", "older.example"]);
    }

    #[test]
    fn list_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = HistoryManager::with_dir(dir.path()).unwrap();
        manager.save(&report("localhost")).unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();

        assert_eq!(manager.list().unwrap().len(), 1);
    }

    #[test]
    fn delete_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let manager = HistoryManager::with_dir(dir.path()).unwrap();
        let id = manager.save(&report("localhost")).unwrap();

        manager.delete(&id).unwrap();
        assert!(manager.list().unwrap().is_empty());
        assert!(matches!(manager.delete(&id), Err(ScanError::HistoryError(_))));
    }

    #[test]
    fn unknown_or_malformed_ids_are_history_errors() {
        let dir = tempfile::tempdir().unwrap();
        let manager = HistoryManager::with_dir(dir.path()).unwrap();

        let missing = Uuid::new_v4().to_string();
        assert!(matches!(manager.get(&missing), Err(ScanError::HistoryError(_))));
        assert!(matches!(manager.get("../etc/passwd"), Err(ScanError::HistoryError(_))));
    }
}
