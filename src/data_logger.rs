use crate::settings::Settings;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{error, info};
use serde_json::json;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes one session directory per run:
///
/// - `manifest.json` — settings and source description
/// - `ticks.jsonl`   — one `TickReport` per line
/// - `stats.json`    — totals written when the report channel closes
pub struct DataLogger {
    rx: Receiver<TickReport>,
    session_dir: PathBuf,
    settings: Settings,
    source: String,
}

impl DataLogger {
    pub fn new(
        rx: Receiver<TickReport>,
        output_dir: &Path,
        settings: Settings,
        source: String,
    ) -> Result<Self, String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let session_dir = output_dir.join(format!("session_{}", timestamp));
        fs::create_dir_all(&session_dir)
            .map_err(|e| format!("create session dir {:?}: {}", session_dir, e))?;

        Ok(Self {
            rx,
            session_dir,
            settings,
            source,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Run the logger. Blocks until every report sender is dropped.
    pub fn run(&self) -> Result<(), String> {
        info!("Data logger → {:?}", self.session_dir);

        self.write_manifest()?;

        let ticks_path = self.session_dir.join("ticks.jsonl");
        let ticks_file =
            File::create(&ticks_path).map_err(|e| format!("create {:?}: {}", ticks_path, e))?;
        let mut writer = BufWriter::new(ticks_file);

        let mut tick_count: u64 = 0;
        let mut pitched_count: u64 = 0;
        let mut last: Option<TickReport> = None;

        for report in self.rx.iter() {
            match serde_json::to_string(&report) {
                Ok(line) => {
                    let _ = writeln!(writer, "{}", line);
                }
                Err(e) => error!("Failed to serialize tick: {}", e),
            }
            tick_count += 1;
            if report.note.is_some() {
                pitched_count += 1;
            }
            if tick_count % 1000 == 0 {
                let _ = writer.flush();
                info!("Logged {} ticks ({} pitched)", tick_count, pitched_count);
            }
            last = Some(report);
        }

        writer
            .flush()
            .map_err(|e| format!("flush {:?}: {}", ticks_path, e))?;

        let stats = json!({
            "total_ticks": tick_count,
            "pitched_ticks": pitched_count,
            "final_dominant_key": last.as_ref().map(|r| r.dominant_key.to_string()),
            "final_window": last.as_ref().map(|r| r.history.len()).unwrap_or(0),
        });
        let stats_path = self.session_dir.join("stats.json");
        let pretty = serde_json::to_string_pretty(&stats).map_err(|e| e.to_string())?;
        fs::write(&stats_path, pretty).map_err(|e| format!("write {:?}: {}", stats_path, e))?;

        info!(
            "Session saved: {} ticks, {} pitched → {:?}",
            tick_count, pitched_count, self.session_dir
        );
        Ok(())
    }

    fn write_manifest(&self) -> Result<(), String> {
        let manifest = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "system": "key-listener",
            "source": self.source,
            "settings": self.settings,
            "keys": KeyCandidate::all().map(|k| k.to_string()).collect::<Vec<_>>(),
        });

        let path = self.session_dir.join("manifest.json");
        let pretty = serde_json::to_string_pretty(&manifest).map_err(|e| e.to_string())?;
        fs::write(&path, pretty).map_err(|e| format!("write {:?}: {}", path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(t: u64, note: Option<PitchClass>) -> TickReport {
        TickReport {
            timestamp_ms: t,
            frequency_hz: note.map(|_| 440.0),
            note,
            history: note.into_iter().collect(),
            key: note.map(|_| KeyCandidate::C_MAJOR),
            key_percentages: vec![0.0; KEY_COUNT],
            dominant_key: KeyCandidate::C_MAJOR,
        }
    }

    #[test]
    fn test_session_files() {
        let out = std::env::temp_dir().join(format!("key_listener_log_{}", std::process::id()));
        let (tx, rx) = crossbeam_channel::bounded(16);
        let logger = DataLogger::new(rx, &out, Settings::default(), "test".into()).unwrap();
        tx.send(report(0, Some(PitchClass::A))).unwrap();
        tx.send(report(16, None)).unwrap();
        drop(tx);
        logger.run().unwrap();

        let dir = logger.session_dir().to_path_buf();
        let ticks = fs::read_to_string(dir.join("ticks.jsonl")).unwrap();
        let lines: Vec<&str> = ticks.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: TickReport = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.note, Some(PitchClass::A));

        let stats: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("stats.json")).unwrap()).unwrap();
        assert_eq!(stats["total_ticks"], 2);
        assert_eq!(stats["pitched_ticks"], 1);

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("manifest.json")).unwrap()).unwrap();
        assert_eq!(manifest["settings"]["window_ms"], 8000);
        assert_eq!(manifest["keys"][1], "C minor");

        let _ = fs::remove_dir_all(&out);
    }
}
