use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::CatalogEntry;
use crate::domain::Kingdom;
use crate::error::AtlasError;
use crate::inaturalist::{TaxonClient, image_file_name, select_taxon};
use crate::ledger::Ledger;

#[derive(Debug, Clone)]
pub struct EnrichOptions {
    pub image_dir: Utf8PathBuf,
    /// Sleep after every organism that reached the network.
    pub pause: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Saved { file_name: String },
    Skipped { file_name: String },
    NoMatch,
    Mismatch { got: String },
    NoPhoto,
    Failed { reason: String },
}

impl Outcome {
    fn describe(&self, scientific: &str) -> String {
        match self {
            Outcome::Saved { file_name } => format!("  Saved {file_name}"),
            Outcome::Skipped { .. } => "  Skip (already downloaded)".to_string(),
            Outcome::NoMatch => format!("  No taxon found for {scientific}"),
            Outcome::Mismatch { got } => format!("  Skip (mismatch): got {got}"),
            Outcome::NoPhoto => format!("  No photo for {scientific}"),
            Outcome::Failed { reason } => format!("  Error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichItemResult {
    pub index: usize,
    pub kingdom: Kingdom,
    pub scientific: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichResult {
    pub started_at: String,
    pub finished_at: String,
    pub total: usize,
    pub interrupted: bool,
    pub ledger_path: String,
    pub ledger_entries: usize,
    pub items: Vec<EnrichItemResult>,
}

impl EnrichResult {
    pub fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.items
            .iter()
            .filter(|item| predicate(&item.outcome))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn line(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Cooperative stop request, checked between organisms, before each download
/// and before each search retry.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raises the flag and reports whether it was already raised.
    pub fn escalate(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    /// Routes Ctrl-C to this flag. Can be installed once per process.
    ///
    /// A second Ctrl-C exits at once with status 130. The ledger is flushed
    /// after every saved image, so nothing recorded is lost.
    pub fn install_interrupt_handler(&self) -> Result<(), AtlasError> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            if flag.escalate() {
                eprintln!("\nInterrupted again, exiting.");
                std::process::exit(130);
            }
            eprintln!("\nStopping after the current request (Ctrl-C again to quit now)...");
        })
        .map_err(|err| AtlasError::Signal(err.to_string()))
    }
}

enum Step {
    Done(Outcome),
    Abandoned,
}

pub struct App<C: TaxonClient> {
    client: C,
    options: EnrichOptions,
}

impl<C: TaxonClient> App<C> {
    pub fn new(client: C, options: EnrichOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Runs the enrichment over `entries`. Only a final ledger flush or an
    /// unusable image directory fails the whole run; everything else is
    /// reported per organism.
    pub fn enrich(
        &self,
        entries: &[CatalogEntry],
        ledger: &mut Ledger,
        stop: &StopFlag,
        sink: &dyn ProgressSink,
    ) -> Result<EnrichResult, AtlasError> {
        let started_at = iso_timestamp();
        let start = Instant::now();
        fs::create_dir_all(self.options.image_dir.as_std_path())
            .map_err(|err| AtlasError::Filesystem(err.to_string()))?;

        let total = entries.len();
        let mut items = Vec::with_capacity(total);
        let mut interrupted = false;

        for (position, entry) in entries.iter().enumerate() {
            if stop.is_raised() {
                interrupted = true;
                break;
            }
            let index = position + 1;
            sink.event(ProgressEvent::line(format!(
                "[{index}/{total}] ({}) {}",
                entry.kingdom, entry.scientific
            )));

            if ledger.is_satisfied(&entry.scientific, &self.options.image_dir) {
                let file_name = ledger.get(&entry.scientific).unwrap_or_default().to_string();
                let outcome = Outcome::Skipped { file_name };
                sink.event(ProgressEvent::line(outcome.describe(&entry.scientific)));
                items.push(EnrichItemResult {
                    index,
                    kingdom: entry.kingdom,
                    scientific: entry.scientific.clone(),
                    outcome,
                });
                continue;
            }

            let outcome = match self.process_entry(entry, ledger, stop) {
                Ok(Step::Done(outcome)) => outcome,
                Ok(Step::Abandoned) => {
                    interrupted = true;
                    break;
                }
                Err(err) => {
                    warn!(scientific = %entry.scientific, error = %err, "organism failed");
                    Outcome::Failed {
                        reason: err.to_string(),
                    }
                }
            };
            if let Outcome::Saved { file_name } = &outcome {
                info!(scientific = %entry.scientific, file = %file_name, "image saved");
            }
            sink.event(ProgressEvent::line(outcome.describe(&entry.scientific)));
            items.push(EnrichItemResult {
                index,
                kingdom: entry.kingdom,
                scientific: entry.scientific.clone(),
                outcome,
            });

            if !self.options.pause.is_zero() && !stop.is_raised() {
                thread::sleep(self.options.pause);
            }
        }

        ledger.flush()?;
        if interrupted {
            sink.event(ProgressEvent::line(format!(
                "Stopped early. Progress saved to {}",
                ledger.path()
            )));
        } else {
            sink.event(ProgressEvent {
                message: format!("Done. Wrote image map to {}", ledger.path()),
                elapsed: Some(start.elapsed()),
            });
        }

        Ok(EnrichResult {
            started_at,
            finished_at: iso_timestamp(),
            total,
            interrupted,
            ledger_path: ledger.path().to_string(),
            ledger_entries: ledger.len(),
            items,
        })
    }

    fn process_entry(
        &self,
        entry: &CatalogEntry,
        ledger: &mut Ledger,
        stop: &StopFlag,
    ) -> Result<Step, AtlasError> {
        let results = self.client.search(&entry.scientific)?;
        let Some(taxon) = select_taxon(&results, &entry.scientific) else {
            return Ok(Step::Done(Outcome::NoMatch));
        };
        if !taxon.name_matches(&entry.scientific) {
            return Ok(Step::Done(Outcome::Mismatch {
                got: taxon.name.clone(),
            }));
        }
        let Some(photo_url) = taxon.photo_url() else {
            return Ok(Step::Done(Outcome::NoPhoto));
        };
        if stop.is_raised() {
            return Ok(Step::Abandoned);
        }

        let file_name = image_file_name(&entry.scientific, photo_url);
        let destination = self.options.image_dir.join(&file_name);
        self.client
            .download_photo(photo_url, destination.as_std_path())?;
        ledger.put(&entry.scientific, &file_name)?;
        Ok(Step::Done(Outcome::Saved { file_name }))
    }
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use super::*;
    use crate::inaturalist::{DefaultPhoto, TaxonMatch};
    use crate::output::JsonOutput;

    struct FlakyClient {
        searches: Mutex<usize>,
    }

    impl TaxonClient for FlakyClient {
        fn search(&self, scientific: &str) -> Result<Vec<TaxonMatch>, AtlasError> {
            *self.searches.lock().unwrap() += 1;
            if scientific == "Vulpes vulpes" {
                return Err(AtlasError::TaxaHttp("connection reset".to_string()));
            }
            Ok(vec![TaxonMatch {
                name: scientific.to_string(),
                rank: "species".to_string(),
                default_photo: Some(DefaultPhoto {
                    medium_url: Some("https://static.example/p/medium.jpg".to_string()),
                    url: None,
                }),
            }])
        }

        fn download_photo(&self, _url: &str, destination: &Path) -> Result<(), AtlasError> {
            std::fs::write(destination, b"jpeg").map_err(|err| AtlasError::Filesystem(err.to_string()))
        }
    }

    #[test]
    fn second_escalation_reports_already_raised() {
        let stop = StopFlag::new();
        assert!(!stop.escalate());
        assert!(stop.is_raised());
        assert!(stop.escalate());
    }

    #[test]
    fn failed_organism_does_not_stop_the_batch() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let app = App::new(
            FlakyClient {
                searches: Mutex::new(0),
            },
            EnrichOptions {
                image_dir: root.join("images"),
                pause: Duration::ZERO,
            },
        );
        let entries = vec![
            CatalogEntry {
                kingdom: Kingdom::Animals,
                scientific: "Vulpes vulpes".to_string(),
            },
            CatalogEntry {
                kingdom: Kingdom::Animals,
                scientific: "Panthera leo".to_string(),
            },
        ];
        let mut ledger = Ledger::new(root.join("organisms_images.js"), "window.organismImages");

        let result = app
            .enrich(&entries, &mut ledger, &StopFlag::new(), &JsonOutput)
            .unwrap();

        assert!(matches!(result.items[0].outcome, Outcome::Failed { .. }));
        assert_eq!(
            result.items[1].outcome,
            Outcome::Saved {
                file_name: "panthera_leo.jpg".to_string()
            }
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(*app.client().searches.lock().unwrap(), 2);
    }
}
