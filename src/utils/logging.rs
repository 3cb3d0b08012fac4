//! Logging
//!
//! `tracing` subscriber setup for the CLI and an epoch timer for the
//! training loop. Log lines go to stderr so `infer --json` keeps stdout
//! machine-readable.

use std::time::Instant;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Subscriber settings
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Most verbose level that is still emitted
    pub level: Level,
    /// Prefix lines with the module path
    pub include_target: bool,
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug level with module targets
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            ..Self::default()
        }
    }

    /// Warnings and errors only
    pub fn quiet() -> Self {
        Self {
            level: Level::WARN,
            ..Self::default()
        }
    }
}

/// Install the global subscriber
///
/// Fails if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Wall-clock timing of training epochs
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: Instant,
    training_start: Instant,
}

impl TrainingLogger {
    pub fn new(total_epochs: usize) -> Self {
        let now = Instant::now();
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: now,
            training_start: now,
        }
    }

    /// Mark the start of the 0-based `epoch`
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();
        tracing::debug!("Epoch {}/{} started", epoch + 1, self.total_epochs);
    }

    /// Log the finished epoch with an ETA, returning its duration in seconds
    pub fn end_epoch(&self, train_loss: f64, val_accuracy: f64) -> f64 {
        let epoch_secs = self.epoch_start.elapsed().as_secs_f64();
        let done = self.epoch + 1;
        let remaining = self.total_epochs.saturating_sub(done);
        let eta_secs = self.elapsed_secs() / done as f64 * remaining as f64;

        tracing::info!(
            epoch = done,
            train_loss,
            val_accuracy,
            "Epoch {}/{} done in {:.1}s, ETA {:.0}s",
            done,
            self.total_epochs,
            epoch_secs,
            eta_secs
        );

        epoch_secs
    }

    /// Seconds since the logger was created
    pub fn elapsed_secs(&self) -> f64 {
        self.training_start.elapsed().as_secs_f64()
    }
}
