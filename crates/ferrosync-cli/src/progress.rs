//! Terminal rendering of sync progress events

use crate::display::{create_spinner, status_line};
use ferrosync_sync::{ProgressEvent, SyncPhase};
use indicatif::ProgressBar;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Prints status lines and drives the scan spinner
pub struct ProgressPrinter {
    spinner: Option<ProgressBar>,
    verbose: bool,
    quiet: bool,
}

impl ProgressPrinter {
    /// Create a printer; status lines are only shown when `verbose`
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            spinner: None,
            verbose,
            quiet,
        }
    }

    /// Render events until the channel closes
    pub fn spawn(mut self, mut events: mpsc::UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(event);
            }
            self.finish_spinner(None);
        })
    }

    fn handle(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::PhaseChanged(SyncPhase::Scanning) => {
                self.spinner = create_spinner(self.quiet);
                if let Some(pb) = &self.spinner {
                    pb.set_message("Scanning local and remote trees...");
                }
            }
            ProgressEvent::PhaseChanged(_) => {}
            ProgressEvent::Scanned {
                source,
                destination,
            } => {
                self.finish_spinner(Some(format!(
                    "Scanned {} source and {} destination files",
                    source, destination
                )));
            }
            ProgressEvent::Status {
                status,
                direction,
                message,
                code,
            } => {
                if self.verbose && !self.quiet {
                    self.print(status_line(status, direction, &message, code));
                }
            }
            ProgressEvent::Completed(_) | ProgressEvent::Failed(_) => self.finish_spinner(None),
        }
    }

    /// Print above the spinner while it is running
    fn print(&self, line: String) {
        match &self.spinner {
            Some(pb) => pb.println(line),
            None => println!("{}", line),
        }
    }

    fn finish_spinner(&mut self, message: Option<String>) {
        if let Some(pb) = self.spinner.take() {
            match message {
                Some(message) => pb.finish_with_message(message),
                None => pb.finish_and_clear(),
            }
        }
    }
}
