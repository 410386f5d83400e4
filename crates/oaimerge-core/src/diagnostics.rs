//! Dedicated writer thread for the line-oriented diagnostic log

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

/// Receives batches of events from worker threads and appends one line per event.
///
/// Runs on its own thread and is the only owner of the log file. A batch is
/// written back to back, so events sent together stay contiguous in the log.
pub struct DiagnosticsWriter<T> {
    rx: Receiver<Vec<T>>,
    out: BufWriter<File>,
}

impl<T: Display> DiagnosticsWriter<T> {
    pub fn new(rx: Receiver<Vec<T>>, file: File) -> Self {
        Self {
            rx,
            out: BufWriter::new(file),
        }
    }

    /// Writer loop: runs until every sender is dropped, returns lines written.
    pub fn run(mut self) -> io::Result<u64> {
        let mut lines = 0u64;

        for batch in self.rx.iter() {
            for event in batch {
                writeln!(self.out, "{event}")?;
                lines += 1;
            }
        }

        self.out.flush()?;
        Ok(lines)
    }
}

/// Sending side plus the writer thread; [`finish`](DiagnosticsHandle::finish)
/// closes the channel and waits for the queue to drain.
pub struct DiagnosticsHandle<T> {
    sender: Sender<Vec<T>>,
    thread: JoinHandle<io::Result<u64>>,
}

impl<T> std::fmt::Debug for DiagnosticsHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsHandle").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> DiagnosticsHandle<T> {
    /// A sender for one producer. Sends never block.
    pub fn sender(&self) -> Sender<Vec<T>> {
        self.sender.clone()
    }

    /// Drop our sender, then join the writer once all clones are gone.
    pub fn finish(self) -> io::Result<u64> {
        drop(self.sender);
        self.thread
            .join()
            .map_err(|_| io::Error::other("diagnostics writer panicked"))?
    }
}

/// Spawn the `diagnostics-writer` thread writing to `path`.
///
/// The file is created here, on the caller's thread, so an unusable path
/// fails before any work is dispatched.
pub fn spawn_diagnostics_writer<T: Display + Send + 'static>(
    path: &Path,
) -> io::Result<DiagnosticsHandle<T>> {
    let file = File::create(path)?;
    let (sender, rx) = mpsc::channel();
    let thread = std::thread::Builder::new()
        .name("diagnostics-writer".into())
        .spawn(move || DiagnosticsWriter::new(rx, file).run())?;
    Ok(DiagnosticsHandle { sender, thread })
}
