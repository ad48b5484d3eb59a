//! Progress reporting that coexists with tracing output
//!
//! Routes tracing's writer through the shared `MultiProgress` so log
//! lines print above any active progress bar instead of tearing it.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Add a progress bar over `len` entities, pinned below log output
pub fn add_progress_bar(len: u64) -> ProgressBar {
    let bar = multi_progress().add(ProgressBar::new(len));
    if let Ok(style) =
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} companies {msg}")
    {
        bar.set_style(style);
    }
    bar
}

/// `MakeWriter` factory handing tracing a progress-aware writer
#[derive(Default, Clone)]
pub struct LogWriterFactory;

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::default()
    }
}

/// Line-buffering writer that emits through the `MultiProgress`
#[derive(Default)]
pub struct LogWriter {
    buffer: String,
}

impl LogWriter {
    fn emit(&self, line: &str) {
        let line = line.trim_end_matches('\r');
        let _ = multi_progress().println(line.to_string());
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.buffer.find('\n') {
            let line = self.buffer[..idx].to_string();
            self.emit(&line);
            self.buffer.drain(..idx + 1);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.emit(&rest);
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
