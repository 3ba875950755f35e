//! Interactive front end: progress and results on the terminal.

use crate::session::{run_sequence, SessionConfig};
use cadence_scheduler::SequenceReporter;
use std::io::{self, Write};

pub struct TerminalReporter<W: Write> {
    out: W,
    last_percent: Option<u32>,
}

impl<W: Write> TerminalReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_percent: None,
        }
    }
}

impl<W: Write> SequenceReporter for TerminalReporter<W> {
    fn progress(&mut self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u32;
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        let _ = writeln!(self.out, "[{:>3}%]", percent);
    }

    fn perf(&mut self, name: &str, seconds: f64) {
        let _ = writeln!(self.out, "  {} took {:.1}s", name, seconds);
    }

    fn message(&mut self, text: &str) {
        let _ = writeln!(self.out, "{}", text);
    }
}

pub fn run(config: &SessionConfig, titles: &[String]) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut reporter = TerminalReporter::new(stdout.lock());
    let completed = run_sequence(config, titles, &mut reporter)?;
    println!("Completed {} events", completed.len());
    for event in &completed {
        println!("  {:<24} job {}", event.title, event.job_id);
    }
    Ok(())
}
