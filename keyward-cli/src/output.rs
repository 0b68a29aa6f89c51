// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::time::Duration;

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use keyward_core::error::KeywardError;

const MNEMONIC_COLUMNS: usize = 3;

#[derive(Clone, Copy)]
enum Tone {
    Ok,
    Warn,
    Fail,
}

/// Styled terminal output. Everything goes to stderr so stdout stays
/// free for piping.
pub struct Output {
    term: Term,
}

impl Output {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn status(&self, tone: Tone, msg: &str) {
        let mark = match tone {
            Tone::Ok => style("✓").green(),
            Tone::Warn => style("!").yellow(),
            Tone::Fail => style("✗").red(),
        };
        self.line(&format!("{} {msg}", mark.bold()));
    }

    pub fn success(&self, msg: &str) {
        self.status(Tone::Ok, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.status(Tone::Warn, msg);
    }

    pub fn error(&self, msg: &str) {
        self.status(Tone::Fail, msg);
    }

    /// Reports a command failure.
    pub fn failure(&self, e: &KeywardError) {
        self.error(&failure_message(e));
    }

    pub fn info(&self, msg: &str) {
        self.line(msg);
    }

    pub fn newline(&self) {
        self.line("");
    }

    pub fn header(&self, title: &str) {
        self.newline();
        self.line(&style(title).bold().to_string());
    }

    pub fn field(&self, label: &str, value: &str) {
        self.line(&format!("  {}: {value}", style(label).dim()));
    }

    /// A field whose value is key material identification (public key,
    /// key id), highlighted so it can be compared at a glance.
    pub fn key_field(&self, label: &str, value: &str) {
        self.line(&format!("  {}: {}", style(label).dim(), style(value).cyan()));
    }

    pub fn table<'a>(&'a self, columns: &[(&str, usize)]) -> Table<'a> {
        let widths: Vec<usize> = columns.iter().map(|(_, w)| *w).collect();
        let header = columns
            .iter()
            .map(|(name, w)| pad(&style(*name).bold().to_string(), name, *w))
            .collect::<Vec<_>>()
            .join(" ");
        self.newline();
        self.line(&header);
        let rule = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        self.line(&"─".repeat(rule));
        Table { out: self, widths }
    }

    /// Runs until [`Spinner::finish`] or drop.
    pub fn spinner(&self, msg: &str) -> Spinner {
        let pb = ProgressBar::new_spinner();
        if let Ok(s) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(s);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        Spinner { pb }
    }

    /// Prints recovery words numbered in a grid, reading down each column.
    pub fn mnemonic(&self, phrase: &str) {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        let rows = words.len().div_ceil(MNEMONIC_COLUMNS);
        self.newline();
        for r in 0..rows {
            let line = (0..MNEMONIC_COLUMNS)
                .filter_map(|c| {
                    let i = c * rows + r;
                    words.get(i).map(|w| {
                        let cell = format!("{:>2}. {w}", i + 1);
                        pad(&style(&cell).yellow().to_string(), &cell, 16)
                    })
                })
                .collect::<Vec<_>>()
                .join("");
            self.line(&format!("  {}", line.trim_end()));
        }
        self.newline();
    }

    pub fn secret_warning(&self) {
        self.newline();
        self.line(
            &style("Write these words down offline. Anyone holding them controls the wallet.")
                .red()
                .bold()
                .to_string(),
        );
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

fn failure_message(e: &KeywardError) -> String {
    match e {
        KeywardError::BackupDecryption => "Wrong PIN or damaged backup entry. Try again.".into(),
        other => other.to_string(),
    }
}

/// Pads `styled` to `width` visible characters, measured on `plain`.
fn pad(styled: &str, plain: &str, width: usize) -> String {
    let fill = width.saturating_sub(plain.chars().count());
    format!("{styled}{}", " ".repeat(fill))
}

pub enum Cell<'a> {
    Text(&'a str),
    Key(&'a str),
}

pub struct Table<'a> {
    out: &'a Output,
    widths: Vec<usize>,
}

impl Table<'_> {
    pub fn row(&self, cells: &[Cell<'_>]) {
        let line = cells
            .iter()
            .zip(&self.widths)
            .map(|(cell, w)| match cell {
                Cell::Text(v) => pad(v, v, *w),
                Cell::Key(v) => pad(&style(*v).cyan().to_string(), v, *w),
            })
            .collect::<Vec<_>>()
            .join(" ");
        self.out.line(line.trim_end());
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn finish(self) {}
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.pb.finish_and_clear();
    }
}
