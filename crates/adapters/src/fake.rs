// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fake scrapers for engine and spec tests.
//!
//! Each helper writes a `/bin/sh` script to disk and returns its path; the
//! dispatcher runs it exactly like a real scraper, honouring the same
//! env contract (`OUTPUT_FILE` in particular).

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// One step of a scripted scraper run.
pub enum Step {
    /// Append a raw line (typically one JSON object) to `$OUTPUT_FILE`.
    WriteLine(String),
    /// Append a raw line to stdout instead of the output file.
    WriteStdout(String),
    /// Sleep for the given number of milliseconds.
    SleepMs(u64),
}

/// Write a scraper script that performs `steps` then exits with
/// `exit_code`. Returns the script path to use as the spawn command.
pub fn script_scraper(dir: &Path, name: &str, steps: &[Step], exit_code: i32) -> PathBuf {
    let path = dir.join(format!("{name}.sh"));
    let mut body = String::from("#!/bin/sh\n");
    for step in steps {
        match step {
            Step::WriteLine(line) => {
                body.push_str(&format!(
                    "printf '%s\\n' {} >> \"$OUTPUT_FILE\"\n",
                    shell_quote(line)
                ));
            }
            Step::WriteStdout(line) => {
                body.push_str(&format!("printf '%s\\n' {}\n", shell_quote(line)));
            }
            Step::SleepMs(ms) => {
                body.push_str(&format!("sleep {}\n", (*ms as f64) / 1000.0));
            }
        }
    }
    body.push_str(&format!("exit {exit_code}\n"));

    write_executable(&path, &body);
    path
}

/// A scraper that writes each line once and exits 0.
pub fn lines_scraper(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let steps: Vec<Step> = lines
        .iter()
        .map(|l| Step::WriteLine((*l).to_string()))
        .collect();
    script_scraper(dir, name, &steps, 0)
}

fn write_executable(path: &Path, body: &str) {
    #[allow(clippy::unwrap_used)]
    {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
