// src/emit.rs

use crate::error::{MineError, Result};
use crate::model::Rule;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

/// Destination for mined rules, shared by all workers of a run.
///
/// Implementations serialize concurrent callers so that the rules of one call
/// land together.
pub trait RuleSink: Sync {
    fn write_rules(&self, rules: &[Rule]) -> Result<()>;
}

/// Writes rules as delimited lines to any writer behind a single lock.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> RuleSink for WriterSink<W> {
    fn write_rules(&self, rules: &[Rule]) -> Result<()> {
        // The whole batch goes out in one write_all under the lock
        let batch: String = rules.iter().map(|rule| format!("{rule}\n")).collect();

        let mut writer = self.writer.lock().map_err(|_| {
            MineError::Output(std::io::Error::new(
                std::io::ErrorKind::Other,
                "output lock poisoned by a failed writer",
            ))
        })?;
        writer.write_all(batch.as_bytes())?;
        writer.flush()?;
        Ok(())
    }
}

/// Keeps rules in memory; used when the caller wants the rules themselves.
#[derive(Default)]
pub struct MemorySink {
    rules: Mutex<Vec<Rule>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RuleSink for MemorySink {
    fn write_rules(&self, rules: &[Rule]) -> Result<()> {
        let mut stored = self
            .rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        stored.extend_from_slice(rules);
        Ok(())
    }
}

/// Opens the result file for appending, or truncates it first when asked to.
pub fn open_output(path: &Path, truncate: bool) -> Result<WriterSink<BufWriter<File>>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| MineError::io(parent, e))?;
    }
    let mut options = OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let file = options.open(path).map_err(|e| MineError::io(path, e))?;
    Ok(WriterSink::new(BufWriter::new(file)))
}

/// Reads a rule file written by [`WriterSink`].
pub fn read_rules(path: &Path) -> Result<Vec<Rule>> {
    let file = File::open(path).map_err(|e| MineError::io(path, e))?;
    let mut rules = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| MineError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let rule = line.parse::<Rule>().map_err(|reason| MineError::RuleFormat {
            line: index + 1,
            reason,
        })?;
        rules.push(rule);
    }
    Ok(rules)
}

// antecedent;consequent;support;confidence;lift;"[b0, b1, ...]"
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{:?};{:?};\"[",
            self.antecedent, self.consequent, self.support, self.confidence, self.lift
        )?;
        for (i, bin) in self.bins.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{bin}")?;
        }
        f.write_str("]\"")
    }
}

impl FromStr for Rule {
    type Err = String;

    /// Fields after the histogram are ignored.
    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = line.trim_end().split(';').collect();
        if parts.len() < 6 {
            return Err(format!("expected 6 fields, found {}", parts.len()));
        }
        let support = parts[2]
            .parse()
            .map_err(|e| format!("invalid support '{}': {e}", parts[2]))?;
        let confidence = parts[3]
            .parse()
            .map_err(|e| format!("invalid confidence '{}': {e}", parts[3]))?;
        let lift = parts[4]
            .parse()
            .map_err(|e| format!("invalid lift '{}': {e}", parts[4]))?;
        let bins = parts[5]
            .strip_prefix("\"[")
            .and_then(|s| s.strip_suffix("]\""))
            .ok_or_else(|| format!("histogram '{}' is not a quoted list", parts[5]))?
            .split(',')
            .map(|bin| bin.trim().parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid histogram '{}': {e}", parts[5]))?;

        Ok(Rule {
            antecedent: parts[0].to_string(),
            consequent: parts[1].to_string(),
            support,
            confidence,
            lift,
            bins,
        })
    }
}
