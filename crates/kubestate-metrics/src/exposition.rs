// Copyright (C) 2026  kubestate Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Text exposition format rendering
//!
//! Records are written line by line into any [`std::io::Write`], so callers can
//! wrap the sink in a compressing writer and never hold the full body in memory.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::types::{EscapedHelp, Metric, MetricFamilyDef};

/// Content type served with the text exposition format
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Incremental writer for the Prometheus text exposition format
pub struct ExpositionWriter<W: Write> {
    inner: W,
    lines: usize,
}

impl<W: Write> ExpositionWriter<W> {
    /// Wrap a sink
    pub fn new(inner: W) -> Self {
        Self { inner, lines: 0 }
    }

    /// Number of sample lines written so far
    pub fn lines_written(&self) -> usize {
        self.lines
    }

    /// Write the `# HELP` / `# TYPE` preamble of a family
    pub fn write_preamble(&mut self, family: &MetricFamilyDef) -> io::Result<()> {
        writeln!(
            self.inner,
            "# HELP {} {}",
            family.name(),
            EscapedHelp(family.help())
        )?;
        writeln!(
            self.inner,
            "# TYPE {} {}",
            family.name(),
            family.metric_type().as_label()
        )
    }

    /// Write a single sample line
    pub fn write_metric(&mut self, metric: &Metric) -> io::Result<()> {
        writeln!(self.inner, "{}", metric)?;
        self.lines += 1;
        Ok(())
    }

    /// Write one collector's output grouped by family
    ///
    /// Families are emitted in declaration order, each preceded by its
    /// preamble; families without records are skipped. Records whose name has
    /// no declared family follow at the end, in first-seen order, without a
    /// preamble.
    pub fn write_collection(
        &mut self,
        families: &[MetricFamilyDef],
        records: &[Metric],
    ) -> io::Result<()> {
        let mut by_name: HashMap<&str, Vec<&Metric>> = HashMap::new();
        let mut first_seen: Vec<&str> = Vec::new();

        for record in records {
            let entry = by_name.entry(record.name()).or_default();
            if entry.is_empty() {
                first_seen.push(record.name());
            }
            entry.push(record);
        }

        for family in families {
            let Some(group) = by_name.remove(family.name()) else {
                continue;
            };
            self.write_preamble(family)?;
            for record in group {
                self.write_metric(record)?;
            }
        }

        for name in first_seen {
            if let Some(group) = by_name.remove(name) {
                for record in group {
                    self.write_metric(record)?;
                }
            }
        }

        Ok(())
    }

    /// Flush the underlying sink
    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Mutable access to the underlying sink, e.g. to drain written bytes
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Recover the underlying sink
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Render a single collection into a string
pub fn render_to_string(families: &[MetricFamilyDef], records: &[Metric]) -> String {
    let mut writer = ExpositionWriter::new(Vec::new());
    // Writing into a Vec cannot fail
    let _ = writer.write_collection(families, records);
    String::from_utf8_lossy(&writer.into_inner()).into_owned()
}
