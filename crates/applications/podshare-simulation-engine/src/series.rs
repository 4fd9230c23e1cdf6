//! Demand series storage and the delimited-text format it is exchanged in
//!
//! The on-disk layout is the one the trace builder produces:
//!
//! ```text
//! ;POD_1;POD_2;sum
//! T_0;120;40;160
//! T_1;90;310;400
//! ```
//!
//! A header row, a label column and a trailing `sum` column surround the
//! actual demand cells (millicores). All three are optional via
//! [`DelimitedFormat`].

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use podshare_core::{DemandSeries, PodshareError, Result};

/// In-memory demand series, validated to be non-empty and rectangular
#[derive(Debug, Clone, PartialEq)]
pub struct DemandTable {
    rows: Vec<Vec<u32>>,
    workload_names: Vec<String>,
}

impl DemandTable {
    /// Build a table from unsigned rows (one row per time step)
    pub fn new(rows: Vec<Vec<u32>>) -> Result<Self> {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if width == 0 {
            return Err(PodshareError::EmptySeries);
        }

        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != width)
            .map(|(i, r)| (i, r.len()))
        {
            return Err(PodshareError::RaggedSeries {
                row,
                expected: width,
                found,
            });
        }

        let workload_names = (1..=width).map(|i| format!("POD_{}", i)).collect();
        Ok(Self {
            rows,
            workload_names,
        })
    }

    /// Build a table from signed rows, rejecting negative demand
    pub fn from_rows(rows: Vec<Vec<i64>>) -> Result<Self> {
        let mut converted = Vec::with_capacity(rows.len());
        for (row, cells) in rows.into_iter().enumerate() {
            let mut out = Vec::with_capacity(cells.len());
            for (column, value) in cells.into_iter().enumerate() {
                if value < 0 {
                    return Err(PodshareError::NegativeDemand { row, column, value });
                }
                let value = u32::try_from(value).map_err(|_| {
                    PodshareError::parse(row + 1, format!("demand {} does not fit in 32 bits", value))
                })?;
                out.push(value);
            }
            converted.push(out);
        }
        Self::new(converted)
    }

    /// Replace the default `POD_n` workload names
    pub fn with_workload_names(mut self, names: Vec<String>) -> Result<Self> {
        if names.len() != self.workload_count() {
            return Err(PodshareError::config(format!(
                "{} workload names for {} workloads",
                names.len(),
                self.workload_count()
            )));
        }
        self.workload_names = names;
        Ok(self)
    }

    pub fn workload_names(&self) -> &[String] {
        &self.workload_names
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.rows
    }

    /// Total demand of all workloads at a time step
    pub fn demand_sum(&self, time_step: usize) -> u64 {
        self.rows[time_step].iter().map(|&v| v as u64).sum()
    }

    /// Largest total demand over all time steps
    pub fn peak_demand(&self) -> u64 {
        (0..self.rows.len())
            .map(|t| self.demand_sum(t))
            .max()
            .unwrap_or(0)
    }

    /// Average of `demand / capacity` over all time steps.
    ///
    /// This is the efficiency a host of this capacity would reach if every
    /// workload were always served in full (not capped at 1.0).
    pub fn ideal_efficiency(&self, capacity: u64) -> f64 {
        if capacity == 0 {
            return 0.0;
        }
        let total: f64 = (0..self.rows.len())
            .map(|t| self.demand_sum(t) as f64 / capacity as f64)
            .sum();
        total / self.rows.len() as f64
    }
}

impl DemandSeries for DemandTable {
    fn series_len(&self) -> usize {
        self.rows.len()
    }

    fn workload_count(&self) -> usize {
        self.workload_names.len()
    }

    fn demand_at(&self, time_step: usize, workload: usize) -> u32 {
        self.rows[time_step][workload]
    }
}

/// Layout of a delimited demand file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedFormat {
    pub delimiter: char,
    /// First line holds workload names
    pub has_header: bool,
    /// First column holds the time step label
    pub label_column: bool,
    /// Last column holds the row total
    pub trailing_sum_column: bool,
}

impl Default for DelimitedFormat {
    fn default() -> Self {
        Self {
            delimiter: ';',
            has_header: true,
            label_column: true,
            trailing_sum_column: true,
        }
    }
}

impl DelimitedFormat {
    /// Plain grid of numbers, no header, label or sum
    pub fn bare(delimiter: char) -> Self {
        Self {
            delimiter,
            has_header: false,
            label_column: false,
            trailing_sum_column: false,
        }
    }

    /// Strip the label and sum columns from a split line
    fn data_cells<'a>(&self, cells: &'a [&'a str]) -> &'a [&'a str] {
        let start = usize::from(self.label_column).min(cells.len());
        let end = if self.trailing_sum_column {
            cells.len().saturating_sub(1).max(start)
        } else {
            cells.len()
        };
        &cells[start..end]
    }

    /// Read a demand table
    pub fn read<R: BufRead>(&self, reader: R) -> Result<DemandTable> {
        let mut rows = Vec::new();
        let mut names = None;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }

            let cells: Vec<&str> = line.split(self.delimiter).map(str::trim).collect();
            let data = self.data_cells(&cells);

            if self.has_header && names.is_none() {
                names = Some(data.iter().map(|c| unquote(c).to_string()).collect::<Vec<_>>());
                continue;
            }

            let row = data
                .iter()
                .map(|cell| {
                    unquote(cell).parse::<i64>().map_err(|e| {
                        PodshareError::parse(line_no, format!("invalid demand '{}': {}", cell, e))
                    })
                })
                .collect::<Result<Vec<i64>>>()?;
            rows.push(row);
        }

        let table = DemandTable::from_rows(rows)?;
        match names {
            Some(names) => table.with_workload_names(names),
            None => Ok(table),
        }
    }

    /// Load a demand table from a file
    pub fn load(&self, path: impl AsRef<Path>) -> Result<DemandTable> {
        let file = File::open(path)?;
        self.read(BufReader::new(file))
    }

    /// Write a demand table in this layout
    pub fn write<W: Write>(&self, table: &DemandTable, mut writer: W) -> Result<()> {
        let sep = self.delimiter.to_string();

        if self.has_header {
            let mut header: Vec<&str> = Vec::new();
            if self.label_column {
                header.push("");
            }
            header.extend(table.workload_names().iter().map(String::as_str));
            if self.trailing_sum_column {
                header.push("sum");
            }
            writeln!(writer, "{}", header.join(sep.as_str()))?;
        }

        for (t, row) in table.rows().iter().enumerate() {
            let mut cells: Vec<String> = Vec::with_capacity(row.len() + 2);
            if self.label_column {
                cells.push(format!("T_{}", t));
            }
            cells.extend(row.iter().map(u32::to_string));
            if self.trailing_sum_column {
                cells.push(table.demand_sum(t).to_string());
            }
            writeln!(writer, "{}", cells.join(sep.as_str()))?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Save a demand table to a file
    pub fn save(&self, table: &DemandTable, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        self.write(table, BufWriter::new(file))
    }
}

fn unquote(cell: &str) -> &str {
    cell.trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = ";POD_1;POD_2;sum\nT_0;100;0;100\nT_1;50;50;100\nT_2;0;100;100\n";

    #[test]
    fn test_read_default_layout() {
        let table = DelimitedFormat::default().read(TRACE.as_bytes()).unwrap();

        assert_eq!(table.series_len(), 3);
        assert_eq!(table.workload_count(), 2);
        assert_eq!(table.demand_at(1, 0), 50);
        assert_eq!(table.demand_at(2, 1), 100);
        assert_eq!(table.workload_names(), &["POD_1", "POD_2"]);
    }

    #[test]
    fn test_write_then_read_preserves_table() {
        let table = DemandTable::new(vec![vec![10, 20, 30], vec![5, 0, 7]]).unwrap();
        let format = DelimitedFormat::default();

        let mut buffer = Vec::new();
        format.write(&table, &mut buffer).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with(";POD_1;POD_2;POD_3;sum\nT_0;10;20;30;60\n"));

        let parsed = format.read(buffer.as_slice()).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_bare_layout_and_quotes() {
        let table = DelimitedFormat::bare(',')
            .read("\"1\",2\n3,4\n\n".as_bytes())
            .unwrap();
        assert_eq!(table.rows(), &[vec![1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let err = DelimitedFormat::bare(';')
            .read("1;2\n3\n".as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            PodshareError::RaggedSeries { row: 1, expected: 2, found: 1 }
        ));
    }

    #[test]
    fn test_rejects_negative_demand() {
        let err = DelimitedFormat::bare(';')
            .read("1;2\n3;-4\n".as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            PodshareError::NegativeDemand { row: 1, column: 1, value: -4 }
        ));
    }

    #[test]
    fn test_rejects_garbage_with_line_number() {
        let err = DelimitedFormat::default()
            .read(";POD_1;sum\nT_0;12;12\nT_1;abc;0\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, PodshareError::Parse { line: 3, .. }));
    }

    #[test]
    fn test_rejects_empty_series() {
        assert!(matches!(
            DelimitedFormat::default().read(";POD_1;sum\n".as_bytes()),
            Err(PodshareError::EmptySeries)
        ));
        assert!(matches!(DemandTable::new(vec![]), Err(PodshareError::EmptySeries)));
        assert!(matches!(
            DemandTable::new(vec![vec![]]),
            Err(PodshareError::EmptySeries)
        ));
    }

    #[test]
    fn test_ideal_efficiency() {
        let table = DemandTable::new(vec![vec![100, 0], vec![50, 50], vec![0, 50]]).unwrap();

        assert_eq!(table.peak_demand(), 100);
        // (1.0 + 1.0 + 0.5) / 3
        assert!((table.ideal_efficiency(100) - 2.5 / 3.0).abs() < 1e-9);
        assert_eq!(table.ideal_efficiency(0), 0.0);
    }
}
