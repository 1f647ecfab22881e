use std::{
    fmt::Write as _,
    io::{self, BufRead, Write as _},
};

use clap::ValueEnum;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::{cli_bail, error::result::KmsCliResult};

pub const KMS_CLI_FORMAT: &str = "KMS_CLI_FORMAT";

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Renders command results on stdout, as text or as JSON
#[derive(Clone, Copy, Debug, Default)]
pub struct Stdout {
    format: OutputFormat,
}

impl Stdout {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print `value` as JSON, or the text built by `text`
    pub fn write<T, F>(&self, value: &T, text: F) -> KmsCliResult<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce() -> String,
    {
        if self.is_json() {
            println!("{}", to_json(value)?);
        } else {
            let text = text();
            if !text.is_empty() {
                println!("{}", text.trim_end_matches('\n'));
            }
        }
        Ok(())
    }

    /// Print a confirmation message
    pub fn message(&self, message: &str) -> KmsCliResult<()> {
        self.write(&serde_json::json!({ "message": message }), || message.to_owned())
    }
}

/// Pretty JSON with a 4-space indentation
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> KmsCliResult<String> {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buffer)?)
}

/// A table with aligned columns and a header separator
#[derive(Debug, Default)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    #[must_use]
    pub fn new<S: ToString>(header: &[S]) -> Self {
        Self {
            header: header.iter().map(ToString::to_string).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row<S: ToString>(&mut self, row: &[S]) {
        self.rows.push(row.iter().map(ToString::to_string).collect());
    }

    #[must_use]
    pub fn render(&self) -> String {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in self.rows.iter().chain(std::iter::once(&self.header)) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();

        let mut out = String::new();
        for row in std::iter::once(&self.header)
            .chain(std::iter::once(&separator))
            .chain(self.rows.iter())
        {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn push_line(out: &mut String, row: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (i, width) in widths.iter().enumerate() {
        let cell = row.get(i).map_or("", String::as_str);
        if i + 1 == widths.len() {
            line.push_str(cell);
        } else {
            let _ = write!(line, "{cell:<width$}  ");
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// A two-column table of names and values.
/// Values spanning several lines stay aligned on the value column.
#[derive(Debug, Default)]
pub struct KeyValueTable {
    rows: Vec<(String, String)>,
}

impl KeyValueTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl ToString, value: impl ToString) -> &mut Self {
        self.rows.push((name.to_string(), value.to_string()));
        self
    }

    /// Add the row only when a value is present
    pub fn add_opt(&mut self, name: impl ToString, value: Option<impl ToString>) -> &mut Self {
        if let Some(value) = value {
            self.add(name, value);
        }
        self
    }

    #[must_use]
    pub fn render(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|(name, _)| name.chars().count())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for (name, value) in &self.rows {
            let mut lines = value.lines();
            let first = lines.next().unwrap_or("");
            let _ = writeln!(out, "{name:<width$}  {first}");
            for line in lines {
                let _ = writeln!(out, "{:<width$}  {line}", "");
            }
        }
        out
    }
}

/// Ask a question on stderr and read the answer from `input`.
/// An empty answer gives `default`.
pub fn prompt_from(input: &mut impl BufRead, question: &str, default: &str) -> KmsCliResult<String> {
    let mut stderr = io::stderr();
    if default.is_empty() {
        write!(stderr, "{question}: ")?;
    } else {
        write!(stderr, "{question} [{default}]: ")?;
    }
    stderr.flush()?;
    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        cli_bail!("No answer to {question:?}");
    }
    let answer = answer.trim();
    Ok(if answer.is_empty() {
        default.to_owned()
    } else {
        answer.to_owned()
    })
}

/// Ask a question on the terminal
pub fn prompt(question: &str, default: &str) -> KmsCliResult<String> {
    prompt_from(&mut io::stdin().lock(), question, default)
}

/// Yes or no question, `no` by default
pub fn confirm_from(input: &mut impl BufRead, question: &str) -> KmsCliResult<bool> {
    let answer = prompt_from(input, question, "y/N")?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Fail with `Canceled` unless the user confirms
pub fn ensure_confirmed(question: &str) -> KmsCliResult<()> {
    if !confirm_from(&mut io::stdin().lock(), question)? {
        cli_bail!("Canceled");
    }
    Ok(())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::{KeyValueTable, Table, to_json};

    #[test]
    fn test_table_alignment() {
        let mut table = Table::new(&["ID", "Name", "State"]);
        table.add_row(&["1", "first-key", "active"]);
        table.add_row(&["22", "k", ""]);
        assert_eq!(
            table.render(),
            "ID  Name       State\n--  ---------  ------\n1   first-key  active\n22  k\n"
        );
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let table = Table::new(&["Path", "Version"]);
        assert_eq!(table.render(), "Path  Version\n----  -------\n");
    }

    #[test]
    fn test_key_value_table() {
        let mut table = KeyValueTable::new();
        table
            .add("Id", "abc")
            .add("Usage", "line1\nline2")
            .add_opt("Curve", None::<&str>);
        assert_eq!(table.render(), "Id     abc\nUsage  line1\n       line2\n");
    }

    #[test]
    fn test_json_indent() {
        let json = to_json(&serde_json::json!({"a": [1]})).unwrap();
        assert_eq!(json, "{\n    \"a\": [\n        1\n    ]\n}");
    }

    #[test]
    fn test_prompt_answers() {
        let mut input = &b"\n"[..];
        assert_eq!(super::prompt_from(&mut input, "Endpoint", "localhost").unwrap(), "localhost");
        let mut input = &b"  other \n"[..];
        assert_eq!(super::prompt_from(&mut input, "Endpoint", "localhost").unwrap(), "other");
        let mut input = &b""[..];
        assert!(super::prompt_from(&mut input, "Endpoint", "").is_err());
    }

    #[test]
    fn test_confirm_defaults_to_no() {
        let mut input = &b"\n"[..];
        assert!(!super::confirm_from(&mut input, "Continue ?").unwrap());
        let mut input = &b"Yes\n"[..];
        assert!(super::confirm_from(&mut input, "Continue ?").unwrap());
        let mut input = &b"y\n"[..];
        assert!(super::confirm_from(&mut input, "Continue ?").unwrap());
    }
}
