//! Rendering of command reports
//!
//! Every command builds one serializable report. JSON output prints the report
//! as a single line; text output lets the report lay itself out through a
//! [`TextWriter`]. Diagnostics go through `tracing` on stderr, never here.

use std::fmt::Display;
use std::io::{self, Write};

use anyhow::Result;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// A command result that can also be read by people
pub trait TextReport: Serialize {
    fn write_text(&self, out: &mut TextWriter<'_>) -> io::Result<()>;
}

/// Line-oriented writer for text reports
pub struct TextWriter<'a> {
    out: &'a mut dyn Write,
}

impl<'a> TextWriter<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out }
    }

    pub fn line(&mut self, text: impl Display) -> io::Result<()> {
        writeln!(self.out, "{}", text)
    }

    pub fn blank(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    /// `Key:` padded to a column, then the value
    pub fn field(&mut self, key: &str, value: impl Display) -> io::Result<()> {
        writeln!(self.out, "{:<18} {}", format!("{}:", key), value)
    }

    /// A blank line, `Title:` and one indented line per item; nothing when
    /// there are no items
    pub fn section<I, T>(&mut self, title: &str, items: I) -> io::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        let mut items = items.into_iter().peekable();
        if items.peek().is_none() {
            return Ok(());
        }
        self.blank()?;
        writeln!(self.out, "{}:", title)?;
        for item in items {
            writeln!(self.out, "  {}", item)?;
        }
        Ok(())
    }
}

/// Writes reports to stdout in the selected format
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn report<R: TextReport>(&self, report: &R) -> Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.write_report(&mut lock, report)
    }

    fn write_report<R: TextReport>(&self, out: &mut dyn Write, report: &R) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, report)?;
                writeln!(out)?;
            }
            OutputFormat::Text => report.write_text(&mut TextWriter::new(out))?,
        }
        Ok(())
    }
}

/// Renders a report as text, for tests of command output
#[cfg(test)]
pub fn render_text<R: TextReport>(report: &R) -> String {
    let mut buffer = Vec::new();
    Output::new(OutputFormat::Text)
        .write_report(&mut buffer, report)
        .unwrap();
    String::from_utf8(buffer).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Summary {
        name: &'static str,
        items: Vec<&'static str>,
    }

    impl TextReport for Summary {
        fn write_text(&self, out: &mut TextWriter<'_>) -> io::Result<()> {
            out.field("Name", self.name)?;
            out.section("Items", &self.items)
        }
    }

    #[test]
    fn text_uses_fields_and_sections() {
        let text = render_text(&Summary {
            name: "shop",
            items: vec!["a", "b"],
        });
        assert_eq!(text, "Name:              shop\n\nItems:\n  a\n  b\n");
    }

    #[test]
    fn empty_section_is_omitted() {
        let text = render_text(&Summary { name: "shop", items: vec![] });
        assert_eq!(text, "Name:              shop\n");
    }

    #[test]
    fn json_is_one_line() {
        let mut buffer = Vec::new();
        Output::new(OutputFormat::Json)
            .write_report(&mut buffer, &Summary { name: "shop", items: vec!["a"] })
            .unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "{\"name\":\"shop\",\"items\":[\"a\"]}\n");
    }
}
