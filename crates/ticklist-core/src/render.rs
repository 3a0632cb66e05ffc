use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::view::{TodoRow, ViewKey, VisualState};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self::with_color(color && io::stdout().is_terminal()))
    }

    pub fn with_color(color: bool) -> Self {
        Self { color }
    }

    #[tracing::instrument(skip(self, counts, rows))]
    pub fn print_view(
        &self,
        active: ViewKey,
        counts: [(ViewKey, usize); 3],
        rows: &[TodoRow],
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_view(out, active, counts, rows)
    }

    pub fn write_view<W: Write>(
        &self,
        mut out: W,
        active: ViewKey,
        counts: [(ViewKey, usize); 3],
        rows: &[TodoRow],
    ) -> anyhow::Result<()> {
        let tabs = counts
            .iter()
            .map(|(key, count)| {
                let label = format!("{key} ({count})");
                if *key == active {
                    format!("[{}]", self.paint(&label, "1"))
                } else {
                    format!(" {label} ")
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "{tabs}")?;
        writeln!(out)?;

        if rows.is_empty() {
            writeln!(out, "No todos.")?;
            return Ok(());
        }

        let headers = vec!["ID".to_string(), "Done".to_string(), "Body".to_string()];
        let table = rows
            .iter()
            .map(|row| {
                let cells = [
                    row.todo.id.to_string(),
                    checkbox(row.visual).to_string(),
                    row.todo.body.clone(),
                ];
                let body_codes = style_codes(row.visual, true);
                let row_codes = style_codes(row.visual, false);
                cells
                    .into_iter()
                    .enumerate()
                    .map(|(idx, cell)| {
                        let codes = if idx == 2 { &body_codes } else { &row_codes };
                        match codes {
                            Some(codes) => self.paint(&cell, codes),
                            None => cell,
                        }
                    })
                    .collect()
            })
            .collect();

        write_table(&mut out, headers, table)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn checkbox(visual: VisualState) -> &'static str {
    if visual.checked { "[x]" } else { "[ ]" }
}

/// SGR codes for a cell. Strikethrough only applies to the body text.
fn style_codes(visual: VisualState, body: bool) -> Option<String> {
    let mut codes = Vec::new();
    if visual.emphasized {
        codes.push("100");
    }
    if body && visual.strikethrough {
        codes.push("9");
        codes.push("37");
    }
    if codes.is_empty() {
        None
    } else {
        Some(codes.join(";"))
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::{Status, Todo};

    fn rows() -> Vec<TodoRow> {
        vec![
            TodoRow::from(Todo::new_pending(1, "Buy milk")),
            TodoRow::from(Todo {
                id: 2,
                body: "Café run".to_string(),
                status: Status::Completed,
            }),
        ]
    }

    fn counts() -> [(ViewKey, usize); 3] {
        [(ViewKey::All, 2), (ViewKey::Pending, 1), (ViewKey::Completed, 1)]
    }

    #[test]
    fn plain_output_marks_active_tab_and_checkboxes() {
        let mut buf = Vec::new();
        Renderer::with_color(false)
            .write_view(&mut buf, ViewKey::All, counts(), &rows())
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[all (2)]  pending (1)   completed (1) ");
        assert!(lines[4].starts_with("1  [ ]  Buy milk"));
        assert!(lines[5].starts_with("2  [x]  Café run"));
    }

    #[test]
    fn completed_body_is_struck_through_with_emphasized_background() {
        let mut buf = Vec::new();
        Renderer::with_color(true)
            .write_view(&mut buf, ViewKey::Completed, counts(), &rows()[1..])
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");

        assert!(text.contains("\x1b[100;9;37mCafé run\x1b[0m"));
        assert!(text.contains("\x1b[100m[x]\x1b[0m"));
    }

    #[test]
    fn pending_rows_are_unstyled() {
        let mut buf = Vec::new();
        Renderer::with_color(true)
            .write_view(&mut buf, ViewKey::Pending, counts(), &rows()[..1])
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("Buy milk"));
        assert!(!text.contains("\x1b[100"));
        assert!(!text.contains("\x1b[9"));
    }

    #[test]
    fn color_setting_goes_through_config_parser() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "maybe".to_string())]);
        let err = Renderer::new(&cfg).expect_err("unrecognised color value");
        assert!(err.to_string().contains("invalid color setting: maybe"));

        cfg.apply_overrides(vec![("color".to_string(), "n".to_string())]);
        assert!(!Renderer::new(&cfg).expect("n is off").color);
    }

    #[test]
    fn empty_view_says_so() {
        let mut buf = Vec::new();
        Renderer::with_color(false)
            .write_view(&mut buf, ViewKey::Pending, counts(), &[])
            .expect("render");
        assert!(String::from_utf8(buf).expect("utf8").contains("No todos."));
    }
}
