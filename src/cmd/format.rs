/*!
format.rs

Terminal formatting for the human-readable output of `mcp tools` and
`mcp claude list`. JSON output paths never go through here.

  - StyleOptions::detect() honours NO_COLOR, NO_EMOJI and COLUMNS.
  - box_header(title, subtitle, style) draws a one-line framed title.
  - table(headers, rows, style) lays out columns, shrinking the widest
    ones first when the terminal is too narrow.
*/

use std::borrow::Cow;

#[derive(Debug, Clone)]
pub struct StyleOptions {
    pub use_color: bool,
    pub use_emoji: bool,
    pub term_width: usize,
}

impl StyleOptions {
    pub fn detect() -> Self {
        let term_width = std::env::var("COLUMNS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .map(|w| w.clamp(40, 220))
            .unwrap_or(100);
        StyleOptions {
            use_color: std::env::var_os("NO_COLOR").is_none(),
            use_emoji: std::env::var_os("NO_EMOJI").is_none(),
            term_width,
        }
    }

    /// No color, no emoji, fixed width.
    pub fn plain(term_width: usize) -> Self {
        StyleOptions {
            use_color: false,
            use_emoji: false,
            term_width,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Secondary,
    Accent,
    Success,
    Dim,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45",
        Role::Secondary => "38;5;250",
        Role::Accent => "38;5;213",
        Role::Success => "38;5;82",
        Role::Dim => "2",
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

pub fn emoji(tag: &str, style: &StyleOptions) -> &'static str {
    if !style.use_emoji {
        return "";
    }
    match tag {
        "success" => "✔",
        "info" => "ℹ",
        "tool" => "🛠",
        "list" => "📜",
        _ => "",
    }
}

/// Title (and optional subtitle) inside a light box, clipped to the terminal width.
pub fn box_header(title: &str, subtitle: Option<&str>, style: &StyleOptions) -> String {
    let plain = match subtitle {
        Some(sub) => format!("{title}  {sub}"),
        None => title.to_string(),
    };
    let max_inner = style.term_width.saturating_sub(4).max(10);
    let plain = truncate_ellipsis(&plain, max_inner);
    let inner_width = display_width(&plain);

    let styled = match plain.split_once("  ") {
        Some((t, s)) if subtitle.is_some() => format!(
            "{}  {}",
            color(Role::Primary, t, style),
            color(Role::Secondary, s, style)
        ),
        _ => color(Role::Primary, &plain, style),
    };

    let bar = "─".repeat(inner_width + 2);
    format!("┌{bar}┐\n│ {styled} │\n└{bar}┘")
}

pub fn table(headers: &[&str], rows: &[Vec<String>], style: &StyleOptions) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(cols) {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let total: usize = widths.iter().sum::<usize>() + (cols - 1) * 2;
    if total > style.term_width {
        let mut overflow = total - style.term_width;
        let mut order: Vec<usize> = (0..cols).collect();
        order.sort_by(|a, b| widths[*b].cmp(&widths[*a]));
        for i in order {
            if overflow == 0 {
                break;
            }
            let shrink = widths[i].saturating_sub(4).min(overflow);
            widths[i] -= shrink;
            overflow -= shrink;
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(render_row(headers.iter().copied(), &widths, |c| color(Role::Accent, c, style)));
    lines.push(color(
        Role::Dim,
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "),
        style,
    ));
    for row in rows {
        let cells = (0..cols).map(|i| row.get(i).map(String::as_str).unwrap_or(""));
        lines.push(render_row(cells, &widths, str::to_string));
    }
    lines.join("\n")
}

fn render_row<'a>(
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
    paint: impl Fn(&str) -> String,
) -> String {
    let rendered: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| paint(&pad(&truncate_ellipsis(cell, w), w)))
        .collect();
    rendered.join("  ").trim_end().to_string()
}

fn pad(s: &str, width: usize) -> String {
    let len = display_width(s);
    if len >= width {
        s.to_string()
    } else {
        format!("{s}{}", " ".repeat(width - len))
    }
}

pub fn truncate_ellipsis(s: &str, max_chars: usize) -> String {
    if display_width(s) <= max_chars {
        return s.to_string();
    }
    if max_chars <= 1 {
        return "…".repeat(max_chars);
    }
    let mut out: String = strip_ansi(s).chars().take(max_chars - 1).collect();
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    if !s.contains('\x1b') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    Cow::Owned(out)
}

fn display_width(s: &str) -> usize {
    strip_ansi(s).chars().count()
}
