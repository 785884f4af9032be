//! Plain-text rendering of articles for the terminal front-end.

use chrono::{DateTime, Utc};

use crate::storage::Article;
use crate::views::{read_time_label, Notice, NoticeLevel};

const MAX_COL_WIDTH: usize = 48;
const EXCERPT_LEN: usize = 60;

/// ASCII table of a list page with a footer line.
pub fn render_article_table(items: &[Article], page: u32, total_pages: u32, total_count: usize) -> String {
    let cols: Vec<String> = ["id", "title", "excerpt", "author", "created", "read"].iter().map(|s| s.to_string()).collect();
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|a| {
            vec![
                a.id.clone(),
                a.title.clone(),
                excerpt(&a.content, EXCERPT_LEN),
                short_id(&a.owner_id),
                format_date(&a.created_at),
                read_time_label(&a.content),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = cols.iter().map(|c| c.chars().count()).collect();
    for r in &rows {
        for (i, cell) in r.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count().min(MAX_COL_WIDTH));
        }
    }

    let sep = build_separator(&widths);
    let mut out = Vec::with_capacity(rows.len() + 5);
    out.push(sep.clone());
    out.push(build_row(&cols, &widths));
    out.push(sep.clone());
    for r in &rows { out.push(build_row(r, &widths)); }
    out.push(sep);
    out.push(format!("page {} of {}, {} article(s)", page, total_pages.max(1), total_count));
    out.join("\n")
}

/// Full article view.
pub fn render_article(article: &Article, can_mutate: bool) -> String {
    let mut out = vec![
        article.title.clone(),
        "=".repeat(article.title.chars().count().clamp(3, 72)),
        format!("by {} on {} · {}", short_id(&article.owner_id), format_date(&article.created_at), read_time_label(&article.content)),
        String::new(),
        article.content.clone(),
    ];
    if can_mutate {
        out.push(String::new());
        out.push(format!("[edit {0}] [delete {0}]", article.id));
    }
    out.join("\n")
}

pub fn render_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "info",
        NoticeLevel::Error => "error",
    };
    format!("[{}] {}", tag, notice.text)
}

pub fn format_date(ts: &DateTime<Utc>) -> String { ts.format("%b %-d, %Y").to_string() }

/// First `max` characters of `content` on one line.
pub fn excerpt(content: &str, max: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&flat, max)
}

fn short_id(id: &str) -> String { id.chars().take(8).collect() }

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('+');
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::new();
    s.push('|');
    for (i, w) in widths.iter().enumerate() {
        let text = truncate(cells.get(i).map(String::as_str).unwrap_or(""), *w);
        s.push(' ');
        s.push_str(&text);
        s.push_str(&" ".repeat(w.saturating_sub(text.chars().count())));
        s.push_str(" |");
    }
    s
}

fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max { return s.to_string(); }
    if max <= 1 { return "…".to_string(); }
    s.chars().take(max - 1).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn article(title: &str, content: &str) -> Article {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap();
        Article { id: "a1".into(), title: title.into(), content: content.into(), owner_id: "0123456789".into(), created_at: ts, updated_at: ts }
    }

    #[test]
    fn table_has_header_rows_and_footer() {
        let out = render_article_table(&[article("Hello", "one two")], 1, 1, 1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[1].contains("title"));
        assert!(lines[3].contains("Hello") && lines[3].contains("01234567") && lines[3].contains("1 min read"));
        assert_eq!(lines[5], "page 1 of 1, 1 article(s)");
    }

    #[test]
    fn long_cells_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(excerpt("a\n\nb   c", 10), "a b c");
    }

    #[test]
    fn detail_offers_actions_only_when_allowed() {
        let a = article("Hello", "body");
        assert!(render_article(&a, true).contains("[edit a1]"));
        assert!(!render_article(&a, false).contains("[edit"));
        assert!(render_article(&a, false).contains("Mar 5, 2024"));
    }
}
