//! Weekly summary: grouping of accumulated rows and report rendering.
//!
//! The report uses Telegram's HTML parse mode: project names in `<b>`, totals
//! in `<i>`, numbers with a comma decimal separator.

use crate::extract::SubmissionBatch;
use serde::Serialize;
use std::collections::BTreeMap;

/// Sent instead of a report when nothing was submitted during the period.
pub const NO_SUBMISSIONS: &str = "На этой неделе заявок не поступило.";

/// Opening lines of every non-empty report.
pub const REPORT_HEADER: &str = "Доброе утро!\nОбщая заявка от Проектной группы:\n\n";

/// Maximum length of a single Telegram message, in characters.
pub const MESSAGE_LIMIT: usize = 4096;

/// Total FTE for one (project, resource) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub project: String,
    pub resource_name: String,
    pub total_fte: f64,
}

/// Totals are rounded to this many decimal places, which removes binary
/// rounding noise such as `0.6000000000000001`.
const TOTAL_DECIMALS: i32 = 9;

/// Compensated (Neumaier) running sum.
#[derive(Debug, Default, Clone, Copy)]
struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    fn total(self) -> f64 {
        round_total(self.sum + self.compensation)
    }
}

fn round_total(value: f64) -> f64 {
    let scale = 10f64.powi(TOTAL_DECIMALS);
    let rounded = (value * scale).round() / scale;
    if rounded.is_finite() { rounded } else { value }
}

/// Groups every row of every batch by (project, resource) and sums FTE.
///
/// Rows come back sorted by project, then resource. Totals do not depend on
/// the order the batches arrived in.
pub fn group_totals(batches: &[SubmissionBatch]) -> Vec<SummaryRow> {
    let mut totals: BTreeMap<(&str, &str), CompensatedSum> = BTreeMap::new();

    for row in batches.iter().flat_map(|b| &b.rows) {
        totals
            .entry((row.project.as_str(), row.resource_name.as_str()))
            .or_default()
            .add(row.fte);
    }

    totals
        .into_iter()
        .map(|((project, resource_name), sum)| SummaryRow {
            project: project.to_string(),
            resource_name: resource_name.to_string(),
            total_fte: sum.total(),
        })
        .collect()
}

/// Builds the report text for the given batches.
pub fn summarize(batches: &[SubmissionBatch]) -> String {
    if batches.is_empty() {
        return NO_SUBMISSIONS.to_string();
    }
    render(&group_totals(batches))
}

/// Renders grouped rows, one bold heading per project.
pub fn render(rows: &[SummaryRow]) -> String {
    let mut text = String::from(REPORT_HEADER);
    let mut current_project: Option<&str> = None;

    for row in rows {
        if current_project != Some(row.project.as_str()) {
            if current_project.is_some() {
                text.push('\n');
            }
            text.push_str(&format!("<b>{}</b>\n", escape_html(&row.project)));
            current_project = Some(&row.project);
        }
        text.push_str(&format!(
            "{} - <i>{}</i>\n",
            escape_html(&row.resource_name),
            format_fte(row.total_fte)
        ));
    }

    text
}

/// Formats a number with a comma decimal separator. Whole numbers keep one
/// fractional digit (`1` becomes `1,0`).
pub fn format_fte(value: f64) -> String {
    let plain = if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    };
    plain.replace('.', ",")
}

/// Escapes the characters Telegram's HTML mode treats as markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Splits `text` into chunks of at most `limit` characters, breaking on line
/// boundaries. A single line longer than `limit` is cut with
/// [`split_markup_line`] so every chunk stays valid HTML.
pub fn paginate(text: &str, limit: usize) -> Vec<String> {
    let mut pages = Vec::new();
    let mut page = String::new();
    let mut page_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();

        if page_len + line_len > limit && !page.is_empty() {
            pages.push(std::mem::take(&mut page));
            page_len = 0;
        }

        if line_len > limit {
            pages.extend(split_markup_line(line, limit));
            continue;
        }

        page.push_str(line);
        page_len += line_len;
    }

    if !page.is_empty() {
        pages.push(page);
    }
    pages
}

/// Cuts one line of markup into pieces of at most `limit` characters.
///
/// Tags and entities are never split. Tags still open at a cut are closed at
/// the end of the piece and reopened at the start of the next one. A trailing
/// newline is kept only if it fits in the last piece.
pub fn split_markup_line(line: &str, limit: usize) -> Vec<String> {
    let (body, newline) = match line.strip_suffix('\n') {
        Some(body) => (body, true),
        None => (line, false),
    };

    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_len = 0;
    let mut reopened_len = 0;
    let mut open: Vec<&str> = Vec::new();

    for atom in markup_atoms(body) {
        let atom_len = atom.chars().count();
        // Closers for open tags are already counted in the reserve.
        let closes_open = closing_tag(atom).is_some_and(|name| open.contains(&name));
        let mut reserve: usize = open.iter().map(|t| t.len() + 3).sum();
        if let Some(name) = opening_tag(atom) {
            // Room for the closer and at least one character inside.
            reserve += name.len() + 4;
        }

        if !closes_open && piece_len + atom_len + reserve > limit && piece_len > reopened_len {
            for tag in open.iter().rev() {
                piece.push_str(&format!("</{tag}>"));
            }
            pieces.push(std::mem::take(&mut piece));

            for tag in &open {
                piece.push_str(&format!("<{tag}>"));
            }
            piece_len = piece.chars().count();
            reopened_len = piece_len;
        }

        if let Some(name) = opening_tag(atom) {
            open.push(name);
        } else if let Some(name) = closing_tag(atom) {
            if let Some(pos) = open.iter().rposition(|t| *t == name) {
                open.remove(pos);
            }
        }

        piece.push_str(atom);
        piece_len += atom_len;
    }

    if piece_len > reopened_len {
        pieces.push(piece);
    }
    if newline {
        if let Some(last) = pieces.last_mut().filter(|p| p.chars().count() < limit) {
            last.push('\n');
        }
    }
    pieces
}

/// Splits markup into tags (`<b>`), entities (`&amp;`) and single characters.
fn markup_atoms(line: &str) -> Vec<&str> {
    let mut atoms = Vec::new();
    let mut rest = line;

    while let Some(c) = rest.chars().next() {
        let end = match c {
            '<' => rest.find('>').map(|i| i + 1),
            '&' => rest.find(';').map(|i| i + 1).filter(|&i| i <= 10),
            _ => None,
        }
        .unwrap_or(c.len_utf8());

        let (atom, tail) = rest.split_at(end);
        atoms.push(atom);
        rest = tail;
    }
    atoms
}

fn opening_tag(atom: &str) -> Option<&str> {
    let name = atom.strip_prefix('<')?.strip_suffix('>')?;
    (!name.starts_with('/') && !name.is_empty()).then_some(name)
}

fn closing_tag(atom: &str) -> Option<&str> {
    atom.strip_prefix("</")?.strip_suffix('>')
}
