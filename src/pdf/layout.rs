// src/pdf/layout.rs
//! Positional text layout and table detection.
//!
//! Walks a page's content stream, places every text-showing operator on
//! the page through the text and graphics matrices, then rebuilds lines and
//! cells from the positions. Glyph widths are estimated (half an em per
//! character) since font metrics are not loaded; column gaps in real
//! tables are wide enough that the estimate does not matter.
//!
//! String operands are decoded with the encoding of the font selected by
//! `Tf`, the same way lopdf decodes the page text, so cells and text agree.

use std::collections::BTreeMap;

use lopdf::content::Operation;
use lopdf::{Document, Object};
use once_cell::sync::Lazy;
use regex::Regex;

// --- Constants ---
const DEFAULT_FONT_SIZE: f32 = 12.0;
/// Estimated glyph advance, in em.
const GLYPH_WIDTH_EM: f32 = 0.5;
/// TJ adjustments larger than this (thousandths of an em) count as a word break.
const TJ_SPACE_THRESHOLD: f32 = 200.0;
/// Fragments on baselines closer than this fraction of the font size share a line.
const LINE_TOLERANCE_EM: f32 = 0.5;
/// A horizontal gap wider than this starts a new cell.
const CELL_GAP_EM: f32 = 1.2;
/// Gaps narrower than this join fragments without a space.
const WORD_GAP_EM: f32 = 0.15;
/// Vertical distance between table rows beyond which a table is split.
const ROW_BREAK_EM: f32 = 4.0;
/// Cell starts within this distance belong to the same column.
const COLUMN_TOLERANCE_EM: f32 = 1.0;
/// lopdf cannot decode this encoding without the font's CMap.
const IDENTITY_H: &str = "Identity-H";

/// Encoding name of each font resource on a page, keyed by resource name (`F1`).
pub type FontEncodings = BTreeMap<Vec<u8>, String>;

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile WHITESPACE_RE"));

/// A run of text placed on the page, in device space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub size: f32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    fn translate(tx: f32, ty: f32) -> Self {
        Matrix { e: tx, f: ty, ..Self::IDENTITY }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        let v: Vec<f32> = operands.iter().filter_map(number).collect();
        if v.len() != 6 {
            return None;
        }
        Some(Matrix { a: v[0], b: v[1], c: v[2], d: v[3], e: v[4], f: v[5] })
    }

    /// `self × other`, PDF row-vector convention.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn vertical_scale(&self) -> f32 {
        self.c.hypot(self.d)
    }
}

/// Text state tracked while walking a content stream.
struct TextState {
    ctm: Matrix,
    saved: Vec<Matrix>,
    tm: Matrix,
    tlm: Matrix,
    font_size: f32,
    leading: f32,
    encoding: Option<String>,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            font_size: DEFAULT_FONT_SIZE,
            leading: 0.0,
            encoding: None,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// Places `text` at the current position and advances by `advance` text-space units.
    fn show(&mut self, text: String, advance: f32, out: &mut Vec<TextFragment>) {
        let start = self.tm.then(&self.ctm);
        self.tm = Matrix::translate(advance, 0.0).then(&self.tm);
        let end = self.tm.then(&self.ctm);

        if text.trim().is_empty() {
            return;
        }
        out.push(TextFragment {
            x: start.e,
            y: start.f,
            width: (end.e - start.e).abs(),
            size: (self.font_size * start.vertical_scale()).abs().max(1.0),
            text,
        });
    }

    fn advance_for(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.font_size * GLYPH_WIDTH_EM
    }

    /// Decodes a string operand with the current font's encoding.
    fn decode(&self, bytes: &[u8]) -> String {
        match self.encoding.as_deref() {
            Some(encoding) if encoding != IDENTITY_H => Document::decode_text(Some(encoding), bytes),
            _ => decode_string(bytes),
        }
    }
}

fn number(obj: &Object) -> Option<f32> {
    obj.as_float().ok()
}

/// Fallback for strings whose font is unknown: UTF-16BE when it carries a BOM, Latin-1 otherwise.
fn decode_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Places every text-showing operator of a decoded content stream.
pub fn collect_fragments(operations: &[Operation], encodings: &FontEncodings) -> Vec<TextFragment> {
    let mut state = TextState::new();
    let mut fragments = Vec::new();

    for op in operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => state.saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.ctm = m.then(&state.ctm);
                }
            }
            "BT" => {
                state.tm = Matrix::IDENTITY;
                state.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(font)) = operands.first() {
                    state.encoding = encodings.get(font).cloned();
                }
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(number) {
                    state.leading = leading;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    state.tm = m;
                    state.tlm = m;
                }
            }
            "T*" => state.next_line(),
            "Tj" | "'" | "\"" => {
                if op.operator != "Tj" {
                    state.next_line();
                }
                // The string is the last operand for all three operators.
                if let Some(Object::String(bytes, _)) = operands.last() {
                    let text = state.decode(bytes);
                    let advance = state.advance_for(&text);
                    state.show(text, advance, &mut fragments);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let mut text = String::new();
                    let mut advance = 0.0;
                    for item in items {
                        match item {
                            Object::String(bytes, _) => {
                                let piece = state.decode(bytes);
                                advance += state.advance_for(&piece);
                                text.push_str(&piece);
                            }
                            other => {
                                if let Some(adjust) = number(other) {
                                    advance -= adjust / 1000.0 * state.font_size;
                                    if -adjust > TJ_SPACE_THRESHOLD && !text.ends_with(' ') {
                                        text.push(' ');
                                    }
                                }
                            }
                        }
                    }
                    state.show(text, advance, &mut fragments);
                }
            }
            _ => {}
        }
    }

    fragments
}

// --- Lines and cells ---

#[derive(Debug, Clone)]
struct Cell {
    x: f32,
    end: f32,
    text: String,
}

#[derive(Debug, Clone)]
struct Line {
    y: f32,
    size: f32,
    cells: Vec<Cell>,
}

fn clean_cell_text(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Groups fragments into lines (top to bottom) and splits each line into cells.
fn build_lines(fragments: &[TextFragment]) -> Vec<Line> {
    let mut sorted: Vec<&TextFragment> = fragments.iter().collect();
    sorted.sort_by(|a, b| {
        b.y.partial_cmp(&a.y)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut grouped: Vec<(f32, f32, Vec<&TextFragment>)> = Vec::new();
    for frag in sorted {
        match grouped.last_mut() {
            Some((y, size, members))
                if (frag.y - *y).abs() <= size.max(frag.size) * LINE_TOLERANCE_EM =>
            {
                *size = size.max(frag.size);
                members.push(frag);
            }
            _ => grouped.push((frag.y, frag.size, vec![frag])),
        }
    }

    grouped
        .into_iter()
        .map(|(y, size, mut members)| {
            members.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
            let mut cells: Vec<Cell> = Vec::new();
            for frag in members {
                let frag_end = frag.x + frag.width;
                match cells.last_mut() {
                    Some(cell) if frag.x - cell.end <= size * CELL_GAP_EM => {
                        if frag.x - cell.end > size * WORD_GAP_EM {
                            cell.text.push(' ');
                        }
                        cell.text.push_str(&frag.text);
                        cell.end = cell.end.max(frag_end);
                    }
                    _ => cells.push(Cell { x: frag.x, end: frag_end, text: frag.text.clone() }),
                }
            }
            for cell in &mut cells {
                cell.text = clean_cell_text(&cell.text);
            }
            cells.retain(|c| !c.text.is_empty());
            Line { y, size, cells }
        })
        .filter(|line| !line.cells.is_empty())
        .collect()
}

/// Splits lines into runs of consecutive multi-cell lines.
fn table_runs(lines: &[Line]) -> Vec<&[Line]> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;

    for (i, line) in lines.iter().enumerate() {
        let is_row = line.cells.len() >= 2;
        let continues = match (start, i.checked_sub(1).map(|p| &lines[p])) {
            (Some(_), Some(prev)) => {
                is_row && prev.y - line.y <= prev.size.max(line.size) * ROW_BREAK_EM
            }
            _ => false,
        };

        if let Some(s) = start {
            if !continues {
                runs.push(&lines[s..i]);
                start = None;
            }
        }
        if start.is_none() && is_row {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        runs.push(&lines[s..]);
    }

    runs.into_iter().filter(|run| run.len() >= 2).collect()
}

/// Aligns a run of lines on shared column starts.
fn align_run(run: &[Line]) -> Vec<Vec<Option<String>>> {
    let size = run.iter().map(|l| l.size).sum::<f32>() / run.len() as f32;
    let tolerance = size * COLUMN_TOLERANCE_EM;

    let mut starts: Vec<f32> = run.iter().flat_map(|l| l.cells.iter().map(|c| c.x)).collect();
    starts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut anchors: Vec<f32> = Vec::new();
    for x in starts {
        match anchors.last() {
            Some(&anchor) if x - anchor <= tolerance => {}
            _ => anchors.push(x),
        }
    }

    run.iter()
        .map(|line| {
            let mut row: Vec<Option<String>> = vec![None; anchors.len()];
            for cell in &line.cells {
                let column = anchors
                    .iter()
                    .enumerate()
                    .min_by(|(_, a), (_, b)| {
                        (cell.x - **a)
                            .abs()
                            .partial_cmp(&(cell.x - **b).abs())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                match &mut row[column] {
                    Some(existing) => {
                        existing.push(' ');
                        existing.push_str(&cell.text);
                    }
                    slot => *slot = Some(cell.text.clone()),
                }
            }
            row
        })
        .collect()
}

/// Finds the primary table among placed fragments: the candidate holding the most cells.
pub fn detect_table(fragments: &[TextFragment]) -> Option<Vec<Vec<Option<String>>>> {
    let lines = build_lines(fragments);
    let mut best: Option<(usize, Vec<Vec<Option<String>>>)> = None;

    for run in table_runs(&lines) {
        let rows = align_run(run);
        let score = rows.iter().flatten().filter(|c| c.is_some()).count();
        tracing::trace!("Table candidate with {} rows, {} cells", rows.len(), score);
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, rows));
        }
    }

    best.map(|(_, rows)| rows)
}
