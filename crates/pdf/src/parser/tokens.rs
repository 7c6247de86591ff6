//! Content stream → positioned tokens.
//!
//! Walks each page's operators with a reduced PDF text-state machine and
//! emits one [`PositionedToken`] per shown string (or per run of a `TJ`
//! array). Positions are reported the way `pdf2json` reports them: form units
//! of 1/16 point, with `y` measured downward from the top of the page. This is
//! the scale the row threshold and header margin are calibrated against.

use dcbounds_core::PositionedToken;
use unicode_normalization::UnicodeNormalization;

use super::backend::{ContentOp, PageId, PdfBackend, PdfValue};
use crate::PdfError;

/// Points per form unit.
pub const POINTS_PER_FORM_UNIT: f32 = 16.0;

/// Advance of a Latin glyph as a fraction of the font size. There are no
/// glyph metrics here; CJK glyphs are taken as a full em.
const LATIN_WIDTH_RATIO: f32 = 0.5;

/// A `TJ` adjustment wider than this many ems ends the current token.
const TOKEN_SPLIT_EMS: f32 = 1.0;

/// A `TJ` adjustment wider than this many ems between Latin glyphs is a space.
const WORD_GAP_EMS: f32 = 0.2;

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` followed by `n`, in PDF's row-vector convention.
fn concat(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn apply(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn matrix_operands(operands: &[PdfValue]) -> Option<Matrix> {
    let vals: Vec<f32> = operands.iter().take(6).filter_map(PdfValue::number).collect();
    match vals.as_slice() {
        [a, b, c, d, e, f] => Some([*a, *b, *c, *d, *e, *f]),
        _ => None,
    }
}

/// Ideographs, kana, hangul and full-width forms.
pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF
            | 0x3400..=0x4DBF
            | 0x20000..=0x2A6DF
            | 0xF900..=0xFAFF
            | 0x3000..=0x303F
            | 0x3040..=0x30FF
            | 0xAC00..=0xD7AF
            | 0xFF00..=0xFFEF
    )
}

#[derive(Debug, Clone)]
struct TextState {
    font_key: Vec<u8>,
    font_size: f32,
    text_matrix: Matrix,
    line_matrix: Matrix,
    horiz_scale: f32,
    char_spacing: f32,
    word_spacing: f32,
    rise: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font_key: Vec::new(),
            font_size: 0.0,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            rise: 0.0,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn begin_text(&mut self) {
        self.text_matrix = IDENTITY;
        self.line_matrix = IDENTITY;
    }

    fn set_matrix(&mut self, m: Matrix) {
        self.text_matrix = m;
        self.line_matrix = m;
    }

    /// `Td`: offset the start of the current line.
    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = concat(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.leading);
    }

    /// Move right by `dx` unscaled text-space units.
    fn advance(&mut self, dx: f32) {
        self.text_matrix = concat(&[1.0, 0.0, 0.0, 1.0, dx, 0.0], &self.text_matrix);
    }

    fn glyph_advance(&self, c: char) -> f32 {
        let ratio = if is_cjk(c) { 1.0 } else { LATIN_WIDTH_RATIO };
        let mut w = self.font_size * ratio + self.char_spacing;
        if c == ' ' {
            w += self.word_spacing;
        }
        w * self.horiz_scale
    }

    fn advance_over(&mut self, text: &str) {
        let dx = text.chars().map(|c| self.glyph_advance(c)).sum();
        self.advance(dx);
    }

    /// Device-space origin of the next glyph.
    fn origin(&self, ctm: &Matrix) -> (f32, f32) {
        let (x, y) = apply(&self.text_matrix, 0.0, self.rise);
        apply(ctm, x, y)
    }
}

/// Page-level state: graphics stack and output.
struct PageWalker<'a> {
    backend: &'a dyn PdfBackend,
    page: PageId,
    height: f32,
    ctm: Matrix,
    saved: Vec<Matrix>,
    text: TextState,
    tokens: Vec<PositionedToken>,
}

fn form_units(v: f32) -> f64 {
    // pdf2json reports three decimals.
    ((v / POINTS_PER_FORM_UNIT) as f64 * 1000.0).round() / 1000.0
}

impl<'a> PageWalker<'a> {
    fn new(backend: &'a dyn PdfBackend, page: PageId) -> Self {
        Self {
            backend,
            page,
            height: backend.page_height(page),
            ctm: IDENTITY,
            saved: Vec::new(),
            text: TextState::default(),
            tokens: Vec::new(),
        }
    }

    fn decode(&self, operand: &PdfValue) -> String {
        match operand {
            PdfValue::Str(bytes) => self
                .backend
                .decode_text(self.page, &self.text.font_key, bytes),
            _ => String::new(),
        }
    }

    fn emit(&mut self, origin: (f32, f32), raw: &str) {
        let text: String = raw.trim().nfc().collect();
        if text.is_empty() {
            return;
        }
        let (x, y) = origin;
        self.tokens.push(PositionedToken::new(
            form_units(x),
            form_units(self.height - y),
            text,
        ));
    }

    fn show(&mut self, operand: &PdfValue) {
        let text = self.decode(operand);
        let origin = self.text.origin(&self.ctm);
        self.emit(origin, &text);
        self.text.advance_over(&text);
    }

    /// `TJ`: strings interleaved with adjustments in thousandths of an em.
    fn show_array(&mut self, elements: &[PdfValue]) {
        let mut buf = String::new();
        let mut origin = self.text.origin(&self.ctm);

        for element in elements {
            if let Some(adj) = element.number() {
                let ems = -adj / 1000.0;
                self.text.advance(ems * self.text.font_size * self.text.horiz_scale);
                if ems > TOKEN_SPLIT_EMS {
                    self.emit(origin, &buf);
                    buf.clear();
                    origin = self.text.origin(&self.ctm);
                } else if ems > WORD_GAP_EMS
                    && buf.chars().last().is_some_and(|c| !is_cjk(c) && c != ' ')
                {
                    buf.push(' ');
                }
                continue;
            }

            let fragment = self.decode(element);
            if buf.is_empty() {
                origin = self.text.origin(&self.ctm);
            }
            buf.push_str(&fragment);
            self.text.advance_over(&fragment);
        }

        self.emit(origin, &buf);
    }

    fn step(&mut self, op: &ContentOp) {
        let operands = op.operands.as_slice();
        let first_number = || operands.first().and_then(PdfValue::number);

        match op.operator.as_str() {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.ctm = concat(&m, &self.ctm);
                }
            }
            "BT" => self.text.begin_text(),
            "Tf" => {
                if let [PdfValue::Name(key), size, ..] = operands {
                    self.text.font_key = key.clone();
                    self.text.font_size = size.number().unwrap_or(0.0);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.text.set_matrix(m);
                }
            }
            "Td" | "TD" => {
                if let [tx, ty, ..] = operands {
                    let tx = tx.number().unwrap_or(0.0);
                    let ty = ty.number().unwrap_or(0.0);
                    if op.operator == "TD" {
                        self.text.leading = -ty;
                    }
                    self.text.translate_line(tx, ty);
                }
            }
            "T*" => self.text.next_line(),
            "TL" => {
                if let Some(v) = first_number() {
                    self.text.leading = v;
                }
            }
            "Tc" => {
                if let Some(v) = first_number() {
                    self.text.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = first_number() {
                    self.text.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = first_number() {
                    self.text.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = first_number() {
                    self.text.rise = v;
                }
            }
            "Tj" => {
                if let Some(s) = operands.first() {
                    self.show(s);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(elements)) = operands.first() {
                    self.show_array(elements);
                }
            }
            "'" => {
                self.text.next_line();
                if let Some(s) = operands.first() {
                    self.show(s);
                }
            }
            "\"" => {
                if let [aw, ac, s, ..] = operands {
                    self.text.word_spacing = aw.number().unwrap_or(self.text.word_spacing);
                    self.text.char_spacing = ac.number().unwrap_or(self.text.char_spacing);
                    self.text.next_line();
                    self.show(s);
                }
            }
            _ => {}
        }
    }
}

/// Tokens of one page, in content-stream order.
pub fn extract_page_tokens(
    backend: &dyn PdfBackend,
    page: PageId,
) -> Result<Vec<PositionedToken>, PdfError> {
    let ops = backend.page_operations(page)?;
    let mut walker = PageWalker::new(backend, page);
    for op in &ops {
        walker.step(op);
    }
    Ok(walker.tokens)
}

/// Tokens of every page, ordered by page number.
pub fn extract_document_tokens(
    backend: &dyn PdfBackend,
) -> Result<Vec<Vec<PositionedToken>>, PdfError> {
    backend
        .pages()
        .into_iter()
        .map(|(number, page)| {
            let tokens = extract_page_tokens(backend, page)?;
            log::trace!("page {}: {} tokens", number, tokens.len());
            Ok(tokens)
        })
        .collect()
}
