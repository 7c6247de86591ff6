use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use lopdf::{self, content::Content};

use crate::cmap::ToUnicodeMap;
use crate::PdfError;

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

/// US Letter height, used when a page has no resolvable MediaBox.
pub const DEFAULT_PAGE_HEIGHT: f32 = 792.0;

/// A content-stream operand, detached from `lopdf::Object`.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Number(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

impl PdfValue {
    pub fn number(&self) -> Option<f32> {
        match self {
            PdfValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl From<&lopdf::Object> for PdfValue {
    fn from(obj: &lopdf::Object) -> Self {
        match obj {
            lopdf::Object::Null => PdfValue::Null,
            lopdf::Object::Integer(i) => PdfValue::Number(*i as f32),
            lopdf::Object::Real(f) => PdfValue::Number(*f),
            lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
            lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
            lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(PdfValue::from).collect()),
            _ => PdfValue::Other,
        }
    }
}

/// How the shown bytes of one font resource turn into text.
#[derive(Debug, Clone, Default)]
pub struct FontDecoder {
    /// Encoding name, when the font declares it by name.
    pub encoding: Option<String>,
    pub to_unicode: Option<ToUnicodeMap>,
}

impl FontDecoder {
    fn is_identity(&self) -> bool {
        self.encoding
            .as_deref()
            .is_some_and(|enc| enc.starts_with("Identity"))
    }

    /// Decode shown bytes: ToUnicode first, then Identity-H as UTF-16BE, then
    /// [`decode_text_simple`].
    pub fn decode(&self, bytes: &[u8]) -> String {
        if let Some(cmap) = self.to_unicode.as_ref().filter(|m| !m.is_empty()) {
            let decoded = cmap.decode(bytes);
            if !decoded.is_empty() {
                return decoded;
            }
        }

        if self.is_identity() && !bytes.is_empty() && bytes.len().is_multiple_of(2) {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            let decoded = String::from_utf16_lossy(&units);
            if !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                return decoded;
            }
        }

        decode_text_simple(bytes)
    }
}

/// Decode string bytes without font information.
///
/// UTF-16BE with a BOM, then UTF-8, then Latin-1.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let [0xFE, 0xFF, payload @ ..] = bytes {
        let units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// The document operations token extraction needs.
///
/// Implemented by [`LopdfBackend`] and by in-memory mocks in tests.
pub trait PdfBackend {
    /// 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Page height in points, from the (possibly inherited) MediaBox.
    fn page_height(&self, page: PageId) -> f32;

    /// The page's decoded content-stream operations.
    fn page_operations(&self, page: PageId) -> Result<Vec<ContentOp>, PdfError>;

    /// Decode bytes shown with the font resource `font` on `page`.
    fn decode_text(&self, page: PageId, font: &[u8], bytes: &[u8]) -> String;
}

pub struct LopdfBackend {
    doc: lopdf::Document,
    fonts: RefCell<HashMap<PageId, HashMap<Vec<u8>, FontDecoder>>>,
}

impl LopdfBackend {
    pub fn load_bytes(data: &[u8]) -> Result<Self, PdfError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(PdfError::Encrypted);
        }

        Ok(Self {
            doc,
            fonts: RefCell::new(HashMap::new()),
        })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> Option<&'a lopdf::Object> {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn number(&self, obj: &lopdf::Object) -> Option<f32> {
        match self.resolve(obj)? {
            lopdf::Object::Integer(i) => Some(*i as f32),
            lopdf::Object::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Walk up the page tree until a MediaBox is found.
    fn media_box(&self, page: PageId) -> Option<[f32; 4]> {
        let mut dict = self.doc.get_object(page).ok()?.as_dict().ok()?;
        // Page trees are shallow; the bound guards against Parent cycles.
        for _ in 0..32 {
            if let Some(arr) = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| self.resolve(obj))
                .and_then(|obj| obj.as_array().ok())
            {
                let nums: Vec<f32> = arr.iter().filter_map(|o| self.number(o)).collect();
                if let [llx, lly, urx, ury] = nums.as_slice() {
                    return Some([*llx, *lly, *urx, *ury]);
                }
            }
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            dict = self.doc.get_object(parent).ok()?.as_dict().ok()?;
        }
        None
    }

    fn to_unicode(&self, font: &lopdf::Dictionary) -> Option<ToUnicodeMap> {
        let obj = self.resolve(font.get(b"ToUnicode").ok()?)?;
        let stream = obj.as_stream().ok()?;
        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        Some(ToUnicodeMap::parse(&data))
    }

    fn load_page_fonts(&self, page: PageId) -> HashMap<Vec<u8>, FontDecoder> {
        let fonts = match self.doc.get_page_fonts(page) {
            Ok(fonts) => fonts,
            Err(e) => {
                log::warn!("cannot read fonts of page {:?}: {}", page, e);
                return HashMap::new();
            }
        };

        fonts
            .into_iter()
            .map(|(name, dict)| {
                let encoding = dict.get(b"Encoding").ok().and_then(|o| match o {
                    lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                    _ => None,
                });
                let to_unicode = self.to_unicode(dict);
                log::trace!(
                    "font {} on page {:?}: encoding {:?}, ToUnicode {}",
                    String::from_utf8_lossy(&name),
                    page,
                    encoding,
                    to_unicode.is_some()
                );
                (
                    name,
                    FontDecoder {
                        encoding,
                        to_unicode,
                    },
                )
            })
            .collect()
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_height(&self, page: PageId) -> f32 {
        match self.media_box(page) {
            Some([_, lly, _, ury]) => ury - lly,
            None => {
                log::warn!("no MediaBox for page {:?}, assuming Letter", page);
                DEFAULT_PAGE_HEIGHT
            }
        }
    }

    fn page_operations(&self, page: PageId) -> Result<Vec<ContentOp>, PdfError> {
        let data = self
            .doc
            .get_page_content(page)
            .map_err(|e| PdfError::Parse(format!("cannot get page content: {}", e)))?;
        let content = Content::decode(&data)
            .map_err(|e| PdfError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .iter()
            .map(|op| ContentOp {
                operator: op.operator.clone(),
                operands: op.operands.iter().map(PdfValue::from).collect(),
            })
            .collect())
    }

    fn decode_text(&self, page: PageId, font: &[u8], bytes: &[u8]) -> String {
        let mut cache = self.fonts.borrow_mut();
        let fonts = cache
            .entry(page)
            .or_insert_with(|| self.load_page_fonts(page));
        match fonts.get(font) {
            Some(decoder) => decoder.decode(bytes),
            None => decode_text_simple(bytes),
        }
    }
}
