pub mod backend;
pub mod tokens;

pub use backend::{LopdfBackend, PdfBackend};
pub use tokens::{extract_document_tokens, extract_page_tokens};
