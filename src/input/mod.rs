//! Input processing module
//! Handles source enumeration, file detection, and text extraction

pub mod file_detector;
pub mod ocr;
pub mod source;
pub mod text_extractor;

pub use source::{InputDocument, InputSource};
pub use text_extractor::{ExtractedText, TextExtractor};
