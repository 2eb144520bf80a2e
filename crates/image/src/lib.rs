#![doc = include_str!("../README.md")]

pub mod error;
pub mod scanner;
pub mod source;

// --- 주요 타입 re-export ---

pub use error::ImageScanError;
pub use scanner::{ImageScanOptions, ImageScanSummary, ImageScanner};
pub use source::{BollardImageSource, ImageRef, ImageSource, unpack_filesystem};
