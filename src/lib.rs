//! Turns a delimited flat-file byte stream into a compact cell/content
//! matrix: every distinct cell value is interned through a perfect-hash trie
//! so downstream consumers work with small integers instead of repeatedly
//! allocating and re-parsing the same byte sequences.

mod buffer;
mod config;
pub mod error;
pub mod matrix;
mod tokenizer;
mod trie;
pub mod varint;
pub mod wire;

pub use buffer::FileEncoding;
pub use config::ParserOptions;
pub use error::Error;
pub use matrix::{CellMatrix, ParseDiagnostics, UnexpectedCell};
pub use tokenizer::parse;

#[cfg(any(test, feature = "test"))]
pub mod test_helpers {
    use once_cell::sync::OnceCell;

    static LOGGING: OnceCell<()> = OnceCell::new();

    pub fn enable_logging() {
        LOGGING.get_or_init(|| {
            let _ = env_logger::builder()
                .filter_level(log::LevelFilter::Trace)
                .format_timestamp(None)
                .is_test(true)
                .try_init();
        });
    }
}
