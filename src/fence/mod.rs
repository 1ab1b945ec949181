mod extractor;

pub use extractor::{
    extract,
    extract_from_reader,
    is_fence,
    CodeFenceExtractor,
    ExtractMode,
    ExtractSummary,
    Flow,
};
