use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfEditError {
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("invalid page selection: {0}")]
    InvalidPages(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),
}
