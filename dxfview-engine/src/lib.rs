pub mod filter;
pub mod index;
pub mod library;
pub mod svg;
pub mod view;

pub mod errors {
    use std::path::PathBuf;

    use dxfview_io::IoError;
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum IndexError {
        #[error("drawing root {path:?} is not a readable directory")]
        NotADirectory { path: PathBuf },
        #[error("failed to scan {path:?}: {source}")]
        Walk {
            path: PathBuf,
            #[source]
            source: walkdir::Error,
        },
    }

    #[derive(Debug, Error)]
    pub enum LibraryError {
        #[error("invalid filename {0:?}")]
        InvalidInput(String),
        #[error("file {0:?} not found")]
        NotFound(PathBuf),
        #[error("failed to parse {path:?}: {source}")]
        Parse {
            path: PathBuf,
            #[source]
            source: IoError,
        },
        #[error("failed to export document: {source}")]
        Export {
            #[source]
            source: IoError,
        },
        #[error(transparent)]
        Index(#[from] IndexError),
    }
}

pub use filter::{FilterOptions, filter_document};
pub use index::{TreeNode, list_files};
pub use library::DrawingLibrary;
pub use view::{Canvas, ViewTransform, compute_bounding_box, render};
