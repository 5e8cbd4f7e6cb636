use std::fs;
use std::path::Path;

use dxfview_core::document::Document;
use thiserror::Error;

mod reader;
mod writer;

pub use writer::DxfWriter;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait DocumentSaver {
    /// 将文档编码为完整的文件内容。
    fn encode(&self, document: &Document) -> Result<Vec<u8>, IoError>;

    fn save(&self, document: &Document, path: &Path) -> Result<(), IoError> {
        let bytes = self.encode(document)?;
        fs::write(path, bytes).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// DXF 读写入口。读取端只关心 LINE/CIRCLE/ARC/多段线/INSERT，
/// 写出端只输出多段线。
#[derive(Debug, Clone, Copy, Default)]
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 直接从 DXF 文本解析文档。
    pub fn parse_str(&self, source: &str) -> Result<Document, IoError> {
        reader::DxfParser::new(source)
            .parse()
            .map_err(IoError::from)
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let bytes = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        // 旧图纸常用本地代码页（cp1252、GBK 等）保存，无法解码的字节以 U+FFFD 代替。
        self.parse_str(&String::from_utf8_lossy(&bytes))
    }
}

impl DocumentSaver for DxfFacade {
    fn encode(&self, document: &Document) -> Result<Vec<u8>, IoError> {
        let mut writer = DxfWriter::new();
        writer.write_polylines(document)?;
        Ok(writer.finish().into_bytes())
    }
}
