use std::path::{Component, Path, PathBuf};

use dxfview_core::document::Document;
use dxfview_io::{DocumentLoader, DocumentSaver, DxfFacade};
use tracing::{debug, warn};

use crate::errors::LibraryError;
use crate::filter::{FilterOptions, filter_document};
use crate::index::{TreeNode, list_files};

/// 图纸目录：负责列举、路径校验、加载过滤与导出。
#[derive(Debug, Clone)]
pub struct DrawingLibrary<F = DxfFacade> {
    root: PathBuf,
    extension: String,
    filter: FilterOptions,
    facade: F,
}

impl DrawingLibrary<DxfFacade> {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>, filter: FilterOptions) -> Self {
        Self::with_facade(root, extension, filter, DxfFacade::new())
    }
}

impl<F> DrawingLibrary<F>
where
    F: DocumentLoader + DocumentSaver,
{
    pub fn with_facade(
        root: impl Into<PathBuf>,
        extension: impl Into<String>,
        filter: FilterOptions,
        facade: F,
    ) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            filter,
            facade,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn list_files(&self) -> Result<Vec<TreeNode>, LibraryError> {
        let tree = list_files(&self.root, &self.extension)?;
        debug!(root = %self.root.display(), entries = tree.len(), "已扫描图纸目录");
        Ok(tree)
    }

    /// 将客户端提供的相对路径映射到根目录下。
    ///
    /// 含 `..` 的路径一律拒绝；绝对路径的根部分被丢弃，仍落在根目录内。
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, LibraryError> {
        if relative.contains("..") {
            warn!(filename = relative, "拒绝包含 .. 的路径");
            return Err(LibraryError::InvalidInput(relative.to_string()));
        }

        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    return Err(LibraryError::InvalidInput(relative.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    /// 加载并精简一张图纸。
    pub fn load_and_filter(&self, relative: &str) -> Result<Document, LibraryError> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(LibraryError::NotFound(path));
        }

        let mut document = self
            .facade
            .load(&path)
            .map_err(|source| LibraryError::Parse {
                path: path.clone(),
                source,
            })?;
        let summary = filter_document(&mut document, &self.filter);
        debug!(
            path = %path.display(),
            blocks = summary.blocks,
            emptied = summary.emptied_blocks,
            removed_top_level = summary.removed_top_level,
            "图纸加载完成"
        );
        Ok(document)
    }

    /// 将文档中的全部多段线编码为 DXF 字节。
    pub fn export_filtered(&self, document: &Document) -> Result<Vec<u8>, LibraryError> {
        self.facade
            .encode(document)
            .map_err(|source| LibraryError::Export { source })
    }
}
