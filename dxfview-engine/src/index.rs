use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::IndexError;

/// 目录树节点，JSON 中以 `type` 区分 `folder` / `file`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Folder {
        name: String,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
        /// 相对根目录、以 `/` 分隔的路径。
        path: String,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Folder { name, .. } | TreeNode::File { name, .. } => name,
        }
    }
}

/// 递归列出根目录下的子目录与匹配扩展名的文件，同级按名称排序。
///
/// 不含匹配文件的子目录同样保留（`children` 为空）。任一目录不可读即整体失败。
pub fn list_files(root: &Path, extension: &str) -> Result<Vec<TreeNode>, IndexError> {
    if !root.is_dir() {
        return Err(IndexError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let suffix = format!(".{}", extension.trim_start_matches('.').to_ascii_lowercase());
    // 栈中每层对应一个尚未闭合的目录：(名称, 已收集的子节点)。
    let mut stack: Vec<(String, Vec<TreeNode>)> = vec![(String::new(), Vec::new())];

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|source| IndexError::Walk {
            path: source
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            source,
        })?;

        while stack.len() > entry.depth() {
            close_folder(&mut stack);
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().is_dir() {
            stack.push((name, Vec::new()));
        } else if name.to_ascii_lowercase().ends_with(&suffix) {
            let path = relative_path(root, entry.path(), &name);
            if let Some((_, children)) = stack.last_mut() {
                children.push(TreeNode::File { name, path });
            }
        } else {
            debug!(path = %entry.path().display(), "忽略扩展名不匹配的文件");
        }
    }

    while stack.len() > 1 {
        close_folder(&mut stack);
    }
    Ok(stack.pop().map(|(_, children)| children).unwrap_or_default())
}

fn close_folder(stack: &mut Vec<(String, Vec<TreeNode>)>) {
    if let Some((name, children)) = stack.pop() {
        if let Some((_, parent)) = stack.last_mut() {
            parent.push(TreeNode::Folder { name, children });
        }
    }
}

fn relative_path(root: &Path, path: &Path, fallback: &str) -> String {
    path.strip_prefix(root)
        .map(|relative| relative.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "0\nEOF\n").unwrap();
    }

    #[test]
    fn nested_tree_keeps_folders_and_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.dxf"));
        touch(&root.join("a.txt"));
        touch(&root.join("plans/level1/floor.DXF"));
        touch(&root.join("plans/site.dxf"));
        fs::create_dir_all(root.join("empty")).unwrap();

        let tree = list_files(root, "dxf").expect("scan");
        assert_eq!(
            tree,
            vec![
                TreeNode::File {
                    name: "b.dxf".into(),
                    path: "b.dxf".into(),
                },
                TreeNode::Folder {
                    name: "empty".into(),
                    children: vec![],
                },
                TreeNode::Folder {
                    name: "plans".into(),
                    children: vec![
                        TreeNode::Folder {
                            name: "level1".into(),
                            children: vec![TreeNode::File {
                                name: "floor.DXF".into(),
                                path: "plans/level1/floor.DXF".into(),
                            }],
                        },
                        TreeNode::File {
                            name: "site.dxf".into(),
                            path: "plans/site.dxf".into(),
                        },
                    ],
                },
            ]
        );
    }

    #[test]
    fn folder_with_only_foreign_files_has_no_children() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("docs/readme.md"));
        touch(&dir.path().join("docs/drawing.dwg"));

        let tree = list_files(dir.path(), "dxf").unwrap();
        assert_eq!(
            tree,
            vec![TreeNode::Folder {
                name: "docs".into(),
                children: vec![],
            }]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_files(&dir.path().join("nope"), "dxf").unwrap_err();
        assert!(matches!(err, IndexError::NotADirectory { .. }));
    }

    #[test]
    fn leading_dot_extension_and_json_shape() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("sub/part.dxf"));

        let tree = list_files(dir.path(), ".dxf").unwrap();
        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value[0]["type"], "folder");
        assert_eq!(value[0]["name"], "sub");
        assert_eq!(value[0]["children"][0]["type"], "file");
        assert_eq!(value[0]["children"][0]["path"], "sub/part.dxf");
    }
}
