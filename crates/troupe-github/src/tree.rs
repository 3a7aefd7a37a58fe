// Codebase tree rendering
//
// Workflows get an indented listing of the repository as an input, so agents
// can orient themselves without filesystem access.

use std::path::Path;

use troupe_core::{Error, Result};

const IGNORED: &[&str] = &[".git", "node_modules", "target", "__pycache__"];

/// Render the directory tree under `root` as an indented listing
pub fn build_codebase_tree(root: &Path) -> Result<String> {
    let mut out = String::new();
    render_dir(root, 0, &mut out)?;
    Ok(out)
}

fn render_dir(dir: &Path, depth: usize, out: &mut String) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| Error::Generic(anyhow::anyhow!("read {dir:?}: {e}")))?
        .filter_map(|entry| entry.ok())
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if IGNORED.contains(&name.as_ref()) {
            continue;
        }
        let path = entry.path();
        for _ in 0..depth {
            out.push_str("  ");
        }
        if path.is_dir() {
            out.push_str(&name);
            out.push_str("/\n");
            render_dir(&path, depth + 1, out)?;
        } else {
            out.push_str(&name);
            out.push('\n');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_lists_files_with_indentation_and_skips_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "").unwrap();

        let tree = build_codebase_tree(dir.path()).unwrap();
        assert_eq!(tree, "Cargo.toml\nsrc/\n  main.rs\n");
    }
}
