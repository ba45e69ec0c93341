use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::Walk;
use tracing::{debug, warn};

/// Lists the files under `root`, honoring `.gitignore` and hidden-file rules.
///
/// When `include` is set, a file is kept if the glob matches either its path
/// relative to `root` or its bare file name. Results are sorted so the upload
/// order is stable.
pub fn collect_files(root: &Path, include: Option<&str>) -> Result<Vec<PathBuf>, glob::PatternError> {
    let pattern = include
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(Pattern::new)
        .transpose()?;

    let mut files = Vec::new();
    for entry in Walk::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if let Some(pattern) = &pattern {
            let relative = path.strip_prefix(root).unwrap_or(path);
            let name_matches = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !name_matches && !pattern.matches_path(relative) {
                continue;
            }
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    debug!(root = %root.display(), count = files.len(), "collected files");
    Ok(files)
}
