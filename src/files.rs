use std::path::{Path, PathBuf};

pub const REQUESTS: &str = "requests";
pub const ENVIRONMENT: &str = "environment";
pub const FLOWS: &str = "flows";
pub const LOG: &str = "log";

/// Directory holding files of `kind`, optionally scoped to a project.
pub fn kind_root(working_folder: &Path, kind: &str, project: Option<&str>) -> PathBuf {
    project_root(working_folder, project).join(kind)
}

pub fn project_root(working_folder: &Path, project: Option<&str>) -> PathBuf {
    match project {
        Some(project) => working_folder.join(project),
        None => working_folder.to_path_buf(),
    }
}

/// Resolves `name` to an existing file: the name itself when it points at a
/// file, otherwise `{root}[/{project}]/{kind}/{name}.json`.
pub fn find_file(
    working_folder: &Path,
    name: &str,
    kind: &str,
    project: Option<&str>,
) -> Option<PathBuf> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }

    let mut candidate = kind_root(working_folder, kind, project).join(name);
    if candidate.extension().map(|ext| ext != "json").unwrap_or(true) {
        let mut file_name = candidate.as_os_str().to_os_string();
        file_name.push(".json");
        candidate = PathBuf::from(file_name);
    }

    candidate.is_file().then_some(candidate)
}
