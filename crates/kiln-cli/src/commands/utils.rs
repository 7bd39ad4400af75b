//! Path helpers shared by the commands.

use std::path::{Path, PathBuf};

use crate::error::{BuildError, CliError, Result};

/// Resolve `path` against `cwd` unless it is already absolute.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

pub fn get_cwd() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| {
        CliError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to get current directory: {e}"),
        ))
    })
}

/// The project root: `--cwd` when given, else the working directory.
///
/// # Errors
///
/// `FileNotFound` when the directory does not exist.
pub fn project_root(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = get_cwd()?;
    let root = match explicit {
        Some(dir) => resolve_path(dir, &cwd),
        None => cwd,
    };
    if !root.is_dir() {
        return Err(CliError::FileNotFound(root));
    }
    Ok(root.canonicalize()?)
}

const SYSTEM_DIRS: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/proc", "/sbin", "/sys", "/usr",
    "/var/log",
];

/// Refuse output roots whose replacement would delete something other than
/// a build directory.
///
/// # Errors
///
/// `UnsafeOutputDir` naming the rule that matched.
pub fn validate_output_dir(out_dir: &Path, context: &Path) -> Result<()> {
    let resolved = resolve_path(out_dir, context);
    let unsafe_dir = |reason: &str| {
        CliError::Build(BuildError::UnsafeOutputDir {
            path: resolved.clone(),
            reason: reason.to_string(),
        })
    };

    let canonical = if resolved.exists() {
        resolved.canonicalize()?
    } else {
        let (Some(parent), Some(name)) = (resolved.parent(), resolved.file_name()) else {
            return Err(unsafe_dir("it is the filesystem root"));
        };
        if parent.exists() {
            parent.canonicalize()?.join(name)
        } else {
            resolved.clone()
        }
    };
    let context = context.canonicalize()?;

    if canonical.parent().is_none() {
        return Err(unsafe_dir("it is the filesystem root"));
    }
    if SYSTEM_DIRS
        .iter()
        .any(|dir| canonical.starts_with(dir))
    {
        return Err(unsafe_dir("it is a system directory"));
    }
    if std::env::var_os("HOME").is_some_and(|home| canonical == Path::new(&home)) {
        return Err(unsafe_dir("it is the home directory"));
    }
    if context.starts_with(&canonical) {
        return Err(unsafe_dir("it contains the project itself"));
    }
    if resolved.exists() && !resolved.is_dir() {
        return Err(unsafe_dir("it exists and is not a directory"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn relative_paths_resolve_against_cwd() {
        assert_eq!(resolve_path(Path::new("dist"), Path::new("/p")), PathBuf::from("/p/dist"));
        assert_eq!(resolve_path(Path::new("/abs"), Path::new("/p")), PathBuf::from("/abs"));
    }

    #[test]
    fn dist_inside_project_is_fine() {
        let dir = TempDir::new().unwrap();
        validate_output_dir(Path::new("dist"), dir.path()).unwrap();
        std::fs::create_dir(dir.path().join("dist")).unwrap();
        validate_output_dir(Path::new("dist"), dir.path()).unwrap();
    }

    #[test]
    fn project_and_its_ancestors_are_refused() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("app");
        std::fs::create_dir(&project).unwrap();

        for out in [".", "..", "/"] {
            let err = validate_output_dir(Path::new(out), &project).unwrap_err();
            assert!(
                matches!(err, CliError::Build(BuildError::UnsafeOutputDir { .. })),
                "{out}: {err:?}"
            );
        }
    }

    #[test]
    fn system_directories_are_refused() {
        let dir = TempDir::new().unwrap();
        let err = validate_output_dir(Path::new("/etc/kiln"), dir.path()).unwrap_err();
        assert!(err.to_string().contains("system directory"));
    }

    #[test]
    fn existing_file_is_refused() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dist"), "").unwrap();
        let err = validate_output_dir(Path::new("dist"), dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn missing_project_root_is_reported() {
        let err = project_root(Some(Path::new("/definitely/not/here"))).unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }
}
