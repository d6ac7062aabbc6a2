use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("File I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Substitution pattern for value '{value}' is empty")]
    EmptyPattern { value: String },
}

/// Replaces every occurrence of each `(pattern, value)` pair in the file at `path`.
///
/// Substitutions are applied in order on the whole file contents, and the file is
/// rewritten once.
pub fn substitute_in_file<P, V>(path: &Path, substitutions: &[(P, V)]) -> Result<(), TemplateError>
where
    P: AsRef<str>,
    V: AsRef<str>,
{
    let io_err = |source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut content = std::fs::read_to_string(path).map_err(io_err)?;
    for (pattern, value) in substitutions {
        let (pattern, value) = (pattern.as_ref(), value.as_ref());
        if pattern.is_empty() {
            return Err(TemplateError::EmptyPattern {
                value: value.to_string(),
            });
        }
        content = content.replace(pattern, value);
    }
    std::fs::write(path, content).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn replaces_all_occurrences_of_every_pattern() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in.conf");
        fs::write(&path, "Temperature @T@\nPressure @P@\n# again @T@\n").unwrap();

        substitute_in_file(&path, &[("@T@", "300"), ("@P@", "1.01")]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Temperature 300\nPressure 1.01\n# again 300\n");
    }

    #[test]
    fn absent_pattern_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Parameters.par");
        fs::write(&path, "CH3 CH3 1.0 3.75\n").unwrap();

        substitute_in_file(&path, &[("@EPS@", "98.0")]).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "CH3 CH3 1.0 3.75\n");
    }

    #[test]
    fn empty_pattern_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pack.inp");
        fs::write(&path, "structure @MOL@.pdb\n").unwrap();

        let result = substitute_in_file(&path, &[("", "ethane")]);
        assert!(matches!(result, Err(TemplateError::EmptyPattern { .. })));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.conf");
        let err = substitute_in_file(&path, &[("@A@", "1")]).unwrap_err();
        match err {
            TemplateError::Io { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
