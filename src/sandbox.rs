//! Lexical confinement of paths to their trusted sandbox prefix.
//!
//! A file layer that receives an argument with a sandbox prefix must keep
//! every operation below that prefix. This check is purely lexical: it does
//! not touch the filesystem, so symlinks inside the prefix are the file
//! layer's concern.

use crate::assemble::MergedArgument;
use crate::error::SandboxViolation;

/// Check that `candidate` stays below `prefix`.
///
/// The candidate must start with the prefix. What follows must not start
/// with a separator and must not contain a `..` segment. Segments are split
/// on `separator` and on `/`, which the host still treats as a path
/// separator. An empty prefix has no trusted boundary, so only relative
/// candidates pass.
pub fn check_confined(
    prefix: &str,
    candidate: &str,
    separator: char,
) -> Result<(), SandboxViolation> {
    let outside = || SandboxViolation::OutsidePrefix {
        path: candidate.into(),
        prefix: prefix.into(),
    };
    let rest = candidate.strip_prefix(prefix).ok_or_else(outside)?;
    let is_separator = |c: char| c == separator || c == '/';
    if rest.starts_with(is_separator) {
        return Err(outside());
    }
    if rest.split(is_separator).any(|segment| segment == "..") {
        return Err(SandboxViolation::Traversal {
            path: candidate.into(),
        });
    }
    Ok(())
}

impl MergedArgument {
    /// Check a non-glob argument against its own sandbox prefix.
    ///
    /// Arguments without a prefix, and glob patterns, pass: a glob is
    /// checked per match with [`MergedArgument::check_expansion`].
    pub fn check_confined(&self, separator: char) -> Result<(), SandboxViolation> {
        match &self.sandbox_prefix {
            Some(prefix) if !self.is_glob => check_confined(prefix, &self.text, separator),
            _ => Ok(()),
        }
    }

    /// Check one path produced by expanding this argument as a glob.
    pub fn check_expansion(&self, expanded: &str, separator: char) -> Result<(), SandboxViolation> {
        match &self.sandbox_prefix {
            Some(prefix) => check_confined(prefix, expanded, separator),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_file_below_prefix() {
        assert!(check_confined("/etc/", "/etc/passwd", '/').is_ok());
        assert!(check_confined("/srv/data/", "/srv/data/a/b/c.txt", '/').is_ok());
    }

    #[test]
    fn parent_dir_escapes() {
        assert_eq!(
            check_confined("/etc/", "/etc/../shadow", '/'),
            Err(SandboxViolation::Traversal {
                path: "/etc/../shadow".into()
            })
        );
        assert!(check_confined("/srv/", "/srv/a/../../root", '/').is_err());
    }

    #[test]
    fn dotdot_inside_name_is_fine() {
        assert!(check_confined("/srv/", "/srv/a..b", '/').is_ok());
    }

    #[test]
    fn different_prefix_rejected() {
        assert!(matches!(
            check_confined("/etc/", "/var/log", '/'),
            Err(SandboxViolation::OutsidePrefix { .. })
        ));
    }

    #[test]
    fn empty_prefix_allows_only_relative() {
        assert!(check_confined("", "notes.txt", '/').is_ok());
        assert!(check_confined("", "/etc/passwd", '/').is_err());
        assert!(check_confined("", "../up", '/').is_err());
    }

    #[test]
    fn double_slash_after_prefix_rejected() {
        assert!(check_confined("/tmp/", "/tmp//etc", '/').is_err());
    }

    #[test]
    fn glob_argument_checked_per_expansion() {
        let arg = MergedArgument {
            text: "/data/*".into(),
            sandbox_prefix: Some("/data/".into()),
            is_glob: true,
        };
        assert!(arg.check_confined('/').is_ok());
        assert!(arg.check_expansion("/data/x.csv", '/').is_ok());
        assert!(arg.check_expansion("/other/x.csv", '/').is_err());
    }

    #[test]
    fn custom_separator_traversal() {
        assert_eq!(
            check_confined("srv:", "srv:..:..:etc", ':'),
            Err(SandboxViolation::Traversal {
                path: "srv:..:..:etc".into()
            })
        );
        assert!(check_confined("srv:", "srv:a:b", ':').is_ok());
        assert!(check_confined("srv:", "srv::etc", ':').is_err());
    }

    #[test]
    fn slash_still_splits_with_custom_separator() {
        assert!(check_confined("srv:", "srv:../etc", ':').is_err());
        assert!(check_confined("srv:", "srv:/etc", ':').is_err());
    }
}
