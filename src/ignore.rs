//! Ignore rules applied during project scanning
//!
//! The engine does not read ignore files itself; the host supplies the raw
//! text and this adapter parses it into the four pattern forms the engine
//! supports. A fixed built-in set (version control, dependency and build
//! output folders, OS metadata files) applies regardless of what the host
//! supplies.
//!
//! Pattern forms, one per line (`#` comments and blank lines skipped):
//!
//! - `secrets.env` - exact entry name, anywhere in the tree
//! - `*.log` - file name suffix match
//! - `build/` - directory with that name, anywhere in the tree
//! - `docs/generated.md` - exact root-relative path

/// Directory names always ignored, anywhere in the tree
const BUILTIN_DIRS: &[&str] = &[".git", "node_modules", "target", "dist", "build", "out"];

/// File names always ignored
const BUILTIN_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum IgnorePattern {
    /// Matches any entry with this exact name
    ExactName(String),
    /// Matches file names ending with this suffix (from `*.ext`)
    Suffix(String),
    /// Matches a directory with this name (from `name/`)
    Directory(String),
    /// Matches this exact root-relative path
    PathLiteral(String),
}

/// Parsed ignore rules, evaluated per scanned entry
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<IgnorePattern>,
    /// Extra directory names denied by the engine itself (e.g. a storage
    /// root nested inside the project)
    extra_dirs: Vec<String>,
}

impl IgnoreRules {
    /// Rules containing only the built-in set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse raw ignore-file text supplied by the host
    pub fn parse(text: &str) -> Self {
        let patterns = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                if let Some(dir) = line.strip_suffix('/') {
                    if dir.contains('/') {
                        // Trailing slash on a nested path still pins the
                        // whole relative path.
                        IgnorePattern::PathLiteral(dir.to_string())
                    } else {
                        IgnorePattern::Directory(dir.to_string())
                    }
                } else if let Some(suffix) = line.strip_prefix('*') {
                    IgnorePattern::Suffix(suffix.to_string())
                } else if line.contains('/') {
                    IgnorePattern::PathLiteral(line.to_string())
                } else {
                    IgnorePattern::ExactName(line.to_string())
                }
            })
            .collect();

        Self { patterns, extra_dirs: Vec::new() }
    }

    /// Deny an additional directory name, anywhere in the tree
    pub fn deny_dir(&mut self, name: impl Into<String>) {
        self.extra_dirs.push(name.into());
    }

    /// Should this entry be skipped during scanning?
    ///
    /// `relative_path` is root-relative with forward-slash separators.
    pub fn is_ignored(&self, name: &str, relative_path: &str, is_dir: bool) -> bool {
        if is_dir {
            if BUILTIN_DIRS.contains(&name) || self.extra_dirs.iter().any(|d| d == name) {
                return true;
            }
        } else if BUILTIN_FILES.contains(&name) {
            return true;
        }

        self.patterns.iter().any(|pattern| match pattern {
            IgnorePattern::ExactName(n) => name == n,
            IgnorePattern::Suffix(suffix) => !is_dir && name.ends_with(suffix.as_str()),
            IgnorePattern::Directory(n) => is_dir && name == n,
            IgnorePattern::PathLiteral(p) => relative_path == p,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_set() {
        let rules = IgnoreRules::empty();
        assert!(rules.is_ignored(".git", ".git", true));
        assert!(rules.is_ignored("node_modules", "web/node_modules", true));
        assert!(rules.is_ignored(".DS_Store", "docs/.DS_Store", false));
        // A *file* named like a built-in directory is not covered by the
        // directory set.
        assert!(!rules.is_ignored("build", "build", false));
        assert!(!rules.is_ignored("src", "src", true));
    }

    #[test]
    fn test_exact_name() {
        let rules = IgnoreRules::parse("secrets.env\n");
        assert!(rules.is_ignored("secrets.env", "config/secrets.env", false));
        assert!(!rules.is_ignored("secrets.env.sample", "secrets.env.sample", false));
    }

    #[test]
    fn test_suffix() {
        let rules = IgnoreRules::parse("*.log\n");
        assert!(rules.is_ignored("debug.log", "logs/debug.log", false));
        assert!(!rules.is_ignored("log.txt", "log.txt", false));
        // Suffix patterns apply to files, not directories.
        assert!(!rules.is_ignored("archive.log", "archive.log", true));
    }

    #[test]
    fn test_directory() {
        let rules = IgnoreRules::parse("generated/\n");
        assert!(rules.is_ignored("generated", "src/generated", true));
        assert!(!rules.is_ignored("generated", "src/generated", false));
    }

    #[test]
    fn test_path_literal() {
        let rules = IgnoreRules::parse("docs/internal.md\n");
        assert!(rules.is_ignored("internal.md", "docs/internal.md", false));
        assert!(!rules.is_ignored("internal.md", "notes/internal.md", false));
    }

    #[test]
    fn test_comments_and_blanks() {
        let rules = IgnoreRules::parse("# build junk\n\n  *.tmp  \n");
        assert!(rules.is_ignored("a.tmp", "a.tmp", false));
        assert!(!rules.is_ignored("# build junk", "# build junk", false));
    }

    #[test]
    fn test_deny_dir() {
        let mut rules = IgnoreRules::empty();
        rules.deny_dir(".rewind");
        assert!(rules.is_ignored(".rewind", ".rewind", true));
        assert!(!rules.is_ignored(".rewind", ".rewind", false));
    }
}
