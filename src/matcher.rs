use regex::Regex;

/// A single compiled segment pattern.
#[derive(Debug, Clone)]
enum Pattern {
    Literal(String),
    Glob(Regex),
}

impl Pattern {
    fn compile(source: &str) -> Option<Self> {
        if !source.contains('*') {
            return Some(Pattern::Literal(source.to_owned()));
        }

        let body = source
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("[^/]*");

        Regex::new(&format!("^{body}$")).ok().map(Pattern::Glob)
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Pattern::Literal(literal) => literal == segment,
            Pattern::Glob(regex) => regex.is_match(segment),
        }
    }
}

/// Matches path segments against a list of glob patterns.
///
/// Patterns apply to single segments: `*.md` matches `README.md` and also
/// `docs/README.md` (through its last segment), but `docs/*.md` is not a
/// valid pattern and gets dropped. A leading `!` makes a pattern negative,
/// which un-matches segments matched by the positive patterns.
///
/// ```
/// use servitsy::PathMatcher;
///
/// let matcher = PathMatcher::new([".*", "!.well-known"], true);
/// assert!(matcher.test(".env"));
/// assert!(matcher.test("config/.secret/key.pem"));
/// assert!(!matcher.test(".well-known/security.txt"));
/// ```
#[derive(Debug, Clone)]
pub struct PathMatcher {
    positive: Vec<Pattern>,
    negative: Vec<Pattern>,
    case_sensitive: bool,
}

impl PathMatcher {
    pub fn new<I, S>(patterns: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = PathMatcher {
            positive: Vec::new(),
            negative: Vec::new(),
            case_sensitive,
        };

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            let (negated, source) = match pattern.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pattern),
            };
            if source.is_empty() || source.contains(['/', '\\']) {
                continue;
            }

            let source = if case_sensitive {
                source.to_owned()
            } else {
                source.to_lowercase()
            };
            let Some(compiled) = Pattern::compile(&source) else {
                continue;
            };

            if negated {
                matcher.negative.push(compiled);
            } else {
                matcher.positive.push(compiled);
            }
        }

        matcher
    }

    /// Returns `true` if at least one segment of `path` matches.
    pub fn test(&self, path: &str) -> bool {
        if self.positive.is_empty() {
            return false;
        }

        let path = if self.case_sensitive {
            path.replace('\\', "/")
        } else {
            path.replace('\\', "/").to_lowercase()
        };

        path.split('/')
            .filter(|segment| !segment.is_empty())
            .any(|segment| self.matches_segment(segment))
    }

    fn matches_segment(&self, segment: &str) -> bool {
        self.positive.iter().any(|p| p.matches(segment))
            && !self.negative.iter().any(|p| p.matches(segment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_positive_pattern_never_matches() {
        let matcher = PathMatcher::new(["!.well-known"], true);
        assert!(!matcher.test(".well-known"));
        assert!(!matcher.test("anything"));
        assert!(!matcher.test(""));

        let empty = PathMatcher::new(Vec::<String>::new(), true);
        assert!(!empty.test("a/b/c"));
    }

    #[test]
    fn literal_patterns_match_whole_segments() {
        let matcher = PathMatcher::new(["node_modules"], true);
        assert!(matcher.test("node_modules"));
        assert!(matcher.test("lib/node_modules/pkg/index.js"));
        assert!(!matcher.test("node_modules_old"));
        assert!(!matcher.test("my-node_modules"));
    }

    #[test]
    fn wildcard_stays_within_segment() {
        let matcher = PathMatcher::new(["*.md"], true);
        assert!(matcher.test("README.md"));
        assert!(matcher.test("docs/intro.md"));
        assert!(!matcher.test("docs.md.txt"));
        assert!(!matcher.test("docs/intro.mdx"));

        let matcher = PathMatcher::new(["a*c"], true);
        assert!(matcher.test("ac"));
        assert!(matcher.test("abbbc"));
        assert!(!matcher.test("ab/c"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let matcher = PathMatcher::new(["file(1).txt", "v?.*"], true);
        assert!(matcher.test("file(1).txt"));
        assert!(!matcher.test("file1.txt"));
        assert!(matcher.test("v?.json"));
        assert!(!matcher.test("v1.json"));
    }

    #[test]
    fn negative_patterns_reinclude() {
        let matcher = PathMatcher::new([".*", "!.well-known"], true);
        assert!(matcher.test(".env"));
        assert!(matcher.test(".git/config"));
        assert!(!matcher.test(".well-known/security.txt"));
        assert!(!matcher.test("index.html"));
        // Another segment can still match.
        assert!(matcher.test(".well-known/.hidden"));
    }

    #[test]
    fn patterns_with_separators_are_dropped() {
        let matcher = PathMatcher::new(["docs/*.md", "a\\b", "*.txt"], true);
        assert!(!matcher.test("docs/intro.md"));
        assert!(matcher.test("notes.txt"));
    }

    #[test]
    fn backslashes_split_like_slashes() {
        let matcher = PathMatcher::new([".*"], true);
        assert!(matcher.test("public\\.env"));
    }

    #[test]
    fn case_sensitivity() {
        let sensitive = PathMatcher::new(["*.PNG"], true);
        assert!(sensitive.test("image.PNG"));
        assert!(!sensitive.test("image.png"));

        let insensitive = PathMatcher::new(["*.PNG", "!Keep.png"], false);
        assert!(insensitive.test("image.png"));
        assert!(insensitive.test("IMAGE.Png"));
        assert!(!insensitive.test("KEEP.PNG"));
    }

    #[test]
    fn repeated_calls_are_stable() {
        let matcher = PathMatcher::new(["*.log"], true);
        for _ in 0..3 {
            assert!(matcher.test("logs/server.log"));
            assert!(!matcher.test("logs/server.txt"));
        }
    }
}
