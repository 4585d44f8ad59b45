//! Static checks on script code.

use std::sync::LazyLock;

/// True if the script performs a mutating operation (tracepoint deployment).
///
/// Mutating scripts must not run without explicit user action.
pub fn contains_mutation(pxl: &str) -> bool {
    static MUTATION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"(?m)^\s*(import\s+pxtrace\b|from\s+pxtrace\s+import\b)").unwrap()
    });
    MUTATION_RE.is_match(pxl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_queries_are_not_mutations() {
        let pxl = "import px\ndf = px.DataFrame('http_events')\npx.display(df)\n";
        assert!(!contains_mutation(pxl));
    }

    #[test]
    fn pxtrace_import_is_a_mutation() {
        assert!(contains_mutation("import px\nimport pxtrace\n"));
        assert!(contains_mutation("from pxtrace import probe\n"));
    }

    #[test]
    fn pxtrace_mentioned_outside_an_import_is_not_a_mutation() {
        assert!(!contains_mutation("# import pxtrace later\nimport px\n"));
        assert!(!contains_mutation("import pxtrace_helpers\n"));
    }
}
