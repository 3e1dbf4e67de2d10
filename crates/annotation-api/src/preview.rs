//! Save previews rendered as unified diffs

use similar::{ChangeTag, TextDiff};

/// What a save would do to one file
#[derive(Debug, Clone)]
pub struct FilePreview {
    pub uri: String,
    /// Cached text before the save
    pub original_content: String,
    /// Text after applying the pending changes
    pub modified_content: String,
    /// Number of text edits for this file
    pub edit_count: usize,
    pub diff: String,
}

impl FilePreview {
    pub fn new(uri: &str, original: String, modified: String, edit_count: usize) -> Self {
        let diff = unified_diff(&original, &modified, uri);
        Self {
            uri: uri.to_string(),
            original_content: original,
            modified_content: modified,
            edit_count,
            diff,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.original_content != self.modified_content
    }
}

/// Unified diff with three lines of context
pub fn unified_diff(original: &str, modified: &str, uri: &str) -> String {
    let diff = TextDiff::from_lines(original, modified);
    let mut output = String::new();

    output.push_str(&format!("--- {uri}\n"));
    output.push_str(&format!("+++ {uri} (modified)\n"));

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push('\n');
        }

        let old_line = group[0].old_range().start;
        let new_line = group[0].new_range().start;
        let old_len = group.iter().map(|op| op.old_range().len()).sum::<usize>();
        let new_len = group.iter().map(|op| op.new_range().len()).sum::<usize>();

        output.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_line + 1,
            old_len,
            new_line + 1,
            new_len
        ));

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                };
                output.push(sign);
                output.push_str(change.value());
                if change.missing_newline() {
                    output.push('\n');
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_diff() {
        let preview = FilePreview::new(
            "file:///app/annotations.xml",
            "<a>\n    <b/>\n</a>\n".to_string(),
            "<a>\n    <b/>\n    <c/>\n</a>\n".to_string(),
            1,
        );
        assert!(preview.has_changes());
        insta::assert_snapshot!(preview.diff, @r"
        --- file:///app/annotations.xml
        +++ file:///app/annotations.xml (modified)
        @@ -1,3 +1,4 @@
         <a>
             <b/>
        +    <c/>
         </a>
        ");
    }

    #[test]
    fn test_unchanged_text_has_no_hunks() {
        let diff = unified_diff("same\n", "same\n", "file:///x.cds");
        assert_eq!(diff, "--- file:///x.cds\n+++ file:///x.cds (modified)\n");
    }
}
