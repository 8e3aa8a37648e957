//! Code-aware content splitting
//!
//! Separates fenced code from surrounding prose so the prose can shrink
//! while every fence survives byte-for-byte.

/// One run of content: prose, or a complete fenced block.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Prose(String),
    Fence(String),
}

/// Split on triple-backtick fences. Fences do not nest; an unterminated
/// fence runs to end of input. Fence segments keep their opening and
/// closing lines exactly as written.
pub fn split_fences(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_fence = false;

    for line in content.split_inclusive('\n') {
        let fence_line = line.trim_start().starts_with("```");
        if !in_fence && fence_line {
            if !current.is_empty() {
                segments.push(Segment::Prose(std::mem::take(&mut current)));
            }
            current.push_str(line);
            in_fence = true;
        } else if in_fence && fence_line {
            current.push_str(line);
            segments.push(Segment::Fence(std::mem::take(&mut current)));
            in_fence = false;
        } else {
            current.push_str(line);
        }
    }

    if !current.is_empty() {
        segments.push(if in_fence {
            Segment::Fence(current)
        } else {
            Segment::Prose(current)
        });
    }
    segments
}

/// Concatenated trimmed prose (joined with blank lines) and the fence
/// blocks with their trailing line terminators removed.
pub fn split_prose_and_fences(content: &str) -> (String, Vec<String>) {
    let mut prose_parts = Vec::new();
    let mut fences = Vec::new();
    for segment in split_fences(content) {
        match segment {
            Segment::Prose(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    prose_parts.push(trimmed.to_string());
                }
            }
            Segment::Fence(block) => {
                fences.push(block.trim_end_matches('\n').to_string());
            }
        }
    }
    (prose_parts.join("\n\n"), fences)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_prose_fence_prose() {
        let content = "Intro text.\n```rust\nlet a = 1;\n```\nOutro text.";
        let segments = split_fences(content);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::Prose("Intro text.\n".to_string()));
        assert_eq!(
            segments[1],
            Segment::Fence("```rust\nlet a = 1;\n```\n".to_string())
        );
        assert_eq!(segments[2], Segment::Prose("Outro text.".to_string()));
    }

    #[test]
    fn test_fence_block_is_byte_exact() {
        let content = "before\n```ts\nlet x=1;\n```\nafter";
        let (_, fences) = split_prose_and_fences(content);
        assert_eq!(fences, vec!["```ts\nlet x=1;\n```".to_string()]);
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let content = "prose\n```sh\necho hi";
        let segments = split_fences(content);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1], Segment::Fence("```sh\necho hi".to_string()));
    }

    #[test]
    fn test_multiple_fences() {
        let content = "a\n```\none\n```\nb\n```\ntwo\n```\n";
        let (prose, fences) = split_prose_and_fences(content);
        assert_eq!(prose, "a\n\nb");
        assert_eq!(fences.len(), 2);
        assert!(fences[0].contains("one"));
        assert!(fences[1].contains("two"));
    }

    #[test]
    fn test_no_fences() {
        let content = "just prose here";
        let (prose, fences) = split_prose_and_fences(content);
        assert_eq!(prose, "just prose here");
        assert!(fences.is_empty());
    }
}
