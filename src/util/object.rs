use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};

/// Blob name for a local staging path.
///
/// Segments are resolved the way a URL path resolves them: empty and `.`
/// segments are dropped and `..` removes the previous one, never going above
/// the container. Absolute and relative paths both map to a name inside the
/// container, and the name matches the path the request is sent to.
pub fn blob_name_from_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Block ID for the block at `index`. IDs share one length across a blob.
pub fn block_id(index: usize) -> String {
    BASE64_STANDARD.encode(format!("block-{:08}", index))
}

/// Splits `len` bytes into `(offset, size)` ranges of at most `block_size`.
pub fn block_ranges(len: u64, block_size: usize) -> Vec<(u64, usize)> {
    let block_size = block_size.max(1) as u64;
    let mut ranges = Vec::new();
    let mut offset = 0;

    while offset < len {
        let size = block_size.min(len - offset);
        ranges.push((offset, size as usize));
        offset += size;
    }

    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_name_from_path() {
        let cases = vec![
            ("sample.txt", "sample.txt"),
            ("/tmp/sample.txt", "tmp/sample.txt"),
            ("./dir/sample.txt", "dir/sample.txt"),
            (".//./a", "a"),
            ("/", ""),
            ("../data/f.txt", "data/f.txt"),
            ("dir/sub/../f.txt", "dir/f.txt"),
            ("a/./b//c", "a/b/c"),
            ("../../..", ""),
        ];

        for (path, expected) in cases {
            assert_eq!(
                blob_name_from_path(path),
                expected,
                "failed on `blob_name_from_path` for case: {}",
                path
            );
        }
    }

    #[test]
    fn test_block_id() {
        assert_eq!(block_id(0), "YmxvY2stMDAwMDAwMDA=");
        assert_eq!(block_id(0).len(), block_id(12345).len());
        assert_ne!(block_id(1), block_id(2));
    }

    #[test]
    fn test_block_ranges() {
        assert!(block_ranges(0, 4).is_empty());
        assert_eq!(block_ranges(4, 4), vec![(0, 4)]);
        assert_eq!(block_ranges(10, 4), vec![(0, 4), (4, 4), (8, 2)]);
    }
}
