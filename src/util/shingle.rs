/// Word window sizes used when nothing else is configured.
pub const DEFAULT_WINDOW_SIZES: [usize; 3] = [5, 7, 9];

/// Split `text` on whitespace and emit every contiguous run of `k` words for
/// each `k` in `window_sizes`, in that order.
///
/// Windows slide one word at a time and are joined with a single space. A
/// window larger than the document contributes nothing. Repeated shingles are
/// kept here; they collapse once hashed into a set.
pub fn shingles(text: &str, window_sizes: &[usize]) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();

    let capacity = window_sizes
        .iter()
        .map(|&size| shingle_count(words.len(), size))
        .sum();
    let mut out = Vec::with_capacity(capacity);

    for &size in window_sizes {
        if size == 0 || words.len() < size {
            continue;
        }
        out.extend(words.windows(size).map(|window| window.join(" ")));
    }

    out
}

fn shingle_count(word_count: usize, size: usize) -> usize {
    if size == 0 || word_count < size {
        0
    } else {
        word_count - size + 1
    }
}
