/// Ratcliff/Obershelp similarity in `[0, 1]`: `2 * M / (|a| + |b|)`, where `M`
/// counts characters in the recursively found longest common blocks.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (a_start, b_start, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }

    len + matching_chars(&a[..a_start], &b[..b_start])
        + matching_chars(&a[a_start + len..], &b[b_start + len..])
}

/// earliest longest common substring as `(start_in_a, start_in_b, len)`
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // suffix lengths for the previous row of a
    let mut prev = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                row[j] = prev[j - 1] + 1;
                if row[j] > best.2 {
                    best = (i - row[j], j - row[j], row[j]);
                }
            }
        }
        prev = row;
    }

    best
}
