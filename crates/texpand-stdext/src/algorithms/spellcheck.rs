//! Spell checking using Levenshtein distance
//!
//! Used to suggest the intended name when an undefined control sequence is encountered.

/// Find words in the dictionary within `max_distance` edits of the search word.
///
/// The result is ordered by distance and then alphabetically.
///
/// ```
/// # use texpand_stdext::algorithms::spellcheck::find_close_words;
/// let dictionary = ["iftrue", "iffalse", "ifcase", "relax"];
/// assert_eq!(find_close_words(dictionary, "iftru", 2), vec!["iftrue"]);
/// ```
pub fn find_close_words<'a, I>(dictionary: I, word: &str, max_distance: usize) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let word: Vec<char> = word.chars().collect();
    let mut candidates: Vec<(usize, &'a str)> = dictionary
        .into_iter()
        .filter_map(|candidate| {
            let d = levenshtein_distance(&word, candidate);
            if d <= max_distance {
                Some((d, candidate))
            } else {
                None
            }
        })
        .collect();
    candidates.sort();
    candidates.dedup();
    candidates.into_iter().map(|(_, w)| w).collect()
}

/// Standard two-row dynamic programming formulation.
fn levenshtein_distance(a: &[char], b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, a_i) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_j) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(a_i != b_j);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
