use crate::config::SimilarityWeights;

/// Blend of unordered overlap and positional agreement between two word lists.
///
/// Overlap counts the words of `a` found anywhere in `b`, over the longer
/// length; positional agreement counts equal words at equal positions, over
/// the shorter length. Two empty lists are identical, one empty list shares
/// nothing. Result is in [0, 1] when the weights sum to 1.
pub fn context_similarity<A, B>(a: &[A], b: &[B], weights: SimilarityWeights) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let overlap_hits = a
        .iter()
        .filter(|word| b.iter().any(|other| other.as_ref() == word.as_ref()))
        .count();
    let overlap = overlap_hits as f64 / a.len().max(b.len()) as f64;

    let positional_len = a.len().min(b.len());
    let positional_hits = a
        .iter()
        .zip(b.iter())
        .filter(|(x, y)| x.as_ref() == y.as_ref())
        .count();
    let positional = positional_hits as f64 / positional_len as f64;

    weights.overlap * overlap + weights.positional * positional
}
