use std::ops::Range;

/// Resolves a `start`/`end` pair against `len` the way typed arrays do.
///
/// Negative values count back from `len`, results are clamped into
/// `0..=len`, an omitted `end` means `len`, and a `start` past `end` yields an
/// empty range at `end`.
pub fn clamp(len: usize, start: isize, end: Option<isize>) -> Range<usize> {
    let end = end.map_or(len, |end| resolve(len, end));
    let start = resolve(len, start).min(end);
    start..end
}

fn resolve(len: usize, index: isize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs())
    } else {
        index.unsigned_abs().min(len)
    }
}
