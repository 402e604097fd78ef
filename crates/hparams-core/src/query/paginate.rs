//! Slice the ordered result to the requested window.

/// A window of an ordered list plus the list's full length.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_size: usize,
}

/// Take `[start_index, start_index + slice_size)` clipped to the list.
///
/// A start beyond the end yields an empty page with the full total.
pub fn paginate<T>(items: Vec<T>, start_index: usize, slice_size: usize) -> Page<T> {
    let total_size = items.len();
    let items = items
        .into_iter()
        .skip(start_index)
        .take(slice_size)
        .collect();
    Page { items, total_size }
}
