/// Pick the primary element of an ordered set.
///
/// A sole element is primary by convention, whatever its flag says. Otherwise the
/// first element flagged primary wins; later flagged elements are ignored.
pub fn select_primary<T, F>(items: &[T], is_primary: F) -> Option<&T>
where
    F: Fn(&T) -> bool,
{
    if let [only] = items {
        return Some(only);
    }
    items.iter().find(|item| is_primary(item))
}
