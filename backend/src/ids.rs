//! Identifier generation
//!
//! Every entity id is a UUIDv7 rendered as a hyphenated string. UUIDv7 puts
//! the millisecond timestamp in the leading bits, so ids generated later
//! compare greater as plain strings.

use uuid::Uuid;

/// Generate a new globally-unique, lexically-sortable identifier
#[inline]
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_sorted() {
        let ids: Vec<String> = (0..64).map(|_| new_id()).collect();

        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();

        assert_eq!(sorted.len(), ids.len());
        assert_eq!(sorted, ids);
    }

    #[test]
    fn test_id_is_v7() {
        let id = new_id();
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }
}
