//! Translates the engine's bitmap filters into the integer arrays the
//! stored SQL functions expect (§4.10, §6 `create_filter_array`).
//!
//! An empty array is the "no filter" convention: every operation type
//! matches.

/// A 128-bit operation-type filter split across two `u64` halves: bit `i`
/// of `low` selects type `i`; bit `i` of `high` selects type `i + 64`.
pub fn operation_filter_to_ids(low: u64, high: u64) -> Vec<i32> {
    let mut ids = Vec::new();
    for i in 0..64 {
        if low & (1u64 << i) != 0 {
            ids.push(i as i32);
        }
    }
    for i in 0..64 {
        if high & (1u64 << i) != 0 {
            ids.push((i + 64) as i32);
        }
    }
    ids
}

/// A 32-bit virtual-operation filter: bit `i` selects type `i + 48`.
pub fn virtual_filter_to_ids(filter: u32) -> Vec<i32> {
    let mut ids = Vec::new();
    for i in 0..32 {
        if filter & (1u32 << i) != 0 {
            ids.push((i + 48) as i32);
        }
    }
    ids
}

/// Render `ids` as the `ARRAY[...]::INT[]` literal the stored functions
/// expect. An empty slice renders as `ARRAY[]::INT[]`, which the functions
/// interpret as "no filter, select all types".
pub fn filter_array_sql(ids: &[i32]) -> String {
    if ids.is_empty() {
        return "ARRAY[]::INT[]".to_string();
    }
    let joined = ids.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(",");
    format!("ARRAY[{}]::INT[]", joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_bits_set_yields_empty_filter() {
        assert!(operation_filter_to_ids(0, 0).is_empty());
        assert_eq!(filter_array_sql(&operation_filter_to_ids(0, 0)), "ARRAY[]::INT[]");
    }

    #[test]
    fn low_bit_zero_selects_type_zero() {
        assert_eq!(operation_filter_to_ids(1, 0), vec![0]);
    }

    #[test]
    fn high_bit_zero_selects_type_sixty_four() {
        assert_eq!(operation_filter_to_ids(0, 1), vec![64]);
    }

    #[test]
    fn multiple_bits_selects_multiple_types() {
        assert_eq!(operation_filter_to_ids(0b101, 0), vec![0, 2]);
    }

    #[test]
    fn virtual_filter_bit_zero_selects_type_forty_eight() {
        assert_eq!(virtual_filter_to_ids(1), vec![48]);
    }

    #[test]
    fn filter_array_sql_renders_comma_separated_literal() {
        assert_eq!(filter_array_sql(&[0, 2, 5]), "ARRAY[0,2,5]::INT[]");
    }
}
