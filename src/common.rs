/// Common bit manip for hit masks.

/// Set the nth bit of a 32-bit value.
pub const fn bit(n: usize) -> u32 {
    1 << n
}

/// Set the nth bit of a 64-bit value.
pub const fn bit_64(n: usize) -> u64 {
    1 << n
}

/// Check if the nth bit is set of a 64-bit value.
pub const fn test_bit_64(val: u64, n: usize) -> bool {
    (val & bit_64(n)) != 0
}

/// Iterate over the indices of all set bits, lowest first.
pub fn set_bits(mut val: u64) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if val == 0 {
            None
        } else {
            let n = val.trailing_zeros() as usize;
            val &= val - 1;
            Some(n)
        }
    })
}
