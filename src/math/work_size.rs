/// Rounds `desired` up to the nearest multiple of `group_size`.
///
/// Every dispatch is sized with this so the device always receives whole
/// work groups; lanes past the real problem size are masked off inside the
/// kernels.
///
/// # Panics
/// Panics if `group_size` is zero.
pub fn round_up(desired: usize, group_size: usize) -> usize {
    assert!(group_size > 0, "group_size must be at least 1");
    match desired % group_size {
        0 => desired,
        rem => desired + group_size - rem,
    }
}
