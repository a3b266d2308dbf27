/// Adaptive partition count for multi-process simulation runs.

/// Upper bound on partitions for very large basins.
pub const MAX_PARTITIONS: usize = 20;

/// Number of partitions for a basin of `ncats` catchments given a budget of
/// `nproc` processors.
///
/// Basins no larger than the budget run as a single partition; larger ones
/// get `ncats / nproc` partitions, capped at [`MAX_PARTITIONS`]. A budget
/// of one processor (or none) always runs serially.
pub fn partition_count(ncats: usize, nproc: usize) -> usize {
    if nproc <= 1 || ncats <= nproc {
        return 1;
    }
    (ncats / nproc).clamp(1, MAX_PARTITIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_basin_runs_serially() {
        assert_eq!(partition_count(3, 10), 1);
        assert_eq!(partition_count(10, 10), 1);
    }

    #[test]
    fn medium_basin_scales_with_ratio() {
        assert_eq!(partition_count(100, 10), 10);
        assert_eq!(partition_count(45, 4), 11);
    }

    #[test]
    fn large_basin_is_clamped() {
        assert_eq!(partition_count(500, 10), 20);
        assert_eq!(partition_count(100_000, 2), MAX_PARTITIONS);
    }

    #[test]
    fn single_processor_never_partitions() {
        assert_eq!(partition_count(5, 1), 1);
        assert_eq!(partition_count(1_000, 1), 1);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(partition_count(0, 10), 1);
        assert_eq!(partition_count(250, 0), 1);
        assert_eq!(partition_count(250, 1), 1);
    }

    #[test]
    fn never_exceeds_catchments() {
        for n in 1..300 {
            for p in 1..32 {
                let k = partition_count(n, p);
                assert!(k >= 1 && k <= n && k <= MAX_PARTITIONS);
            }
        }
    }
}
