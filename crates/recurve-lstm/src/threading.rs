/// How the per-step hidden GEMM and gate kernel fan out over the pool.
///
/// Large batches split cheaply along the batch axis. Small batches with a
/// wide hidden dimension are instead split along the `4H` gate columns so
/// the recurrent matrix multiply still parallelizes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ThreadPlan {
    pub input_threads: usize,
    pub hidden_threads: usize,
    pub batch_parallel: bool,
}

impl ThreadPlan {
    /// Pick stripe counts from the problem shape and the machine width.
    pub fn choose(batch_size: usize, hidden_size: usize, hw_threads: usize) -> Self {
        let threads = hw_threads.saturating_sub(1).max(1);

        let mut input_threads = threads.min(24);
        if input_threads > 16 && hidden_size <= 256 {
            input_threads = 16;
        }

        if batch_size > 4 || (batch_size >= 2 && hidden_size <= 256) {
            return Self {
                input_threads,
                hidden_threads: threads,
                batch_parallel: true,
            };
        }

        let band = if hidden_size <= 128 {
            2
        } else if hidden_size <= 256 {
            5
        } else if hidden_size <= 512 {
            7
        } else if hidden_size <= 1024 {
            11
        } else {
            threads
        };

        Self {
            input_threads,
            hidden_threads: threads.min(band),
            batch_parallel: false,
        }
    }

    /// Plan against this machine's logical core count.
    pub fn for_host(batch_size: usize, hidden_size: usize) -> Self {
        let hw = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self::choose(batch_size, hidden_size, hw)
    }

    /// Stripe size that spreads `count` work items over `threads` workers.
    pub fn stripe(count: usize, threads: usize) -> usize {
        count.div_ceil(threads.max(1)).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_batch_selects_batch_parallel() {
        let plan = ThreadPlan::choose(8, 512, 16);
        assert!(plan.batch_parallel);
        assert_eq!(plan.hidden_threads, 15);
    }

    #[test]
    fn small_batch_narrow_hidden_selects_batch_parallel() {
        let plan = ThreadPlan::choose(2, 128, 8);
        assert!(plan.batch_parallel);
    }

    #[test]
    fn single_batch_wide_hidden_selects_column_parallel() {
        let plan = ThreadPlan::choose(1, 1024, 16);
        assert!(!plan.batch_parallel);
        assert_eq!(plan.hidden_threads, 11);
    }

    #[test]
    fn column_bands_cap_hidden_threads() {
        assert_eq!(ThreadPlan::choose(1, 128, 32).hidden_threads, 2);
        assert_eq!(ThreadPlan::choose(1, 256, 32).hidden_threads, 5);
        assert_eq!(ThreadPlan::choose(1, 512, 32).hidden_threads, 7);
        assert_eq!(ThreadPlan::choose(1, 1024, 32).hidden_threads, 11);
        assert_eq!(ThreadPlan::choose(1, 2048, 32).hidden_threads, 31);
    }

    #[test]
    fn input_threads_cap_at_24_and_shrink_for_narrow_hidden() {
        assert_eq!(ThreadPlan::choose(8, 512, 64).input_threads, 24);
        assert_eq!(ThreadPlan::choose(8, 256, 64).input_threads, 16);
        assert_eq!(ThreadPlan::choose(8, 512, 4).input_threads, 3);
    }

    #[test]
    fn single_core_host_degrades_to_one_thread() {
        let plan = ThreadPlan::choose(4, 64, 1);
        assert_eq!(plan.input_threads, 1);
        assert_eq!(plan.hidden_threads, 1);
    }

    #[test]
    fn stripe_covers_count_with_ceiling_division() {
        assert_eq!(ThreadPlan::stripe(10, 4), 3);
        assert_eq!(ThreadPlan::stripe(4, 8), 1);
        assert_eq!(ThreadPlan::stripe(0, 4), 1);
    }
}
