use lazy_static::lazy_static;

pub mod logger;
pub mod readable_size;

lazy_static! {
    /// the number of available CPUs (logical cores) of the current system.
    static ref NUM_CPUS: usize = num_cpus::get();
}

#[inline(always)]
pub fn num_cpus() -> usize { *NUM_CPUS }

/// Divide cpu num by a non-zero `divisor` and returns at least 1.
pub fn divide_num_cpus(divisor: usize) -> usize {
    debug_assert!(divisor > 0);
    let cores = num_cpus();
    debug_assert!(cores > 0);
    (cores + divisor - 1) / divisor
}
