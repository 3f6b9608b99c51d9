//! A fixed-capacity radix-2 FFT engine that reuses its buffers across transforms.
//!
//! [`BufferedFft`] allocates three stores once, at construction: an input store and two result
//! stores. A transform copies its input into the input store, decimates it through
//! [`Stride`] descriptors instead of copying, and writes every recursion level into one of the
//! two result stores, alternating between them level by level. No transform allocates, apart from
//! the variants that hand back a freshly allocated result.
//!
//! ### Example:
//! ```rust
//! use buffered_fft::complex::ComplexExt;
//! use buffered_fft::BufferedFft;
//! use buffered_fft::Complex64;
//!
//! let fft = BufferedFft::new(4);
//!
//! let spectrum = fft.compute_vec(&[1_i8, 8, 3, 2]).unwrap();
//!
//! let expected = [
//!     Complex64::new(14.0, 0.0),
//!     Complex64::new(-2.0, -6.0),
//!     Complex64::new(-6.0, 0.0),
//!     Complex64::new(-2.0, 6.0),
//! ];
//! for (actual, expected) in spectrum.iter().zip(expected.iter()) {
//!     assert!(actual.approx_eq(expected));
//! }
//! ```
use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use log::debug;
use log::trace;
use log::warn;

use crate::complex::ComplexExt;
use crate::error::FftError;
use crate::error::Result;
use crate::sample::Sample;
use crate::task::Executor;
use crate::task::FftHandle;
use crate::task::FftTask;
use crate::view::Stride;
use crate::view::StridedView;
use crate::view::StridedViewMut;
use crate::Complex64;

/// Backing storage of one engine.
///
/// Every transform overwrites the input positions it reads and writes each result position before
/// any level reads it, so the contents left behind by a panicked call are never observed.
struct Stores {
    input: Box<[Complex64]>,
    /// Written by the single-element levels, and every second level above them.
    leaf: Box<[Complex64]>,
    other: Box<[Complex64]>,
    /// Set between an asynchronous copy-in and the matching copy-out.
    in_flight: bool,
}

impl Stores {
    fn new(capacity: usize) -> Self {
        let zeroed = || vec![Complex64::default(); capacity].into_boxed_slice();
        Self {
            input: zeroed(),
            leaf: zeroed(),
            other: zeroed(),
            in_flight: false,
        }
    }

    fn load<S: Sample>(&mut self, samples: &[S]) {
        for (slot, sample) in self.input.iter_mut().zip(samples) {
            *slot = sample.to_complex();
        }
    }

    /// Transforms the first `n` loaded samples and returns a view of the result.
    ///
    /// `n` must be a power of two no larger than the capacity.
    fn transform(&mut self, n: usize) -> StridedView<'_, Complex64> {
        let Self {
            input, leaf, other, ..
        } = self;
        let chunk = Stride::full(n);

        // Every level swaps the roles of the two stores. Picking the root's store by the parity
        // of its height makes the single-element levels land in `leaf`.
        let (dst, src) = if n.trailing_zeros() % 2 == 0 {
            (leaf, other)
        } else {
            (other, leaf)
        };

        transform(&input[..], &mut dst[..], &mut src[..], chunk);
        StridedView::with_layout(&dst[..], chunk)
    }
}

/// Transforms the input elements selected by `chunk` into the same positions of `dst`.
///
/// The children of this level write `src`, which is then read by the combination step.
fn transform(input: &[Complex64], dst: &mut [Complex64], src: &mut [Complex64], chunk: Stride) {
    if chunk.count() == 1 {
        let at = chunk.index(0);
        dst[at].copy_from(&input[at]);
        return;
    }

    transform(input, src, dst, chunk.evens());
    transform(input, src, dst, chunk.odds());

    combine(
        StridedView::with_layout(&*src, chunk.evens()),
        StridedView::with_layout(&*src, chunk.odds()),
        StridedViewMut::with_layout(dst, chunk),
    );
}

/// The butterfly: `ret[k] = even[k] + w·odd[k]` and `ret[k + N/2] = even[k] - w·odd[k]`.
fn combine(
    even: StridedView<'_, Complex64>,
    odd: StridedView<'_, Complex64>,
    mut ret: StridedViewMut<'_, Complex64>,
) {
    let n = ret.len();
    let half = n / 2;
    let mut twiddle = Complex64::default();
    let mut product = Complex64::default();

    for k in 0..half {
        let theta = -2.0 * k as f64 * PI / n as f64;
        twiddle.set(theta.cos(), theta.sin());
        twiddle.mul_into(odd.at(k), &mut product);
        even.at(k).add_into(&product, ret.at_mut(k));
        even.at(k).sub_into(&product, ret.at_mut(k + half));
    }
}

fn copy_out(result: StridedView<'_, Complex64>, output: &mut [Complex64]) {
    for (out, value) in output.iter_mut().zip(result.iter()) {
        out.copy_from(value);
    }
}

/// Marks an engine busy for as long as an asynchronous transform is pending.
///
/// Dropped without [`finish`](Self::finish), e.g. because the executor discarded the task, it
/// clears the mark so the engine becomes usable again.
struct InFlight {
    stores: Arc<Mutex<Stores>>,
    finished: bool,
}

impl InFlight {
    fn finish<T>(mut self, n: usize, deliver: impl FnOnce(StridedView<'_, Complex64>) -> T) -> T {
        let mut stores = lock(&self.stores);
        let delivered = deliver(stores.transform(n));
        stores.in_flight = false;
        drop(stores);
        self.finished = true;
        delivered
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            lock(&self.stores).in_flight = false;
        }
    }
}

fn lock(stores: &Mutex<Stores>) -> MutexGuard<'_, Stores> {
    stores.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A radix-2 decimation-in-time FFT engine with a fixed maximum transform length.
///
/// Transform lengths must be powers of two no larger than [`capacity`](Self::capacity). A count
/// and starting offset into a larger buffer are expressed by passing the sub-slice
/// `&buffer[offset..offset + n]`.
///
/// One engine runs one transform at a time: synchronous calls are serialized on an internal
/// lock, and any call made while an asynchronous transform is still pending fails with
/// [`FftError::Busy`]. Separate engines share nothing and can run in parallel.
pub struct BufferedFft {
    capacity: usize,
    stores: Arc<Mutex<Stores>>,
}

impl BufferedFft {
    /// Creates an engine for transforms of up to `capacity` points.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        debug!("Allocating FFT engine with capacity {capacity}");
        Self {
            capacity,
            stores: Arc::new(Mutex::new(Stores::new(capacity))),
        }
    }

    /// Largest transform length this engine accepts.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Transforms `input` and writes the `input.len()` result bins to the start of `output`.
    ///
    /// # Errors
    /// [`FftError::Size`] if `input` is longer than the capacity, [`FftError::NotPowerOfTwo`] if
    /// its length is not a power of two, [`FftError::OutputTooSmall`] if `output` is shorter than
    /// `input`, and [`FftError::Busy`] if an asynchronous transform is pending. Nothing is
    /// written in any of these cases.
    pub fn compute<S: Sample>(&self, input: &[S], output: &mut [Complex64]) -> Result<()> {
        let n = input.len();
        self.validate(n, output.len())?;

        let mut stores = lock(&self.stores);
        if stores.in_flight {
            warn!("Rejecting {n}-point transform, an asynchronous transform is pending");
            return Err(FftError::Busy);
        }
        trace!("Computing {n}-point transform");
        stores.load(input);
        copy_out(stores.transform(n), output);
        Ok(())
    }

    /// Transforms `input` into a newly allocated vector of `input.len()` bins.
    ///
    /// # Errors
    /// As [`compute`](Self::compute), apart from [`FftError::OutputTooSmall`].
    pub fn compute_vec<S: Sample>(&self, input: &[S]) -> Result<Vec<Complex64>> {
        self.validate(input.len(), input.len())?;
        let mut output = vec![Complex64::default(); input.len()];
        self.compute(input, &mut output)?;
        Ok(output)
    }

    /// Copies `input` into the engine now, then runs the transform on `executor`.
    ///
    /// The handle resolves to a newly allocated vector of `input.len()` bins.
    ///
    /// # Errors
    /// Validation errors as for [`compute`](Self::compute) are returned here, before anything is
    /// submitted. Failures of the submitted task arrive through the handle.
    pub fn compute_async<S, E>(
        &self,
        input: &[S],
        executor: &E,
    ) -> Result<FftHandle<Vec<Complex64>>>
    where
        S: Sample,
        E: Executor + ?Sized,
    {
        let n = input.len();
        self.submit(input, n, executor, |result| result.iter().copied().collect())
    }

    /// Copies `input` into the engine now, then runs the transform on `executor`, writing the
    /// result into the start of `output`.
    ///
    /// The handle hands `output` back once it holds the result.
    ///
    /// # Errors
    /// As [`compute_async`](Self::compute_async), plus [`FftError::OutputTooSmall`].
    pub fn compute_async_into<S, E>(
        &self,
        input: &[S],
        mut output: Vec<Complex64>,
        executor: &E,
    ) -> Result<FftHandle<Vec<Complex64>>>
    where
        S: Sample,
        E: Executor + ?Sized,
    {
        self.submit(input, output.len(), executor, move |result| {
            copy_out(result, &mut output);
            output
        })
    }

    fn submit<S, E, T, F>(
        &self,
        input: &[S],
        output_len: usize,
        executor: &E,
        deliver: F,
    ) -> Result<FftHandle<T>>
    where
        S: Sample,
        E: Executor + ?Sized,
        T: Send + 'static,
        F: FnOnce(StridedView<'_, Complex64>) -> T + Send + 'static,
    {
        let n = input.len();
        self.validate(n, output_len)?;

        {
            let mut stores = lock(&self.stores);
            if stores.in_flight {
                warn!("Rejecting {n}-point transform, an asynchronous transform is pending");
                return Err(FftError::Busy);
            }
            stores.load(input);
            stores.in_flight = true;
        }

        let pending = InFlight {
            stores: Arc::clone(&self.stores),
            finished: false,
        };
        let (task, handle) = FftTask::new(move || {
            trace!("Computing {n}-point transform on {:?}", std::thread::current().name());
            Ok(pending.finish(n, deliver))
        });
        task.submit(executor);
        Ok(handle)
    }

    fn validate(&self, n: usize, output_len: usize) -> Result<()> {
        let error = if n > self.capacity {
            FftError::Size {
                requested: n,
                capacity: self.capacity,
            }
        } else if !n.is_power_of_two() {
            FftError::NotPowerOfTwo { len: n }
        } else if output_len < n {
            FftError::OutputTooSmall {
                required: n,
                actual: output_len,
            }
        } else {
            return Ok(());
        };
        warn!("Rejecting transform: {error}");
        Err(error)
    }
}

impl core::fmt::Debug for BufferedFft {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferedFft")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::slices_approx_eq;
    use crate::task::Inline;
    use crate::task::Job;
    use crate::task::WorkerPool;
    use approx::assert_abs_diff_eq;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn scenario_one() -> [Complex64; 4] {
        [c(14.0, 0.0), c(-2.0, -6.0), c(-6.0, 0.0), c(-2.0, 6.0)]
    }

    fn assert_spectrum_eq(actual: &[Complex64], expected: &[Complex64]) {
        assert!(
            slices_approx_eq(actual, expected),
            "got {actual:?}, expected {expected:?}"
        );
    }

    /// Deterministic samples in [-1, 1).
    fn pseudo_random(n: usize, seed: u64) -> Vec<Complex64> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1_u64 << 52) as f64 - 1.0
        };
        (0..n).map(|_| c(next(), next())).collect()
    }

    /// Holds submitted jobs until told to run them.
    #[derive(Default)]
    struct Deferred(Mutex<Vec<Job>>);

    impl Deferred {
        fn run_all(&self) {
            let jobs: Vec<Job> = self.0.lock().unwrap().drain(..).collect();
            for job in jobs {
                job();
            }
        }

        fn discard_all(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    impl Executor for Deferred {
        fn execute(&self, job: Job) {
            self.0.lock().unwrap().push(job);
        }
    }

    #[test]
    fn all_real_input() {
        let fft = BufferedFft::new(4);
        let input = [c(1.0, 0.0), c(8.0, 0.0), c(3.0, 0.0), c(2.0, 0.0)];
        assert_spectrum_eq(&fft.compute_vec(&input).unwrap(), &scenario_one());
    }

    #[test]
    fn mixed_complex_input() {
        let fft = BufferedFft::new(4);
        let input = [c(1.0, 1.0), c(3.0, 0.0), c(3.0, 3.0), c(6.0, 0.0)];
        let expected = [c(13.0, 4.0), c(-2.0, 1.0), c(-5.0, 4.0), c(-2.0, -5.0)];
        assert_spectrum_eq(&fft.compute_vec(&input).unwrap(), &expected);
    }

    #[test]
    fn byte_input_matches_real_input() {
        let fft = BufferedFft::new(4);
        let mut output = [Complex64::default(); 4];
        fft.compute(&[1_i8, 8, 3, 2], &mut output).unwrap();
        assert_spectrum_eq(&output, &scenario_one());
    }

    #[test]
    fn offset_into_a_larger_buffer() {
        let fft = BufferedFft::new(4);
        let samples = [0.0_f64, 0.0, 1.0, 8.0, 3.0, 2.0, 0.0];
        let spectrum = fft.compute_vec(&samples[2..6]).unwrap();
        assert_spectrum_eq(&spectrum, &scenario_one());
    }

    #[test]
    fn output_longer_than_transform_keeps_its_tail() {
        let fft = BufferedFft::new(8);
        let sentinel = c(-99.0, 99.0);
        let mut output = [sentinel; 6];
        fft.compute(&[1_i8, 8, 3, 2], &mut output).unwrap();
        assert_spectrum_eq(&output[..4], &scenario_one());
        assert_eq!(output[4..], [sentinel, sentinel]);
    }

    #[test]
    fn dc_bin_is_the_sum_of_real_inputs() {
        let fft = BufferedFft::new(256);
        for height in 0..=8 {
            let n = 1_usize << height;
            let input: Vec<f64> = (0..n).map(|i| ((i * 7 + 3) % 11) as f64 - 5.0).collect();
            let spectrum = fft.compute_vec(&input).unwrap();
            let sum: f64 = input.iter().sum();
            assert_abs_diff_eq!(spectrum[0].re, sum, epsilon = 1e-9);
            assert_abs_diff_eq!(spectrum[0].im, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn single_point_transform_is_identity() {
        let fft = BufferedFft::new(1);
        assert_eq!(fft.compute_vec(&[c(2.5, -1.0)]).unwrap(), vec![c(2.5, -1.0)]);
    }

    #[test]
    fn matches_rustfft_for_every_supported_size() {
        let fft = BufferedFft::new(1024);
        let mut planner = rustfft::FftPlanner::<f64>::new();

        for height in 0..=10 {
            let n = 1_usize << height;
            let input = pseudo_random(n, height as u64 + 1);

            let mut reference = input.clone();
            planner.plan_fft_forward(n).process(&mut reference);

            let actual = fft.compute_vec(&input).unwrap();
            for (a, r) in actual.iter().zip(&reference) {
                assert_abs_diff_eq!(a.re, r.re, epsilon = 1e-9);
                assert_abs_diff_eq!(a.im, r.im, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn engine_is_reusable_across_lengths() {
        let fft = BufferedFft::new(16);
        let long = pseudo_random(16, 7);
        let first = fft.compute_vec(&long).unwrap();

        assert_spectrum_eq(&fft.compute_vec(&[1_i8, 8, 3, 2]).unwrap(), &scenario_one());
        assert_eq!(
            fft.compute_vec(&[c(4.0, 4.0), c(1.0, 0.0)]).unwrap(),
            vec![c(5.0, 4.0), c(3.0, 4.0)]
        );
        assert_spectrum_eq(&fft.compute_vec(&long).unwrap(), &first);
    }

    #[test]
    fn oversized_input_is_a_size_error_and_mutates_nothing() {
        let fft = BufferedFft::new(4);
        let sentinel = c(7.0, 7.0);
        let mut output = [sentinel; 8];

        let result = fft.compute(&[1_i8, 8, 3, 2, 1, 8, 3, 2], &mut output);

        assert_eq!(
            result,
            Err(FftError::Size {
                requested: 8,
                capacity: 4
            })
        );
        assert_eq!(output, [sentinel; 8]);
        assert!(lock(&fft.stores).input.iter().all(|z| *z == Complex64::default()));
    }

    #[test]
    fn non_power_of_two_lengths_are_rejected() {
        let fft = BufferedFft::new(8);
        for n in [0, 3, 5, 6, 7] {
            let input = vec![1.0_f64; n];
            assert_eq!(
                fft.compute_vec(&input),
                Err(FftError::NotPowerOfTwo { len: n })
            );
        }
    }

    #[test]
    fn short_output_is_rejected() {
        let fft = BufferedFft::new(4);
        let mut output = [Complex64::default(); 3];
        assert_eq!(
            fft.compute(&[1_i8, 8, 3, 2], &mut output),
            Err(FftError::OutputTooSmall {
                required: 4,
                actual: 3
            })
        );
        assert_eq!(
            fft.compute_async_into(&[1_i8, 8, 3, 2], vec![Complex64::default(); 2], &Inline)
                .err(),
            Some(FftError::OutputTooSmall {
                required: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn async_allocating_variant() {
        let fft = BufferedFft::new(4);
        let pool = WorkerPool::new(1).unwrap();
        let handle = fft.compute_async(&[1_i8, 8, 3, 2], &pool).unwrap();
        assert_spectrum_eq(&handle.wait().unwrap(), &scenario_one());
    }

    #[test]
    fn async_buffered_variant_returns_the_callers_buffer() {
        let fft = BufferedFft::new(4);
        let pool = WorkerPool::new(1).unwrap();
        let output = vec![Complex64::default(); 4];
        let address = output.as_ptr();

        let handle = fft.compute_async_into(&[1_i8, 8, 3, 2], output, &pool).unwrap();
        let output = handle.wait().unwrap();

        assert_eq!(output.as_ptr(), address);
        assert_spectrum_eq(&output, &scenario_one());
    }

    #[test]
    fn two_engines_on_disjoint_halves_of_one_byte_buffer() {
        let input = [1_i8, 8, 3, 2, 1, 8, 3, 2];
        let left = BufferedFft::new(4);
        let right = BufferedFft::new(4);
        let pool = WorkerPool::new(2).unwrap();

        let first = left
            .compute_async_into(&input[..4], vec![Complex64::default(); 4], &pool)
            .unwrap();
        let second = right
            .compute_async_into(&input[4..], vec![Complex64::default(); 4], &pool)
            .unwrap();

        assert_spectrum_eq(&first.wait().unwrap(), &scenario_one());
        assert_spectrum_eq(&second.wait().unwrap(), &scenario_one());
    }

    #[test]
    fn two_engines_on_disjoint_halves_of_one_complex_buffer() {
        let input: Vec<Complex64> = [1.0, 8.0, 3.0, 2.0, 1.0, 8.0, 3.0, 2.0]
            .iter()
            .map(|re| c(*re, 0.0))
            .collect();
        let left = BufferedFft::new(4);
        let right = BufferedFft::new(4);
        let pool = WorkerPool::new(2).unwrap();

        let first = left.compute_async(&input[..4], &pool).unwrap();
        let second = right.compute_async(&input[4..], &pool).unwrap();

        assert_spectrum_eq(&first.wait().unwrap(), &scenario_one());
        assert_spectrum_eq(&second.wait().unwrap(), &scenario_one());
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn rayon_pool_runs_two_engines() {
        let input = [1_i8, 8, 3, 2, 1, 8, 3, 2];
        let left = BufferedFft::new(4);
        let right = BufferedFft::new(4);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();

        let first = left.compute_async(&input[..4], &pool).unwrap();
        let second = right
            .compute_async_into(&input[4..], vec![Complex64::default(); 4], &pool)
            .unwrap();

        assert_spectrum_eq(&first.wait().unwrap(), &scenario_one());
        assert_spectrum_eq(&second.wait().unwrap(), &scenario_one());
    }

    #[test]
    fn many_engines_in_parallel_threads() {
        let input = pseudo_random(64, 99);
        let expected = BufferedFft::new(64).compute_vec(&input).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let fft = BufferedFft::new(64);
                    for _ in 0..50 {
                        assert_spectrum_eq(&fft.compute_vec(&input).unwrap(), &expected);
                    }
                });
            }
        });
    }

    #[test]
    fn shared_engine_serializes_synchronous_calls() {
        let fft = BufferedFft::new(8);
        let input = pseudo_random(8, 3);
        let expected = fft.compute_vec(&input).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        assert_spectrum_eq(&fft.compute_vec(&input).unwrap(), &expected);
                    }
                });
            }
        });
    }

    #[test]
    fn input_is_captured_at_submission() {
        let fft = BufferedFft::new(4);
        let executor = Deferred::default();
        let mut samples = [1_i8, 8, 3, 2];

        let handle = fft.compute_async(&samples, &executor).unwrap();
        samples.fill(0);
        executor.run_all();

        assert_spectrum_eq(&handle.wait().unwrap(), &scenario_one());
    }

    #[test]
    fn pending_async_transform_makes_engine_busy() {
        let fft = BufferedFft::new(4);
        let executor = Deferred::default();

        let handle = fft.compute_async(&[1_i8, 8, 3, 2], &executor).unwrap();
        assert_eq!(
            fft.compute_async(&[0_i8; 4], &executor).err(),
            Some(FftError::Busy)
        );
        assert_eq!(fft.compute_vec(&[0_i8; 4]), Err(FftError::Busy));

        executor.run_all();
        assert_spectrum_eq(&handle.wait().unwrap(), &scenario_one());
        assert!(fft.compute_vec(&[0_i8; 4]).is_ok());
    }

    #[test]
    fn discarded_task_cancels_and_frees_the_engine() {
        let fft = BufferedFft::new(4);
        let executor = Deferred::default();

        let handle = fft.compute_async(&[1_i8, 8, 3, 2], &executor).unwrap();
        executor.discard_all();

        assert_eq!(handle.wait(), Err(FftError::Cancelled));
        assert_spectrum_eq(
            &fft.compute_vec(&[1_i8, 8, 3, 2]).unwrap(),
            &scenario_one(),
        );
    }

    #[test]
    fn validation_errors_are_returned_at_submission() {
        let fft = BufferedFft::new(4);
        let executor = Deferred::default();
        assert_eq!(
            fft.compute_async(&[1_i8; 8], &executor).err(),
            Some(FftError::Size {
                requested: 8,
                capacity: 4
            })
        );
        assert!(executor.0.lock().unwrap().is_empty());
        assert!(!lock(&fft.stores).in_flight);
    }
}
