//! SIMD-blocked vector and banded matrix-vector kernels.
//!
//! Every kernel processes its input in blocks of [`LANES`] values followed by
//! a scalar remainder. Two implementations share that shape:
//!
//! - a portable one that keeps one accumulator per lane in a `[f64; LANES]`
//!   array, and
//! - an AVX2 + FMA one (`simd` feature, x86_64), chosen at runtime when the
//!   CPU supports both extensions.
//!
//! Both paths produce bit-identical results:
//!
//! - every multiply-accumulate is fused (`f64::mul_add` / `vfmadd`), in the
//!   blocked part and in the remainder alike;
//! - lane partial sums are folded as `(l0 + l1) + (l2 + l3)` before the
//!   remainder is added in order.
//!
//! The summation order is therefore part of the kernel contract, and runs are
//! reproducible bit for bit on any machine.
//!
//! Kernels assert matching lengths. A length of zero is a no-op. Destinations
//! never alias sources except where a kernel is documented as in-place
//! ([`axpy`], [`xpby`]).

use crate::banded::BandedMatrix;

/// Number of `f64` lanes per block (one 256-bit register).
pub const LANES: usize = 4;

/// Row kernel signature: accumulate one stored band row into `y`.
///
/// Arguments are the band row `A[i][i+1..=i+len]`, `v[i]`, `v[i+1..=i+len]`,
/// `y[i+1..=i+len]` (scattered into) and the running `y[i]`; returns the new
/// `y[i]`.
type RowKernel = fn(&[f64], f64, &[f64], &mut [f64], f64) -> f64;

/// `true` when the AVX2 + FMA kernels are compiled in and supported by the
/// running CPU.
#[cfg(all(feature = "simd", target_arch = "x86_64"))]
#[inline]
pub fn simd_available() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

/// `true` when the AVX2 + FMA kernels are compiled in and supported by the
/// running CPU.
#[cfg(not(all(feature = "simd", target_arch = "x86_64")))]
#[inline]
pub fn simd_available() -> bool {
    false
}

/// Fold lane partial sums in the fixed `(l0 + l1) + (l2 + l3)` order.
#[inline(always)]
fn reduce_lanes(acc: [f64; LANES]) -> f64 {
    (acc[0] + acc[1]) + (acc[2] + acc[3])
}

// ═══════════════════════════════════════════════════════════════════════════
// Dispatching entry points
// ═══════════════════════════════════════════════════════════════════════════

/// Banded matrix-vector product `y = A * v`.
///
/// First pass: `y[i] = A[i][i] * v[i]`. Second pass, for each row `i` in
/// order, every stored `a = A[i][c]` (`c > i`) is applied twice:
/// `y[i] += a * v[c]` is accumulated across lanes and folded once per row,
/// while `y[c] += a * v[i]` is stored lane-wise straight back into `y`. Each
/// `y[c]` is touched once per row, so the scatter needs no reduction. This
/// symmetric scatter is what keeps the stored matrix at half size, and it is
/// what prevents naive row-parallelism (see [`multiply_banded_parallel`]).
///
/// # Panics
///
/// Panics if `v.len()` or `y.len()` differs from `matrix.n()`.
pub fn multiply_banded(matrix: &BandedMatrix, v: &[f64], y: &mut [f64]) {
    assert_eq!(v.len(), matrix.n(), "multiply_banded: v length must equal n");
    assert_eq!(y.len(), matrix.n(), "multiply_banded: y length must equal n");

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if simd_available() {
            // SAFETY: AVX2 and FMA support was checked at runtime.
            unsafe { avx2::multiply_banded(matrix, v, y) };
            return;
        }
    }

    multiply_banded_portable(matrix, v, y);
}

/// Dot product `sum(a[i] * b[i])` with a lane-wide accumulator.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "dot: length mismatch");

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if simd_available() {
            // SAFETY: AVX2 and FMA support was checked at runtime.
            return unsafe { avx2::dot(a, b) };
        }
    }

    dot_portable(a, b)
}

/// Element-wise difference `out = a - b`.
///
/// # Panics
///
/// Panics if the three lengths differ.
pub fn subtract(a: &[f64], b: &[f64], out: &mut [f64]) {
    assert_eq!(a.len(), b.len(), "subtract: length mismatch");
    assert_eq!(a.len(), out.len(), "subtract: output length mismatch");

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if simd_available() {
            // SAFETY: AVX2 and FMA support was checked at runtime.
            unsafe { avx2::subtract(a, b, out) };
            return;
        }
    }

    subtract_portable(a, b, out);
}

/// Scaled addition `out = a + b * scalar` with a single rounding per element.
///
/// # Panics
///
/// Panics if the three lengths differ.
pub fn add_scaled(a: &[f64], b: &[f64], scalar: f64, out: &mut [f64]) {
    assert_eq!(a.len(), b.len(), "add_scaled: length mismatch");
    assert_eq!(a.len(), out.len(), "add_scaled: output length mismatch");

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if simd_available() {
            // SAFETY: AVX2 and FMA support was checked at runtime.
            unsafe { avx2::add_scaled(a, b, scalar, out) };
            return;
        }
    }

    add_scaled_portable(a, b, scalar, out);
}

/// In-place `y = y + x * alpha`: [`add_scaled`] whose destination is its
/// first operand.
///
/// # Panics
///
/// Panics if `x.len() != y.len()`.
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "axpy: length mismatch");

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if simd_available() {
            // SAFETY: AVX2 and FMA support was checked at runtime.
            unsafe { avx2::axpy(alpha, x, y) };
            return;
        }
    }

    axpy_portable(alpha, x, y);
}

/// In-place `y = x + y * beta`: [`add_scaled`] whose destination is its
/// second (scaled) operand.
///
/// # Panics
///
/// Panics if `x.len() != y.len()`.
pub fn xpby(x: &[f64], beta: f64, y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "xpby: length mismatch");

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if simd_available() {
            // SAFETY: AVX2 and FMA support was checked at runtime.
            unsafe { avx2::xpby(x, beta, y) };
            return;
        }
    }

    xpby_portable(x, beta, y);
}

/// Copy `src` into `dst`.
///
/// # Panics
///
/// Panics if the lengths differ.
#[inline]
pub fn copy(src: &[f64], dst: &mut [f64]) {
    assert_eq!(src.len(), dst.len(), "copy: length mismatch");
    dst.copy_from_slice(src);
}

// ═══════════════════════════════════════════════════════════════════════════
// Portable lane-blocked implementations
// ═══════════════════════════════════════════════════════════════════════════

/// Portable [`multiply_banded`].
pub fn multiply_banded_portable(matrix: &BandedMatrix, v: &[f64], y: &mut [f64]) {
    assert_eq!(v.len(), matrix.n(), "multiply_banded: v length must equal n");
    assert_eq!(y.len(), matrix.n(), "multiply_banded: y length must equal n");

    main_diagonal_portable(matrix.main_diagonal(), v, y);
    scatter_bands(matrix, v, y, accumulate_row_portable);
}

fn main_diagonal_portable(main: &[f64], v: &[f64], y: &mut [f64]) {
    for ((yc, mc), vc) in y
        .chunks_exact_mut(LANES)
        .zip(main.chunks_exact(LANES))
        .zip(v.chunks_exact(LANES))
    {
        for l in 0..LANES {
            yc[l] = mc[l] * vc[l];
        }
    }

    let base = main.len() - main.len() % LANES;
    for i in base..main.len() {
        y[i] = main[i] * v[i];
    }
}

/// Off-diagonal pass over every row in order, using `kernel` per row.
fn scatter_bands(matrix: &BandedMatrix, v: &[f64], y: &mut [f64], kernel: RowKernel) {
    let n = matrix.n();
    if matrix.half_band() == 0 || n < 2 {
        return;
    }

    for i in 0..n - 1 {
        let band = matrix.row_band(i);
        let len = band.len();
        let (head, tail) = y.split_at_mut(i + 1);
        head[i] = kernel(band, v[i], &v[i + 1..i + 1 + len], &mut tail[..len], head[i]);
    }
}

fn accumulate_row_portable(
    band: &[f64],
    vi: f64,
    v_cols: &[f64],
    y_cols: &mut [f64],
    yi: f64,
) -> f64 {
    let len = band.len();
    let blocks = len / LANES;
    let mut acc = [0.0f64; LANES];

    for b in 0..blocks {
        let base = b * LANES;
        for l in 0..LANES {
            let a = band[base + l];
            acc[l] = a.mul_add(v_cols[base + l], acc[l]);
            y_cols[base + l] = a.mul_add(vi, y_cols[base + l]);
        }
    }

    let mut sum = yi + reduce_lanes(acc);
    for j in blocks * LANES..len {
        let a = band[j];
        sum = a.mul_add(v_cols[j], sum);
        y_cols[j] = a.mul_add(vi, y_cols[j]);
    }
    sum
}

/// Portable [`dot`].
pub fn dot_portable(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "dot: length mismatch");

    let mut acc = [0.0f64; LANES];
    for (ac, bc) in a.chunks_exact(LANES).zip(b.chunks_exact(LANES)) {
        for l in 0..LANES {
            acc[l] = ac[l].mul_add(bc[l], acc[l]);
        }
    }

    let mut sum = reduce_lanes(acc);
    let base = a.len() - a.len() % LANES;
    for i in base..a.len() {
        sum = a[i].mul_add(b[i], sum);
    }
    sum
}

/// Portable [`subtract`].
pub fn subtract_portable(a: &[f64], b: &[f64], out: &mut [f64]) {
    assert_eq!(a.len(), b.len(), "subtract: length mismatch");
    assert_eq!(a.len(), out.len(), "subtract: output length mismatch");

    for ((oc, ac), bc) in out
        .chunks_exact_mut(LANES)
        .zip(a.chunks_exact(LANES))
        .zip(b.chunks_exact(LANES))
    {
        for l in 0..LANES {
            oc[l] = ac[l] - bc[l];
        }
    }

    let base = a.len() - a.len() % LANES;
    for i in base..a.len() {
        out[i] = a[i] - b[i];
    }
}

/// Portable [`add_scaled`].
pub fn add_scaled_portable(a: &[f64], b: &[f64], scalar: f64, out: &mut [f64]) {
    assert_eq!(a.len(), b.len(), "add_scaled: length mismatch");
    assert_eq!(a.len(), out.len(), "add_scaled: output length mismatch");

    for ((oc, ac), bc) in out
        .chunks_exact_mut(LANES)
        .zip(a.chunks_exact(LANES))
        .zip(b.chunks_exact(LANES))
    {
        for l in 0..LANES {
            oc[l] = bc[l].mul_add(scalar, ac[l]);
        }
    }

    let base = a.len() - a.len() % LANES;
    for i in base..a.len() {
        out[i] = b[i].mul_add(scalar, a[i]);
    }
}

/// Portable [`axpy`].
pub fn axpy_portable(alpha: f64, x: &[f64], y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "axpy: length mismatch");

    for (yc, xc) in y.chunks_exact_mut(LANES).zip(x.chunks_exact(LANES)) {
        for l in 0..LANES {
            yc[l] = xc[l].mul_add(alpha, yc[l]);
        }
    }

    let base = x.len() - x.len() % LANES;
    for i in base..x.len() {
        y[i] = x[i].mul_add(alpha, y[i]);
    }
}

/// Portable [`xpby`].
pub fn xpby_portable(x: &[f64], beta: f64, y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "xpby: length mismatch");

    for (yc, xc) in y.chunks_exact_mut(LANES).zip(x.chunks_exact(LANES)) {
        for l in 0..LANES {
            yc[l] = yc[l].mul_add(beta, xc[l]);
        }
    }

    let base = x.len() - x.len() % LANES;
    for i in base..x.len() {
        y[i] = y[i].mul_add(beta, x[i]);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Row-parallel matrix-vector product
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(feature = "parallel")]
fn select_row_kernel() -> RowKernel {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if simd_available() {
            return avx2::accumulate_row_detected;
        }
    }
    accumulate_row_portable
}

/// Row-parallel `y = A * v` on the rayon thread pool.
///
/// Rows are split into contiguous stripes, one per worker. The symmetric
/// scatter of row `i` writes `y[i+1..=i+h]`, which crosses into the next
/// stripe, so each worker accumulates into a private window covering its
/// rows plus `h` trailing slots. Windows are merged into `y` in stripe order
/// after the main-diagonal pass.
///
/// The merge reorders additions relative to [`multiply_banded`], so results
/// agree to rounding but are not bit-identical. For a fixed thread count the
/// result is deterministic.
///
/// # Panics
///
/// Panics if `v.len()` or `y.len()` differs from `matrix.n()`.
#[cfg(feature = "parallel")]
pub fn multiply_banded_parallel(matrix: &BandedMatrix, v: &[f64], y: &mut [f64]) {
    use rayon::prelude::*;

    let n = matrix.n();
    assert_eq!(v.len(), n, "multiply_banded_parallel: v length must equal n");
    assert_eq!(y.len(), n, "multiply_banded_parallel: y length must equal n");

    let h = matrix.half_band();
    if h == 0 || n < 2 {
        multiply_banded(matrix, v, y);
        return;
    }

    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if simd_available() {
            // SAFETY: AVX2 and FMA support was checked at runtime.
            unsafe { avx2::main_diagonal(matrix.main_diagonal(), v, y) };
        } else {
            main_diagonal_portable(matrix.main_diagonal(), v, y);
        }
    }
    #[cfg(not(all(feature = "simd", target_arch = "x86_64")))]
    main_diagonal_portable(matrix.main_diagonal(), v, y);

    let rows = n - 1;
    let workers = rayon::current_num_threads().max(1).min(rows);
    let rows_per_worker = rows.div_ceil(workers);
    let kernel = select_row_kernel();

    let windows: Vec<(usize, Vec<f64>)> = (0..workers)
        .into_par_iter()
        .map(|w| {
            let start = (w * rows_per_worker).min(rows);
            let end = ((w + 1) * rows_per_worker).min(rows);
            let window_end = (end + h).min(n);
            let mut local = vec![0.0f64; window_end - start];

            for i in start..end {
                let band = matrix.row_band(i);
                let len = band.len();
                let off = i - start;
                let (head, tail) = local.split_at_mut(off + 1);
                head[off] = kernel(band, v[i], &v[i + 1..i + 1 + len], &mut tail[..len], head[off]);
            }

            (start, local)
        })
        .collect();

    for (start, local) in windows {
        for (yk, lk) in y[start..start + local.len()].iter_mut().zip(&local) {
            *yk += *lk;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AVX2 + FMA implementations
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod avx2 {
    //! Every function here requires AVX2 and FMA. Callers check
    //! [`simd_available`](super::simd_available) first. Loads and stores are
    //! unaligned because band rows start at arbitrary offsets.

    use std::arch::x86_64::*;

    use super::{scatter_bands, LANES};
    use crate::banded::BandedMatrix;

    /// Horizontal sum in the `(l0 + l1) + (l2 + l3)` order of
    /// `reduce_lanes`.
    #[target_feature(enable = "avx2,fma")]
    #[inline]
    unsafe fn horizontal_sum_f64x4(v: __m256d) -> f64 {
        let pairs = _mm256_hadd_pd(v, v);
        let lo = _mm256_castpd256_pd128(pairs);
        let hi = _mm256_extractf128_pd(pairs, 1);
        _mm_cvtsd_f64(_mm_add_sd(lo, hi))
    }

    /// # Safety
    ///
    /// Requires AVX2 + FMA. `v` and `y` must have length `matrix.n()`.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn multiply_banded(matrix: &BandedMatrix, v: &[f64], y: &mut [f64]) {
        main_diagonal(matrix.main_diagonal(), v, y);
        scatter_bands(matrix, v, y, accumulate_row_detected);
    }

    /// # Safety
    ///
    /// Requires AVX2 + FMA. All three slices must have the same length.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn main_diagonal(main: &[f64], v: &[f64], y: &mut [f64]) {
        debug_assert!(main.len() == v.len() && v.len() == y.len());
        let n = main.len();
        let blocks = n / LANES;

        for b in 0..blocks {
            let i = b * LANES;
            // SAFETY: `i + LANES <= n` for every block.
            let m = _mm256_loadu_pd(main.as_ptr().add(i));
            let x = _mm256_loadu_pd(v.as_ptr().add(i));
            _mm256_storeu_pd(y.as_mut_ptr().add(i), _mm256_mul_pd(m, x));
        }

        for i in blocks * LANES..n {
            y[i] = main[i] * v[i];
        }
    }

    /// Row kernel for `scatter_bands`.
    ///
    /// Only handed out after `simd_available()` returned `true`.
    pub(super) fn accumulate_row_detected(
        band: &[f64],
        vi: f64,
        v_cols: &[f64],
        y_cols: &mut [f64],
        yi: f64,
    ) -> f64 {
        // SAFETY: reachable only through `multiply_banded` /
        // `select_row_kernel`, both gated on runtime AVX2 + FMA detection.
        unsafe { accumulate_row(band, vi, v_cols, y_cols, yi) }
    }

    #[target_feature(enable = "avx2,fma")]
    unsafe fn accumulate_row(
        band: &[f64],
        vi: f64,
        v_cols: &[f64],
        y_cols: &mut [f64],
        yi: f64,
    ) -> f64 {
        let len = band.len();
        debug_assert!(v_cols.len() == len && y_cols.len() == len);
        let blocks = len / LANES;

        let vi4 = _mm256_set1_pd(vi);
        let mut acc = _mm256_setzero_pd();

        for b in 0..blocks {
            let base = b * LANES;
            // SAFETY: `base + LANES <= len` and all three slices have `len`
            // elements.
            let a = _mm256_loadu_pd(band.as_ptr().add(base));
            let vc = _mm256_loadu_pd(v_cols.as_ptr().add(base));
            acc = _mm256_fmadd_pd(a, vc, acc);

            let yc = _mm256_loadu_pd(y_cols.as_ptr().add(base));
            _mm256_storeu_pd(y_cols.as_mut_ptr().add(base), _mm256_fmadd_pd(a, vi4, yc));
        }

        let mut sum = yi + horizontal_sum_f64x4(acc);
        for j in blocks * LANES..len {
            let a = band[j];
            sum = a.mul_add(v_cols[j], sum);
            y_cols[j] = a.mul_add(vi, y_cols[j]);
        }
        sum
    }

    /// # Safety
    ///
    /// Requires AVX2 + FMA. `a.len() == b.len()`.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn dot(a: &[f64], b: &[f64]) -> f64 {
        let n = a.len();
        let blocks = n / LANES;
        let mut acc = _mm256_setzero_pd();

        for blk in 0..blocks {
            let i = blk * LANES;
            let ta = _mm256_loadu_pd(a.as_ptr().add(i));
            let tb = _mm256_loadu_pd(b.as_ptr().add(i));
            acc = _mm256_fmadd_pd(ta, tb, acc);
        }

        let mut sum = horizontal_sum_f64x4(acc);
        for i in blocks * LANES..n {
            sum = a[i].mul_add(b[i], sum);
        }
        sum
    }

    /// # Safety
    ///
    /// Requires AVX2 + FMA. All three slices have the same length.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn subtract(a: &[f64], b: &[f64], out: &mut [f64]) {
        let n = a.len();
        let blocks = n / LANES;

        for blk in 0..blocks {
            let i = blk * LANES;
            let ta = _mm256_loadu_pd(a.as_ptr().add(i));
            let tb = _mm256_loadu_pd(b.as_ptr().add(i));
            _mm256_storeu_pd(out.as_mut_ptr().add(i), _mm256_sub_pd(ta, tb));
        }

        for i in blocks * LANES..n {
            out[i] = a[i] - b[i];
        }
    }

    /// # Safety
    ///
    /// Requires AVX2 + FMA. All three slices have the same length.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn add_scaled(a: &[f64], b: &[f64], scalar: f64, out: &mut [f64]) {
        let n = a.len();
        let blocks = n / LANES;
        let s = _mm256_set1_pd(scalar);

        for blk in 0..blocks {
            let i = blk * LANES;
            let ta = _mm256_loadu_pd(a.as_ptr().add(i));
            let tb = _mm256_loadu_pd(b.as_ptr().add(i));
            _mm256_storeu_pd(out.as_mut_ptr().add(i), _mm256_fmadd_pd(tb, s, ta));
        }

        for i in blocks * LANES..n {
            out[i] = b[i].mul_add(scalar, a[i]);
        }
    }

    /// # Safety
    ///
    /// Requires AVX2 + FMA. `x.len() == y.len()`.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
        let n = x.len();
        let blocks = n / LANES;
        let s = _mm256_set1_pd(alpha);

        for blk in 0..blocks {
            let i = blk * LANES;
            let tx = _mm256_loadu_pd(x.as_ptr().add(i));
            let ty = _mm256_loadu_pd(y.as_ptr().add(i));
            _mm256_storeu_pd(y.as_mut_ptr().add(i), _mm256_fmadd_pd(tx, s, ty));
        }

        for i in blocks * LANES..n {
            y[i] = x[i].mul_add(alpha, y[i]);
        }
    }

    /// # Safety
    ///
    /// Requires AVX2 + FMA. `x.len() == y.len()`.
    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn xpby(x: &[f64], beta: f64, y: &mut [f64]) {
        let n = x.len();
        let blocks = n / LANES;
        let s = _mm256_set1_pd(beta);

        for blk in 0..blocks {
            let i = blk * LANES;
            let tx = _mm256_loadu_pd(x.as_ptr().add(i));
            let ty = _mm256_loadu_pd(y.as_ptr().add(i));
            _mm256_storeu_pd(y.as_mut_ptr().add(i), _mm256_fmadd_pd(ty, s, tx));
        }

        for i in blocks * LANES..n {
            y[i] = y[i].mul_add(beta, x[i]);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banded::BandedMatrix;

    /// Banded matrix with distinct, easily checked entries.
    fn test_matrix(n: usize, bandwidth: usize) -> BandedMatrix {
        let h = bandwidth / 2;
        let diagonals: Vec<Vec<f64>> = (0..=h)
            .map(|k| {
                (0..n - k)
                    .map(|i| if k == 0 { 10.0 + i as f64 } else { 1.0 / (1 + i + k) as f64 })
                    .collect()
            })
            .collect();
        BandedMatrix::from_diagonals(n, bandwidth, &diagonals).unwrap()
    }

    fn dense_matvec(a: &BandedMatrix, v: &[f64]) -> Vec<f64> {
        a.to_dense()
            .iter()
            .map(|row| row.iter().zip(v).map(|(x, y)| x * y).sum())
            .collect()
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 0.5 + (i % 7) as f64 * 0.25).collect()
    }

    #[test]
    fn diagonal_matvec_is_exact() {
        let a = BandedMatrix::from_diagonals(9, 1, &[(1..=9).map(|i| i as f64 * 1.1).collect()])
            .unwrap();
        let v = ramp(9);
        let mut y = vec![0.0; 9];
        multiply_banded(&a, &v, &mut y);
        for i in 0..9 {
            assert_eq!(y[i], a.main_diagonal()[i] * v[i]);
        }
    }

    #[test]
    fn matvec_matches_dense_reference() {
        for &(n, bw) in &[(3, 3), (5, 5), (12, 9), (20, 11), (23, 19), (40, 17)] {
            let a = test_matrix(n, bw);
            let v = ramp(n);
            let mut y = vec![0.0; n];
            multiply_banded(&a, &v, &mut y);
            let expected = dense_matvec(&a, &v);
            for i in 0..n {
                assert!(
                    (y[i] - expected[i]).abs() < 1e-12 * expected[i].abs().max(1.0),
                    "n={n} bw={bw} i={i}: {} vs {}",
                    y[i],
                    expected[i]
                );
            }
        }
    }

    #[test]
    fn matvec_overwrites_stale_output() {
        let a = test_matrix(10, 5);
        let v = ramp(10);
        let mut clean = vec![0.0; 10];
        let mut stale = vec![123.0; 10];
        multiply_banded(&a, &v, &mut clean);
        multiply_banded(&a, &v, &mut stale);
        assert_eq!(clean, stale);
    }

    #[test]
    fn dispatch_matches_portable_bitwise() {
        let a = test_matrix(37, 13);
        let v = ramp(37);
        let mut y1 = vec![0.0; 37];
        let mut y2 = vec![0.0; 37];
        multiply_banded(&a, &v, &mut y1);
        multiply_banded_portable(&a, &v, &mut y2);
        assert_eq!(y1, y2);

        let w: Vec<f64> = v.iter().map(|x| x * 1.7 - 0.3).collect();
        assert_eq!(dot(&v, &w).to_bits(), dot_portable(&v, &w).to_bits());

        let mut o1 = vec![0.0; 37];
        let mut o2 = vec![0.0; 37];
        add_scaled(&v, &w, -0.37, &mut o1);
        add_scaled_portable(&v, &w, -0.37, &mut o2);
        assert_eq!(o1, o2);
    }

    #[test]
    fn dot_uses_lane_blocked_order() {
        // Sequential summation gives 1.0; the (l0 + l1) + (l2 + l3) fold
        // loses both small terms to rounding.
        let a = [1e16, 1.0, -1e16, 1.0];
        let b = [1.0; 4];
        assert_eq!(dot(&a, &b), 0.0);
        assert_eq!(a.iter().fold(0.0, |s, x| s + x), 1.0);
    }

    #[test]
    fn dot_basic_and_empty() {
        assert_eq!(dot(&[], &[]), 0.0);
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [6.0, 5.0, 4.0, 3.0, 2.0, 1.0];
        assert_eq!(dot(&a, &b), 56.0);
    }

    #[test]
    fn add_scaled_is_fused() {
        // (1 + 2^-30)^2 - 1 = 2^-29 + 2^-60 exactly; an unfused multiply
        // rounds the 2^-60 term away.
        let t = 1.0 + 2f64.powi(-30);
        let a = [-1.0; 5];
        let b = [t; 5];
        let mut out = [0.0; 5];
        add_scaled(&a, &b, t, &mut out);
        let fused = 2f64.powi(-29) + 2f64.powi(-60);
        assert!(out.iter().all(|&x| x == fused));
        assert_ne!(fused, t * t - 1.0);
    }

    #[test]
    fn in_place_variants_match_add_scaled() {
        let x = ramp(11);
        let y0: Vec<f64> = (0..11).map(|i| i as f64 * 0.3 - 1.0).collect();

        let mut expected = vec![0.0; 11];
        add_scaled(&y0, &x, 0.75, &mut expected);
        let mut y = y0.clone();
        axpy(0.75, &x, &mut y);
        assert_eq!(y, expected);

        add_scaled(&x, &y0, -1.25, &mut expected);
        let mut y = y0.clone();
        xpby(&x, -1.25, &mut y);
        assert_eq!(y, expected);
    }

    #[test]
    fn subtract_and_copy() {
        let a = [5.0, 4.0, 3.0, 2.0, 1.0];
        let b = [1.0, 1.0, 1.0, 1.0, 1.0];
        let mut out = [0.0; 5];
        subtract(&a, &b, &mut out);
        assert_eq!(out, [4.0, 3.0, 2.0, 1.0, 0.0]);

        let mut dst = [0.0; 5];
        copy(&a, &mut dst);
        assert_eq!(dst, a);
    }

    #[test]
    fn zero_length_is_noop() {
        let empty: [f64; 0] = [];
        let mut out: [f64; 0] = [];
        subtract(&empty, &empty, &mut out);
        add_scaled(&empty, &empty, 2.0, &mut out);
        axpy(2.0, &empty, &mut out);
        xpby(&empty, 2.0, &mut out);
        copy(&empty, &mut out);
        let a = BandedMatrix::from_diagonals(0, 1, &[vec![]]).unwrap();
        multiply_banded(&a, &empty, &mut out);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn mismatched_lengths_panic() {
        dot(&[1.0, 2.0], &[1.0]);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_matvec_matches_serial() {
        for &(n, bw) in &[(7, 3), (64, 9), (257, 31)] {
            let a = test_matrix(n, bw);
            let v = ramp(n);
            let mut serial = vec![0.0; n];
            let mut parallel = vec![7.0; n];
            multiply_banded(&a, &v, &mut serial);
            multiply_banded_parallel(&a, &v, &mut parallel);
            for i in 0..n {
                assert!(
                    (serial[i] - parallel[i]).abs() < 1e-12 * serial[i].abs().max(1.0),
                    "n={n} bw={bw} i={i}"
                );
            }
        }
    }
}
