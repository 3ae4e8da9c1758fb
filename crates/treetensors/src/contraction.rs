//! Mode-wise contraction primitives.
//!
//! Everything here iterates the before/active/behind decomposition of a
//! flat index around one chosen mode: [`mult_ab`] replaces a mode's
//! values by a matrix product slice-by-slice, [`mult_atb`] applies the
//! conjugate transpose instead, and [`hole_product`] marginalizes every
//! mode except one, producing the reduced overlap in that mode's space.
//! The hole product is the primitive the tree sweeps are built on.

use rayon::prelude::*;

use crate::matrix::Matrix;
use crate::scalar::Scalar;
use crate::tensor::Tensor;

/// `C[.., j, ..] += Σ_l A(j, l) · B[.., l, ..]` around one mode.
///
/// `active_c` is the active size of `C` (rows of `A`), `active_b` the
/// active size of `B` (columns of `A`). With `zero` set the destination
/// is cleared first, otherwise it accumulates.
fn mat_tensor<T: Scalar>(
    c: &mut Tensor<T>,
    a: &Matrix<T>,
    b: &Tensor<T>,
    before: usize,
    active_c: usize,
    active_b: usize,
    behind: usize,
    zero: bool,
) {
    if zero {
        c.zero();
    }
    let cd = c.data_mut();
    let bd = b.data();
    let ad = a.data();
    let actbef_b = active_b * before;
    let actbef_c = active_c * before;
    if before == 1 {
        for k in 0..behind {
            let kb = k * actbef_b;
            let kc = k * actbef_c;
            for l in 0..active_b {
                let b_kl = bd[kb + l];
                for j in 0..active_c {
                    cd[kc + j] += ad[l * active_c + j] * b_kl;
                }
            }
        }
    } else {
        for k in 0..behind {
            let kb = k * actbef_b;
            let kc = k * actbef_c;
            for l in 0..active_b {
                let lpre = l * before + kb;
                let lact = l * active_c;
                for j in 0..active_c {
                    let a_jl = ad[lact + j];
                    let jpre = j * before + kc;
                    for i in 0..before {
                        cd[jpre + i] += a_jl * bd[lpre + i];
                    }
                }
            }
        }
    }
}

/// Adjoint variant of [`mat_tensor`]:
/// `C[.., j, ..] += Σ_l conj(A(l, j)) · B[.., l, ..]`.
fn t_mat_tensor<T: Scalar>(
    c: &mut Tensor<T>,
    a: &Matrix<T>,
    b: &Tensor<T>,
    before: usize,
    active_b: usize,
    active_c: usize,
    behind: usize,
    zero: bool,
) {
    if zero {
        c.zero();
    }
    let cd = c.data_mut();
    let bd = b.data();
    let actbef_b = active_b * before;
    let actbef_c = active_c * before;
    if before == 1 {
        for k in 0..behind {
            let kb = k * actbef_b;
            let kc = k * actbef_c;
            for l in 0..active_b {
                let b_kl = bd[kb + l];
                for j in 0..active_c {
                    cd[kc + j] += a.at(l, j).conj() * b_kl;
                }
            }
        }
    } else {
        for k in 0..behind {
            let kb = k * actbef_b;
            let kc = k * actbef_c;
            for l in 0..active_b {
                let lpre = l * before + kb;
                for j in 0..active_c {
                    let a_lj = a.at(l, j).conj();
                    let jpre = j * before + kc;
                    for i in 0..before {
                        cd[jpre + i] += a_lj * bd[lpre + i];
                    }
                }
            }
        }
    }
}

/// Contract matrix `A` against mode `mode` of `B`, accumulating into `c`.
///
/// `c` must already carry the output shape (`A`'s row count in the
/// contracted mode); with `zero` set it is cleared first.
pub fn mult_ab_into<T: Scalar>(
    c: &mut Tensor<T>,
    a: &Matrix<T>,
    b: &Tensor<T>,
    mode: usize,
    zero: bool,
) {
    let shape = b.shape();
    assert!(mode < shape.order(), "mode {} out of range", mode);
    assert_eq!(a.cols(), shape.dim(mode), "matrix columns must match the contracted mode");
    assert_eq!(
        c.shape().dim(mode),
        a.rows(),
        "destination active size must match the matrix rows"
    );
    let before = shape.before(mode);
    let behind = shape.after(mode);
    mat_tensor(c, a, b, before, a.rows(), a.cols(), behind, zero);
}

/// Contract matrix `A` against mode `mode` of `B`, returning a fresh
/// tensor. Rectangular matrices resize the contracted mode to `A`'s row
/// count.
pub fn mult_ab<T: Scalar>(a: &Matrix<T>, b: &Tensor<T>, mode: usize) -> Tensor<T> {
    let shape = b.shape();
    assert!(mode < shape.order(), "mode {} out of range", mode);
    assert_eq!(a.cols(), shape.dim(mode), "matrix columns must match the contracted mode");
    let out_shape = shape
        .replace_dimension(mode, a.rows())
        .expect("mode index checked above");
    let mut c = Tensor::zeros(&out_shape);
    mult_ab_into(&mut c, a, b, mode, false);
    c
}

/// Contract the conjugate transpose of `A` against mode `mode` of `B`.
/// Rectangular matrices resize the contracted mode to `A`'s column count.
pub fn mult_atb<T: Scalar>(a: &Matrix<T>, b: &Tensor<T>, mode: usize) -> Tensor<T> {
    let shape = b.shape();
    assert!(mode < shape.order(), "mode {} out of range", mode);
    assert_eq!(a.rows(), shape.dim(mode), "matrix rows must match the contracted mode");
    let out_shape = shape
        .replace_dimension(mode, a.cols())
        .expect("mode index checked above");
    let mut c = Tensor::zeros(&out_shape);
    let before = shape.before(mode);
    let behind = shape.after(mode);
    t_mat_tensor(&mut c, a, b, before, a.rows(), a.cols(), behind, false);
    c
}

/// Contract `A` against the trailing state mode:
/// `C(i, m) = Σ_n A(m, n) · B(i, n)`. The output state count is `A`'s
/// row count.
pub fn mult_state_ab<T: Scalar>(a: &Matrix<T>, b: &Tensor<T>) -> Tensor<T> {
    mult_ab(a, b, b.shape().order() - 1)
}

/// State-wise product with the plain (unconjugated) transpose:
/// `C(i, m) = Σ_n A(n, m) · B(i, n)`. Requires a square `A` matching the
/// state count.
pub fn mult_state_transposed<T: Scalar>(a: &Matrix<T>, b: &Tensor<T>) -> Tensor<T> {
    let shape = b.shape();
    let ntensor = shape.ntensor();
    assert_eq!(a.rows(), a.cols(), "state mixing matrix must be square");
    assert_eq!(a.cols(), ntensor, "matrix size must match the state count");
    let dim_part = shape.dim_part();
    let mut c = Tensor::zeros(shape);
    for m in 0..ntensor {
        for n in 0..ntensor {
            let a_nm = a.at(n, m);
            for i in 0..dim_part {
                *c.at_mut(i, m) += a_nm * b.at(i, n);
            }
        }
    }
    c
}

/// Reduced overlap in the space of mode `k`:
/// `S(i, j) = Σ conj(A[.., i, ..]) · B[.., j, ..]`, marginalized over
/// every other mode. For `k` equal to the trailing state mode this
/// degenerates to the state-pair Gram matrix.
///
/// The two tensors may differ in the active size of mode `k` but must
/// agree everywhere else. Output columns are computed in parallel; the
/// per-cell reduction is sequential.
pub fn hole_product<T: Scalar>(a: &Tensor<T>, b: &Tensor<T>, k: usize) -> Matrix<T> {
    let sa = a.shape();
    let sb = b.shape();
    assert!(k < sa.order(), "mode {} out of range", k);
    let before = sa.before(k);
    let behind = sa.after(k);
    let active1 = sa.dim(k);
    let active2 = sb.dim(k);
    assert_eq!(before, sb.before(k), "leading mode sizes must agree");
    assert_eq!(behind, sb.after(k), "trailing mode sizes must agree");
    let mut s = Matrix::zeros(active1, active2);
    let ad = a.data();
    let bd = b.data();
    let actbef1 = active1 * before;
    let actbef2 = active2 * before;
    s.data_mut()
        .par_chunks_mut(active1)
        .enumerate()
        .for_each(|(j, col)| {
            for n in 0..behind {
                let npre1 = n * actbef1;
                let jpre = n * actbef2 + j * before;
                for (i, cell) in col.iter_mut().enumerate() {
                    let ipre = npre1 + i * before;
                    let mut acc = T::zero();
                    for l in 0..before {
                        acc += ad[ipre + l].conj() * bd[jpre + l];
                    }
                    *cell += acc;
                }
            }
        });
    s
}

/// Two-mode reduced object: contraction of `conj(A)` against `B` over
/// every mode except `k1 < k2`, yielding a tensor with modes
/// `(A-active k1, B-active k1, A-active k2, B-active k2)`.
pub fn double_hole_product<T: Scalar>(
    a: &Tensor<T>,
    b: &Tensor<T>,
    k1: usize,
    k2: usize,
) -> Tensor<T> {
    let sa = a.shape();
    let sb = b.shape();
    assert!(k1 < k2, "hole modes must be ordered");
    assert!(k2 + 1 < sa.order(), "mode {} is not a part mode", k2);
    for k in 0..sa.order() {
        if k != k1 && k != k2 {
            assert_eq!(sa.dim(k), sb.dim(k), "untouched mode sizes must agree");
        }
    }
    let a1 = sa.dim(k1);
    let b1 = sb.dim(k1);
    let a2 = sa.dim(k2);
    let b2 = sb.dim(k2);
    let before = sa.before(k1);
    let mid = sa.before(k2) / (before * a1);
    let behind = sa.after(k2) / sa.ntensor();
    let out_shape = crate::shape::TensorShape::new(&[a1, b1, a2, b2])
        .expect("active sizes are positive");
    let mut d = Tensor::zeros(&out_shape);
    for n in 0..sa.ntensor() {
        for beh in 0..behind {
            for ja in 0..a2 {
                for jb in 0..b2 {
                    for m in 0..mid {
                        for ia in 0..a1 {
                            for ib in 0..b1 {
                                let mut acc = T::zero();
                                for bef in 0..before {
                                    acc += a.at_hole2(bef, ia, m, ja, beh, k1, k2, n).conj()
                                        * b.at_hole2(bef, ib, m, jb, beh, k1, k2, n);
                                }
                                let flat = ia + a1 * (ib + b1 * (ja + a2 * jb));
                                d[flat] += acc;
                            }
                        }
                    }
                }
            }
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::TensorShape;
    use approx::assert_relative_eq;

    fn counting_tensor(dims: &[usize]) -> Tensor<f64> {
        let shape = TensorShape::new(dims).unwrap();
        let data = (0..shape.total()).map(|i| (i + 1) as f64).collect();
        Tensor::from_vec(&shape, data).unwrap()
    }

    #[test]
    fn test_identity_leaves_tensor_unchanged() {
        let t = counting_tensor(&[2, 3, 4, 2]);
        for mode in 0..t.shape().order() {
            let eye = Matrix::identity(t.shape().dim(mode));
            let u = mult_ab(&eye, &t, mode);
            assert_eq!(u, t);
            let v = mult_atb(&eye, &t, mode);
            assert_eq!(v, t);
        }
    }

    #[test]
    fn test_mult_ab_scales_one_mode() {
        let t = counting_tensor(&[2, 3, 2]);
        let mut two = Matrix::identity(3);
        two *= 2.0;
        let u = mult_ab(&two, &t, 1);
        for (x, y) in u.data().iter().zip(t.data().iter()) {
            assert_relative_eq!(*x, 2.0 * y);
        }
    }

    #[test]
    fn test_mult_ab_rectangular_resizes_mode() {
        let t = counting_tensor(&[2, 3, 2]);
        // 1x3 row of ones sums the mode away to a single slot.
        let ones = Matrix::from_vec(1, 3, vec![1.0, 1.0, 1.0]).unwrap();
        let u = mult_ab(&ones, &t, 1);
        assert_eq!(u.shape().dims(), &[2, 1, 2]);
        for n in 0..2 {
            for i in 0..2 {
                let expected: f64 = (0..3).map(|j| t.at_mode(i, j, 0, 1, n)).sum();
                assert_relative_eq!(u.at_mode(i, 0, 0, 1, n), expected);
            }
        }
    }

    #[test]
    fn test_mult_atb_is_adjoint_of_mult_ab() {
        use crate::scalar::c64;
        let shape = TensorShape::new(&[2, 2]).unwrap();
        let data = (0..4).map(|i| c64::new(i as f64, 1.0)).collect();
        let t = Tensor::from_vec(&shape, data).unwrap();
        let a = Matrix::from_vec(
            2,
            2,
            vec![
                c64::new(0.0, 1.0),
                c64::new(2.0, 0.0),
                c64::new(1.0, -1.0),
                c64::new(0.0, 0.0),
            ],
        )
        .unwrap();
        let via_atb = mult_atb(&a, &t, 0);
        let via_ab = mult_ab(&a.adjoint(), &t, 0);
        for i in 0..4 {
            assert_relative_eq!(via_atb[i].re, via_ab[i].re, epsilon = 1e-14);
            assert_relative_eq!(via_atb[i].im, via_ab[i].im, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_accumulate_vs_zero_flag() {
        let t = counting_tensor(&[2, 2]);
        let eye = Matrix::identity(2);
        let mut c = Tensor::zeros(t.shape());
        mult_ab_into(&mut c, &eye, &t, 0, false);
        mult_ab_into(&mut c, &eye, &t, 0, false);
        for (x, y) in c.data().iter().zip(t.data().iter()) {
            assert_relative_eq!(*x, 2.0 * y);
        }
        mult_ab_into(&mut c, &eye, &t, 0, true);
        assert_eq!(c, t);
    }

    #[test]
    fn test_hole_product_last_mode_is_gram() {
        let t = counting_tensor(&[3, 2, 2]);
        let s = hole_product(&t, &t, t.shape().order() - 1);
        let g = t.gram(&t);
        assert_eq!(s.rows(), 2);
        for i in 0..2 {
            for j in 0..2 {
                assert_relative_eq!(s.at(i, j), g.at(i, j));
            }
        }
    }

    #[test]
    fn test_hole_product_manual() {
        let t = counting_tensor(&[2, 2]);
        // Mode 0, dims {2, 2}: S(i, j) = sum_n t(i, n) * t(j, n)
        let s = hole_product(&t, &t, 0);
        for i in 0..2 {
            for j in 0..2 {
                let expected: f64 = (0..2).map(|n| t.at(i, n) * t.at(j, n)).sum();
                assert_relative_eq!(s.at(i, j), expected);
            }
        }
    }

    #[test]
    fn test_mult_state_transposed() {
        let t = counting_tensor(&[2, 2]);
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let c = mult_state_transposed(&a, &t);
        for m in 0..2 {
            for i in 0..2 {
                let expected: f64 = (0..2).map(|n| a.at(n, m) * t.at(i, n)).sum();
                assert_relative_eq!(c.at(i, m), expected);
            }
        }
    }

    #[test]
    fn test_double_hole_traces_to_hole() {
        // Contracting the double-hole object over its second mode pair's
        // diagonal recovers the single-mode hole product.
        let t = counting_tensor(&[2, 3, 2, 2]);
        let d = double_hole_product(&t, &t, 0, 2);
        let s = hole_product(&t, &t, 0);
        let (a1, b1, a2) = (2, 2, 2);
        for i in 0..2 {
            for j in 0..2 {
                let mut traced = 0.0;
                for x in 0..2 {
                    traced += d[i + a1 * (j + b1 * (x + a2 * x))];
                }
                assert_relative_eq!(traced, s.at(i, j), epsilon = 1e-12);
            }
        }
    }
}
