//! Scalar numerics used by the derived indices: adaptive quadrature and a
//! bracketed 1-D maximizer.

const PANELS: usize = 64;
const MAX_DEPTH: u32 = 24;
const GRID_POINTS: usize = 1024;
const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// Absolute tolerance used when callers do not pick one.
pub const DEFAULT_TOLERANCE: f64 = 1e-11;

/// Integrate `f` over `[a, b]` with adaptive Simpson quadrature.
///
/// The interval is first cut into fixed panels so that narrow peaks inside a
/// wide window are never skipped by the coarse initial estimate.
pub fn integrate<F: Fn(f64) -> f64>(f: &F, a: f64, b: f64, tol: f64) -> f64 {
    if !(b > a) {
        return 0.0;
    }
    let width = (b - a) / PANELS as f64;
    let panel_tol = tol / PANELS as f64;
    (0..PANELS)
        .map(|i| {
            let lo = a + width * i as f64;
            let hi = if i + 1 == PANELS { b } else { lo + width };
            let flo = f(lo);
            let fhi = f(hi);
            let (mid, fmid, whole) = simpson(f, lo, flo, hi, fhi);
            adaptive(f, lo, flo, hi, fhi, mid, fmid, whole, panel_tol, MAX_DEPTH)
        })
        .sum()
}

/// Integrate over the whole real line a function whose mass is confined to
/// the union of the given `(lo, hi)` supports. Outside them the integrand is
/// assumed to be negligible.
///
/// Every support endpoint and midpoint becomes a breakpoint, so a narrow
/// component is always resolved on its own sub-interval.
pub fn integrate_real_line<F, I>(f: &F, supports: I, tol: f64) -> f64
where
    F: Fn(f64) -> f64,
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut breaks: Vec<f64> = supports
        .into_iter()
        .filter(|(lo, hi)| lo.is_finite() && hi.is_finite() && hi > lo)
        .flat_map(|(lo, hi)| [lo, 0.5 * (lo + hi), hi])
        .collect();
    if breaks.is_empty() {
        return 0.0;
    }
    breaks.sort_by(|a, b| a.total_cmp(b));
    breaks.dedup();
    let pieces = (breaks.len() - 1).max(1) as f64;
    breaks
        .windows(2)
        .map(|w| integrate(f, w[0], w[1], tol / pieces))
        .sum()
}

fn simpson<F: Fn(f64) -> f64>(f: &F, a: f64, fa: f64, b: f64, fb: f64) -> (f64, f64, f64) {
    let m = 0.5 * (a + b);
    let fm = f(m);
    (m, fm, (b - a) / 6.0 * (fa + 4.0 * fm + fb))
}

#[allow(clippy::too_many_arguments)]
fn adaptive<F: Fn(f64) -> f64>(
    f: &F,
    a: f64,
    fa: f64,
    b: f64,
    fb: f64,
    m: f64,
    fm: f64,
    whole: f64,
    tol: f64,
    depth: u32,
) -> f64 {
    let (lm, flm, left) = simpson(f, a, fa, m, fm);
    let (rm, frm, right) = simpson(f, m, fm, b, fb);
    let delta = left + right - whole;
    let floor = f64::EPSILON * (left.abs() + right.abs());
    if depth == 0 || delta.abs() <= 15.0 * tol.max(floor) {
        return left + right + delta / 15.0;
    }
    adaptive(f, a, fa, m, fm, lm, flm, left, tol / 2.0, depth - 1)
        + adaptive(f, m, fm, b, fb, rm, frm, right, tol / 2.0, depth - 1)
}

/// Locate the maximum of `f` on `[lo, hi]`.
///
/// A uniform grid finds the best bracket, then golden-section search refines
/// inside it. Returns `(argmax, max)`.
pub fn maximize<F: Fn(f64) -> f64>(f: &F, lo: f64, hi: f64) -> (f64, f64) {
    if !(hi > lo) {
        return (lo, f(lo));
    }
    let step = (hi - lo) / (GRID_POINTS - 1) as f64;
    let (best, _) = (0..GRID_POINTS)
        .map(|i| (i, f(lo + step * i as f64)))
        .fold((0, f64::NEG_INFINITY), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });
    let mut a = lo + step * best.saturating_sub(1) as f64;
    let mut b = (lo + step * (best + 1) as f64).min(hi);
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);
    for _ in 0..200 {
        if (b - a).abs() <= 1e-13 * (1.0 + c.abs()) {
            break;
        }
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = f(d);
        }
    }
    let t = 0.5 * (a + b);
    let grid_best = lo + step * best as f64;
    let (ft, fg) = (f(t), f(grid_best));
    if fg > ft {
        (grid_best, fg)
    } else {
        (t, ft)
    }
}
