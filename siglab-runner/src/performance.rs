//! Performance metrics — pure functions over an equity curve.
//!
//! The equity curve a backtest produces is PnL in currency units at every bar.
//! Metrics resample it to one point per calendar day, add the initial cash and
//! annualize with 252 periods per year. Undefined ratios are reported as 0.0
//! so summaries always serialize.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use siglab_core::domain::TimeSeries;

pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Drawdown episode statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownStats {
    /// Number of distinct drawdown episodes.
    pub count: usize,
    /// Mean of each episode's deepest point, in percent of the running peak.
    pub mean_depth_pct: f64,
    /// Longest episode, in daily periods from peak to recovery (or to the end).
    pub longest_periods: usize,
}

/// The fixed bundle of metrics attached to a stored run artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Final minus first equity value, in currency units.
    pub gain: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Maximum drawdown in percent of the running peak.
    pub drawdown_pct: f64,
    /// Maximum currency drawdown in basis points of the initial cash.
    pub drawdown_pct_on_init_bp: f64,
    /// Maximum drawdown in currency units.
    pub mdd_usd: f64,
    /// Peak preceding the maximum drawdown.
    pub mdd_start: Option<NaiveDateTime>,
    /// Deepest point of the maximum drawdown.
    pub mdd_peak: Option<NaiveDateTime>,
    /// First time the pre-drawdown peak was regained, if ever.
    pub mdd_recover: Option<NaiveDateTime>,
    pub annual_volatility: f64,
    pub dd_stat: DrawdownStats,
    pub tail_ratio: f64,
    /// R² of a linear fit to cumulative log returns.
    pub stability: f64,
    /// 95% historical value at risk of daily returns (a negative fraction).
    pub var: f64,
    pub mean_return: f64,
    pub n_execs: usize,
}

impl PerformanceSummary {
    /// Compute every metric from a PnL curve.
    pub fn compute(equity: &TimeSeries<f64>, initial_cash: f64, n_execs: usize) -> Self {
        let gain = match (equity.values().first(), equity.values().last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        };
        let daily = daily_closes(equity);
        let capital: Vec<f64> = daily.iter().map(|(_, v)| initial_cash + v).collect();
        let returns = daily_returns(&capital);
        let dd = drawdowns(&daily, &capital);

        let cagr = cagr(&capital, returns.len());
        let calmar = if dd.max_pct > 0.0 && cagr > 0.0 {
            cagr / (dd.max_pct / 100.0)
        } else {
            0.0
        };
        let drawdown_pct_on_init_bp = if initial_cash > 0.0 {
            dd.max_usd / initial_cash * 10_000.0
        } else {
            0.0
        };

        Self {
            gain: finite(gain),
            cagr: finite(cagr),
            sharpe: finite(sharpe_ratio(&returns)),
            sortino: finite(sortino_ratio(&returns)),
            calmar: finite(calmar),
            drawdown_pct: finite(dd.max_pct),
            drawdown_pct_on_init_bp: finite(drawdown_pct_on_init_bp),
            mdd_usd: finite(dd.max_usd),
            mdd_start: dd.start,
            mdd_peak: dd.trough,
            mdd_recover: dd.recover,
            annual_volatility: finite(std_dev(&returns) * PERIODS_PER_YEAR.sqrt()),
            dd_stat: dd.stats,
            tail_ratio: finite(tail_ratio(&returns)),
            stability: finite(stability(&returns)),
            var: finite(percentile(&returns, 5.0)),
            mean_return: finite(mean_f64(&returns)),
            n_execs,
        }
    }
}

/// JSON has no infinities; overflowed metrics are reported as 0.0.
fn finite(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

// ─── Resampling ─────────────────────────────────────────────────────

/// Last value of each calendar day, stamped with that value's timestamp.
pub fn daily_closes(equity: &TimeSeries<f64>) -> Vec<(NaiveDateTime, f64)> {
    let mut out: Vec<(NaiveDateTime, f64)> = Vec::new();
    for (t, &v) in equity.iter() {
        if !v.is_finite() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.0.date() == t.date() => *last = (t, v),
            _ => out.push((t, v)),
        }
    }
    out
}

// ─── Individual metric functions ────────────────────────────────────

pub fn daily_returns(capital: &[f64]) -> Vec<f64> {
    capital
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Compound annual growth rate over `periods` daily returns.
pub fn cagr(capital: &[f64], periods: usize) -> f64 {
    let (Some(&initial), Some(&last)) = (capital.first(), capital.last()) else {
        return 0.0;
    };
    if periods == 0 || initial <= 0.0 || last <= 0.0 {
        return 0.0;
    }
    let years = periods as f64 / PERIODS_PER_YEAR;
    finite((last / initial).powf(1.0 / years) - 1.0)
}

/// Annualized Sharpe ratio with a zero risk-free rate.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std * PERIODS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio; downside deviation uses the full sample size.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / downside_std * PERIODS_PER_YEAR.sqrt()
}

/// |95th percentile| / |5th percentile| of returns.
pub fn tail_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let left = percentile(returns, 5.0).abs();
    if left < 1e-15 {
        return 0.0;
    }
    percentile(returns, 95.0).abs() / left
}

/// R² of cumulative log returns regressed on time.
pub fn stability(returns: &[f64]) -> f64 {
    if returns.len() < 2 || returns.iter().any(|r| *r <= -1.0) {
        return 0.0;
    }
    let mut acc = 0.0;
    let y: Vec<f64> = returns
        .iter()
        .map(|r| {
            acc += r.ln_1p();
            acc
        })
        .collect();
    let n = y.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = mean_f64(&y);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (i, yi) in y.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = yi - y_mean;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx < 1e-15 || syy < 1e-15 {
        return 0.0;
    }
    sxy * sxy / (sxx * syy)
}

/// Linear-interpolated percentile, `q` in [0, 100].
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = q.clamp(0.0, 100.0) / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

// ─── Drawdowns ──────────────────────────────────────────────────────

struct Drawdowns {
    max_usd: f64,
    max_pct: f64,
    start: Option<NaiveDateTime>,
    trough: Option<NaiveDateTime>,
    recover: Option<NaiveDateTime>,
    stats: DrawdownStats,
}

fn drawdowns(daily: &[(NaiveDateTime, f64)], capital: &[f64]) -> Drawdowns {
    let mut out = Drawdowns {
        max_usd: 0.0,
        max_pct: 0.0,
        start: None,
        trough: None,
        recover: None,
        stats: DrawdownStats::default(),
    };
    let Some(&first) = capital.first() else {
        return out;
    };

    let mut peak = first;
    let mut peak_at = 0usize;
    // Deepest point of the maximum drawdown, and its peak.
    let mut mdd_peak_idx = None;
    let mut mdd_trough_idx = 0usize;
    // Current episode: start index and depth.
    let mut episode: Option<(usize, f64)> = None;
    let mut depths = Vec::new();

    for (i, &value) in capital.iter().enumerate() {
        if value >= peak {
            if let Some((start, depth)) = episode.take() {
                depths.push(depth);
                out.stats.longest_periods = out.stats.longest_periods.max(i - start);
            }
            peak = value;
            peak_at = i;
            continue;
        }
        let usd = peak - value;
        let pct = if peak > 0.0 { usd / peak * 100.0 } else { 0.0 };
        let entry = episode.get_or_insert((peak_at, 0.0));
        entry.1 = entry.1.max(pct);
        out.max_pct = out.max_pct.max(pct);
        if usd > out.max_usd {
            out.max_usd = usd;
            mdd_peak_idx = Some(peak_at);
            mdd_trough_idx = i;
        }
    }
    if let Some((start, depth)) = episode {
        depths.push(depth);
        out.stats.longest_periods = out.stats.longest_periods.max(capital.len() - 1 - start);
    }

    out.stats.count = depths.len();
    out.stats.mean_depth_pct = mean_f64(&depths);

    if let Some(p) = mdd_peak_idx {
        out.start = Some(daily[p].0);
        out.trough = Some(daily[mdd_trough_idx].0);
        out.recover = capital[mdd_trough_idx..]
            .iter()
            .position(|&v| v >= capital[p])
            .map(|offset| daily[mdd_trough_idx + offset].0);
    }
    out
}

// ─── Tests ───────────────────────────────────────────────────────────
