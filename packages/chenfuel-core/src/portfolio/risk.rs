//! Risk-adjusted return statistics.

use super::exposure::ExposureSeries;

/// Deviations below this are floating-point residue of a constant series.
const MIN_STD: f64 = 1e-12;

/// Daily return on deployed capital.
///
/// Each day's P/L is divided by that day's exposure. Days whose exposure is
/// at or below `noise_floor` contribute 0 so the series stays aligned with
/// the exposure date axis.
///
/// # Arguments
///
/// * `daily_pl` - Daily realized P/L aligned with `exposure`
/// * `exposure` - Daily capital at risk
/// * `noise_floor` - Minimum exposure for a day to produce a return
pub fn daily_returns(daily_pl: &[f64], exposure: &ExposureSeries, noise_floor: f64) -> Vec<f64> {
    daily_pl
        .iter()
        .zip(exposure.values())
        .map(|(pl, capital)| {
            if capital > noise_floor {
                pl / capital
            } else {
                0.0
            }
        })
        .collect()
}

/// Sample mean and standard deviation. `None` with fewer than two points.
pub fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);

    Some((mean, variance.sqrt()))
}

/// Annualized Sharpe ratio of a return series, with no risk-free rate.
///
/// Returns 0 when the deviation is zero or undefined.
pub fn annualized_sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    let Some((mean, std)) = mean_and_std(returns) else {
        return 0.0;
    };

    if std <= MIN_STD || !std.is_finite() {
        return 0.0;
    }

    let sharpe = mean / std * periods_per_year.sqrt();
    if sharpe.is_finite() {
        sharpe
    } else {
        0.0
    }
}

/// Sharpe ratio of the ledger's daily returns on exposure.
///
/// # Arguments
///
/// * `daily_pl` - Daily realized P/L aligned with `exposure`
/// * `exposure` - Daily capital at risk
/// * `noise_floor` - Minimum exposure for a day to produce a return
/// * `periods_per_year` - Annualization factor (252 trading days)
pub fn sharpe_ratio(
    daily_pl: &[f64],
    exposure: &ExposureSeries,
    noise_floor: f64,
    periods_per_year: f64,
) -> f64 {
    let returns = daily_returns(daily_pl, exposure, noise_floor);
    annualized_sharpe(&returns, periods_per_year)
}
