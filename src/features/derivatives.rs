// =============================================================================
// Derivatives feature engine — basis, open interest, funding
// =============================================================================
//
// Readings are grouped by timestamp (several exchanges per tick). The latest
// group is the current snapshot; per-timestamp means form the history used
// for momentum and volatility.
//
//   basis_sentiment      = tanh(100 · avg_basis)        premium = bullish
//   funding_sentiment    = -tanh(1000 · avg_funding)    crowded longs = bearish
//   derivative_sentiment = 0.7 · basis + 0.3 · funding

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{FeatureEngine, FeatureSet, FeatureSpec, WindowSpec};
use crate::error::FeatureResult;
use crate::indicators::stats::{mean, mean_first_difference, std_dev};
use crate::market_data::derivatives::{validate_funding, validate_futures};
use crate::market_data::{FundingReading, FuturesReading};
use crate::types::Modality;

pub const BASIS_GAIN: f64 = 100.0;
pub const FUNDING_GAIN: f64 = 1000.0;
pub const BASIS_SHARE: f64 = 0.7;
pub const FUNDING_SHARE: f64 = 0.3;

pub const SCHEMA: &[FeatureSpec] = &[
    FeatureSpec::number("avg_basis"),
    FeatureSpec::number("basis_volatility"),
    FeatureSpec::number("basis_momentum"),
    FeatureSpec::number("avg_open_interest"),
    FeatureSpec::number("oi_momentum"),
    FeatureSpec::number("volume_ratio"),
    FeatureSpec::number("avg_funding_rate"),
    FeatureSpec::number("funding_rate_volatility"),
    FeatureSpec::number("funding_rate_momentum"),
    FeatureSpec::number("funding_rate_spread"),
    FeatureSpec::number("basis_sentiment"),
    FeatureSpec::number("funding_sentiment"),
    FeatureSpec::number("derivative_sentiment"),
    FeatureSpec::number("market_structure_score"),
];

#[derive(Debug, Clone, Copy)]
pub struct DerivativesInput<'a> {
    pub futures: &'a [FuturesReading],
    pub funding: &'a [FundingReading],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DerivativesEngine;

/// Group values by timestamp, keeping insertion order inside a group.
fn group_by_time<T, F>(items: &[T], key: F) -> BTreeMap<DateTime<Utc>, Vec<&T>>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut groups: BTreeMap<DateTime<Utc>, Vec<&T>> = BTreeMap::new();
    for item in items {
        groups.entry(key(item)).or_default().push(item);
    }
    groups
}

/// Mean fractional change between consecutive positive samples of the last `n`.
fn mean_fractional_change(series: &[f64], n: usize) -> Option<f64> {
    let tail = &series[series.len().saturating_sub(n)..];
    let changes: Vec<f64> = tail
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();
    mean(&changes)
}

impl DerivativesEngine {
    fn futures_features(&self, futures: &[FuturesReading], window: &WindowSpec, set: &mut FeatureSet) -> Option<f64> {
        let groups = group_by_time(futures, |r| r.timestamp);
        let history: Vec<&Vec<&FuturesReading>> = groups.values().collect();
        let history = window.tail(&history);
        let current = history.last()?;

        let per_tick = |f: &dyn Fn(&FuturesReading) -> Option<f64>| -> Vec<f64> {
            history
                .iter()
                .filter_map(|g| {
                    let values: Vec<f64> = g.iter().filter_map(|&r| f(r)).collect();
                    mean(&values)
                })
                .collect()
        };

        let basis_now: Vec<f64> = current.iter().filter_map(|r| r.basis()).collect();
        let basis_series = per_tick(&|r| r.basis());
        let avg_basis = mean(&basis_now);
        set.set_number("avg_basis", avg_basis);

        // Cross-exchange dispersion when several venues report, otherwise
        // the recent time series.
        let basis_volatility = if basis_now.len() > 1 {
            std_dev(&basis_now)
        } else {
            let n = window.momentum_samples;
            std_dev(&basis_series[basis_series.len().saturating_sub(n)..])
        };
        set.set_number("basis_volatility", basis_volatility);
        set.set_number(
            "basis_momentum",
            mean_first_difference(&basis_series, window.momentum_samples),
        );

        let oi_now: Vec<f64> = current.iter().map(|r| r.open_interest).filter(|v| *v > 0.0).collect();
        set.set_number("avg_open_interest", mean(&oi_now));
        let oi_series = per_tick(&|r| (r.open_interest > 0.0).then_some(r.open_interest));
        set.set_number("oi_momentum", mean_fractional_change(&oi_series, window.momentum_samples));

        let volume_now: Vec<f64> = current.iter().map(|r| r.volume_24h).filter(|v| *v > 0.0).collect();
        let volume_series = per_tick(&|r| (r.volume_24h > 0.0).then_some(r.volume_24h));
        let volume_ratio = match (mean(&volume_now), mean(&volume_series)) {
            (Some(now), Some(avg)) if avg > 0.0 => Some(now / avg),
            _ => None,
        };
        set.set_number("volume_ratio", volume_ratio);

        avg_basis
    }

    fn funding_features(&self, funding: &[FundingReading], window: &WindowSpec, set: &mut FeatureSet) -> Option<f64> {
        let groups = group_by_time(funding, |r| r.timestamp);
        let history: Vec<&Vec<&FundingReading>> = groups.values().collect();
        let history = window.tail(&history);
        let current = history.last()?;

        let rates: Vec<f64> = current.iter().map(|r| r.funding_rate).collect();
        let series: Vec<f64> = history
            .iter()
            .filter_map(|g| mean(&g.iter().map(|r| r.funding_rate).collect::<Vec<_>>()))
            .collect();

        let avg = mean(&rates);
        set.set_number("avg_funding_rate", avg);
        set.set_number("funding_rate_volatility", std_dev(&rates));
        set.set_number(
            "funding_rate_momentum",
            mean_first_difference(&series, window.momentum_samples),
        );
        let spread = if rates.len() > 1 {
            let hi = rates.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let lo = rates.iter().copied().fold(f64::INFINITY, f64::min);
            Some(hi - lo)
        } else {
            None
        };
        set.set_number("funding_rate_spread", spread);
        avg
    }
}

impl FeatureEngine for DerivativesEngine {
    type Input<'a> = DerivativesInput<'a>;

    fn modality(&self) -> Modality {
        Modality::Derivatives
    }

    fn schema(&self) -> &'static [FeatureSpec] {
        SCHEMA
    }

    fn build_features(&self, input: DerivativesInput<'_>, window: &WindowSpec) -> FeatureResult<FeatureSet> {
        validate_futures(input.futures)?;
        validate_funding(input.funding)?;

        let mut set = FeatureSet::from_schema(SCHEMA);
        let avg_basis = self.futures_features(input.futures, window, &mut set);
        let avg_funding = self.funding_features(input.funding, window, &mut set);

        let basis_sentiment = avg_basis.map(|b| (b * BASIS_GAIN).tanh());
        let funding_sentiment = avg_funding.map(|f| -(f * FUNDING_GAIN).tanh());
        set.set_number("basis_sentiment", basis_sentiment);
        set.set_number("funding_sentiment", funding_sentiment);

        let derivative_sentiment = match (basis_sentiment, funding_sentiment) {
            (None, None) => None,
            (b, f) => Some(BASIS_SHARE * b.unwrap_or(0.0) + FUNDING_SHARE * f.unwrap_or(0.0)),
        };
        set.set_number("derivative_sentiment", derivative_sentiment);

        let basis_vol = set.observed_number("basis_volatility");
        let funding_vol = set.observed_number("funding_rate_volatility");
        let structure = match (basis_vol, funding_vol) {
            (None, None) => None,
            (b, f) => Some((1.0 - (b.unwrap_or(0.0) + f.unwrap_or(0.0)) / 2.0).clamp(0.0, 1.0)),
        };
        set.set_number("market_structure_score", structure);

        debug!(
            futures = input.futures.len(),
            funding = input.funding.len(),
            defaulted = set.defaulted().count(),
            "derivatives features built"
        );
        Ok(set)
    }
}
