// =============================================================================
// Order-book feature engine — imbalance, spread, trade flow, price impact
// =============================================================================
//
// The latest snapshot in the window is the current book. Trades are split
// into batches by snapshot boundaries (trades after the last snapshot join the
// last batch), so every snapshot has a matching trade-flow reading and the
// momentum features can difference both series.

use tracing::debug;

use super::{FeatureEngine, FeatureSet, FeatureSpec, WindowSpec};
use crate::error::FeatureResult;
use crate::indicators::stats::{mean, mean_first_difference, std_dev};
use crate::market_data::orderbook::{validate_snapshots, validate_trades};
use crate::market_data::{OrderBookSnapshot, Trade, TradeSide};
use crate::types::Modality;

/// Trades at or above this quote notional count as "large".
pub const LARGE_TRADE_NOTIONAL: f64 = 10_000.0;
/// Levels counted as the top of the book for liquidity concentration.
pub const TOP_LEVELS: usize = 5;

pub const SCHEMA: &[FeatureSpec] = &[
    FeatureSpec::number("volume_imbalance"),
    FeatureSpec::number("price_imbalance"),
    FeatureSpec::number("depth_imbalance"),
    FeatureSpec::number("spread_absolute"),
    FeatureSpec::number("spread_relative"),
    FeatureSpec::number("spread_bps"),
    FeatureSpec::number("spread_volatility"),
    FeatureSpec::number("buy_sell_pressure"),
    FeatureSpec::number("large_trade_ratio"),
    FeatureSpec::number("large_trade_pressure"),
    FeatureSpec::number("trade_size_ratio"),
    FeatureSpec::number("trade_frequency"),
    FeatureSpec::number("impact_depth_01"),
    FeatureSpec::number("impact_depth_05"),
    FeatureSpec::number("impact_imbalance_01"),
    FeatureSpec::number("liquidity_concentration"),
    FeatureSpec::number("order_flow_rate"),
    FeatureSpec::number("orderbook_momentum"),
    FeatureSpec::number("trade_momentum"),
    FeatureSpec::number("microstructure_momentum"),
];

#[derive(Debug, Clone, Copy)]
pub struct OrderBookInput<'a> {
    pub snapshots: &'a [OrderBookSnapshot],
    pub trades: &'a [Trade],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderBookEngine;

fn ratio(num: f64, den: f64) -> Option<f64> {
    (den > 0.0).then(|| num / den)
}

/// Quantity resting within `pct` of mid on the ask side (up) and bid side (down).
fn impact_volumes(book: &OrderBookSnapshot, mid: f64, pct: f64) -> (f64, f64) {
    let reach = mid * pct;
    let up: f64 = book
        .asks
        .iter()
        .take_while(|(p, _)| *p <= mid + reach)
        .map(|(_, q)| q)
        .sum();
    let down: f64 = book
        .bids
        .iter()
        .take_while(|(p, _)| *p >= mid - reach)
        .map(|(_, q)| q)
        .sum();
    (up, down)
}

/// Net taker flow: (buy qty - sell qty) / total qty.
fn buy_sell_pressure(trades: &[&Trade]) -> Option<f64> {
    let (buy, sell) = trades.iter().fold((0.0, 0.0), |(b, s), t| match t.side {
        TradeSide::Buy => (b + t.quantity, s),
        TradeSide::Sell => (b, s + t.quantity),
    });
    ratio(buy - sell, buy + sell)
}

/// Split trades at snapshot timestamps. Batch `i` holds trades up to and
/// including snapshot `i`; trades after the last snapshot join the last batch.
fn batch_trades<'a>(snapshots: &[OrderBookSnapshot], trades: &'a [Trade]) -> Vec<Vec<&'a Trade>> {
    let mut batches: Vec<Vec<&Trade>> = vec![Vec::new(); snapshots.len()];
    let Some(last) = batches.len().checked_sub(1) else {
        return batches;
    };
    let mut i = 0;
    for trade in trades {
        while i < last && trade.timestamp > snapshots[i].timestamp {
            i += 1;
        }
        batches[i].push(trade);
    }
    batches
}

impl OrderBookEngine {
    fn book_features(&self, book: &OrderBookSnapshot, set: &mut FeatureSet) {
        if book.bids.is_empty() || book.asks.is_empty() {
            return;
        }
        let bid_depth = book.bid_depth();
        let ask_depth = book.ask_depth();
        set.set_number("volume_imbalance", ratio(bid_depth - ask_depth, bid_depth + ask_depth));

        let bid_value: f64 = book.bids.iter().map(|(p, q)| p * q).sum();
        let ask_value: f64 = book.asks.iter().map(|(p, q)| p * q).sum();
        set.set_number("price_imbalance", ratio(bid_value - ask_value, bid_value + ask_value));

        let levels = (book.bids.len() + book.asks.len()) as f64;
        set.set_number(
            "depth_imbalance",
            ratio(book.bids.len() as f64 - book.asks.len() as f64, levels),
        );

        let Some(mid) = book.mid_price() else {
            return;
        };
        let spread = book.spread();
        set.set_number("spread_absolute", spread);
        set.set_number("spread_relative", spread.map(|s| s / mid));
        set.set_number("spread_bps", book.spread_bps());

        let (up_01, down_01) = impact_volumes(book, mid, 0.001);
        let (up_05, down_05) = impact_volumes(book, mid, 0.005);
        set.set_number("impact_depth_01", Some((up_01 + down_01) / 2.0));
        set.set_number("impact_depth_05", Some((up_05 + down_05) / 2.0));
        // Support below minus resistance above: positive = bid-heavy.
        set.set_number("impact_imbalance_01", ratio(down_01 - up_01, down_01 + up_01));

        let top: f64 = book.bids.iter().take(TOP_LEVELS).map(|l| l.1).sum::<f64>()
            + book.asks.iter().take(TOP_LEVELS).map(|l| l.1).sum::<f64>();
        set.set_number("liquidity_concentration", ratio(top, bid_depth + ask_depth));
    }

    fn trade_features(&self, batch: &[&Trade], set: &mut FeatureSet) {
        if batch.is_empty() {
            return;
        }
        set.set_number("buy_sell_pressure", buy_sell_pressure(batch));

        let large: Vec<&Trade> = batch
            .iter()
            .copied()
            .filter(|t| t.notional() >= LARGE_TRADE_NOTIONAL)
            .collect();
        set.set_number("large_trade_ratio", Some(large.len() as f64 / batch.len() as f64));

        let (large_buy, large_sell) = large.iter().fold((0.0, 0.0), |(b, s), t| match t.side {
            TradeSide::Buy => (b + t.notional(), s),
            TradeSide::Sell => (b, s + t.notional()),
        });
        set.set_number(
            "large_trade_pressure",
            ratio(large_buy - large_sell, large_buy + large_sell),
        );

        let all_notional: Vec<f64> = batch.iter().map(|t| t.notional()).collect();
        let large_notional: Vec<f64> = large.iter().map(|t| t.notional()).collect();
        let size_ratio = match (mean(&all_notional), mean(&large_notional)) {
            (Some(avg), Some(large_avg)) => ratio(large_avg, avg),
            (Some(_), None) => Some(0.0),
            _ => None,
        };
        set.set_number("trade_size_ratio", size_ratio);

        let frequency = match (batch.first(), batch.last()) {
            (Some(first), Some(last)) if batch.len() > 1 => {
                let minutes = (last.timestamp - first.timestamp).num_milliseconds() as f64 / 60_000.0;
                ratio(batch.len() as f64, minutes)
            }
            _ => None,
        };
        set.set_number("trade_frequency", frequency);
    }
}

impl FeatureEngine for OrderBookEngine {
    type Input<'a> = OrderBookInput<'a>;

    fn modality(&self) -> Modality {
        Modality::OrderBook
    }

    fn schema(&self) -> &'static [FeatureSpec] {
        SCHEMA
    }

    fn build_features(&self, input: OrderBookInput<'_>, window: &WindowSpec) -> FeatureResult<FeatureSet> {
        validate_snapshots(input.snapshots)?;
        validate_trades(input.trades)?;

        let mut set = FeatureSet::from_schema(SCHEMA);
        let snapshots = window.tail(input.snapshots);
        let batches = batch_trades(snapshots, input.trades);

        let Some(current) = snapshots.last() else {
            debug!("order book: no snapshots, all features defaulted");
            return Ok(set);
        };
        self.book_features(current, &mut set);
        if let Some(batch) = batches.last() {
            self.trade_features(batch, &mut set);
        }

        let recent = &snapshots[snapshots.len().saturating_sub(window.momentum_samples)..];
        let spreads: Vec<f64> = recent.iter().filter_map(OrderBookSnapshot::spread).collect();
        set.set_number("spread_volatility", std_dev(&spreads));

        if let [.., prev, cur] = snapshots {
            let minutes = (cur.timestamp - prev.timestamp).num_milliseconds() as f64 / 60_000.0;
            let depth_change = (cur.bid_depth() + cur.ask_depth()) - (prev.bid_depth() + prev.ask_depth());
            set.set_number("order_flow_rate", ratio(depth_change, minutes));
        }

        let imbalances: Vec<f64> = snapshots
            .iter()
            .filter(|s| !s.bids.is_empty() && !s.asks.is_empty())
            .map(OrderBookSnapshot::volume_imbalance)
            .collect();
        let pressures: Vec<f64> = batches.iter().filter_map(|b| buy_sell_pressure(b)).collect();
        let book_momentum = mean_first_difference(&imbalances, window.momentum_samples);
        let trade_momentum = mean_first_difference(&pressures, window.momentum_samples);
        set.set_number("orderbook_momentum", book_momentum);
        set.set_number("trade_momentum", trade_momentum);
        let micro = match (book_momentum, trade_momentum) {
            (Some(b), Some(t)) => Some((b + t) / 2.0),
            (b, t) => b.or(t),
        };
        set.set_number("microstructure_momentum", micro);

        debug!(
            snapshots = snapshots.len(),
            trades = input.trades.len(),
            defaulted = set.defaulted().count(),
            "order-book features built"
        );
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn book(secs: i64, bid_qty: f64, ask_qty: f64) -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: t(secs),
            bids: vec![(99.95, bid_qty), (99.0, 1.0)],
            asks: vec![(100.05, ask_qty), (101.0, 1.0)],
        }
    }

    fn trade(secs: i64, qty: f64, side: TradeSide) -> Trade {
        Trade {
            timestamp: t(secs),
            price: 100.0,
            quantity: qty,
            side,
        }
    }

    fn build(snapshots: &[OrderBookSnapshot], trades: &[Trade]) -> FeatureSet {
        OrderBookEngine
            .build_features(OrderBookInput { snapshots, trades }, &WindowSpec::default())
            .unwrap()
    }

    #[test]
    fn no_snapshots_is_all_defaults() {
        let set = build(&[], &[trade(0, 1.0, TradeSide::Buy)]);
        assert!(set.all_defaulted());
        assert!(set.conforms_to(SCHEMA));
    }

    #[test]
    fn current_book_features() {
        let set = build(&[book(0, 3.0, 1.0)], &[]);
        // Depth 4 vs 2.
        assert_abs_diff_eq!(set.number("volume_imbalance"), 2.0 / 6.0, epsilon = 1e-12);
        assert_abs_diff_eq!(set.number("spread_absolute"), 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(set.number("spread_bps"), 10.0, epsilon = 1e-6);
        // Within 0.1% of mid only the touch levels count: 3 below, 1 above.
        assert_abs_diff_eq!(set.number("impact_imbalance_01"), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(set.number("liquidity_concentration"), 1.0);
        assert!(set.is_defaulted("buy_sell_pressure"));
        assert!(set.is_defaulted("orderbook_momentum"));
    }

    #[test]
    fn trade_flow_and_large_trades() {
        let trades = vec![
            trade(1, 200.0, TradeSide::Buy), // 20k notional
            trade(2, 1.0, TradeSide::Sell),
            trade(3, 1.0, TradeSide::Sell),
        ];
        let set = build(&[book(0, 1.0, 1.0)], &trades);
        assert_abs_diff_eq!(set.number("buy_sell_pressure"), 198.0 / 202.0, epsilon = 1e-12);
        assert_abs_diff_eq!(set.number("large_trade_ratio"), 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(set.number("large_trade_pressure"), 1.0);
        assert_abs_diff_eq!(set.number("trade_frequency"), 3.0 / (2.0 / 60.0), epsilon = 1e-9);
    }

    #[test]
    fn momentum_tracks_imbalance_and_pressure() {
        let snapshots = vec![book(0, 1.0, 1.0), book(60, 2.0, 1.0), book(120, 3.0, 1.0)];
        let trades = vec![
            trade(-10, 1.0, TradeSide::Sell),
            trade(30, 1.0, TradeSide::Buy),
            trade(31, 1.0, TradeSide::Sell),
            trade(90, 1.0, TradeSide::Buy),
        ];
        let set = build(&snapshots, &trades);
        assert!(set.observed_number("orderbook_momentum").unwrap() > 0.0);
        // Pressure -1, 0, +1.
        assert_abs_diff_eq!(set.number("trade_momentum"), 1.0, epsilon = 1e-12);
        let micro = set.number("microstructure_momentum");
        assert_abs_diff_eq!(
            micro,
            (set.number("orderbook_momentum") + set.number("trade_momentum")) / 2.0,
            epsilon = 1e-12
        );
        // One more unit of bid depth per minute.
        assert_abs_diff_eq!(set.number("order_flow_rate"), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn crossed_book_is_malformed() {
        let crossed = OrderBookSnapshot {
            timestamp: t(0),
            bids: vec![(101.0, 1.0)],
            asks: vec![(100.0, 1.0)],
        };
        assert!(OrderBookEngine
            .build_features(
                OrderBookInput {
                    snapshots: &[crossed],
                    trades: &[],
                },
                &WindowSpec::default(),
            )
            .is_err());
    }
}
