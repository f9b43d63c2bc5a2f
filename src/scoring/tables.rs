// =============================================================================
// Per-modality rule tables
// =============================================================================

use super::{Aggregation, Band, Cmp, ConfidenceCurve, Effect, Rule, ScoreTable};
use crate::types::{Label, Modality};

const fn above(t: f64, v: f64) -> Band {
    Band {
        when: Cmp::Above(t),
        effect: Effect::Add(v),
    }
}

const fn below(t: f64, v: f64) -> Band {
    Band {
        when: Cmp::Below(t),
        effect: Effect::Add(v),
    }
}

const fn scale_above(t: f64, m: f64) -> Band {
    Band {
        when: Cmp::Above(t),
        effect: Effect::Scale(m),
    }
}

const fn scale_below(t: f64, m: f64) -> Band {
    Band {
        when: Cmp::Below(t),
        effect: Effect::Scale(m),
    }
}

/// Market-data tables: 0.5 + 2|s| capped at 0.9, flat 0.3 when neutral.
const MARKET_CURVE: ConfidenceCurve = ConfidenceCurve {
    base: 0.5,
    slope: 2.0,
    score_cap: 1.0,
    max: 0.9,
    neutral_base: 0.3,
    neutral_decay: 0.0,
    floor: 0.05,
};

// -----------------------------------------------------------------------------
// Technical analysis
// -----------------------------------------------------------------------------
//
// Crypto momentum reading: an overbought oscillator is continuation, not
// reversal. Volatility multipliers sit where they are in the list on purpose:
// the ATR scale applies before the trend tag is added.

pub static TECHNICAL: ScoreTable = ScoreTable {
    modality: Modality::Technical,
    rules: &[
        Rule::Bands {
            feature: "rsi14",
            bands: &[above(70.0, 0.30), above(55.0, 0.15), below(30.0, -0.30), below(45.0, -0.15)],
        },
        Rule::ScaledSign {
            feature: "macd_hist",
            reference: "close",
            factor: 100.0,
            cap: 2.0,
            weight: 0.2,
        },
        Rule::Sign {
            feature: "ema8_above_ema20",
            weight: 0.25,
        },
        Rule::Sign {
            feature: "ema20_above_ema50",
            weight: 0.15,
        },
        Rule::Bands {
            feature: "bb_position",
            bands: &[above(0.8, 0.2), below(0.2, -0.2), above(0.6, 0.1), below(0.4, -0.1)],
        },
        Rule::CrossPair {
            fast: "stoch_k",
            slow: "stoch_d",
            upper: 80.0,
            lower: 20.0,
            extreme: 0.15,
            cross: 0.05,
        },
        Rule::Bands {
            feature: "momentum_1",
            bands: &[above(0.005, 0.15), above(0.002, 0.08), below(-0.005, -0.15), below(-0.002, -0.08)],
        },
        Rule::Bands {
            feature: "momentum_2",
            bands: &[above(0.01, 0.10), below(-0.01, -0.10)],
        },
        Rule::Bands {
            feature: "momentum_4",
            bands: &[above(0.02, 0.05), below(-0.02, -0.05)],
        },
        Rule::Bands {
            feature: "volume_ratio",
            bands: &[above(1.5, 0.15), above(1.2, 0.10), below(0.7, -0.15), below(0.8, -0.10)],
        },
        Rule::Bands {
            feature: "atr_ratio",
            bands: &[scale_above(0.03, 1.2), scale_below(0.01, 0.8)],
        },
        Rule::Tag {
            feature: "market_trend",
            cases: &[("uptrend", Effect::Add(0.1)), ("downtrend", Effect::Add(-0.1))],
        },
        Rule::Tag {
            feature: "market_volatility",
            cases: &[("high", Effect::Scale(1.1)), ("low", Effect::Scale(0.9))],
        },
    ],
    aggregation: Aggregation::Sum,
    clamp: None,
    dead_zone: 0.15,
    confidence: ConfidenceCurve {
        base: 0.4,
        slope: 0.4,
        score_cap: 1.0,
        max: 0.9,
        neutral_base: 0.5,
        neutral_decay: 0.3,
        floor: 0.05,
    },
    labels: (Label::Bullish, Label::Bearish),
};

// -----------------------------------------------------------------------------
// Sentiment
// -----------------------------------------------------------------------------

pub static SENTIMENT: ScoreTable = ScoreTable {
    modality: Modality::Sentiment,
    rules: &[Rule::Linear {
        feature: "sentiment_composite",
        weight: 1.0,
    }],
    aggregation: Aggregation::Sum,
    clamp: Some(0.5),
    dead_zone: 0.05,
    confidence: ConfidenceCurve {
        base: 0.5,
        slope: 0.8,
        score_cap: 0.5,
        max: 0.9,
        neutral_base: 0.5,
        neutral_decay: 0.3,
        floor: 0.05,
    },
    labels: (Label::Positive, Label::Negative),
};

// -----------------------------------------------------------------------------
// Derivatives
// -----------------------------------------------------------------------------

pub static DERIVATIVES: ScoreTable = ScoreTable {
    modality: Modality::Derivatives,
    rules: &[
        Rule::Linear {
            feature: "avg_basis",
            weight: 0.30,
        },
        Rule::Linear {
            feature: "derivative_sentiment",
            weight: 0.25,
        },
        Rule::Linear {
            feature: "basis_momentum",
            weight: 0.15,
        },
        Rule::Linear {
            feature: "avg_funding_rate",
            weight: 0.10,
        },
        Rule::Linear {
            feature: "funding_rate_momentum",
            weight: 0.08,
        },
        Rule::Linear {
            feature: "oi_momentum",
            weight: 0.07,
        },
    ],
    aggregation: Aggregation::WeightedMean,
    clamp: None,
    dead_zone: 0.1,
    confidence: MARKET_CURVE,
    labels: (Label::Bullish, Label::Bearish),
};

// -----------------------------------------------------------------------------
// On-chain
// -----------------------------------------------------------------------------

pub static ON_CHAIN: ScoreTable = ScoreTable {
    modality: Modality::OnChain,
    rules: &[
        Rule::Bands {
            feature: "mempool_congestion_score",
            bands: &[above(0.7, 0.3), below(0.3, -0.2)],
        },
        Rule::Bands {
            feature: "fee_pressure_score",
            bands: &[above(0.7, 0.2), below(0.3, -0.1)],
        },
        Rule::Bands {
            feature: "network_activity_score",
            bands: &[above(0.7, 0.2), below(0.3, -0.1)],
        },
        Rule::Bands {
            feature: "market_structure_score",
            bands: &[above(0.7, 0.3), below(0.3, -0.2)],
        },
    ],
    aggregation: Aggregation::Sum,
    clamp: Some(1.0),
    dead_zone: 0.3,
    confidence: ConfidenceCurve {
        base: 0.4,
        slope: 0.5,
        score_cap: 1.0,
        max: 0.85,
        neutral_base: 0.3,
        neutral_decay: 0.0,
        floor: 0.05,
    },
    labels: (Label::Bullish, Label::Bearish),
};

// -----------------------------------------------------------------------------
// Order book
// -----------------------------------------------------------------------------
//
// Only signed, scale-free features vote. Spread and large-trade share carry
// no direction on their own and stay report-only.

pub static ORDER_BOOK: ScoreTable = ScoreTable {
    modality: Modality::OrderBook,
    rules: &[
        Rule::Linear {
            feature: "volume_imbalance",
            weight: 0.25,
        },
        Rule::Linear {
            feature: "microstructure_momentum",
            weight: 0.20,
        },
        Rule::Linear {
            feature: "large_trade_pressure",
            weight: 0.15,
        },
        Rule::Linear {
            feature: "buy_sell_pressure",
            weight: 0.10,
        },
        Rule::Linear {
            feature: "impact_imbalance_01",
            weight: 0.08,
        },
        Rule::Linear {
            feature: "orderbook_momentum",
            weight: 0.05,
        },
        Rule::Linear {
            feature: "trade_momentum",
            weight: 0.05,
        },
    ],
    aggregation: Aggregation::WeightedMean,
    clamp: None,
    dead_zone: 0.1,
    confidence: MARKET_CURVE,
    labels: (Label::Bullish, Label::Bearish),
};

pub fn table_for(modality: Modality) -> &'static ScoreTable {
    match modality {
        Modality::Technical => &TECHNICAL,
        Modality::Sentiment => &SENTIMENT,
        Modality::Derivatives => &DERIVATIVES,
        Modality::OnChain => &ON_CHAIN,
        Modality::OrderBook => &ORDER_BOOK,
    }
}
