//! Interaction and size features. Each column exists only when its operand
//! columns do.

use tracing::debug;

use crate::domain::{NumericColumn, Panel, finite};

pub fn add_interaction_features(panel: &Panel) -> Panel {
    let mut out = panel.clone();

    if let Some(v) = product(panel, "roa", "leverage") {
        out.insert_derived("roa_leverage_interaction", v);
    }
    if let Some(v) = product(panel, "revenue_growth", "equity_volatility_100d") {
        out.insert_derived("growth_volatility_interaction", v);
    }
    if let Some(cap) = panel.numeric("market_cap") {
        let v = cap
            .iter()
            .map(|c| c.filter(|c| *c > 0.0).and_then(|c| finite(c.ln())))
            .collect();
        out.insert_derived("log_market_cap", v);
    } else {
        debug!("no market_cap column; log_market_cap not created");
    }

    out
}

fn product(panel: &Panel, a: &str, b: &str) -> Option<NumericColumn> {
    let (Some(x), Some(y)) = (panel.numeric(a), panel.numeric(b)) else {
        debug!(left = a, right = b, "interaction operand missing; column not created");
        return None;
    };
    Some(
        x.iter()
            .zip(y)
            .map(|(x, y)| Some((*x)? * (*y)?))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::panel::test_support::quarterly_panel;

    #[test]
    fn interactions_require_both_operands() {
        let mut p = quarterly_panel(&["A"], 2);
        p.insert_numeric("roa", vec![Some(2.0), None]).unwrap();
        p.insert_numeric("leverage", vec![Some(0.5), Some(0.4)]).unwrap();
        p.insert_numeric("revenue_growth", vec![Some(1.0), Some(1.0)]).unwrap();
        p.insert_numeric("market_cap", vec![Some(std::f64::consts::E), Some(0.0)]).unwrap();

        let out = add_interaction_features(&p);
        assert_eq!(out.numeric("roa_leverage_interaction").unwrap(), &[Some(1.0), None]);
        assert!(!out.has_numeric("growth_volatility_interaction"));
        let cap = out.numeric("log_market_cap").unwrap();
        assert!((cap[0].unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(cap[1], None);
    }
}
