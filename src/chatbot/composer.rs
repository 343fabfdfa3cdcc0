use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::market::{MarketRecord, MarketStatus};

pub const LIVE_DATA_HEADER: &str = "**Live Market Data:**";
const RULE: &str = "---";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Build the text sent to the model: prior turns, the question, and the full
/// market snapshot when one was fetched.
pub fn compose_context(question: &str, history: &[String], markets: &[MarketRecord]) -> String {
    let mut context = if history.is_empty() {
        question.to_string()
    } else {
        format!(
            "Previous conversation:\n{}\n\nCurrent question: {}",
            history.join("\n"),
            question
        )
    };

    if let Some(block) = market_block(markets) {
        context.push_str("\n\n");
        context.push_str(&block);
    }
    context
}

/// The market snapshot as the model sees it, or `None` with no markets.
pub fn market_block(markets: &[MarketRecord]) -> Option<String> {
    let fetched_at = latest_fetch(markets)?;
    // Serialising a Vec of plain structs cannot fail.
    let json = serde_json::to_string_pretty(markets).unwrap_or_default();
    Some(format!(
        "Live market data (fetched {}):\n{}",
        fetched_at.to_rfc3339(),
        json
    ))
}

/// Append a deterministic rendering of `markets` to the model's answer.
/// With no markets the answer is returned untouched.
pub fn compose_answer(answer: &str, markets: &[MarketRecord]) -> String {
    let Some(fetched_at) = latest_fetch(markets) else {
        return answer.to_string();
    };

    let mut out = String::from(answer);
    out.push_str("\n\n");
    out.push_str(LIVE_DATA_HEADER);
    out.push('\n');

    for (i, market) in markets.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(RULE);
            out.push('\n');
        }
        render_market(&mut out, market);
    }

    let _ = write!(out, "\n*Data fetched at {}*", fetched_at.format(TIME_FORMAT));
    out
}

fn render_market(out: &mut String, m: &MarketRecord) {
    let _ = writeln!(out, "\n**Market #{}:** {}", m.id, display_metadata(&m.metadata));
    let _ = writeln!(out, "- Status: {}", m.status);
    let _ = writeln!(out, "- End Time: {}", m.expires_at.format(TIME_FORMAT));
    let _ = writeln!(out, "- Liquidity: {:.4}", m.liquidity);
    let _ = writeln!(out, "- Volume: {:.4}", m.volume);

    let estimated = if m.prices_estimated { " (estimated)" } else { "" };
    for (idx, price) in m.prices.iter().enumerate() {
        let _ = writeln!(out, "- Outcome {}: {:.2}%{}", idx + 1, price * 100.0, estimated);
    }

    let note = match (m.status, m.resolved_at) {
        (MarketStatus::Resolved, Some(at)) => format!("Resolved on {}", at.format(TIME_FORMAT)),
        (MarketStatus::Resolved, None) => "Resolved".to_string(),
        (MarketStatus::Closed, _) => "Trading closed, awaiting resolution".to_string(),
        (MarketStatus::Active, _) => "Open for trading".to_string(),
    };
    let _ = writeln!(out, "- Resolution: {}", note);

    if m.status == MarketStatus::Resolved {
        if let Some(winner) = m.winning_outcome {
            let _ = writeln!(out, "- Winning Outcome: Outcome {}", winner as u32 + 1);
        }
    }
}

fn display_metadata(metadata: &str) -> &str {
    let trimmed = metadata.trim();
    if trimmed.is_empty() {
        "(no description)"
    } else {
        trimmed
    }
}

fn latest_fetch(markets: &[MarketRecord]) -> Option<DateTime<Utc>> {
    markets.iter().map(|m| m.fetched_at).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn market(id: u64, status: MarketStatus) -> MarketRecord {
        let now = Utc::now();
        MarketRecord {
            id,
            creator: "0x0000000000000000000000000000000000000abc".to_string(),
            collateral_token: "0x0000000000000000000000000000000000000def".to_string(),
            collateral_amount: 1000.0,
            fee_bps: 100,
            outcome_count: 2,
            prices: vec![0.625, 0.375],
            prices_estimated: false,
            outcome_token_amounts: vec![100.0, 200.0],
            volume: 300.0,
            liquidity: 250.5,
            created_at: now - Duration::days(7),
            expires_at: now + Duration::days(2),
            status,
            winning_outcome: (status == MarketStatus::Resolved).then_some(0),
            resolved_at: None,
            resolver: None,
            metadata: format!("Will event {id} happen?"),
            fetched_at: now,
        }
    }

    #[test]
    fn test_compose_answer_identity_without_markets() {
        for answer in ["", "plain answer", "multi\nline **markdown**", "ünïcödé"] {
            assert_eq!(compose_answer(answer, &[]), answer);
        }
    }

    #[test]
    fn test_compose_answer_renders_each_market() {
        let markets = vec![
            market(3, MarketStatus::Active),
            market(8, MarketStatus::Resolved),
            market(11, MarketStatus::Closed),
        ];
        let out = compose_answer("Here are the markets.", &markets);

        assert!(out.starts_with("Here are the markets.\n\n**Live Market Data:**"));
        for m in &markets {
            assert!(out.contains(&format!("**Market #{}:**", m.id)));
            assert!(out.contains(m.status.as_str()));
            assert!(out.contains(&format!("{:.4}", m.liquidity)));
        }
        assert!(out.contains("- Liquidity: 250.5000"));
        assert!(out.contains("- Outcome 1: 62.50%"));
        assert!(out.contains("- Outcome 2: 37.50%"));
        assert_eq!(out.matches("\n---\n").count(), 2);
        assert_eq!(out.matches("Winning Outcome").count(), 1);
        assert!(out.contains("- Winning Outcome: Outcome 1"));
        assert!(out.contains("*Data fetched at "));
    }

    #[test]
    fn test_estimated_prices_are_flagged() {
        let mut m = market(1, MarketStatus::Active);
        m.prices = vec![0.5, 0.5];
        m.prices_estimated = true;
        let out = compose_answer("a", &[m]);
        assert!(out.contains("- Outcome 1: 50.00% (estimated)"));
    }

    #[test]
    fn test_compose_context_without_history_or_markets() {
        assert_eq!(compose_context("What is XO?", &[], &[]), "What is XO?");
    }

    #[test]
    fn test_compose_context_with_history_and_markets() {
        let history = vec!["Human: hi".to_string(), "Assistant: hello".to_string()];
        let ctx = compose_context("Which markets are open?", &history, &[market(4, MarketStatus::Active)]);

        assert!(ctx.starts_with("Previous conversation:\nHuman: hi\nAssistant: hello\n\nCurrent question: Which markets are open?"));
        assert!(ctx.contains("Live market data (fetched "));
        assert!(ctx.contains("\"id\": 4"));
        assert!(ctx.contains("\"liquidity\": 250.5"));
    }
}
