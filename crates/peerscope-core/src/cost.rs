//! Per-run tally of external-call cost.
//!
//! The social-data API bills in credits:
//!
//! | call        | credits                                   |
//! |-------------|-------------------------------------------|
//! | user lookup | 18                                        |
//! | recent posts| `ceil(count / 1000 × 15 000)`, minimum 15 |
//!
//! One credit is $0.00001. Language-model calls are billed per token:
//! $0.002 per 1K input tokens and $0.010 per 1K output tokens.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const USER_INFO_CREDITS: u64 = 18;
pub const POST_CREDITS_PER_THOUSAND: u64 = 15_000;
pub const MIN_POSTS_CALL_CREDITS: u64 = 15;

/// USD per social-data credit.
fn credit_usd() -> Decimal {
    Decimal::new(1, 5)
}

/// USD per language-model input token.
fn input_token_usd() -> Decimal {
    Decimal::new(2, 6)
}

/// USD per language-model output token.
fn output_token_usd() -> Decimal {
    Decimal::new(1, 5)
}

/// One billable external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostEvent {
    UserInfo,
    /// A recent-posts fetch; `count` is the number of items the API returned.
    Posts { count: u64 },
    LanguageModel {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Credits charged for one recent-posts call returning `count` items.
#[must_use]
pub fn posts_call_credits(count: u64) -> u64 {
    count
        .saturating_mul(POST_CREDITS_PER_THOUSAND)
        .div_ceil(1_000)
        .max(MIN_POSTS_CALL_CREDITS)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostLedger {
    social_credits: u64,
    user_info_calls: u64,
    posts_calls: u64,
    llm_calls: u64,
    input_tokens: u64,
    output_tokens: u64,
}

impl CostLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: CostEvent) {
        match event {
            CostEvent::UserInfo => {
                self.user_info_calls += 1;
                self.social_credits += USER_INFO_CREDITS;
            }
            CostEvent::Posts { count } => {
                self.posts_calls += 1;
                self.social_credits += posts_call_credits(count);
            }
            CostEvent::LanguageModel {
                input_tokens,
                output_tokens,
            } => {
                self.llm_calls += 1;
                self.input_tokens += input_tokens;
                self.output_tokens += output_tokens;
            }
        }
    }

    #[must_use]
    pub fn social_credits(&self) -> u64 {
        self.social_credits
    }

    #[must_use]
    pub fn social_cost(&self) -> Decimal {
        Decimal::from(self.social_credits) * credit_usd()
    }

    #[must_use]
    pub fn llm_cost(&self) -> Decimal {
        Decimal::from(self.input_tokens) * input_token_usd()
            + Decimal::from(self.output_tokens) * output_token_usd()
    }

    #[must_use]
    pub fn total_cost(&self) -> Decimal {
        self.social_cost() + self.llm_cost()
    }

    #[must_use]
    pub fn summary(&self) -> CostSummary {
        CostSummary {
            social: SocialCostSummary {
                user_info_calls: self.user_info_calls,
                posts_calls: self.posts_calls,
                total_credits: self.social_credits,
                cost_usd: self.social_cost(),
            },
            language_model: LanguageModelCostSummary {
                api_calls: self.llm_calls,
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
                cost_usd: self.llm_cost(),
            },
            total_cost_usd: self.total_cost(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialCostSummary {
    pub user_info_calls: u64,
    pub posts_calls: u64,
    pub total_credits: u64,
    pub cost_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageModelCostSummary {
    pub api_calls: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSummary {
    pub social: SocialCostSummary,
    pub language_model: LanguageModelCostSummary,
    pub total_cost_usd: Decimal,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn usd(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn posts_credits_scale_with_count() {
        assert_eq!(posts_call_credits(40), 600);
        assert_eq!(posts_call_credits(100), 1_500);
    }

    #[test]
    fn posts_credits_have_minimum_charge() {
        assert_eq!(posts_call_credits(0), 15);
        assert_eq!(posts_call_credits(1), 15);
    }

    #[test]
    fn social_cost_converts_credits() {
        let mut ledger = CostLedger::new();
        ledger.record(CostEvent::UserInfo);
        ledger.record(CostEvent::Posts { count: 40 });
        assert_eq!(ledger.social_credits(), 18 + 600);
        assert_eq!(ledger.social_cost(), usd("0.00618"));
    }

    #[test]
    fn llm_cost_prices_input_and_output_separately() {
        let mut ledger = CostLedger::new();
        ledger.record(CostEvent::LanguageModel {
            input_tokens: 1_000,
            output_tokens: 1_000,
        });
        assert_eq!(ledger.llm_cost(), usd("0.012"));
    }

    #[test]
    fn total_is_sum_and_deterministic() {
        let events = [
            CostEvent::UserInfo,
            CostEvent::LanguageModel {
                input_tokens: 2_500,
                output_tokens: 800,
            },
            CostEvent::Posts { count: 3 },
        ];
        let mut a = CostLedger::new();
        let mut b = CostLedger::new();
        for event in events {
            a.record(event);
            b.record(event);
        }
        assert_eq!(a, b);
        assert_eq!(a.total_cost(), a.social_cost() + a.llm_cost());
        // 18 + 45 credits, 2 500 × 0.000002 + 800 × 0.00001
        assert_eq!(a.total_cost(), usd("0.00063") + usd("0.013"));
    }

    #[test]
    fn summary_counts_calls_per_category() {
        let mut ledger = CostLedger::new();
        ledger.record(CostEvent::UserInfo);
        ledger.record(CostEvent::UserInfo);
        ledger.record(CostEvent::LanguageModel {
            input_tokens: 10,
            output_tokens: 5,
        });
        let summary = ledger.summary();
        assert_eq!(summary.social.user_info_calls, 2);
        assert_eq!(summary.social.posts_calls, 0);
        assert_eq!(summary.language_model.api_calls, 1);
        assert_eq!(summary.language_model.input_tokens, 10);
        assert_eq!(summary.total_cost_usd, ledger.total_cost());
    }

    #[test]
    fn social_summary_reports_only_billed_call_kinds() {
        let mut ledger = CostLedger::new();
        ledger.record(CostEvent::UserInfo);
        ledger.record(CostEvent::Posts { count: 20 });
        let social = serde_json::to_value(ledger.summary().social).unwrap();
        let mut keys: Vec<&str> = social
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["cost_usd", "posts_calls", "total_credits", "user_info_calls"]
        );
        assert_eq!(social["total_credits"], 18 + 300);
    }

    #[test]
    fn empty_ledger_costs_nothing() {
        assert_eq!(CostLedger::new().total_cost(), Decimal::ZERO);
    }
}
