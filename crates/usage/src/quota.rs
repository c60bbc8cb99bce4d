//! Quota policy: a pure function deciding whether one more request fits
//! within a tenant's monthly message and token budget (§4.7), grounded on
//! `policies/quota.py`'s `allow_request` in the original implementation.

/// The caps that apply for a tenant's plan in a given month.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub included_messages: u64,
    pub hard_token_cap: u64,
}

/// Usage already recorded for the month in question.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct QuotaCounter {
    pub messages_used: u64,
    pub tokens_used: u64,
}

/// No side effects: called fresh per request against a freshly computed
/// counter. Admits iff the request's message fits under `included_messages`
/// and its estimated tokens fit under `hard_token_cap`.
pub fn allow_request(policy: QuotaPolicy, counter: QuotaCounter, estimated_tokens: u64) -> bool {
    if counter.messages_used + 1 > policy.included_messages {
        return false;
    }
    counter.tokens_used + estimated_tokens <= policy.hard_token_cap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_under_both_caps() {
        let policy = QuotaPolicy { included_messages: 10, hard_token_cap: 1000 };
        let counter = QuotaCounter { messages_used: 5, tokens_used: 500 };
        assert!(allow_request(policy, counter, 10));
    }

    #[test]
    fn denies_at_message_cap() {
        let policy = QuotaPolicy { included_messages: 1, hard_token_cap: 1_000_000 };
        let counter = QuotaCounter { messages_used: 1, tokens_used: 0 };
        assert!(!allow_request(policy, counter, 1));
    }

    #[test]
    fn denies_at_token_cap() {
        let policy = QuotaPolicy { included_messages: 1_000, hard_token_cap: 100 };
        let counter = QuotaCounter { messages_used: 0, tokens_used: 95 };
        assert!(!allow_request(policy, counter, 10));
    }
}
