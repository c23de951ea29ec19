use crate::models::chat::ChatMessage;

pub const MAX_CONTEXT_LENGTH: usize = 128_000;
pub const RESPONSE_BUFFER: usize = 2_000;
pub const MAX_HISTORY_TOKENS: usize = MAX_CONTEXT_LENGTH - RESPONSE_BUFFER;

/// Messages always kept from the tail of the log.
pub const RECENT_WINDOW: usize = 5;

/// Rough token count: one token per four characters.
pub fn estimate_tokens(message: &ChatMessage) -> f64 {
    (message.content.chars().count() as f64) / 4.0
}

/// Picks the part of `history` that is sent to the completion API.
///
/// Logs of `RECENT_WINDOW` messages or fewer are returned as-is. Longer logs
/// always keep the first message and the last `RECENT_WINDOW` messages, then
/// fill the gap in order from the second message onward until the next
/// message would push the estimate past `max_tokens`. The mandatory messages
/// are counted but never dropped, so the result can exceed the budget.
pub fn select_relevant_history(history: &[ChatMessage], max_tokens: usize) -> Vec<ChatMessage> {
    if history.len() <= RECENT_WINDOW {
        return history.to_vec();
    }

    let budget = max_tokens as f64;
    let recent_start = history.len() - RECENT_WINDOW;
    let first = &history[0];
    let recent = &history[recent_start..];

    let mut total: f64 = recent.iter().map(estimate_tokens).sum();
    total += estimate_tokens(first);

    let mut selected = Vec::with_capacity(history.len());
    selected.push(first.clone());
    for msg in &history[1..recent_start] {
        let cost = estimate_tokens(msg);
        if total + cost > budget {
            break;
        }
        total += cost;
        selected.push(msg.clone());
    }
    selected.extend_from_slice(recent);
    selected
}
