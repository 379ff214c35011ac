//! Text heuristics applied to AI analysis answers.

use std::collections::HashMap;

use tracing::debug;

/// Below this similarity to the previous analysis, the new one counts as a change.
pub const SIMILARITY_THRESHOLD: f64 = 0.45;

const CHANGE_KEYWORDS: &[&str] = &[
    "조정",
    "변경",
    "수정",
    "조정해야",
    "변경해야",
    "수정해야",
    "비중 조정",
    "투자 비율 조정",
    "금액 조정",
    "추가 투자",
    "투자 금액 증가",
    "투자 금액 감소",
    "권장",
    "추천",
    "제안",
];
const AMOUNT_WORDS: &[&str] = &["원", "금액", "투자액"];
const WEIGHT_WORDS: &[&str] = &["비중", "비율", "%"];
const RECOMMENDATION_WORDS: &[&str] = &["추천", "권장", "제안", "조정", "변경"];
const ANALYSIS_WORDS: &[&str] = &["분석", "데이터", "정보"];
const CERTAINTY_WORDS: &[&str] = &["확실", "명확", "분명"];

const RECOMMENDATION_MAX_CHARS: usize = 200;

/// Section markers of the stored portfolio-analysis notification body.
pub const ANALYSIS_HEADER: &str = "📈 분석 결과:\n";
pub const RECOMMENDATION_HEADER: &str = "💡 종합 추천사항:\n";

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Keyword score of an answer: 0.1 per change keyword, +0.2 when amounts are
/// mentioned, +0.3 when weights or ratios are.
pub fn change_score(text: &str) -> f64 {
    let mut score = CHANGE_KEYWORDS.iter().filter(|k| text.contains(*k)).count() as f64 * 0.1;
    if contains_any(text, AMOUNT_WORDS) {
        score += 0.2;
    }
    if contains_any(text, WEIGHT_WORDS) {
        score += 0.3;
    }
    score
}

/// Decide whether `current` warrants a notification.
///
/// Against a previous analysis the answers must have drifted apart; without
/// one the keyword score has to reach `threshold`.
pub fn determine_notification_need(current: &str, previous: Option<&str>, threshold: f64) -> bool {
    match previous.filter(|p| !p.is_empty()) {
        Some(previous) => {
            let similarity = cosine_similarity(previous, current);
            debug!(similarity, threshold = SIMILARITY_THRESHOLD, "compared with previous analysis");
            similarity < SIMILARITY_THRESHOLD
        }
        None => {
            let score = change_score(current);
            debug!(score, threshold, "keyword score");
            score >= threshold
        }
    }
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf = HashMap::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *tf.entry(token.to_lowercase()).or_insert(0.0) += 1.0;
    }
    tf
}

/// Cosine similarity of the term-frequency vectors of `a` and `b`.
///
/// Returns 0.0 when either text has no tokens.
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    let (ta, tb) = (term_frequencies(a), term_frequencies(b));
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let dot: f64 = ta
        .iter()
        .filter_map(|(term, x)| tb.get(term).map(|y| x * y))
        .sum();
    let norm = |v: &HashMap<String, f64>| v.values().map(|x| x * x).sum::<f64>().sqrt();
    dot / (norm(&ta) * norm(&tb))
}

/// First line carrying a recommendation, else the answer truncated to 200 chars.
pub fn extract_recommendation(text: &str) -> String {
    if let Some(line) = text.lines().find(|l| contains_any(l, RECOMMENDATION_WORDS)) {
        return line.trim().to_owned();
    }
    if text.chars().count() > RECOMMENDATION_MAX_CHARS {
        let head: String = text.chars().take(RECOMMENDATION_MAX_CHARS).collect();
        return format!("{head}...");
    }
    text.to_owned()
}

/// Rough confidence in `[0.5, 1.0]` derived from length and wording.
pub fn extract_confidence_score(text: &str) -> f64 {
    let mut score: f64 = 0.5;
    if text.chars().count() > 100 {
        score += 0.2;
    }
    if contains_any(text, ANALYSIS_WORDS) {
        score += 0.1;
    }
    if contains_any(text, CERTAINTY_WORDS) {
        score += 0.1;
    }
    score.min(1.0)
}

/// Recover the raw analysis from a stored portfolio-analysis notification body.
pub fn analysis_section(content: &str) -> &str {
    let Some(start) = content.find(ANALYSIS_HEADER) else {
        return content.trim();
    };
    let rest = &content[start + ANALYSIS_HEADER.len()..];
    match rest.find(RECOMMENDATION_HEADER) {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}

/// Outcome of evaluating one AI answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub should_notify: bool,
    pub recommendation: String,
    pub confidence: f64,
}

pub fn assess(current: &str, previous: Option<&str>, threshold: f64) -> Assessment {
    Assessment {
        should_notify: determine_notification_need(current, previous, threshold),
        recommendation: extract_recommendation(current),
        confidence: extract_confidence_score(current),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identical_texts_are_fully_similar() {
        let s = cosine_similarity("SPY 비중을 늘리세요", "SPY 비중을 늘리세요");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_or_empty_texts_score_zero() {
        assert_eq!(cosine_similarity("alpha beta", "gamma delta"), 0.0);
        assert_eq!(cosine_similarity("", "anything"), 0.0);
        assert_eq!(cosine_similarity("...", "!!!"), 0.0);
    }

    #[test]
    fn similarity_ignores_case_and_punctuation() {
        let s = cosine_similarity("Hold, SPY.", "hold spy");
        assert!((s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn keyword_score_adds_amount_and_weight_bonus() {
        // 조정 + 권장, amount word 원, weight word 비중.
        let text = "QQQ 비중 조정을 권장합니다. 10만원 추가.";
        // 조정, 비중 조정, 권장 → 0.3; +0.2; +0.3.
        assert!((change_score(text) - 0.8).abs() < 1e-9);
        assert!(determine_notification_need(text, None, 0.7));
        assert!(!determine_notification_need("현 상태 유지", None, 0.7));
    }

    #[test]
    fn previous_analysis_switches_to_similarity() {
        let prev = "SPY 비중 유지 권장";
        assert!(!determine_notification_need(prev, Some(prev), 0.7));
        assert!(determine_notification_need("완전히 다른 답변", Some(prev), 0.7));
        // An empty previous analysis is treated as absent.
        assert!(!determine_notification_need("유지", Some(""), 0.7));
    }

    #[test]
    fn recommendation_prefers_keyword_line() {
        let text = "시장 요약\nEWY 비중을 추천합니다  \n끝";
        assert_eq!(extract_recommendation(text), "EWY 비중을 추천합니다");
    }

    #[test]
    fn recommendation_truncates_long_text() {
        let text = "가".repeat(250);
        let rec = extract_recommendation(&text);
        assert_eq!(rec.chars().count(), 203);
        assert!(rec.ends_with("..."));
        assert_eq!(extract_recommendation("짧은 답변"), "짧은 답변");
    }

    #[test]
    fn confidence_is_capped() {
        assert_eq!(extract_confidence_score("hi"), 0.5);
        let long = format!("{} 분석 결과 명확", "x".repeat(120));
        assert!((extract_confidence_score(&long) - 0.9).abs() < 1e-9);
        assert!(extract_confidence_score(&long) <= 1.0);
    }

    #[test]
    fn analysis_section_is_recovered_from_notification_body() {
        let body = format!("머리말\n\n{ANALYSIS_HEADER}본문 내용\n\n{RECOMMENDATION_HEADER}추천");
        assert_eq!(analysis_section(&body), "본문 내용");
        assert_eq!(analysis_section("  plain "), "plain");
    }
}
