// SPDX-License-Identifier: MIT

//! SEO optimizer - local readability and reach metrics, no LLM call

use super::Step;
use crate::adk::error::PostgenError;
use crate::postgen::workflow::state::{Field, GenerationState, SeoMetrics, StateUpdate};
use async_trait::async_trait;

const LINKEDIN_WORDS: std::ops::RangeInclusive<usize> = 150..=200;
const TWITTER_MAX_CHARS: usize = 280;

fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Vowel groups, minus a silent trailing 'e', at least one
fn syllables(word: &str) -> usize {
    let mut count = 0;
    let mut prev_vowel = false;
    for c in word.chars() {
        let vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }
    if word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}

/// Flesch reading ease mapped from [0, 100] onto [0, 1]
fn readability(text: &str) -> f64 {
    let words = words(text);
    if words.is_empty() {
        return 0.0;
    }
    let sentences = text
        .split(['.', '!', '?', '\n'])
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .count()
        .max(1);
    let syllables: usize = words.iter().map(|w| syllables(w)).sum();

    let n = words.len() as f64;
    let ease = 206.835 - 1.015 * (n / sentences as f64) - 84.6 * (syllables as f64 / n);
    (ease / 100.0).clamp(0.0, 1.0)
}

/// Share of the topic's keywords that appear in the draft
fn keyword_density(draft: &str, topic: &str) -> f64 {
    let keywords: Vec<String> = words(topic).into_iter().filter(|w| w.len() > 3).collect();
    if keywords.is_empty() {
        return 1.0;
    }
    let draft_words = words(draft);
    let hits = keywords
        .iter()
        .filter(|k| draft_words.iter().any(|w| w.starts_with(k.as_str())))
        .count();
    hits as f64 / keywords.len() as f64
}

pub fn compute_seo_metrics(draft: &str, topic: &str, platform: &str) -> SeoMetrics {
    let word_count = draft.split_whitespace().count();
    let optimal_length = match platform.to_ascii_lowercase().as_str() {
        "linkedin" => LINKEDIN_WORDS.contains(&word_count),
        "twitter" => draft.chars().count() <= TWITTER_MAX_CHARS,
        _ => true,
    };
    let hashtag_count = draft
        .split_whitespace()
        .filter(|w| w.starts_with('#') && w.len() > 1)
        .count();

    SeoMetrics {
        keyword_density: keyword_density(draft, topic),
        readability_score: readability(draft),
        word_count,
        optimal_length,
        hashtag_count,
    }
}

pub struct SeoStep;

#[async_trait]
impl Step for SeoStep {
    fn name(&self) -> &str {
        "seo_optimizer"
    }

    fn reads(&self) -> &'static [Field] {
        &[Field::Draft]
    }

    fn writes(&self) -> &'static [Field] {
        &[Field::SeoMetrics]
    }

    async fn run(&self, state: &GenerationState) -> Result<StateUpdate, PostgenError> {
        let metrics = compute_seo_metrics(&state.draft, &state.input.topic, &state.input.platform);
        log::info!(
            "SEO: readability={:.2}, keywords={:.2}, words={}",
            metrics.readability_score,
            metrics.keyword_density,
            metrics.word_count
        );
        Ok(StateUpdate::Seo(metrics))
    }
}
