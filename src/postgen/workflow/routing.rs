// SPDX-License-Identifier: MIT

//! Specialized-writer routing
//!
//! A pure lookup from (platform, content type) to the writer variant whose
//! style guidance the writer step applies.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterVariant {
    TechnicalLinkedinWriter,
    ThoughtLeaderWriter,
    StandardLinkedinWriter,
    TwitterThreadWriter,
    TwitterWriter,
    GeneralWriter,
}

impl WriterVariant {
    pub fn name(&self) -> &'static str {
        match self {
            WriterVariant::TechnicalLinkedinWriter => "technical_linkedin_writer",
            WriterVariant::ThoughtLeaderWriter => "thought_leader_writer",
            WriterVariant::StandardLinkedinWriter => "standard_linkedin_writer",
            WriterVariant::TwitterThreadWriter => "twitter_thread_writer",
            WriterVariant::TwitterWriter => "twitter_writer",
            WriterVariant::GeneralWriter => "general_writer",
        }
    }

    /// Style guidance appended to the writer's instruction
    pub fn style_guidance(&self) -> &'static str {
        match self {
            WriterVariant::TechnicalLinkedinWriter => {
                "Write for engineers on LinkedIn: precise terminology, concrete numbers, \
                 one idea per short paragraph, 150 to 200 words."
            }
            WriterVariant::ThoughtLeaderWriter => {
                "Write a LinkedIn thought-leadership post: take a clear position, \
                 back it with evidence from the context, close with a question, 150 to 200 words."
            }
            WriterVariant::StandardLinkedinWriter => {
                "Write a LinkedIn post: strong hook, short paragraphs, a call to action \
                 and two or three hashtags, 150 to 200 words."
            }
            WriterVariant::TwitterThreadWriter => {
                "Write a Twitter thread: numbered tweets, each under 280 characters, \
                 the first one a hook."
            }
            WriterVariant::TwitterWriter => {
                "Write a single tweet under 280 characters with at most two hashtags."
            }
            WriterVariant::GeneralWriter => {
                "Write a clear, engaging social media post that follows the outline."
            }
        }
    }
}

/// Content types with a dedicated writer, per platform
static SPECIALIZED: Lazy<HashMap<(&'static str, &'static str), WriterVariant>> = Lazy::new(|| {
    HashMap::from([
        (("linkedin", "technical"), WriterVariant::TechnicalLinkedinWriter),
        (("linkedin", "thought_leadership"), WriterVariant::ThoughtLeaderWriter),
        (("twitter", "thread"), WriterVariant::TwitterThreadWriter),
    ])
});

/// Pick the writer variant for a platform and optional content type
///
/// Keys match exactly; anything outside the table gets the general writer.
pub fn route_to_specialized_writer(platform: &str, content_type: Option<&str>) -> WriterVariant {
    if let Some(variant) = SPECIALIZED.get(&(platform, content_type.unwrap_or_default())) {
        return *variant;
    }
    match platform {
        "linkedin" => WriterVariant::StandardLinkedinWriter,
        "twitter" => WriterVariant::TwitterWriter,
        _ => WriterVariant::GeneralWriter,
    }
}
