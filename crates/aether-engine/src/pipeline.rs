//! Multi-stage thought pipeline
//!
//! Five ordered stages, each a pure function of its input: perception,
//! analysis, synthesis, emotion, response framing. The pipeline never fails
//! and never touches shared state, so it runs fully in parallel across
//! requests without locking.
//!
//! Analysis and synthesis ship baseline heuristics only. Their contract is
//! shape stability for downstream consumers (tone selection, prompt
//! framing), not depth; anything smarter slots in behind the same structs.

use crate::profile::UserProfile;
use serde::{Deserialize, Serialize};

const POSITIVE_WORDS: &[&str] = &["good", "great", "excellent", "happy", "love", "amazing"];
const NEGATIVE_WORDS: &[&str] = &["bad", "terrible", "hate", "angry", "sad", "frustrated"];
const CREATIVE_WORDS: &[&str] = &["create", "write", "generate"];
const ANALYTIC_WORDS: &[&str] = &["analyze", "explain", "why"];

const BASE_CONFIDENCE: f32 = 0.85;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Question,
    Creative,
    Analysis,
    Conversation,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningType {
    Deductive,
    Inductive,
    Analogical,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserEmotion {
    Neutral,
    Happy,
    Concerned,
    Curious,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseTone {
    Professional,
    Supportive,
    Warm,
    Curious,
}

/// Stage 1 output: initial understanding of the input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Perception {
    pub intent: Intent,
    pub entities: Vec<String>,
    pub sentiment: Sentiment,
}

/// Stage 2 output: what answering will take.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Analysis {
    pub complexity: Complexity,
    pub knowledge_domains: Vec<String>,
    pub reasoning_type: ReasoningType,
}

/// Stage 3 output: insights drawn from the analysis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Synthesis {
    pub key_points: Vec<String>,
    pub connections: Vec<String>,
    pub implications: Vec<String>,
}

/// Stage 4 output: emotional framing for the response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmotionalAssessment {
    pub user_emotion: UserEmotion,
    pub tone: ResponseTone,
    pub empathy: f32,
}

/// The full record produced for one input message. Transient: only the
/// derived response text and confidence survive into session history.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThoughtRecord {
    pub perception: Perception,
    pub analysis: Analysis,
    pub synthesis: Synthesis,
    pub emotion: EmotionalAssessment,
    pub follow_ups: Vec<String>,
    pub confidence: f32,
}

#[derive(Default)]
pub struct ThoughtPipeline;

impl ThoughtPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Run all five stages. Total over arbitrary text: empty or
    /// whitespace-only input yields a conversation-intent, neutral record.
    pub fn process(&self, input: &str, profile: Option<&UserProfile>) -> ThoughtRecord {
        let perception = perceive(input);
        let analysis = analyze(input, &perception, profile);
        let synthesis = synthesize(&perception, &analysis);
        let emotion = assess_emotion(&perception, &analysis);
        frame_response(perception, analysis, synthesis, emotion)
    }
}

/// Stage 1: intent, entities, sentiment.
fn perceive(input: &str) -> Perception {
    Perception {
        intent: detect_intent(input),
        entities: extract_entities(input),
        sentiment: analyze_sentiment(input),
    }
}

/// Stage 2: complexity, knowledge domains, reasoning type. Baseline
/// heuristics; a present profile seeds domains with its expertise areas.
fn analyze(input: &str, perception: &Perception, profile: Option<&UserProfile>) -> Analysis {
    let word_count = input.split_whitespace().count();
    let complexity = if word_count < 8 {
        Complexity::Simple
    } else if word_count < 40 {
        Complexity::Moderate
    } else {
        Complexity::Complex
    };

    let mut knowledge_domains = vec!["general".to_string()];
    if let Some(profile) = profile {
        knowledge_domains.extend(profile.expertise_areas.iter().cloned());
    }

    let reasoning_type = match perception.intent {
        Intent::Creative => ReasoningType::Analogical,
        Intent::Question => ReasoningType::Inductive,
        _ => ReasoningType::Deductive,
    };

    Analysis {
        complexity,
        knowledge_domains,
        reasoning_type,
    }
}

/// Stage 3: key points from perceived entities; connections and
/// implications stay empty at baseline.
fn synthesize(perception: &Perception, _analysis: &Analysis) -> Synthesis {
    Synthesis {
        key_points: perception.entities.clone(),
        connections: Vec::new(),
        implications: Vec::new(),
    }
}

/// Stage 4: deterministic given the same perception and analysis.
fn assess_emotion(perception: &Perception, _analysis: &Analysis) -> EmotionalAssessment {
    let (user_emotion, tone, empathy) = match (perception.sentiment, perception.intent) {
        (Sentiment::Negative, _) => (UserEmotion::Concerned, ResponseTone::Supportive, 0.8),
        (Sentiment::Positive, _) => (UserEmotion::Happy, ResponseTone::Warm, 0.6),
        (Sentiment::Neutral, Intent::Question) => {
            (UserEmotion::Curious, ResponseTone::Curious, 0.6)
        }
        (Sentiment::Neutral, _) => (UserEmotion::Neutral, ResponseTone::Professional, 0.5),
    };
    EmotionalAssessment {
        user_emotion,
        tone,
        empathy,
    }
}

/// Stage 5: assemble the record, confidence, and follow-up suggestions.
fn frame_response(
    perception: Perception,
    analysis: Analysis,
    synthesis: Synthesis,
    emotion: EmotionalAssessment,
) -> ThoughtRecord {
    let follow_ups = follow_ups_for(perception.intent);

    let mut confidence = BASE_CONFIDENCE;
    if !perception.entities.is_empty() {
        confidence += 0.05;
    }
    if analysis.complexity == Complexity::Complex {
        confidence -= 0.1;
    }
    let confidence = confidence.clamp(0.0, 1.0);

    ThoughtRecord {
        perception,
        analysis,
        synthesis,
        emotion,
        follow_ups,
        confidence,
    }
}

/// Priority order: question mark, creation verbs, explanatory verbs,
/// then conversation as the default.
fn detect_intent(input: &str) -> Intent {
    let lower = input.to_lowercase();
    if input.contains('?') {
        Intent::Question
    } else if CREATIVE_WORDS.iter().any(|w| lower.contains(w)) {
        Intent::Creative
    } else if ANALYTIC_WORDS.iter().any(|w| lower.contains(w)) {
        Intent::Analysis
    } else {
        Intent::Conversation
    }
}

/// Capitalized tokens longer than two characters.
fn extract_entities(input: &str) -> Vec<String> {
    input
        .split_whitespace()
        .filter(|w| {
            w.chars().next().is_some_and(|c| c.is_uppercase()) && w.chars().count() > 2
        })
        .map(String::from)
        .collect()
}

/// Lexicon counting; ties favor neutral.
fn analyze_sentiment(input: &str) -> Sentiment {
    let lower = input.to_lowercase();
    let pos = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let neg = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count();
    if pos > neg {
        Sentiment::Positive
    } else if neg > pos {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

fn follow_ups_for(intent: Intent) -> Vec<String> {
    match intent {
        Intent::Question => vec!["Would you like me to go deeper on any part of that?".to_string()],
        Intent::Analysis => vec!["Want me to break that down step by step?".to_string()],
        Intent::Creative => vec!["Should I try a different style or tone?".to_string()],
        Intent::Conversation => Vec::new(),
    }
}
