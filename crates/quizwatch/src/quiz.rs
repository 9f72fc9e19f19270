//! Fact-to-quiz conversion
//!
//! A [`QuestionBank`] maps fact tags to [`QuestionTemplate`]s. Building a
//! [`QuizItem`] picks one correct answer, fills the remaining slots with
//! distractors (the fact's preferred wrong answers first, then the
//! template's answer domain), shuffles, and records the correct index.

use crate::error::QuizBuildError;
use crate::types::Fact;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\d+)\}").expect("placeholder pattern is valid"));

/// How the presentation layer should lay answers out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderHint {
    #[default]
    Text,
    /// Answers are image keys
    Image,
    /// Answers are short enough for a grid
    Grid,
}

/// Question shape for one fact tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionTemplate {
    pub tag: String,
    /// Prompt with positional `{n}` placeholders
    pub prompt: String,
    /// Answer domain used to fill distractors
    #[serde(default)]
    pub answers: Vec<String>,
    #[serde(default)]
    pub hint: RenderHint,
}

impl QuestionTemplate {
    pub fn new<I, S>(tag: impl Into<String>, prompt: impl Into<String>, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tag: tag.into(),
            prompt: prompt.into(),
            answers: answers.into_iter().map(Into::into).collect(),
            hint: RenderHint::Text,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: RenderHint) -> Self {
        self.hint = hint;
        self
    }

    /// Number of distinct positional arguments the prompt needs
    #[must_use]
    pub fn arity(&self) -> usize {
        PLACEHOLDER
            .captures_iter(&self.prompt)
            .filter_map(|c| c[1].parse::<usize>().ok())
            .max()
            .map_or(0, |highest| highest + 1)
    }

    fn render_prompt(&self, args: &[String]) -> String {
        PLACEHOLDER
            .replace_all(&self.prompt, |caps: &regex::Captures<'_>| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| args.get(i))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

/// Registry of question templates keyed by tag
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    templates: HashMap<String, QuestionTemplate>,
}

impl QuestionBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, replacing any previous one with the same tag
    pub fn register(&mut self, template: QuestionTemplate) {
        self.templates.insert(template.tag.clone(), template);
    }

    #[must_use]
    pub fn with(mut self, template: QuestionTemplate) -> Self {
        self.register(template);
        self
    }

    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&QuestionTemplate> {
        self.templates.get(tag)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Build one quiz item from `fact` with exactly `answer_count` answers
    pub fn build<R: Rng>(
        &self,
        fact: &Fact,
        answer_count: usize,
        rng: &mut R,
    ) -> Result<QuizItem, QuizBuildError> {
        let template = self
            .get(&fact.tag)
            .ok_or_else(|| QuizBuildError::UnknownTag(fact.tag.clone()))?;

        let expected = template.arity();
        if expected != fact.args.len() {
            return Err(QuizBuildError::ArgumentMismatch {
                tag: fact.tag.clone(),
                expected,
                supplied: fact.args.len(),
            });
        }

        let correct = fact
            .correct
            .choose(rng)
            .cloned()
            .ok_or_else(|| QuizBuildError::NoCorrectAnswer(fact.tag.clone()))?;

        // Other correct answers must never appear as distractors
        let excluded: BTreeSet<&str> = fact.correct.iter().map(String::as_str).collect();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        let mut preferred: Vec<&String> = fact.preferred_wrong.iter().collect();
        preferred.shuffle(rng);
        let mut domain: Vec<&String> = template.answers.iter().collect();
        domain.shuffle(rng);

        let mut answers: Vec<String> = Vec::with_capacity(answer_count);
        for candidate in preferred.into_iter().chain(domain) {
            if answers.len() + 1 == answer_count {
                break;
            }
            if excluded.contains(candidate.as_str()) || !seen.insert(candidate.clone()) {
                continue;
            }
            answers.push(candidate.clone());
        }

        if answers.len() + 1 < answer_count {
            return Err(QuizBuildError::NotEnoughAnswers {
                tag: fact.tag.clone(),
                available: answers.len() + 1,
                required: answer_count,
            });
        }

        let correct_index = rng.gen_range(0..answer_count);
        answers.insert(correct_index, correct);

        Ok(QuizItem {
            tag: fact.tag.clone(),
            prompt: template.render_prompt(&fact.args),
            answers,
            correct_index,
            hint: template.hint,
        })
    }
}

/// One rendered question built from exactly one fact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub tag: String,
    pub prompt: String,
    pub answers: Vec<String>,
    pub correct_index: usize,
    pub hint: RenderHint,
}

impl QuizItem {
    #[inline]
    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.answers[self.correct_index]
    }

    #[inline]
    #[must_use]
    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn bank() -> QuestionBank {
        QuestionBank::new()
            .with(QuestionTemplate::new(
                "wire_cut",
                "Which wire did you cut on the {0}-wire module?",
                ["first", "second", "third", "fourth", "fifth", "sixth"],
            ))
            .with(QuestionTemplate::new("color", "What color was the {0}?", ["red", "blue"]))
    }

    #[test]
    fn builds_fixed_size_item() {
        let mut rng = StdRng::seed_from_u64(7);
        let fact = Fact::new("wire_cut", "third").arg("5");
        let item = bank().build(&fact, 4, &mut rng).unwrap();

        assert_eq!(item.answers.len(), 4);
        assert_eq!(item.correct_answer(), "third");
        assert_eq!(item.prompt, "Which wire did you cut on the 5-wire module?");
        let distinct: BTreeSet<_> = item.answers.iter().collect();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn preferred_wrong_answers_come_first() {
        let mut rng = StdRng::seed_from_u64(1);
        let fact = Fact::new("wire_cut", "first")
            .arg("3")
            .prefer_wrong(["second", "third"]);
        let item = bank().build(&fact, 3, &mut rng).unwrap();
        let mut others: Vec<_> = item
            .answers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != item.correct_index)
            .map(|(_, a)| a.as_str())
            .collect();
        others.sort_unstable();
        assert_eq!(others, vec!["second", "third"]);
    }

    #[test]
    fn alternate_correct_answers_never_distract() {
        let mut rng = StdRng::seed_from_u64(3);
        let fact = Fact::new("wire_cut", "first").also_correct("second").arg("2");
        for _ in 0..20 {
            let item = bank().build(&fact, 5, &mut rng).unwrap();
            let correct_hits = item
                .answers
                .iter()
                .filter(|a| *a == "first" || *a == "second")
                .count();
            assert_eq!(correct_hits, 1);
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = bank().build(&Fact::new("nope", "x"), 4, &mut rng).unwrap_err();
        assert_eq!(err, QuizBuildError::UnknownTag("nope".to_string()));
    }

    #[test]
    fn rejects_argument_mismatch() {
        let mut rng = StdRng::seed_from_u64(0);
        let err = bank()
            .build(&Fact::new("wire_cut", "first"), 4, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            QuizBuildError::ArgumentMismatch {
                expected: 1,
                supplied: 0,
                ..
            }
        ));
    }

    #[test]
    fn rejects_when_domain_too_small() {
        let mut rng = StdRng::seed_from_u64(0);
        let fact = Fact::new("color", "red").arg("button");
        let err = bank().build(&fact, 4, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            QuizBuildError::NotEnoughAnswers {
                available: 2,
                required: 4,
                ..
            }
        ));
    }

    #[test]
    fn template_arity_counts_highest_placeholder() {
        let t = QuestionTemplate::new("t", "{1} then {0} then {1}", Vec::<String>::new());
        assert_eq!(t.arity(), 2);
        assert_eq!(t.render_prompt(&["a".into(), "b".into()]), "b then a then b");
    }
}
