//! Tally computation for the active question
//!
//! Always a full re-derivation from the current response set; nothing is
//! cached between response events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Question, QuestionId, Response};

/// Count responses per option. Every option starts at 0; selections that
/// are not (or no longer) options of the question are ignored.
pub fn compute_tallies(question: &Question, responses: &[Response]) -> HashMap<String, u32> {
    let mut tallies: HashMap<String, u32> = question
        .options
        .iter()
        .map(|option| (option.clone(), 0))
        .collect();

    for response in responses {
        for selected in &response.selected_options {
            if let Some(count) = tallies.get_mut(selected) {
                *count += 1;
            }
        }
    }

    tallies
}

/// Rounded share of responses, 0 when there are none
pub fn percentage(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(count) / f64::from(total) * 100.0).round() as u32
}

/// Bar length relative to the largest option, so the leading option always
/// fills the full width
pub fn bar_scale(count: u32, max_count: u32) -> f64 {
    f64::from(count) / f64::from(max_count.max(1))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionTally {
    pub option: String,
    pub count: u32,
    pub percent: u32,
    /// 0.0..=1.0
    pub bar: f64,
}

/// Display-ready tallies in question option order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TallyReport {
    pub question_id: QuestionId,
    pub options: Vec<OptionTally>,
    /// Number of responses, not the sum of counts
    pub total: u32,
}

impl TallyReport {
    pub fn build(question: &Question, responses: &[Response]) -> Self {
        let tallies = compute_tallies(question, responses);
        let total = responses.len() as u32;
        let max_count = tallies.values().copied().max().unwrap_or(0);

        let options = question
            .options
            .iter()
            .map(|option| {
                let count = tallies.get(option).copied().unwrap_or(0);
                OptionTally {
                    option: option.clone(),
                    count,
                    percent: percentage(count, total),
                    bar: if total > 0 {
                        bar_scale(count, max_count)
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        Self {
            question_id: question.id.clone(),
            options,
            total,
        }
    }

    pub fn count(&self, option: &str) -> Option<u32> {
        self.options
            .iter()
            .find(|t| t.option == option)
            .map(|t| t.count)
    }
}
