use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::mapper::error::MapperError;
use crate::mapper::mapper::MappingService;
use crate::mapper::mapping_model::{FieldMapping, StudentData};
use crate::mapper::parse::filter_mappings;
use crate::scanner::scan_model::FormElement;

/// Offline mapper: matches words in a control's label, name, id and
/// placeholder against the student record's keys. Scores go through the
/// same confidence filter as model output.
pub struct HeuristicMapper;

/// Lowercase alphanumeric words, splitting `camelCase` and `snake_case`.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut spaced = String::with_capacity(text.len() + 8);
    let mut prev_lower = false;
    for c in text.chars() {
        if c.is_uppercase() && prev_lower {
            spaced.push(' ');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        spaced.push(c);
    }

    spaced
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn element_tokens(el: &FormElement) -> BTreeSet<String> {
    [&el.label, &el.aria_label, &el.name, &el.id, &el.placeholder]
        .into_iter()
        .flatten()
        .flat_map(|s| tokenize(s))
        .collect()
}

/// How well a student key describes a control, in [0, 1].
///
/// Dominated by how much of the key appears in the control's words, with a
/// small bonus for how much of the control the key explains.
pub fn match_score(key_path: &str, element_words: &BTreeSet<String>) -> f32 {
    let key = key_path.rsplit('.').next().unwrap_or(key_path);
    let key_words = tokenize(key);
    if key_words.is_empty() || element_words.is_empty() {
        return 0.0;
    }

    let shared = key_words.intersection(element_words).count() as f32;
    let key_coverage = shared / key_words.len() as f32;
    let element_coverage = shared / element_words.len() as f32;

    0.9 * key_coverage + 0.1 * element_coverage
}

fn best_match(el: &FormElement, fields: &[(String, String)]) -> Option<(String, f32)> {
    let words = element_tokens(el);

    fields
        .iter()
        .map(|(key, value)| (value, match_score(key, &words), tokenize(key).len()))
        .filter(|(_, score, _)| *score > 0.0)
        // Highest score; on ties the more specific (longer) key wins.
        .max_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.2.cmp(&b.2))
        })
        .map(|(value, score, _)| (value.clone(), score))
}

impl HeuristicMapper {
    pub fn map(&self, elements: &[FormElement], student: &StudentData) -> Vec<FieldMapping> {
        let fields = student.scalar_fields();

        let candidates: Vec<Value> = elements
            .iter()
            .filter_map(|el| {
                let (value, score) = best_match(el, &fields)?;
                Some(json!({
                    "selector": el.selector,
                    "value": value,
                    "confidence": score,
                }))
            })
            .collect();

        filter_mappings(candidates)
    }
}

#[async_trait]
impl MappingService for HeuristicMapper {
    async fn map_fields(
        &self,
        elements: &[FormElement],
        student: &StudentData,
    ) -> Result<Vec<FieldMapping>, MapperError> {
        if !student.is_record() {
            return Err(MapperError::InvalidRequest(
                "student_data must be a JSON object".into(),
            ));
        }
        Ok(self.map(elements, student))
    }
}
