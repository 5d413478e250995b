use crate::mapper::mapping_model::StudentData;
use crate::scanner::scan_model::FormElement;

/// One line per control, in scan order.
pub fn describe_elements(elements: &[FormElement]) -> String {
    elements
        .iter()
        .enumerate()
        .map(|(i, el)| {
            let mut parts = vec![format!("selector: {}", el.selector)];

            let kind = match &el.input_type {
                Some(t) => format!("{} ({})", el.tag_name, t),
                None => el.tag_name.clone(),
            };
            parts.push(format!("type: {}", kind));

            let described = [
                ("label", &el.label),
                ("aria-label", &el.aria_label),
                ("name", &el.name),
                ("id", &el.id),
                ("placeholder", &el.placeholder),
                ("current value", &el.current_value),
            ];
            for (key, value) in described {
                if let Some(v) = value {
                    parts.push(format!("{}: \"{}\"", key, v));
                }
            }

            format!("{}. {}", i + 1, parts.join(" | "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_mapping_prompt(html_context: &str, student: &StudentData) -> String {
    format!(
        r##"You are filling out a university application form on behalf of a student.
Match each form field below to the student's data.

FORM FIELDS:
{fields}

STUDENT DATA (JSON):
{student}

Return ONLY a JSON array. Each entry must look like:
{{"selector": "<selector exactly as listed above>", "value": "<value to enter>", "confidence": <0.0-1.0>}}

Rules:
- Use only selectors from the list above.
- Only include fields you are confident about (confidence >= 0.8).
- Never invent data that is not present in the student record.
- Format dates and phone numbers the way the field's placeholder suggests.
- For select fields, use the visible option text.

Respond with ONLY valid JSON, no explanation."##,
        fields = if html_context.trim().is_empty() {
            "(none)"
        } else {
            html_context
        },
        student = student.to_pretty_json(),
    )
}
