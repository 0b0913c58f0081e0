use indexmap::map::Entry;
use indexmap::IndexMap;

/// Values the summarize-and-extract mode emits for sections a chunk knows
/// nothing about. Contributions matching one of these are dropped so they
/// never shadow real content from sibling chunks.
const PLACEHOLDERS: [&str; 3] = [
    "not applicable",
    "information not available in this chunk",
    "n/a",
];

pub fn is_placeholder(content: &str) -> bool {
    let normalized = content.trim().to_lowercase();
    PLACEHOLDERS.contains(&normalized.as_str())
}

/// Ordered label -> content map used to merge field-structured partial
/// responses. Labels keep first-seen order; repeated labels accumulate
/// their content newline-joined.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldMap {
    fields: IndexMap<String, String>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one partial response in. Paragraphs are blank-line separated;
    /// only paragraphs of the shape `Label: content` contribute.
    pub fn absorb(&mut self, response: &str) {
        for paragraph in response.split("\n\n") {
            let Some((label, content)) = paragraph.split_once(':') else {
                continue;
            };
            let label = label.trim();
            let content = content.trim();
            if label.is_empty() || content.is_empty() || is_placeholder(content) {
                continue;
            }
            match self.fields.entry(label.to_string()) {
                Entry::Occupied(mut slot) => {
                    let value = slot.get_mut();
                    value.push('\n');
                    value.push_str(content);
                }
                Entry::Vacant(slot) => {
                    slot.insert(content.to_string());
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }

    /// Serialize back to `Label: value` blocks separated by blank lines.
    pub fn render(&self) -> String {
        self.fields
            .iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
