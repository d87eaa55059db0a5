use lazy_static::lazy_static;
use shared::Expression;
use std::collections::HashMap;

lazy_static! {
    static ref DEFAULT_LABELS: HashMap<String, String> = {
        let pairs = [
            (Expression::Neutral, "Calma"),
            (Expression::Happy, "Alegria"),
            (Expression::Sad, "Tristeza"),
            (Expression::Angry, "Enojo"),
            (Expression::Fearful, "Tristeza"),
            (Expression::Disgusted, "Tristeza"),
            (Expression::Surprised, "Sorpresa"),
        ];
        pairs
            .iter()
            .map(|(expression, label)| (expression.to_string(), label.to_string()))
            .collect()
    };
}

/// Maps canonical expression names to display labels. Lookups are exact and
/// case-sensitive; unknown names come back unchanged.
#[derive(Debug, Clone)]
pub struct LabelTranslator {
    table: HashMap<String, String>,
}

impl Default for LabelTranslator {
    fn default() -> Self {
        Self {
            table: DEFAULT_LABELS.clone(),
        }
    }
}

impl LabelTranslator {
    /// Built-in table with `overrides` applied on top.
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut translator = Self::default();
        for (expression, label) in overrides {
            log::info!("Display label override: {} -> {}", expression, label);
            translator.table.insert(expression, label);
        }
        translator
    }

    pub fn translate<'a>(&'a self, expression: &'a str) -> &'a str {
        self.table
            .get(expression)
            .map(String::as_str)
            .unwrap_or(expression)
    }
}
