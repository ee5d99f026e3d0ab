//! Interface to the biographical-answer classifier.
//!
//! Classification itself (unit conversion, canned reactions) lives outside
//! this crate. The interpreter only needs the normalised value to log and
//! an optional reaction line to reveal.

use crate::schema::profile::BioField;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BioReading {
    /// Normalised value to record, e.g. `"180cm"` for `5'11`.
    pub display_text: Option<String>,
    /// Line revealed in the AI voice after the value is logged.
    pub reaction_text: Option<String>,
}

pub trait BioParser {
    fn classify(&self, field: BioField, raw: &str) -> BioReading;
}

impl<F> BioParser for F
where
    F: Fn(BioField, &str) -> BioReading,
{
    fn classify(&self, field: BioField, raw: &str) -> BioReading {
        self(field, raw)
    }
}
