// src/services/advisor.rs
use std::fmt;

/// Specialised sub-agents the upstream chatbot can hand a conversation to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advisor {
    General,
    Admission,
    FinancialCost,
}

impl Advisor {
    pub const ALL: [Advisor; 3] = [Advisor::General, Advisor::Admission, Advisor::FinancialCost];

    /// Recognise an advisor name regardless of casing and `_`/`-`/space separators.
    pub fn parse(name: &str) -> Option<Self> {
        let folded: String = name
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "generaladvisor" => Some(Advisor::General),
            "admissionadvisor" | "admissionsadvisor" => Some(Advisor::Admission),
            "financialcostadvisor" | "financialadvisor" | "financialaidadvisor" => {
                Some(Advisor::FinancialCost)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Advisor::General => "GeneralAdvisor",
            Advisor::Admission => "AdmissionAdvisor",
            Advisor::FinancialCost => "FinancialCostAdvisor",
        }
    }
}

impl fmt::Display for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for the upstream's "I don't know" filler, which must never reach the client.
pub fn is_unknown_sentinel(message: &str) -> bool {
    let normalized: String = message
        .trim()
        .trim_end_matches(['.', '!'])
        .replace('\u{2019}', "'")
        .to_lowercase();

    matches!(normalized.as_str(), "i don't know" | "i dont know" | "i do not know")
}
