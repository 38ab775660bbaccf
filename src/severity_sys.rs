use crate::model::Severity;


const HIGH_IMPACT_TYPES: [&'static str; 8] = [
    "robbery",
    "armed robbery",
    "assault",
    "violence",
    "violent crime",
    "kidnapping",
    "murder",
    "sexual assault",
];

const LOW_IMPACT_TYPES: [&'static str; 4] = [
    "suspicious",
    "suspicious activity",
    "vandalism",
    "noise",
];


/// Total: anything outside the two known sets, empty input included, is medium.
pub fn classify_incident(incident_type: &str) -> Severity {
    let normalized = incident_type.trim().to_lowercase();

    if HIGH_IMPACT_TYPES.iter().any(|&t| t == normalized) {
        Severity::High
    }
    else if LOW_IMPACT_TYPES.iter().any(|&t| t == normalized) {
        Severity::Low
    }
    else {
        Severity::Medium
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_impact_types_are_high() {
        for t in HIGH_IMPACT_TYPES.iter() {
            assert_eq!(classify_incident(t), Severity::High, "{}", t);
        }
        assert_eq!(classify_incident("ROBBERY"), Severity::High);
        assert_eq!(classify_incident("  Assault "), Severity::High);
    }

    #[test]
    fn low_impact_types_are_low() {
        for t in LOW_IMPACT_TYPES.iter() {
            assert_eq!(classify_incident(t), Severity::Low, "{}", t);
        }
        assert_eq!(classify_incident("Vandalism"), Severity::Low);
    }

    #[test]
    fn everything_else_is_medium() {
        assert_eq!(classify_incident("Theft"), Severity::Medium);
        assert_eq!(classify_incident("fraud"), Severity::Medium);
        assert_eq!(classify_incident(""), Severity::Medium);
        assert_eq!(classify_incident("robbery attempt?"), Severity::Medium);
    }
}
