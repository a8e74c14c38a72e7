//! Query token expansion for suggestion scoring.
//!
//! Free-text queries rarely use the corpus vocabulary ("cat scan" vs
//! "computed tomography"), so matched tokens pull in their whole synonym
//! group before scoring. Expansion is preprocessing only — the scoring rule
//! itself never consults the table.

/// Fixed domain synonym groups. A query token matching any member unions the
/// entire group into the token set.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["ct", "computed tomography", "ct scan", "cat scan", "tomography"],
    &["mri", "magnetic resonance", "mr imaging"],
    &["xray", "x-ray", "radiograph", "plain film"],
    &["ultrasound", "sonogram", "sonography", "doppler"],
    &["nuclear", "pet", "pet-ct", "nuclear medicine"],
    &["echo", "echocardiogram", "echocardiography", "stress echo"],
    &["single view", "2 views", "3 views", "ap", "lateral"],
    &[
        "surgery",
        "operative",
        "procedure",
        "arthroscopy",
        "endoscopy",
        "colonoscopy",
        "egd",
        "ercp",
        "stent",
        "cath",
        "reconstruction",
        "release",
        "repair",
    ],
    &[
        "e/m",
        "evaluation & management",
        "visit",
        "office",
        "outpatient",
        "telehealth",
        "telemedicine",
        "ed",
        "er",
        "inpatient",
        "observation",
        "preventive",
        "annual",
    ],
    &[
        "therapy",
        "pt",
        "ot",
        "slp",
        "physical therapy",
        "occupational therapy",
        "speech therapy",
        "eval",
        "re-eval",
        "group",
    ],
    &[
        "lab",
        "laboratory",
        "panel",
        "assay",
        "pcr",
        "cbc",
        "cmp",
        "lipid",
        "a1c",
        "tsh",
        "hiv",
    ],
    &[
        "pathology",
        "biopsy",
        "cytology",
        "frozen section",
        "ihc",
        "molecular",
    ],
    &["anesthesia", "sedation", "mac", "regional", "general"],
    &["ecg", "ekg", "holter", "stress", "treadmill", "cardiology"],
    &[
        "vaccine",
        "immunization",
        "mmr",
        "dtap",
        "influenza",
        "hpv",
        "pneumococcal",
        "hep b",
    ],
    &[
        "ophthalmology",
        "eye exam",
        "refraction",
        "oct",
        "retina",
        "visual field",
        "contacts",
        "glasses",
        "frames",
        "lenses",
    ],
    &[
        "dme",
        "equipment",
        "supply",
        "wheelchair",
        "walker",
        "cane",
        "crutches",
        "cpap",
        "oxygen",
        "nebulizer",
        "brace",
        "splint",
        "prosthetic",
        "orthotic",
        "rr",
        "nu",
        "ue",
        "kx",
        "ga",
        "lt",
        "rt",
    ],
];

/// Tokenize a raw query and expand tokens through the synonym table.
///
/// Lowercases, maps every non-alphanumeric character except hyphen to a
/// space, splits on whitespace, and drops single-character tokens. Any base
/// token that appears in a synonym group unions the whole group into the
/// result. Insertion order is stable: base tokens first, then group members.
pub fn expand_tokens(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let base: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .collect();

    let mut expanded: Vec<String> = Vec::new();
    for token in &base {
        if !expanded.iter().any(|e| e == token) {
            expanded.push((*token).to_string());
        }
    }
    for group in SYNONYM_GROUPS {
        if base.iter().any(|t| group.contains(t)) {
            for member in *group {
                if !expanded.iter().any(|e| e == member) {
                    expanded.push((*member).to_string());
                }
            }
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits() {
        let tokens = expand_tokens("Knee Brace");
        assert!(tokens.contains(&"knee".to_string()));
        assert!(tokens.contains(&"brace".to_string()));
    }

    #[test]
    fn drops_single_character_tokens() {
        let tokens = expand_tokens("a knee x brace");
        assert!(!tokens.contains(&"a".to_string()));
        assert!(!tokens.contains(&"x".to_string()));
    }

    #[test]
    fn punctuation_becomes_whitespace() {
        let tokens = expand_tokens("office/outpatient, visit!");
        assert!(tokens.contains(&"office".to_string()));
        assert!(tokens.contains(&"outpatient".to_string()));
        assert!(tokens.contains(&"visit".to_string()));
    }

    #[test]
    fn hyphen_survives_tokenization() {
        let tokens = expand_tokens("x-ray of wrist");
        assert!(tokens.contains(&"x-ray".to_string()));
    }

    #[test]
    fn ct_expands_to_full_group() {
        let tokens = expand_tokens("ct of the chest");
        assert!(tokens.contains(&"computed tomography".to_string()));
        assert!(tokens.contains(&"cat scan".to_string()));
        assert!(tokens.contains(&"tomography".to_string()));
    }

    #[test]
    fn group_membership_is_symmetric() {
        // Any member pulls in every member, including the short form.
        let tokens = expand_tokens("tomography request");
        assert!(tokens.contains(&"ct".to_string()));
        assert!(tokens.contains(&"ct scan".to_string()));
    }

    #[test]
    fn unmatched_tokens_expand_nothing() {
        let tokens = expand_tokens("wrist sprain");
        assert_eq!(tokens, vec!["wrist".to_string(), "sprain".to_string()]);
    }

    #[test]
    fn base_tokens_precede_group_members() {
        let tokens = expand_tokens("mri brain");
        assert_eq!(tokens[0], "mri");
        assert_eq!(tokens[1], "brain");
        assert!(tokens.contains(&"magnetic resonance".to_string()));
    }

    #[test]
    fn no_duplicates_in_output() {
        let tokens = expand_tokens("ct ct scan ct");
        let unique: std::collections::HashSet<&String> = tokens.iter().collect();
        assert_eq!(unique.len(), tokens.len());
    }

    #[test]
    fn empty_and_noise_input() {
        assert!(expand_tokens("").is_empty());
        assert!(expand_tokens("! @ # $").is_empty());
    }

    #[test]
    fn five_digit_codes_survive() {
        let tokens = expand_tokens("need 70553 approved");
        assert!(tokens.contains(&"70553".to_string()));
    }
}
