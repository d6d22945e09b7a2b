//! Static knowledge tables for the keyword dispatcher: emergency terms,
//! symptom entries, health tips, and category keyword patterns.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("knowledge pattern must compile")
}

/// Emergency terms. Matched before anything else; note that plain symptom
/// words ("headache", "fever") are deliberately absent — severity wording
/// alone does not escalate.
pub static EMERGENCY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        pattern(r"(?i)\bchest\s+pain\b"),
        pattern(r"(?i)\bheart\s+attack\b"),
        pattern(r"(?i)\b(?:can'?t|cannot|unable\s+to)\s+breathe?\b"),
        pattern(r"(?i)\b(?:difficulty|trouble)\s+breathing\b"),
        pattern(r"(?i)\bshortness\s+of\s+breath\b"),
        pattern(r"(?i)\bstroke\b"),
        pattern(r"(?i)\bface\s+droop(?:ing)?\b"),
        pattern(r"(?i)\bsevere\s+bleeding\b"),
        pattern(r"(?i)\bbleeding\s+(?:heavily|won'?t\s+stop)\b"),
        pattern(r"(?i)\bunconscious\b"),
        pattern(r"(?i)\bpassed\s+out\b"),
        pattern(r"(?i)\bseizure\b"),
        pattern(r"(?i)\bchoking\b"),
        pattern(r"(?i)\boverdose\b"),
        pattern(r"(?i)\bsuicid(?:e|al)\b"),
    ]
});

pub static APPOINTMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:appointment|booking|book|schedule|reschedule|visit|slot|consultation)\b")
});

pub static RECORDS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:record|report|history|prescription|lab\s+result|test\s+result|document)s?\b")
});

pub static HEALTH_TIP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:health\s+tip|tip|advice|diet|nutrition|exercise|sleep|wellness|healthy)\b")
});

pub static PAYMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)\b(?:payment|pay|bill|billing|invoice|fee|charge|insurance|refund)s?\b")
});

pub static GREETING_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)^\s*(?:hi|hello|hey|good\s+(?:morning|afternoon|evening))\b"));

/// One symptom knowledge-base entry with self-care advice and an
/// escalation hint.
#[derive(Debug, Clone, Serialize)]
pub struct SymptomEntry {
    pub name: &'static str,
    pub advice: &'static str,
    pub see_doctor_if: &'static str,
}

struct SymptomRule {
    matcher: Regex,
    entry: SymptomEntry,
}

static SYMPTOM_RULES: LazyLock<Vec<SymptomRule>> = LazyLock::new(|| {
    vec![
        SymptomRule {
            matcher: pattern(r"(?i)\bhead\s*aches?\b|\bheadaches?\b|\bmigraines?\b"),
            entry: SymptomEntry {
                name: "headache",
                advice: "Rest in a quiet, dark room, stay hydrated, and consider an over-the-counter pain reliever.",
                see_doctor_if: "it is sudden and severe, lasts more than 48 hours, or comes with fever, stiff neck, or vision changes.",
            },
        },
        SymptomRule {
            matcher: pattern(r"(?i)\bfevers?\b|\bhigh\s+temperature\b"),
            entry: SymptomEntry {
                name: "fever",
                advice: "Rest, drink plenty of fluids, and use a fever reducer if you are uncomfortable.",
                see_doctor_if: "it exceeds 39.4°C (103°F), lasts more than three days, or comes with a rash or stiff neck.",
            },
        },
        SymptomRule {
            matcher: pattern(r"(?i)\bcough(?:ing)?\b"),
            entry: SymptomEntry {
                name: "cough",
                advice: "Stay hydrated, use honey or lozenges, and humidify the air.",
                see_doctor_if: "it lasts over three weeks, brings up blood, or comes with breathing difficulty.",
            },
        },
        SymptomRule {
            matcher: pattern(r"(?i)\bsore\s+throat\b|\bthroat\s+pain\b"),
            entry: SymptomEntry {
                name: "sore throat",
                advice: "Gargle warm salt water, drink warm liquids, and rest your voice.",
                see_doctor_if: "it lasts more than a week, or swallowing becomes difficult.",
            },
        },
        SymptomRule {
            matcher: pattern(r"(?i)\bstomach\s+(?:pain|ache)\b|\babdominal\s+pain\b|\bnausea\b"),
            entry: SymptomEntry {
                name: "stomach pain",
                advice: "Eat bland food, avoid dairy and caffeine, and sip clear fluids.",
                see_doctor_if: "the pain is severe or localized, or comes with vomiting that won't stop.",
            },
        },
        SymptomRule {
            matcher: pattern(r"(?i)\bback\s+(?:pain|ache)\b"),
            entry: SymptomEntry {
                name: "back pain",
                advice: "Stay gently active, apply heat or ice, and avoid heavy lifting.",
                see_doctor_if: "it follows an injury, radiates down a leg, or comes with numbness.",
            },
        },
        SymptomRule {
            matcher: pattern(r"(?i)\brash(?:es)?\b|\bitch(?:y|ing)?\s+skin\b"),
            entry: SymptomEntry {
                name: "rash",
                advice: "Keep the area clean and dry, avoid scratching, and try a mild moisturizer.",
                see_doctor_if: "it spreads quickly, blisters, or comes with fever.",
            },
        },
        SymptomRule {
            matcher: pattern(r"(?i)\bdizz(?:y|iness)\b|\blight-?headed(?:ness)?\b"),
            entry: SymptomEntry {
                name: "dizziness",
                advice: "Sit or lie down until it passes, rise slowly, and drink water.",
                see_doctor_if: "it is recurrent, or comes with chest pain, palpitations, or fainting.",
            },
        },
    ]
});

pub const HEALTH_TIPS: &[&str] = &[
    "Aim for at least 30 minutes of moderate exercise most days of the week.",
    "Drink 6-8 glasses of water a day; more in hot weather or when exercising.",
    "Keep a consistent sleep schedule — adults need 7-9 hours a night.",
    "Fill half your plate with vegetables and fruit at each meal.",
    "Wash your hands for 20 seconds, especially before eating.",
    "Schedule a routine check-up once a year, even when you feel well.",
    "Limit added sugar and highly processed foods.",
    "Take short movement breaks if you sit for long stretches.",
];

/// First symptom entry whose pattern matches the message.
pub fn match_symptom(message: &str) -> Option<&'static SymptomEntry> {
    SYMPTOM_RULES
        .iter()
        .find(|rule| rule.matcher.is_match(message))
        .map(|rule| &rule.entry)
}

/// Exact-name lookup for the symptom reference endpoint.
pub fn symptom_by_name(name: &str) -> Option<&'static SymptomEntry> {
    let needle = name.trim().to_lowercase();
    SYMPTOM_RULES
        .iter()
        .map(|rule| &rule.entry)
        .find(|entry| entry.name == needle)
}

pub fn all_symptoms() -> Vec<&'static SymptomEntry> {
    SYMPTOM_RULES.iter().map(|rule| &rule.entry).collect()
}

/// Whether any emergency term matches.
pub fn is_emergency(message: &str) -> bool {
    EMERGENCY_PATTERNS.iter().any(|p| p.is_match(message))
}
