use serde::Serialize;
use serde_json::Value;

/// Storage type of a catalog field. Working-copy input is coerced to this
/// before persistence; blank input always becomes NULL, never "".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
}

/// A typed student-row value. Unknown (non-catalog) columns read and write
/// as `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    /// The comparable display form used by the diff: NULL collapses to the
    /// empty string so "blank" and "unset" compare equal.
    pub fn display_string(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Int(n) => n.to_string(),
            FieldValue::Real(x) => x.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Int(n) => Value::from(*n),
            FieldValue::Real(x) => Value::from(*x),
            FieldValue::Text(s) => Value::from(s.clone()),
        }
    }
}

/// Display destination for an advisor request label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Leetcode,
    Codechef,
    Codeforces,
    Skillrack,
    Github,
    Linkedin,
    Resume,
    Profile,
}

pub const ALL_PLATFORMS: [Platform; 8] = [
    Platform::Leetcode,
    Platform::Codechef,
    Platform::Codeforces,
    Platform::Skillrack,
    Platform::Github,
    Platform::Linkedin,
    Platform::Resume,
    Platform::Profile,
];

impl Platform {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "leetcode" => Some(Self::Leetcode),
            "codechef" => Some(Self::Codechef),
            "codeforces" => Some(Self::Codeforces),
            "skillrack" => Some(Self::Skillrack),
            "github" => Some(Self::Github),
            "linkedin" => Some(Self::Linkedin),
            "resume" => Some(Self::Resume),
            "profile" => Some(Self::Profile),
            _ => None,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Leetcode => "leetcode",
            Self::Codechef => "codechef",
            Self::Codeforces => "codeforces",
            Self::Skillrack => "skillrack",
            Self::Github => "github",
            Self::Linkedin => "linkedin",
            Self::Resume => "resume",
            Self::Profile => "profile",
        }
    }

    /// Navigation route used by both shells.
    pub fn route(self) -> &'static str {
        match self {
            Self::Leetcode => "/leetcode",
            Self::Codechef => "/codechef",
            Self::Codeforces => "/codeforces",
            Self::Skillrack => "/skillrack",
            Self::Github => "/github",
            Self::Linkedin => "/linkedin",
            Self::Resume => "/resume",
            Self::Profile => "/profile",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Leetcode => "LeetCode",
            Self::Codechef => "CodeChef",
            Self::Codeforces => "CodeForces",
            Self::Skillrack => "Skillrack",
            Self::Github => "GitHub",
            Self::Linkedin => "LinkedIn",
            Self::Resume => "Resume",
            Self::Profile => "Profile",
        }
    }
}

const PROFILE_FIELDS: &[(&str, FieldKind)] = &[
    ("NAME", FieldKind::Text),
    ("REGNO", FieldKind::Text),
    ("DEPT", FieldKind::Text),
    ("SECTION", FieldKind::Text),
    ("YEAR", FieldKind::Text),
    ("GENDER", FieldKind::Text),
    ("EMAIL", FieldKind::Text),
    ("OFFICIAL_MAIL", FieldKind::Text),
    ("MOBILE_NO", FieldKind::Text),
    ("ALT_MOBILE_NO", FieldKind::Text),
    ("CURRENT_ADDRESS", FieldKind::Text),
    ("PERMANENT_ADDRESS", FieldKind::Text),
    ("PINCODE", FieldKind::Text),
    ("STATE", FieldKind::Text),
    ("10TH_BOARD_MARKS", FieldKind::Integer),
    ("10TH_BOARD_PCT", FieldKind::Decimal),
    ("10TH_BOARD_YEAR", FieldKind::Integer),
    ("12TH_BOARD_MARKS", FieldKind::Integer),
    ("12TH_BOARD_PCT", FieldKind::Decimal),
    ("12TH_BOARD_YEAR", FieldKind::Integer),
    ("DIPLOMA_YEAR", FieldKind::Integer),
    ("DIPLOMA_PCT", FieldKind::Decimal),
    ("GPA_SEM1", FieldKind::Decimal),
    ("GPA_SEM2", FieldKind::Decimal),
    ("GPA_SEM3", FieldKind::Decimal),
    ("GPA_SEM4", FieldKind::Decimal),
    ("GPA_SEM5", FieldKind::Decimal),
    ("GPA_SEM6", FieldKind::Decimal),
    ("GPA_SEM7", FieldKind::Decimal),
    ("GPA_SEM8", FieldKind::Decimal),
    ("CGPA", FieldKind::Decimal),
    ("AADHAR_NO", FieldKind::Text),
    ("PAN_NO", FieldKind::Text),
    ("FATHER_NAME", FieldKind::Text),
    ("MOTHER_NAME", FieldKind::Text),
    ("GUARDIAN_NAME", FieldKind::Text),
    ("KNOWN_TECH_STACK", FieldKind::Text),
    ("INTERNSHIP_COMPANY", FieldKind::Text),
    ("INTERNSHIP_OFFER_LINK", FieldKind::Text),
    ("PLACEMENT_HS", FieldKind::Text),
    ("WILLING_TO_RELOCATE", FieldKind::Text),
    ("COE_NAME", FieldKind::Text),
    ("COE_INCHARGE_NAME", FieldKind::Text),
    ("COE_PROJECTS_DONE", FieldKind::Integer),
];

const LEETCODE_FIELDS: &[(&str, FieldKind)] = &[
    ("LEETCODE_ID", FieldKind::Text),
    ("LC_TOTAL_PROBLEMS", FieldKind::Integer),
    ("LC_EASY", FieldKind::Integer),
    ("LC_MEDIUM", FieldKind::Integer),
    ("LC_HARD", FieldKind::Integer),
    ("LC_RATING", FieldKind::Integer),
    ("LC_BADGES", FieldKind::Integer),
    ("LC_MAX_RATING", FieldKind::Integer),
];

const CODECHEF_FIELDS: &[(&str, FieldKind)] = &[
    ("CODECHEF_ID", FieldKind::Text),
    ("CC_TOTAL_PROBLEMS", FieldKind::Integer),
    ("CC_RANK", FieldKind::Integer),
    ("CC_BADGES", FieldKind::Integer),
    ("CC_RATING", FieldKind::Integer),
];

const SKILLRACK_FIELDS: &[(&str, FieldKind)] = &[
    ("SKILLRACK_ID", FieldKind::Text),
    ("SR_PROBLEMS_SOLVED", FieldKind::Integer),
    ("SR_RANK", FieldKind::Integer),
];

const GITHUB_FIELDS: &[(&str, FieldKind)] = &[
    ("GITHUB_ID", FieldKind::Text),
    ("GITHUB_LINK", FieldKind::Text),
];

const LINKEDIN_FIELDS: &[(&str, FieldKind)] = &[("LINKEDIN_LINK", FieldKind::Text)];

const RESUME_FIELDS: &[(&str, FieldKind)] = &[("RESUME_LINK", FieldKind::Text)];

/// Advisor-facing request label -> student-row field, per group. Unknown
/// labels pass through verbatim so a request can name a raw field key.
const LEETCODE_LABEL_MAP: &[(&str, &str)] = &[
    ("LEETCODE", "LEETCODE_ID"),
    ("LEETCODE ID", "LEETCODE_ID"),
    ("LC TOTAL", "LC_TOTAL_PROBLEMS"),
    ("LC_TOTAL", "LC_TOTAL_PROBLEMS"),
    ("LC EASY", "LC_EASY"),
    ("LC MED", "LC_MEDIUM"),
    ("LC MEDIUM", "LC_MEDIUM"),
    ("LC HARD", "LC_HARD"),
    ("LC RATING", "LC_RATING"),
    ("LC BADGES", "LC_BADGES"),
    ("LC MAX", "LC_MAX_RATING"),
    ("LC_MAX", "LC_MAX_RATING"),
];

const CODECHEF_LABEL_MAP: &[(&str, &str)] = &[
    ("CODECHEF", "CODECHEF_ID"),
    ("CODECHEF ID", "CODECHEF_ID"),
    ("CC TOTAL", "CC_TOTAL_PROBLEMS"),
    ("CC_TOTAL", "CC_TOTAL_PROBLEMS"),
    ("CC RANK", "CC_RANK"),
    ("CC BADGES", "CC_BADGES"),
    ("CC RATING", "CC_RATING"),
];

const SKILLRACK_LABEL_MAP: &[(&str, &str)] = &[
    ("SKILLRACK", "SKILLRACK_ID"),
    ("SKILLRACK ID", "SKILLRACK_ID"),
    ("SR PROBLEMS", "SR_PROBLEMS_SOLVED"),
    ("SR_PROBLEMS", "SR_PROBLEMS_SOLVED"),
    ("SR RANK", "SR_RANK"),
];

const GITHUB_LABEL_MAP: &[(&str, &str)] = &[
    ("GITHUB", "GITHUB_ID"),
    ("GITHUB ID", "GITHUB_ID"),
    ("GITHUB LINK", "GITHUB_LINK"),
];

const LINKEDIN_LABEL_MAP: &[(&str, &str)] = &[
    ("LINKEDIN", "LINKEDIN_LINK"),
    ("LINKEDIN LINK", "LINKEDIN_LINK"),
];

const RESUME_LABEL_MAP: &[(&str, &str)] = &[
    ("RESUME", "RESUME_LINK"),
    ("RESUME LINK", "RESUME_LINK"),
];

/// Student-row field -> the advisor-facing label used when retiring a
/// request. One fixed label per field; fields without an entry (all profile
/// fields) use the field name itself.
const FIELD_TO_LABEL: &[(&str, &str)] = &[
    ("LEETCODE_ID", "LEETCODE ID"),
    ("LC_TOTAL_PROBLEMS", "LC TOTAL"),
    ("LC_EASY", "LC EASY"),
    ("LC_MEDIUM", "LC MED"),
    ("LC_HARD", "LC HARD"),
    ("LC_RATING", "LC RATING"),
    ("LC_BADGES", "LC BADGES"),
    ("LC_MAX_RATING", "LC MAX"),
    ("CODECHEF_ID", "CODECHEF ID"),
    ("CC_TOTAL_PROBLEMS", "CC TOTAL"),
    ("CC_RANK", "CC RANK"),
    ("CC_BADGES", "CC BADGES"),
    ("CC_RATING", "CC RATING"),
    ("SKILLRACK_ID", "SKILLRACK ID"),
    ("SR_PROBLEMS_SOLVED", "SR PROBLEMS"),
    ("SR_RANK", "SR RANK"),
    ("GITHUB_ID", "GITHUB ID"),
    ("GITHUB_LINK", "GITHUB LINK"),
    ("LINKEDIN_LINK", "LINKEDIN LINK"),
    ("RESUME_LINK", "RESUME LINK"),
];

/// Student-row fields editable through a given platform screen. Codeforces
/// has none: its stats never land in the student row (device stash only).
pub fn group_fields(platform: Platform) -> &'static [(&'static str, FieldKind)] {
    match platform {
        Platform::Leetcode => LEETCODE_FIELDS,
        Platform::Codechef => CODECHEF_FIELDS,
        Platform::Codeforces => &[],
        Platform::Skillrack => SKILLRACK_FIELDS,
        Platform::Github => GITHUB_FIELDS,
        Platform::Linkedin => LINKEDIN_FIELDS,
        Platform::Resume => RESUME_FIELDS,
        Platform::Profile => PROFILE_FIELDS,
    }
}

/// Every field that has a column in the students table.
pub fn catalog() -> impl Iterator<Item = (&'static str, FieldKind)> {
    ALL_PLATFORMS
        .iter()
        .flat_map(|p| group_fields(*p).iter().copied())
}

pub fn field_kind(field: &str) -> Option<FieldKind> {
    catalog().find(|(n, _)| *n == field).map(|(_, k)| k)
}

fn label_map(platform: Platform) -> &'static [(&'static str, &'static str)] {
    match platform {
        Platform::Leetcode => LEETCODE_LABEL_MAP,
        Platform::Codechef => CODECHEF_LABEL_MAP,
        Platform::Codeforces => &[],
        Platform::Skillrack => SKILLRACK_LABEL_MAP,
        Platform::Github => GITHUB_LABEL_MAP,
        Platform::Linkedin => LINKEDIN_LABEL_MAP,
        Platform::Resume => RESUME_LABEL_MAP,
        Platform::Profile => &[],
    }
}

/// Resolve an advisor label to the field it highlights. Labels are matched
/// after trim + uppercase; unmapped labels pass through unchanged (profile
/// requests name the field directly).
pub fn label_to_field(platform: Platform, label: &str) -> String {
    let normalized = label.trim().to_uppercase();
    for (l, f) in label_map(platform) {
        if *l == normalized {
            return (*f).to_string();
        }
    }
    normalized
}

/// Reverse direction: the label under which a completed field is recorded.
pub fn field_to_label(field: &str) -> String {
    for (f, l) in FIELD_TO_LABEL {
        if *f == field {
            return (*l).to_string();
        }
    }
    field.to_string()
}

/// Classify a request label into its display destination. Rules run in a
/// fixed order with first-match-wins; every label lands in exactly one
/// bucket, with profile as the catch-all.
pub fn classify(label: &str) -> Platform {
    let l = label.trim().to_uppercase();
    if l.contains("LEETCODE") || l.starts_with("LC_") || l.starts_with("LC ") {
        Platform::Leetcode
    } else if l.contains("CODECHEF") || l.starts_with("CC_") || l.starts_with("CC ") {
        Platform::Codechef
    } else if l.contains("CODEFORCES") || l.starts_with("CF_") || l.starts_with("CF ") {
        Platform::Codeforces
    } else if l.contains("SKILLRACK") || l.starts_with("SR_") || l.starts_with("SR ") {
        Platform::Skillrack
    } else if l.contains("GITHUB") {
        Platform::Github
    } else if l.contains("LINKEDIN") {
        Platform::Linkedin
    } else if l.contains("RESUME") {
        Platform::Resume
    } else {
        Platform::Profile
    }
}

/// Comparable form of a working-copy JSON value, mirroring
/// `FieldValue::display_string` on the stored side.
pub fn json_display_string(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Coerce a working-copy JSON value to the field's stored type. Blank input
/// becomes NULL for every kind.
pub fn typed_from_json(kind: FieldKind, v: &Value) -> Result<FieldValue, String> {
    if v.is_null() {
        return Ok(FieldValue::Null);
    }
    match kind {
        FieldKind::Text => match v {
            Value::String(s) if s.is_empty() => Ok(FieldValue::Null),
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
            Value::Bool(b) => Ok(FieldValue::Text(b.to_string())),
            _ => Err("value must be a scalar".to_string()),
        },
        FieldKind::Integer => match v {
            Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Int)
                .ok_or_else(|| "value must be an integer".to_string()),
            Value::String(s) => {
                let t = s.trim();
                if t.is_empty() {
                    Ok(FieldValue::Null)
                } else {
                    t.parse::<i64>()
                        .map(FieldValue::Int)
                        .map_err(|_| format!("not an integer: {}", s))
                }
            }
            _ => Err("value must be an integer".to_string()),
        },
        FieldKind::Decimal => match v {
            Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Real)
                .ok_or_else(|| "value must be numeric".to_string()),
            Value::String(s) => {
                let t = s.trim();
                if t.is_empty() {
                    Ok(FieldValue::Null)
                } else {
                    t.parse::<f64>()
                        .map(FieldValue::Real)
                        .map_err(|_| format!("not a number: {}", s))
                }
            }
            _ => Err("value must be numeric".to_string()),
        },
    }
}
