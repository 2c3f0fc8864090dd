//! Domain objects: users in their three roles, subjects, and the pure
//! in-memory behavior (credential check, grade/attendance accrual, per-subject
//! analytics). No I/O lives here.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Subject bucket legacy flat grades/attendance are relocated under.
pub const GENERAL_SUBJECT: &str = "GENERAL";

/// Overall average below this marks a student as at academic risk.
pub const AT_RISK_THRESHOLD: f64 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    /// Canonical discriminator value written to the document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Teacher => "Teacher",
            Role::Student => "Student",
        }
    }

    /// Parse a discriminator value. Legacy documents disagree on casing
    /// ("admin" vs "Admin"); `strict` rejects anything but the canonical
    /// capitalized form.
    pub fn parse(s: &str, strict: bool) -> Result<Role, ValidationError> {
        if strict {
            return match s {
                "Admin" => Ok(Role::Admin),
                "Teacher" => Ok(Role::Teacher),
                "Student" => Ok(Role::Student),
                _ => Err(ValidationError::BadRole(s.to_string())),
            };
        }
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            _ => Err(ValidationError::BadRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields every role shares. The username is the immutable record key.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseUser {
    pub username: String,
    pub password: String,
}

impl BaseUser {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Grades keyed by subject code, then assignment name.
pub type GradeMap = BTreeMap<String, BTreeMap<String, f64>>;

/// Attendance dates keyed by subject code; insertion order is the order the
/// dates were recorded.
pub type AttendanceMap = BTreeMap<String, Vec<String>>;

#[derive(Clone, Debug, PartialEq)]
pub struct Student {
    pub base: BaseUser,
    pub grades: GradeMap,
    pub attendance: AttendanceMap,
}

impl Student {
    pub fn new(base: BaseUser) -> Self {
        Self {
            base,
            grades: GradeMap::new(),
            attendance: AttendanceMap::new(),
        }
    }

    /// Upsert one assignment score. Bounds checking (0-100) is the calling
    /// UI's job; see [`parse_score`].
    pub fn add_grade(&mut self, subject: &str, assignment: &str, score: f64) {
        self.grades
            .entry(subject.to_string())
            .or_default()
            .insert(assignment.to_string(), score);
    }

    /// Append one attendance date. `None` records today. Recording the same
    /// date twice yields two entries.
    pub fn add_attendance(&mut self, subject: &str, date: Option<&str>) {
        let date = match date {
            Some(d) => d.to_string(),
            None => chrono::Local::now().format("%Y-%m-%d").to_string(),
        };
        self.attendance
            .entry(subject.to_string())
            .or_default()
            .push(date);
    }

    /// Arithmetic mean of this subject's scores, `None` if there are none.
    pub fn average(&self, subject: &str) -> Option<f64> {
        let scores = self.grades.get(subject)?;
        if scores.is_empty() {
            return None;
        }
        let sum: f64 = scores.values().sum();
        Some(sum / scores.len() as f64)
    }

    /// Mean of every score across every subject, `None` if there are none.
    pub fn overall_average(&self) -> Option<f64> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for scores in self.grades.values() {
            for v in scores.values() {
                sum += v;
                n += 1;
            }
        }
        if n == 0 {
            None
        } else {
            Some(sum / n as f64)
        }
    }

    /// A student with no grades at all is not at risk.
    pub fn at_risk(&self) -> bool {
        self.overall_average()
            .map(|avg| avg < AT_RISK_THRESHOLD)
            .unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Teacher {
    pub base: BaseUser,
    pub subjects: BTreeSet<String>,
}

impl Teacher {
    pub fn new(base: BaseUser) -> Self {
        Self {
            base,
            subjects: BTreeSet::new(),
        }
    }

    pub fn is_assigned(&self, subject: &str) -> bool {
        self.subjects.contains(subject)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum User {
    Admin(BaseUser),
    Teacher(Teacher),
    Student(Student),
}

impl User {
    pub fn new(username: &str, password: &str, role: Role) -> Self {
        let base = BaseUser::new(username, password);
        match role {
            Role::Admin => User::Admin(base),
            Role::Teacher => User::Teacher(Teacher::new(base)),
            Role::Student => User::Student(Student::new(base)),
        }
    }

    fn base(&self) -> &BaseUser {
        match self {
            User::Admin(base) => base,
            User::Teacher(t) => &t.base,
            User::Student(s) => &s.base,
        }
    }

    pub fn username(&self) -> &str {
        &self.base().username
    }

    pub fn role(&self) -> Role {
        match self {
            User::Admin(_) => Role::Admin,
            User::Teacher(_) => Role::Teacher,
            User::Student(_) => Role::Student,
        }
    }

    /// Exact string match against the stored credential. No hashing; the
    /// document format never carried hashed passwords.
    pub fn authenticate(&self, password: &str) -> bool {
        self.base().password == password
    }

    pub fn as_student(&self) -> Option<&Student> {
        match self {
            User::Student(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_student_mut(&mut self) -> Option<&mut Student> {
        match self {
            User::Student(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_teacher(&self) -> Option<&Teacher> {
        match self {
            User::Teacher(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Subject {
    pub code: String,
    pub name: String,
    /// Username of the assigned teacher. Relation only, not ownership.
    pub teacher: Option<String>,
    pub students: BTreeSet<String>,
}

impl Subject {
    /// Codes follow the uppercase convention regardless of input casing.
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_ascii_uppercase(),
            name: name.to_string(),
            teacher: None,
            students: BTreeSet::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SubjectAnalysis {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Full roster size, including students with no grades in the subject.
    pub count: usize,
}

/// Mean and median of each student's average in `subject`. Students with no
/// grades in the subject are excluded from mean/median but still counted in
/// `count`.
pub fn analyze_subject(students: &[&Student], subject: &str) -> SubjectAnalysis {
    let mut averages: Vec<f64> = students
        .iter()
        .filter_map(|s| s.average(subject))
        .collect();
    let count = students.len();
    if averages.is_empty() {
        return SubjectAnalysis {
            mean: None,
            median: None,
            count,
        };
    }
    averages.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mean = averages.iter().sum::<f64>() / averages.len() as f64;
    let mid = averages.len() / 2;
    let median = if averages.len() % 2 == 0 {
        (averages[mid - 1] + averages[mid]) / 2.0
    } else {
        averages[mid]
    };
    SubjectAnalysis {
        mean: Some(mean),
        median: Some(median),
        count,
    }
}

/// Parse and bounds-check a grade entered at the prompt. The domain itself
/// stores whatever f64 it is handed; this is the 0-100 check the menu layer
/// runs before calling in.
pub fn parse_score(input: &str) -> Result<f64, ValidationError> {
    let t = input.trim();
    let v: f64 = t
        .parse()
        .map_err(|_| ValidationError::BadScore(t.to_string()))?;
    if !(0.0..=100.0).contains(&v) {
        return Err(ValidationError::ScoreOutOfRange(t.to_string()));
    }
    Ok(v)
}
