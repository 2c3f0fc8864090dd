//! Reconstruction of domain objects from stored records.
//!
//! The document has been through several schema revisions: grades were once a
//! flat assignment->score map, attendance once a flat list of dates. Both are
//! relocated under the synthetic "GENERAL" subject bucket. Malformed values
//! are dropped rather than failing the load; old data stays readable at the
//! cost of masking quality problems, so every drop is logged at warn.

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::model::{
    AttendanceMap, BaseUser, GradeMap, Role, Student, Subject, Teacher, User, GENERAL_SUBJECT,
};

/// A flat key-value structure as persisted in the JSON document.
pub type Record = Map<String, Value>;

fn str_field<'a>(rec: &'a Record, key: &str) -> Option<&'a str> {
    rec.get(key).and_then(|v| v.as_str())
}

/// Discriminator lives under "role" in newer documents, "type" in older ones.
pub fn record_role(rec: &Record, strict: bool) -> Option<Role> {
    let raw = str_field(rec, "role").or_else(|| str_field(rec, "type"))?;
    match Role::parse(raw, strict) {
        Ok(role) => Some(role),
        Err(_) => {
            warn!(role = raw, "dropping record with unknown role");
            None
        }
    }
}

/// Canonicalize a stored grades value.
///
/// Accepted shapes, per entry:
/// - `"hw1": 90` (legacy flat) -> relocated under `GENERAL`;
/// - `"MATH101": {"hw1": 90}` (canonical) -> kept, non-numeric scores dropped;
/// - anything else -> dropped.
pub fn normalize_grades(raw: Option<&Value>) -> GradeMap {
    let mut out = GradeMap::new();
    let Some(Value::Object(map)) = raw else {
        if let Some(v) = raw {
            if !v.is_null() {
                warn!(shape = %value_kind(v), "dropping unrecognized grades value");
            }
        }
        return out;
    };
    for (key, val) in map {
        match val {
            Value::Number(n) => {
                if let Some(score) = n.as_f64() {
                    out.entry(GENERAL_SUBJECT.to_string())
                        .or_default()
                        .insert(key.clone(), score);
                }
            }
            Value::Object(assignments) => {
                let bucket = out.entry(key.clone()).or_default();
                for (assignment, score) in assignments {
                    match score.as_f64() {
                        Some(v) => {
                            bucket.insert(assignment.clone(), v);
                        }
                        None => {
                            warn!(subject = %key, assignment = %assignment,
                                  "dropping non-numeric score");
                        }
                    }
                }
            }
            other => {
                warn!(key = %key, shape = %value_kind(other),
                      "dropping malformed grade entry");
            }
        }
    }
    out
}

/// Canonicalize a stored attendance value.
///
/// Accepted shapes: per-subject map of date lists (canonical), flat list of
/// dates (legacy, relocated under `GENERAL`), or absent (empty).
pub fn normalize_attendance(raw: Option<&Value>) -> AttendanceMap {
    let mut out = AttendanceMap::new();
    match raw {
        None | Some(Value::Null) => {}
        Some(Value::Array(dates)) => {
            let list: Vec<String> = dates
                .iter()
                .filter_map(|d| d.as_str().map(|s| s.to_string()))
                .collect();
            if !list.is_empty() {
                out.insert(GENERAL_SUBJECT.to_string(), list);
            }
        }
        Some(Value::Object(map)) => {
            for (subject, val) in map {
                match val {
                    Value::Array(dates) => {
                        let list = out.entry(subject.clone()).or_default();
                        for d in dates {
                            match d.as_str() {
                                Some(s) => list.push(s.to_string()),
                                None => {
                                    warn!(subject = %subject, "dropping non-string attendance date")
                                }
                            }
                        }
                    }
                    other => {
                        warn!(subject = %subject, shape = %value_kind(other),
                              "dropping malformed attendance entry");
                    }
                }
            }
        }
        Some(other) => {
            warn!(shape = %value_kind(other), "dropping unrecognized attendance value");
        }
    }
    out
}

/// Reconstruct a domain user from a stored record. Returns `None` for records
/// that cannot name a user or a role; the load carries on without them.
pub fn user_from_record(rec: &Record, strict_roles: bool) -> Option<User> {
    let username = str_field(rec, "username")?;
    let password = str_field(rec, "password").unwrap_or("");
    let base = BaseUser::new(username, password);
    let user = match record_role(rec, strict_roles)? {
        Role::Admin => User::Admin(base),
        Role::Teacher => {
            let mut teacher = Teacher::new(base);
            if let Some(Value::Array(codes)) = rec.get("subjects") {
                for c in codes {
                    if let Some(code) = c.as_str() {
                        teacher.subjects.insert(code.to_string());
                    }
                }
            }
            User::Teacher(teacher)
        }
        Role::Student => {
            let mut student = Student::new(base);
            student.grades = normalize_grades(rec.get("grades"));
            student.attendance = normalize_attendance(rec.get("attendance"));
            User::Student(student)
        }
    };
    Some(user)
}

/// Serialize a domain user back to the canonical record shape.
pub fn user_to_record(user: &User) -> Record {
    let mut rec = Record::new();
    rec.insert("username".into(), json!(user.username()));
    rec.insert("role".into(), json!(user.role().as_str()));
    match user {
        User::Admin(base) => {
            rec.insert("password".into(), json!(base.password));
        }
        User::Teacher(t) => {
            rec.insert("password".into(), json!(t.base.password));
            rec.insert("subjects".into(), json!(t.subjects));
        }
        User::Student(s) => {
            rec.insert("password".into(), json!(s.base.password));
            rec.insert("grades".into(), json!(s.grades));
            rec.insert("attendance".into(), json!(s.attendance));
        }
    }
    rec
}

pub fn subject_from_record(rec: &Record) -> Option<Subject> {
    let code = str_field(rec, "code")?;
    let name = str_field(rec, "name").unwrap_or(code);
    let mut subject = Subject::new(code, name);
    subject.teacher = str_field(rec, "teacher").map(|s| s.to_string());
    if let Some(Value::Array(students)) = rec.get("students") {
        for s in students {
            if let Some(username) = s.as_str() {
                subject.students.insert(username.to_string());
            }
        }
    }
    Some(subject)
}

pub fn subject_to_record(subject: &Subject) -> Record {
    let mut rec = Record::new();
    rec.insert("code".into(), json!(subject.code));
    rec.insert("name".into(), json!(subject.name));
    rec.insert("teacher".into(), json!(subject.teacher));
    rec.insert("students".into(), json!(subject.students));
    rec
}

fn value_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(v: Value) -> Record {
        v.as_object().expect("fixture must be an object").clone()
    }

    #[test]
    fn flat_grades_relocate_under_general() {
        let grades = json!({ "hw1": 90 });
        let norm = normalize_grades(Some(&grades));
        assert_eq!(norm.len(), 1);
        assert_eq!(norm["GENERAL"]["hw1"], 90.0);
    }

    #[test]
    fn nested_grades_pass_through() {
        let grades = json!({ "MATH101": { "hw1": 90, "quiz1": 75.5 } });
        let norm = normalize_grades(Some(&grades));
        assert_eq!(norm["MATH101"]["hw1"], 90.0);
        assert_eq!(norm["MATH101"]["quiz1"], 75.5);
    }

    #[test]
    fn mixed_and_malformed_grades_degrade_per_entry() {
        let grades = json!({
            "hw1": 55,
            "MATH101": { "quiz1": 80, "quiz2": "absent" },
            "junk": ["not", "a", "map"]
        });
        let norm = normalize_grades(Some(&grades));
        assert_eq!(norm["GENERAL"]["hw1"], 55.0);
        assert_eq!(norm["MATH101"].len(), 1);
        assert_eq!(norm["MATH101"]["quiz1"], 80.0);
        assert!(!norm.contains_key("junk"));
    }

    #[test]
    fn grades_wrong_type_becomes_empty() {
        assert!(normalize_grades(Some(&json!("oops"))).is_empty());
        assert!(normalize_grades(Some(&json!(null))).is_empty());
        assert!(normalize_grades(None).is_empty());
    }

    #[test]
    fn flat_attendance_relocates_under_general() {
        let att = json!(["2024-01-01"]);
        let norm = normalize_attendance(Some(&att));
        assert_eq!(norm["GENERAL"], vec!["2024-01-01".to_string()]);
    }

    #[test]
    fn nested_attendance_passes_through() {
        let att = json!({ "MATH101": ["2024-01-01", "2024-01-08"] });
        let norm = normalize_attendance(Some(&att));
        assert_eq!(norm["MATH101"].len(), 2);
    }

    #[test]
    fn attendance_absent_or_malformed_is_empty() {
        assert!(normalize_attendance(None).is_empty());
        assert!(normalize_attendance(Some(&json!(42))).is_empty());
        let norm = normalize_attendance(Some(&json!({ "MATH101": "not-a-list" })));
        assert!(norm.is_empty());
    }

    #[test]
    fn student_record_roundtrip_is_canonical() {
        // Legacy record: "type" discriminator, flat grades, flat attendance.
        let rec = record(json!({
            "type": "student",
            "username": "bob",
            "password": "pw",
            "grades": { "hw1": 90 },
            "attendance": ["2024-01-01"]
        }));
        let user = user_from_record(&rec, false).expect("student reconstructs");
        let student = user.as_student().unwrap();
        assert_eq!(student.grades["GENERAL"]["hw1"], 90.0);
        assert_eq!(student.attendance["GENERAL"], vec!["2024-01-01".to_string()]);

        let out = user_to_record(&user);
        assert_eq!(out["role"], "Student");
        assert_eq!(out["grades"]["GENERAL"]["hw1"], 90.0);
        assert_eq!(out["attendance"]["GENERAL"][0], "2024-01-01");
    }

    #[test]
    fn unknown_role_record_is_skipped() {
        let rec = record(json!({ "role": "Janitor", "username": "x" }));
        assert!(user_from_record(&rec, false).is_none());
    }

    #[test]
    fn strict_roles_reject_legacy_casing() {
        let rec = record(json!({ "type": "admin", "username": "root", "password": "pw" }));
        assert!(user_from_record(&rec, true).is_none());
        assert!(user_from_record(&rec, false).is_some());
    }

    #[test]
    fn teacher_record_carries_subjects() {
        let rec = record(json!({
            "role": "Teacher",
            "username": "alice",
            "password": "pw",
            "subjects": ["MATH101", "SCI200"]
        }));
        let user = user_from_record(&rec, false).unwrap();
        let teacher = user.as_teacher().unwrap();
        assert!(teacher.is_assigned("MATH101"));
        assert!(!teacher.is_assigned("ART100"));
    }

    #[test]
    fn subject_record_roundtrip() {
        let rec = record(json!({
            "code": "MATH101",
            "name": "Mathematics",
            "teacher": "alice",
            "students": ["bob"]
        }));
        let subject = subject_from_record(&rec).unwrap();
        assert_eq!(subject.teacher.as_deref(), Some("alice"));
        assert!(subject.students.contains("bob"));

        let out = subject_to_record(&subject);
        assert_eq!(out["code"], "MATH101");
        assert_eq!(out["students"][0], "bob");
    }
}
