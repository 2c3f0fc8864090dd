//! The operation surface the console layer calls. Every mutation runs behind
//! the action gate, applies to the whole document, and is flushed to disk
//! before returning. Reads are not gated.
//!
//! `assign_teacher` and `enroll_student` update both sides of their relation
//! in one load/mutate/save cycle; the store itself still does not enforce the
//! subject.students <-> student.grades invariant.

use tracing::info;

use crate::config::Config;
use crate::error::{OpError, ValidationError};
use crate::gate::{ActionGate, Session};
use crate::model::{analyze_subject, Role, Student, Subject, SubjectAnalysis, User};
use crate::normalize::{
    subject_from_record, subject_to_record, user_from_record, user_to_record,
};
use crate::store::{Document, Store};

/// Default credentials seeded into an empty deployment.
pub const DEFAULT_ADMIN: (&str, &str) = ("admin", "admin");

pub struct Registry {
    store: Store,
    gate: ActionGate,
    strict_roles: bool,
}

impl Registry {
    pub fn new(config: &Config) -> Self {
        Self {
            store: Store::from_config(config),
            gate: ActionGate::from_config(config),
            strict_roles: config.policy.strict_roles,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ----- session lifecycle (reads, not gated) -----

    /// Check credentials and bind the session on success. A failed login
    /// leaves the session untouched.
    pub fn login(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> Result<bool, OpError> {
        let doc = self.store.load()?;
        let Some(user) = self.user_of(&doc, username) else {
            return Ok(false);
        };
        if !user.authenticate(password) {
            return Ok(false);
        }
        session.set(&user);
        info!(username, role = %user.role(), "login");
        Ok(true)
    }

    pub fn logout(&self, session: &mut Session) {
        session.clear();
    }

    /// First-run bootstrap: seed the default admin when no users exist.
    /// Returns whether a record was added. Not gated, since nobody can log in
    /// to an empty deployment.
    pub fn ensure_default_admin(&self) -> Result<bool, OpError> {
        let mut doc = self.store.load()?;
        if !doc.users.is_empty() {
            return Ok(false);
        }
        let (username, password) = DEFAULT_ADMIN;
        doc.add_user(user_to_record(&User::new(username, password, Role::Admin)));
        self.store.save(&doc)?;
        info!(username, "seeded default admin");
        Ok(true)
    }

    // ----- admin operations -----

    pub fn create_user(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<(), OpError> {
        self.gate
            .guard(session, "create_user", &[Role::Admin], || {
                let mut doc = self.store.load()?;
                if doc.find_user(username).is_some() {
                    return Err(ValidationError::DuplicateUser(username.to_string()).into());
                }
                doc.add_user(user_to_record(&User::new(username, password, role)));
                self.store.save(&doc)?;
                Ok(())
            })
    }

    /// Removes every record carrying the username. False if none existed.
    pub fn delete_user(&self, session: &mut Session, username: &str) -> Result<bool, OpError> {
        self.gate
            .guard(session, "delete_user", &[Role::Admin], || {
                let mut doc = self.store.load()?;
                let removed = doc.delete_user(username);
                if removed {
                    self.store.save(&doc)?;
                }
                Ok(removed)
            })
    }

    pub fn create_subject(
        &self,
        session: &mut Session,
        code: &str,
        name: &str,
    ) -> Result<(), OpError> {
        self.gate
            .guard(session, "create_subject", &[Role::Admin], || {
                let subject = Subject::new(code, name);
                let mut doc = self.store.load()?;
                if doc.find_subject(&subject.code).is_some() {
                    return Err(ValidationError::DuplicateSubject(subject.code).into());
                }
                doc.add_subject(subject_to_record(&subject));
                self.store.save(&doc)?;
                Ok(())
            })
    }

    pub fn delete_subject(&self, session: &mut Session, code: &str) -> Result<bool, OpError> {
        let code = code.to_ascii_uppercase();
        self.gate
            .guard(session, "delete_subject", &[Role::Admin], || {
                let mut doc = self.store.load()?;
                let removed = doc.delete_subject(&code);
                if removed {
                    self.store.save(&doc)?;
                }
                Ok(removed)
            })
    }

    /// Point `subject.teacher` at the teacher AND add the code to the
    /// teacher's subject set, in one document cycle.
    pub fn assign_teacher(
        &self,
        session: &mut Session,
        code: &str,
        teacher_username: &str,
    ) -> Result<(), OpError> {
        let code = code.to_ascii_uppercase();
        self.gate
            .guard(session, "assign_teacher", &[Role::Admin], || {
                let mut doc = self.store.load()?;
                let mut subject = self.subject_of(&doc, &code)?;
                let user = self
                    .user_of(&doc, teacher_username)
                    .ok_or_else(|| ValidationError::UnknownUser(teacher_username.to_string()))?;
                let User::Teacher(mut teacher) = user else {
                    return Err(
                        ValidationError::NotATeacher(teacher_username.to_string()).into()
                    );
                };

                subject.teacher = Some(teacher_username.to_string());
                teacher.subjects.insert(code.clone());
                doc.update_subject(&code, &subject_to_record(&subject));
                doc.update_user(teacher_username, &user_to_record(&User::Teacher(teacher)));
                self.store.save(&doc)?;
                Ok(())
            })
    }

    /// Add the student to `subject.students` AND seed empty grade/attendance
    /// buckets for the subject on the student record, in one document cycle.
    pub fn enroll_student(
        &self,
        session: &mut Session,
        code: &str,
        student_username: &str,
    ) -> Result<(), OpError> {
        let code = code.to_ascii_uppercase();
        self.gate
            .guard(session, "enroll_student", &[Role::Admin], || {
                let mut doc = self.store.load()?;
                let mut subject = self.subject_of(&doc, &code)?;
                let mut student = self.student_of(&doc, student_username)?;

                subject.students.insert(student_username.to_string());
                student.grades.entry(code.clone()).or_default();
                student.attendance.entry(code.clone()).or_default();
                doc.update_subject(&code, &subject_to_record(&subject));
                doc.update_user(student_username, &user_to_record(&User::Student(student)));
                self.store.save(&doc)?;
                Ok(())
            })
    }

    // ----- teacher operations -----

    pub fn record_grade(
        &self,
        session: &mut Session,
        student_username: &str,
        code: &str,
        assignment: &str,
        score: f64,
    ) -> Result<(), OpError> {
        let code = code.to_ascii_uppercase();
        let actor = session.actor().to_string();
        self.gate
            .guard(session, "record_grade", &[Role::Teacher], || {
                let mut doc = self.store.load()?;
                self.check_assignment(&doc, &actor, &code)?;
                let mut student = self.student_of(&doc, student_username)?;
                student.add_grade(&code, assignment, score);
                doc.update_user(student_username, &user_to_record(&User::Student(student)));
                self.store.save(&doc)?;
                Ok(())
            })
    }

    pub fn record_attendance(
        &self,
        session: &mut Session,
        student_username: &str,
        code: &str,
        date: Option<&str>,
    ) -> Result<(), OpError> {
        let code = code.to_ascii_uppercase();
        let actor = session.actor().to_string();
        self.gate
            .guard(session, "record_attendance", &[Role::Teacher], || {
                let mut doc = self.store.load()?;
                self.check_assignment(&doc, &actor, &code)?;
                let mut student = self.student_of(&doc, student_username)?;
                student.add_attendance(&code, date);
                doc.update_user(student_username, &user_to_record(&User::Student(student)));
                self.store.save(&doc)?;
                Ok(())
            })
    }

    // ----- read surface -----

    pub fn list_users(&self) -> Result<Vec<User>, OpError> {
        let doc = self.store.load()?;
        Ok(doc
            .users
            .iter()
            .filter_map(|r| user_from_record(r, self.strict_roles))
            .collect())
    }

    pub fn get_student(&self, username: &str) -> Result<Student, OpError> {
        let doc = self.store.load()?;
        Ok(self.student_of(&doc, username)?)
    }

    pub fn get_subject(&self, code: &str) -> Result<Subject, OpError> {
        let doc = self.store.load()?;
        Ok(self.subject_of(&doc, &code.to_ascii_uppercase())?)
    }

    /// Mean/median/count over the subject's enrolled roster.
    pub fn subject_analysis(&self, code: &str) -> Result<SubjectAnalysis, OpError> {
        let code = code.to_ascii_uppercase();
        let doc = self.store.load()?;
        let subject = self.subject_of(&doc, &code)?;
        let roster: Vec<Student> = subject
            .students
            .iter()
            .filter_map(|username| {
                self.user_of(&doc, username)
                    .and_then(|u| u.as_student().cloned())
            })
            .collect();
        let refs: Vec<&Student> = roster.iter().collect();
        Ok(analyze_subject(&refs, &code))
    }

    // ----- lookups -----

    fn user_of(&self, doc: &Document, username: &str) -> Option<User> {
        doc.find_user(username)
            .and_then(|r| user_from_record(r, self.strict_roles))
    }

    fn student_of(&self, doc: &Document, username: &str) -> Result<Student, ValidationError> {
        let user = self
            .user_of(doc, username)
            .ok_or_else(|| ValidationError::UnknownUser(username.to_string()))?;
        match user {
            User::Student(s) => Ok(s),
            _ => Err(ValidationError::NotAStudent(username.to_string())),
        }
    }

    fn subject_of(&self, doc: &Document, code: &str) -> Result<Subject, ValidationError> {
        doc.find_subject(code)
            .and_then(subject_from_record)
            .ok_or_else(|| ValidationError::UnknownSubject(code.to_string()))
    }

    /// The acting teacher must be assigned to the subject before recording
    /// grades or attendance in it.
    fn check_assignment(
        &self,
        doc: &Document,
        teacher_username: &str,
        code: &str,
    ) -> Result<(), ValidationError> {
        self.subject_of(doc, code)?;
        let user = self
            .user_of(doc, teacher_username)
            .ok_or_else(|| ValidationError::UnknownUser(teacher_username.to_string()))?;
        let Some(teacher) = user.as_teacher() else {
            return Err(ValidationError::NotATeacher(teacher_username.to_string()));
        };
        if !teacher.is_assigned(code) {
            return Err(ValidationError::NotAssigned {
                teacher: teacher_username.to_string(),
                subject: code.to_string(),
            });
        }
        Ok(())
    }
}
