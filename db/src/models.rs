use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub uid: u32,
    pub name: String,
    pub email: String,
    pub kind: UserKind,
}

impl User {
    pub fn role(&self) -> Role {
        self.kind.role()
    }

    /// Detached identity snapshot, usable alongside a mutable borrow of the
    /// store when checking ownership rules.
    pub fn actor(&self) -> Actor {
        Actor {
            uid: self.uid,
            email: self.email.clone(),
            role: self.role(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub enum UserKind {
    Admin,
    Teacher(TeacherProfile),
    Student(StudentProfile),
}

impl UserKind {
    pub fn role(&self) -> Role {
        match self {
            Self::Admin => Role::Admin,
            Self::Teacher(_) => Role::Teacher,
            Self::Student(_) => Role::Student,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub department: String,
    pub subject: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct StudentProfile {
    pub status: RegistrationStatus,
}

/// Student accounts start Pending and only become Active through an admin
/// approval; teachers and admins have no approval gate.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Pending,
    Active,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Teacher => "Teacher",
            Self::Student => "Student",
        }
    }
}

/// The account performing an operation, as resolved from its session.
#[derive(Clone, Debug)]
pub struct Actor {
    pub uid: u32,
    pub email: String,
    pub role: Role,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: u32,
    pub student_uid: u32,
    pub student_name: String,
    pub student_email: String,
    pub teacher_uid: u32,
    pub teacher_name: String,
    pub teacher_email: String,
    pub teacher_subject: String,
    pub date: String,
    pub time: String,
    pub reason: String,
    pub status: AppointmentStatus,
    pub created_at: u64,
}

impl Appointment {
    /// Listing order: (date asc, time asc), lexicographic on the raw
    /// strings. An unpadded date like "2024-5-1" sorts out of chronological
    /// order; values are expected to be zero-padded upstream.
    pub fn schedule_cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.time.cmp(&other.time))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u32,
    pub student_uid: u32,
    pub student_name: String,
    pub student_email: String,
    pub teacher_name: String,
    pub teacher_email: String,
    pub content: String,
    pub teacher_reply: Option<String>,
    pub created_at: u64,
}
