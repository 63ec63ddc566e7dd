use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

pub mod gate;
mod json;
pub mod models;
mod seed;
mod subs;

use json::JSONDatabase;
use models::{Actor, Appointment, AppointmentStatus, Message, User};
pub use subs::{AppointmentFilter, MessageFilter};

pub const PAGE_SIZE: usize = 10;

pub type Db = Arc<Mutex<JSONDatabase>>;

pub fn new_db(filename: String) -> Db {
    Arc::new(Mutex::new(JSONDatabase::new(filename)))
}

/// Never dispatched over at runtime; keeps the store surface explicit in one
/// place and lets tests check the impl is complete. The `auth_*` family is
/// the identity-provider capability, the per-collection families are the
/// document-store capability.
pub trait Database {
    fn reset(&mut self);
    fn seed(&mut self, accounts: impl Iterator<Item = NewAccount>);
    fn dump_as_json(&self) -> Result<String, serde_json::Error>;

    /// Creates the identity credential, then the profile record. The two
    /// records stay separate so a credential without a profile is
    /// representable (and rejected at sign-in as `AccountRecordMissing`).
    fn register(&mut self, account: NewAccount) -> Result<&User, AuthError>;
    fn auth_sign_in(&mut self, email: &str, password: &str) -> Result<(&User, String), AuthError>;
    /// Unconditional and idempotent: clearing an unknown or already-cleared
    /// session is a success, so a client can always escape a stale token.
    fn auth_sign_out(&mut self, token: &str);
    fn auth_resolve(&self, token: &str) -> Option<&User>;

    fn user_get(&self, uid: u32) -> Option<&User>;
    fn user_get_by_email(&self, email: &str) -> Option<&User>;
    fn teacher_list(&self, page: usize, query: Option<&str>) -> (usize, Vec<&User>);
    fn teacher_update(&mut self, uid: u32, update: TeacherUpdate) -> UpdateStatus;
    fn student_list_pending(&self, page: usize, query: Option<&str>) -> (usize, Vec<&User>);
    fn student_approve(&mut self, uid: u32) -> UpdateStatus;
    fn student_reject(&mut self, uid: u32) -> bool;
    /// Removes profile, credential and any live sessions. Refuses admin
    /// accounts: those are seeded out-of-band and not administrable here.
    fn account_remove(&mut self, uid: u32) -> bool;

    fn appointment_request(
        &mut self,
        student_email: &str,
        request: NewAppointment,
    ) -> Result<&Appointment, WorkflowError>;
    fn appointment_set_status(
        &mut self,
        id: u32,
        status: AppointmentStatus,
        actor: &Actor,
    ) -> Result<(), WorkflowError>;
    fn appointment_cancel(&mut self, id: u32, actor: &Actor) -> Result<(), WorkflowError>;
    fn appointment_list(&self, filter: &AppointmentFilter) -> Vec<&Appointment>;
    fn appointment_subscribe(
        &mut self,
        filter: AppointmentFilter,
    ) -> watch::Receiver<Vec<Appointment>>;

    fn message_send(
        &mut self,
        student_email: &str,
        request: NewMessage,
    ) -> Result<&Message, WorkflowError>;
    fn message_reply(&mut self, id: u32, actor: &Actor, reply: String)
        -> Result<(), WorkflowError>;
    fn message_list(&self, filter: &MessageFilter) -> Vec<&Message>;
    fn message_subscribe(&mut self, filter: MessageFilter) -> watch::Receiver<Vec<Message>>;
}

pub fn email_from_name(name: &str, domain: &str) -> String {
    let local = unidecode::unidecode(name)
        .to_ascii_lowercase()
        .replace(" ", ".");

    format!("{}@{}", local, domain)
}

pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub kind: NewAccountKind,
}

pub enum NewAccountKind {
    Admin,
    Teacher { department: String, subject: String },
    Student,
}

#[derive(Deserialize)]
pub struct NewAppointment {
    pub teacher_email: String,
    pub date: String,
    pub time: String,
    pub reason: String,
}

impl NewAppointment {
    /// Every field of the booking form is required; nothing is written when
    /// one is missing.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.teacher_email.is_empty() {
            return Err(WorkflowError::MissingField("teacher"));
        }
        if self.date.is_empty() {
            return Err(WorkflowError::MissingField("date"));
        }
        if self.time.is_empty() {
            return Err(WorkflowError::MissingField("time"));
        }
        if self.reason.is_empty() {
            return Err(WorkflowError::MissingField("reason"));
        }

        Ok(())
    }
}

#[derive(Deserialize)]
pub struct NewMessage {
    pub teacher_email: String,
    pub content: String,
}

#[derive(Deserialize)]
pub struct TeacherUpdate {
    pub name: String,
    pub department: String,
    pub subject: String,
}

pub struct UpdateStatus {
    pub found: bool,
    pub updated: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    EmailTaken,
    /// The credential verified but no profile record exists: a fatal
    /// inconsistency, no session is issued.
    AccountRecordMissing,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WorkflowError {
    MissingField(&'static str),
    UnknownId,
    UnknownTeacher,
    NotOwner,
    NotPending,
    InvalidStatus,
}
