use bimap::BiMap;
use rand::{self, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::{collections::HashMap, fs::File};
use tokio::sync::watch;

use super::{
    models::{
        Actor, Appointment, AppointmentStatus, Message, RegistrationStatus, Role, StudentProfile,
        TeacherProfile, User, UserKind,
    },
    seed::seed_db,
    subs::{
        appointment_snapshot, message_snapshot, AppointmentFilter, MessageFilter, SubscriptionSet,
    },
    AuthError, Database, NewAccount, NewAccountKind, NewAppointment, NewMessage, TeacherUpdate,
    UpdateStatus, WorkflowError, PAGE_SIZE,
};

#[derive(Serialize, Deserialize)]
pub struct JSONDatabase {
    filename: String,
    credentials: HashMap<String, Credential>,
    profiles: HashMap<u32, User>,
    tokens: BiMap<String, u32>,
    appointments: HashMap<u32, Appointment>,
    messages: HashMap<u32, Message>,
    next_uid: u32,
    next_appointment_id: u32,
    next_message_id: u32,
    last_created_at: u64,
    #[serde(skip)]
    subscribers: SubscriptionSet,
}

/// Identity record, separate from the profile. Lookup key is the email.
#[derive(Clone, Serialize, Deserialize)]
struct Credential {
    uid: u32,
    salt: String,
    digest: String,
}

impl JSONDatabase {
    pub fn new(filename: String) -> Self {
        // Try to read from disk
        if let Ok(db) = Self::from_file(&filename) {
            return db;
        }

        let mut db = Self {
            filename,
            credentials: HashMap::new(),
            profiles: HashMap::new(),
            tokens: BiMap::new(),
            appointments: HashMap::new(),
            messages: HashMap::new(),
            next_uid: 0,
            next_appointment_id: 0,
            next_message_id: 0,
            last_created_at: 0,
            subscribers: SubscriptionSet::default(),
        };

        db.reset();

        db
    }

    fn from_file(filename: &str) -> Result<Self, std::io::Error> {
        let contents = {
            let mut file = File::open(filename)?;
            let mut contents = String::new();
            file.read_to_string(&mut contents)?;
            contents
        };

        Ok(serde_json::from_str(&contents)?)
    }

    fn persist(&self) -> Result<(), std::io::Error> {
        let mut output = File::create(&self.filename)?;
        write!(output, "{}", self.dump_as_json()?)?;
        Ok(())
    }

    /// Server-assigned creation timestamp, strictly increasing even when two
    /// writes land within the same second.
    fn next_created_at(&mut self) -> u64 {
        let now = chrono::Utc::now().timestamp() as u64;
        self.last_created_at = std::cmp::max(now, self.last_created_at + 1);
        self.last_created_at
    }

    fn publish_appointments(&mut self) {
        self.subscribers.publish_appointments(&self.appointments);
    }

    fn publish_messages(&mut self) {
        self.subscribers.publish_messages(&self.messages);
    }

    fn _register(&mut self, account: NewAccount) -> Result<u32, AuthError> {
        if self.credentials.contains_key(&account.email) {
            return Err(AuthError::EmailTaken);
        }

        let uid = self.next_uid;
        self.next_uid += 1;

        // Identity first, profile second, as the hosted flow would do it.
        let salt = random_token(16);
        let digest = hash_password(&salt, &account.password);
        self.credentials
            .insert(account.email.clone(), Credential { uid, salt, digest });

        let kind = match account.kind {
            NewAccountKind::Admin => UserKind::Admin,
            NewAccountKind::Teacher {
                department,
                subject,
            } => UserKind::Teacher(TeacherProfile {
                department,
                subject,
            }),
            NewAccountKind::Student => UserKind::Student(StudentProfile {
                status: RegistrationStatus::Pending,
            }),
        };

        self.profiles.insert(
            uid,
            User {
                uid,
                name: account.name,
                email: account.email,
                kind,
            },
        );

        Ok(uid)
    }
}

impl Database for JSONDatabase {
    fn reset(&mut self) {
        self.credentials.clear();
        self.profiles.clear();
        self.tokens.clear();
        self.appointments.clear();
        self.messages.clear();
        self.next_uid = 0;
        self.next_appointment_id = 0;
        self.next_message_id = 0;
        self.last_created_at = 0;

        seed_db(self);
        log::info!("database reset, {} accounts seeded", self.profiles.len());

        self.publish_appointments();
        self.publish_messages();
        self.persist().expect("could not save DB");
    }

    fn seed(&mut self, accounts: impl Iterator<Item = NewAccount>) {
        for account in accounts {
            self._register(account)
                .expect("seed accounts should have unique emails");
        }

        self.persist().expect("could not save DB");
    }

    fn dump_as_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self)
    }

    fn register(&mut self, account: NewAccount) -> Result<&User, AuthError> {
        let uid = self._register(account)?;
        self.persist().expect("could not save DB");

        Ok(self.profiles.get(&uid).expect("profile was just added"))
    }

    fn auth_sign_in(&mut self, email: &str, password: &str) -> Result<(&User, String), AuthError> {
        let (uid, salt, digest) = match self.credentials.get(email) {
            Some(credential) => (
                credential.uid,
                credential.salt.clone(),
                credential.digest.clone(),
            ),
            None => return Err(AuthError::InvalidCredentials),
        };

        if hash_password(&salt, password) != digest {
            return Err(AuthError::InvalidCredentials);
        }

        // Identity verified but no profile record: fatal inconsistency, the
        // caller is signed straight back out and no session exists.
        if !self.profiles.contains_key(&uid) {
            return Err(AuthError::AccountRecordMissing);
        }

        let token = random_token(25);
        self.tokens.insert(token.clone(), uid);
        self.persist().expect("could not save DB");

        Ok((self.profiles.get(&uid).expect("checked above"), token))
    }

    fn auth_sign_out(&mut self, token: &str) {
        self.tokens.remove_by_left(&token.to_string());
        self.persist().expect("could not save DB");
    }

    fn auth_resolve(&self, token: &str) -> Option<&User> {
        let uid = self.tokens.get_by_left(&token.to_string())?;
        self.profiles.get(uid)
    }

    fn user_get(&self, uid: u32) -> Option<&User> {
        self.profiles.get(&uid)
    }

    fn user_get_by_email(&self, email: &str) -> Option<&User> {
        self.profiles.values().find(|user| user.email == email)
    }

    fn teacher_list(&self, page: usize, query: Option<&str>) -> (usize, Vec<&User>) {
        _search(
            self.profiles.values(),
            |user: &User| user.name.clone(),
            page,
            query,
            |user| matches!(user.kind, UserKind::Teacher(_)),
        )
    }

    fn teacher_update(&mut self, uid: u32, update: TeacherUpdate) -> UpdateStatus {
        let updated = match self.profiles.get_mut(&uid) {
            Some(user) => match &mut user.kind {
                UserKind::Teacher(profile) => {
                    // Unconditional overwrite, last write wins.
                    user.name = update.name;
                    profile.department = update.department;
                    profile.subject = update.subject;
                    true
                }
                _ => false,
            },
            None => false,
        };

        if updated {
            self.persist().expect("could not save DB");
        }

        UpdateStatus {
            found: updated,
            updated,
        }
    }

    fn student_list_pending(&self, page: usize, query: Option<&str>) -> (usize, Vec<&User>) {
        _search(
            self.profiles.values(),
            |user: &User| user.name.clone(),
            page,
            query,
            |user| {
                matches!(
                    &user.kind,
                    UserKind::Student(StudentProfile {
                        status: RegistrationStatus::Pending,
                    })
                )
            },
        )
    }

    fn student_approve(&mut self, uid: u32) -> UpdateStatus {
        let status = match self.profiles.get_mut(&uid) {
            Some(User {
                kind: UserKind::Student(profile),
                ..
            }) => {
                if profile.status == RegistrationStatus::Pending {
                    profile.status = RegistrationStatus::Active;
                    UpdateStatus {
                        found: true,
                        updated: true,
                    }
                } else {
                    UpdateStatus {
                        found: true,
                        updated: false,
                    }
                }
            }
            _ => UpdateStatus {
                found: false,
                updated: false,
            },
        };

        if status.updated {
            self.persist().expect("could not save DB");
        }

        status
    }

    fn student_reject(&mut self, uid: u32) -> bool {
        // Rejection removes the registration outright, it is not a soft mark.
        let pending = matches!(
            self.profiles.get(&uid),
            Some(User {
                kind: UserKind::Student(StudentProfile {
                    status: RegistrationStatus::Pending,
                }),
                ..
            })
        );

        pending && self.account_remove(uid)
    }

    fn account_remove(&mut self, uid: u32) -> bool {
        match self.profiles.get(&uid) {
            None => return false,
            Some(user) if user.role() == Role::Admin => return false,
            Some(_) => {}
        }

        self.profiles.remove(&uid);
        self.credentials.retain(|_, credential| credential.uid != uid);
        self.tokens.remove_by_right(&uid);
        self.persist().expect("could not save DB");

        true
    }

    fn appointment_request(
        &mut self,
        student_email: &str,
        request: NewAppointment,
    ) -> Result<&Appointment, WorkflowError> {
        request.validate()?;

        let (student_uid, student_name) = match self.user_get_by_email(student_email) {
            Some(user) => (user.uid, user.name.clone()),
            None => return Err(WorkflowError::UnknownId),
        };

        let (teacher_uid, teacher_name, teacher_subject) =
            match self.user_get_by_email(&request.teacher_email) {
                Some(User {
                    uid,
                    name,
                    kind: UserKind::Teacher(profile),
                    ..
                }) => (*uid, name.clone(), profile.subject.clone()),
                _ => return Err(WorkflowError::UnknownTeacher),
            };

        let id = self.next_appointment_id;
        self.next_appointment_id += 1;
        let created_at = self.next_created_at();

        let appointment = Appointment {
            id,
            student_uid,
            student_name,
            student_email: student_email.to_string(),
            teacher_uid,
            teacher_name,
            teacher_email: request.teacher_email,
            teacher_subject,
            date: request.date,
            time: request.time,
            reason: request.reason,
            status: AppointmentStatus::Pending,
            created_at,
        };

        self.appointments.insert(id, appointment);
        self.publish_appointments();
        self.persist().expect("could not save DB");

        Ok(self
            .appointments
            .get(&id)
            .expect("appointment was just added"))
    }

    fn appointment_set_status(
        &mut self,
        id: u32,
        status: AppointmentStatus,
        actor: &Actor,
    ) -> Result<(), WorkflowError> {
        if status == AppointmentStatus::Pending {
            return Err(WorkflowError::InvalidStatus);
        }

        let appointment = self
            .appointments
            .get_mut(&id)
            .ok_or(WorkflowError::UnknownId)?;

        if actor.role != Role::Teacher || actor.email != appointment.teacher_email {
            return Err(WorkflowError::NotOwner);
        }
        if appointment.status != AppointmentStatus::Pending {
            return Err(WorkflowError::NotPending);
        }

        appointment.status = status;
        self.publish_appointments();
        self.persist().expect("could not save DB");

        Ok(())
    }

    fn appointment_cancel(&mut self, id: u32, actor: &Actor) -> Result<(), WorkflowError> {
        let appointment = self.appointments.get(&id).ok_or(WorkflowError::UnknownId)?;

        match actor.role {
            // An admin may remove any record in any state.
            Role::Admin => {}
            Role::Student => {
                if actor.email != appointment.student_email {
                    return Err(WorkflowError::NotOwner);
                }
                if appointment.status != AppointmentStatus::Pending {
                    return Err(WorkflowError::NotPending);
                }
            }
            Role::Teacher => return Err(WorkflowError::NotOwner),
        }

        self.appointments.remove(&id);
        self.publish_appointments();
        self.persist().expect("could not save DB");

        Ok(())
    }

    fn appointment_list(&self, filter: &AppointmentFilter) -> Vec<&Appointment> {
        let mut results: Vec<&Appointment> = self
            .appointments
            .values()
            .filter(|appointment| filter.matches(appointment))
            .collect();

        results.sort_by(|a, b| a.schedule_cmp(b));
        results
    }

    fn appointment_subscribe(
        &mut self,
        filter: AppointmentFilter,
    ) -> watch::Receiver<Vec<Appointment>> {
        let initial = appointment_snapshot(&self.appointments, &filter);
        self.subscribers.subscribe_appointments(filter, initial)
    }

    fn message_send(
        &mut self,
        student_email: &str,
        request: NewMessage,
    ) -> Result<&Message, WorkflowError> {
        if request.teacher_email.is_empty() {
            return Err(WorkflowError::MissingField("teacher"));
        }
        if request.content.is_empty() {
            return Err(WorkflowError::MissingField("content"));
        }

        let (student_uid, student_name) = match self.user_get_by_email(student_email) {
            Some(user) => (user.uid, user.name.clone()),
            None => return Err(WorkflowError::UnknownId),
        };

        let teacher_name = match self.user_get_by_email(&request.teacher_email) {
            Some(User {
                name,
                kind: UserKind::Teacher(_),
                ..
            }) => name.clone(),
            _ => return Err(WorkflowError::UnknownTeacher),
        };

        let id = self.next_message_id;
        self.next_message_id += 1;
        let created_at = self.next_created_at();

        let message = Message {
            id,
            student_uid,
            student_name,
            student_email: student_email.to_string(),
            teacher_name,
            teacher_email: request.teacher_email,
            content: request.content,
            teacher_reply: None,
            created_at,
        };

        self.messages.insert(id, message);
        self.publish_messages();
        self.persist().expect("could not save DB");

        Ok(self.messages.get(&id).expect("message was just added"))
    }

    fn message_reply(
        &mut self,
        id: u32,
        actor: &Actor,
        reply: String,
    ) -> Result<(), WorkflowError> {
        if reply.is_empty() {
            return Err(WorkflowError::MissingField("reply"));
        }

        let message = self.messages.get_mut(&id).ok_or(WorkflowError::UnknownId)?;

        if actor.role != Role::Teacher || actor.email != message.teacher_email {
            return Err(WorkflowError::NotOwner);
        }

        // Replying again overwrites the previous reply.
        message.teacher_reply = Some(reply);
        self.publish_messages();
        self.persist().expect("could not save DB");

        Ok(())
    }

    fn message_list(&self, filter: &MessageFilter) -> Vec<&Message> {
        let mut results: Vec<&Message> = self
            .messages
            .values()
            .filter(|message| filter.matches(message))
            .collect();

        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results
    }

    fn message_subscribe(&mut self, filter: MessageFilter) -> watch::Receiver<Vec<Message>> {
        let initial = message_snapshot(&self.messages, &filter);
        self.subscribers.subscribe_messages(filter, initial)
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn random_token(length: usize) -> String {
    let mut rng = rand::thread_rng();

    std::iter::repeat(())
        .map(|()| rng.sample(rand::distributions::Alphanumeric))
        .take(length)
        .collect()
}

fn _search<'a, T, F>(
    collection: impl Iterator<Item = &'a T>,
    property: F,
    page: usize,
    query: Option<&str>,
    custom_filter: impl Fn(&T) -> bool,
) -> (usize, Vec<&'a T>)
where
    F: Fn(&T) -> String,
{
    let mut filter = contains_query(query, property);
    let mut total = 0;
    let mut skipped = 0;
    let mut results: Vec<&T> = Vec::new();
    let to_skip = (page - 1) * PAGE_SIZE;

    for row in collection {
        if !filter(&row) || !custom_filter(&row) {
            continue;
        }

        total += 1;

        if skipped < to_skip {
            skipped += 1;
        } else if results.len() < PAGE_SIZE {
            results.push(row);
        }
    }

    (total, results)
}

/// Returns a function to be used as a filter that checks if the provided query is contained in the
/// object string.
fn contains_query<T, F>(query: Option<&str>, property: F) -> impl FnMut(&&T) -> bool
where
    F: Fn(&T) -> String,
{
    let normalize = |s: &str| unidecode::unidecode(s.trim()).to_ascii_lowercase();
    let query = query.map(|d| truncate(d, 50)).map(normalize);

    move |object: &&T| {
        if let Some(query) = &query {
            let name = property(object);
            let name = normalize(&name);
            name.contains(query)
        } else {
            true
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((idx, _)) => &s[..idx],
    }
}
