//! Live subscriptions: standing filtered queries that re-deliver the full
//! ordered result set to their listeners after every store mutation.

use std::collections::HashMap;
use tokio::sync::watch;

use crate::models::{Appointment, AppointmentStatus, Message};

/// Equality filter over the appointments collection. `None` fields match
/// everything, so the admin scope is the default value.
#[derive(Clone, Debug, Default)]
pub struct AppointmentFilter {
    pub teacher_email: Option<String>,
    pub student_email: Option<String>,
    pub status: Option<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.teacher_email
            .as_deref()
            .map_or(true, |email| appointment.teacher_email == email)
            && self
                .student_email
                .as_deref()
                .map_or(true, |email| appointment.student_email == email)
            && self
                .status
                .map_or(true, |status| appointment.status == status)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MessageFilter {
    pub teacher_email: Option<String>,
    pub student_email: Option<String>,
}

impl MessageFilter {
    pub fn matches(&self, message: &Message) -> bool {
        self.teacher_email
            .as_deref()
            .map_or(true, |email| message.teacher_email == email)
            && self
                .student_email
                .as_deref()
                .map_or(true, |email| message.student_email == email)
    }
}

/// The registry of active subscriptions. Subscribers are connections, not
/// data: the set is skipped by the store's serialization and starts empty
/// after a restart.
#[derive(Default)]
pub struct SubscriptionSet {
    appointments: Vec<(AppointmentFilter, watch::Sender<Vec<Appointment>>)>,
    messages: Vec<(MessageFilter, watch::Sender<Vec<Message>>)>,
}

impl SubscriptionSet {
    /// The returned receiver yields the current snapshot immediately, then a
    /// fresh snapshot after every publish.
    pub fn subscribe_appointments(
        &mut self,
        filter: AppointmentFilter,
        initial: Vec<Appointment>,
    ) -> watch::Receiver<Vec<Appointment>> {
        let (tx, rx) = watch::channel(initial);
        self.appointments.push((filter, tx));
        rx
    }

    pub fn subscribe_messages(
        &mut self,
        filter: MessageFilter,
        initial: Vec<Message>,
    ) -> watch::Receiver<Vec<Message>> {
        let (tx, rx) = watch::channel(initial);
        self.messages.push((filter, tx));
        rx
    }

    /// Re-delivers the matching result set to every appointment subscriber.
    /// A subscription whose receiver has been dropped fails to broadcast and
    /// is pruned here, exactly once.
    pub fn publish_appointments(&mut self, appointments: &HashMap<u32, Appointment>) {
        self.appointments.retain(|(filter, tx)| {
            tx.broadcast(appointment_snapshot(appointments, filter)).is_ok()
        });
    }

    pub fn publish_messages(&mut self, messages: &HashMap<u32, Message>) {
        self.messages
            .retain(|(filter, tx)| tx.broadcast(message_snapshot(messages, filter)).is_ok());
    }

    #[cfg(test)]
    pub fn appointment_subscriber_count(&self) -> usize {
        self.appointments.len()
    }
}

pub fn appointment_snapshot(
    appointments: &HashMap<u32, Appointment>,
    filter: &AppointmentFilter,
) -> Vec<Appointment> {
    let mut snapshot: Vec<Appointment> = appointments
        .values()
        .filter(|appointment| filter.matches(appointment))
        .cloned()
        .collect();

    snapshot.sort_by(|a, b| a.schedule_cmp(b));
    snapshot
}

pub fn message_snapshot(messages: &HashMap<u32, Message>, filter: &MessageFilter) -> Vec<Message> {
    let mut snapshot: Vec<Message> = messages
        .values()
        .filter(|message| filter.matches(message))
        .cloned()
        .collect();

    // Newest first; timestamps are strictly monotonic so there are no ties.
    snapshot.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    snapshot
}
