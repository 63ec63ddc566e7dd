//! Session gate: decides, for a given view and an optional session account,
//! whether the view may be shown or where the client must be sent instead.

use std::str::FromStr;

use crate::models::{Role, User};

/// The closed set of navigable views. `Entry` is the sign-in/registration
/// view; the three dashboards each require the matching role.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum View {
    Entry,
    Admin,
    Teacher,
    Student,
}

impl View {
    /// The canonical landing view for a role.
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::Admin,
            Role::Teacher => Self::Teacher,
            Role::Student => Self::Student,
        }
    }

    pub fn required_role(self) -> Option<Role> {
        match self {
            Self::Entry => None,
            Self::Admin => Some(Role::Admin),
            Self::Teacher => Some(Role::Teacher),
            Self::Student => Some(Role::Student),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl FromStr for View {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entry" => Ok(Self::Entry),
            "admin" => Ok(Self::Admin),
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decision {
    Allow,
    RedirectTo(View),
}

/// Pure navigation rule, evaluated on every page load before any per-role
/// initialization runs. A protected view without a session goes back to
/// `Entry`; a session on the wrong view goes to its own dashboard.
pub fn authorize(session: Option<&User>, view: View) -> Decision {
    let required = match view.required_role() {
        None => return Decision::Allow,
        Some(required) => required,
    };

    match session {
        None => Decision::RedirectTo(View::Entry),
        Some(user) => {
            let role = user.role();
            if role == required {
                Decision::Allow
            } else {
                Decision::RedirectTo(View::for_role(role))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{authorize, Decision, View};
    use crate::models::{
        RegistrationStatus, Role, StudentProfile, TeacherProfile, User, UserKind,
    };

    fn account(role: Role) -> User {
        let kind = match role {
            Role::Admin => UserKind::Admin,
            Role::Teacher => UserKind::Teacher(TeacherProfile {
                department: "Sciences".to_string(),
                subject: "Physics".to_string(),
            }),
            Role::Student => UserKind::Student(StudentProfile {
                status: RegistrationStatus::Active,
            }),
        };

        User {
            uid: 7,
            name: "Some One".to_string(),
            email: "some.one@school.edu".to_string(),
            kind,
        }
    }

    #[test]
    fn entry_is_always_allowed() {
        assert_eq!(authorize(None, View::Entry), Decision::Allow);

        for role in &[Role::Admin, Role::Teacher, Role::Student] {
            assert_eq!(authorize(Some(&account(*role)), View::Entry), Decision::Allow);
        }
    }

    #[test]
    fn protected_views_require_a_session() {
        for view in &[View::Admin, View::Teacher, View::Student] {
            assert_eq!(authorize(None, *view), Decision::RedirectTo(View::Entry));
        }
    }

    #[test]
    fn matching_role_is_allowed() {
        assert_eq!(
            authorize(Some(&account(Role::Admin)), View::Admin),
            Decision::Allow
        );
        assert_eq!(
            authorize(Some(&account(Role::Teacher)), View::Teacher),
            Decision::Allow
        );
        assert_eq!(
            authorize(Some(&account(Role::Student)), View::Student),
            Decision::Allow
        );
    }

    #[test]
    fn mismatched_role_redirects_to_its_own_view() {
        for &role in &[Role::Admin, Role::Teacher, Role::Student] {
            let user = account(role);
            let own = View::for_role(role);

            for &view in &[View::Admin, View::Teacher, View::Student] {
                if view == own {
                    continue;
                }

                assert_eq!(
                    authorize(Some(&user), view),
                    Decision::RedirectTo(own),
                    "role {:?} on view {:?}",
                    role,
                    view
                );
            }
        }
    }
}
