use super::{email_from_name, Database, NewAccount, NewAccountKind};

const DOMAIN: &str = "school.edu";

/// Development data: one admin, a handful of teachers, two students (one of
/// them left in the approval queue). Passwords are the dotted account name,
/// same convention as the emails.
pub fn seed_db<D: Database>(db: &mut D) {
    db.seed(
        admin_accounts()
            .into_iter()
            .chain(teacher_accounts().into_iter())
            .chain(student_accounts().into_iter()),
    );

    for name in ACTIVE_STUDENTS {
        let uid = db
            .user_get_by_email(&email_from_name(name, DOMAIN))
            .map(|user| user.uid);

        if let Some(uid) = uid {
            db.student_approve(uid);
        }
    }
}

const ACTIVE_STUDENTS: &[&str] = &["Alice Martin"];

fn admin_accounts() -> Vec<NewAccount> {
    vec![NewAccount {
        name: "Admin User".to_string(),
        email: format!("admin@{}", DOMAIN),
        password: "admin.user".to_string(),
        kind: NewAccountKind::Admin,
    }]
}

fn teacher_accounts() -> Vec<NewAccount> {
    let teachers = vec![
        ("Marie Curie", "Sciences", "Physics"),
        ("Alan Turing", "Mathematics", "Logic"),
        ("Rosalind Franklin", "Sciences", "Biology"),
    ];

    teachers
        .into_iter()
        .map(|(name, department, subject)| account(
            name,
            NewAccountKind::Teacher {
                department: department.to_string(),
                subject: subject.to_string(),
            },
        ))
        .collect()
}

fn student_accounts() -> Vec<NewAccount> {
    vec![
        account("Alice Martin", NewAccountKind::Student),
        account("Bob Dupont", NewAccountKind::Student),
    ]
}

fn account(name: &str, kind: NewAccountKind) -> NewAccount {
    let email = email_from_name(name, DOMAIN);
    let password = email
        .split('@')
        .next()
        .expect("email always has a local part")
        .to_string();

    NewAccount {
        name: name.to_string(),
        email,
        password,
        kind,
    }
}
