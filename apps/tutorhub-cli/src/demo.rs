//! Seeded in-memory backend for `--demo`

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tutorhub_api::{
    Account, AccountId, InMemoryBackend, Message, MessageId, Role, StudentId, StudentProfile,
    Subject, TeacherId, TeacherProfile,
};

/// Default account for demo sessions (student "kim", student profile 3)
pub const DEMO_ACCOUNT: i64 = 42;

fn account(id: i64, username: &str, role: Role) -> Account {
    Account {
        id: AccountId(id),
        username: username.to_string(),
        email: format!("{username}@tutorhub.test"),
        role,
        active: true,
    }
}

fn subject(name: &str, hourly_rate: f64) -> Subject {
    Subject {
        name: name.to_string(),
        description: None,
        hourly_rate,
    }
}

pub fn seeded_backend() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());

    let kim = account(42, "kim", Role::Student);
    let lee = account(43, "lee", Role::Student);
    let prof = account(99, "prof_park", Role::Teacher);
    let tutor = account(98, "tutor_choi", Role::Teacher);
    for a in [&kim, &lee, &prof, &tutor] {
        backend.add_account(a.clone());
    }

    backend.add_student(StudentProfile {
        id: StudentId(3),
        user_id: kim.id,
    });
    backend.add_student(StudentProfile {
        id: StudentId(4),
        user_id: lee.id,
    });
    backend.add_teacher(TeacherProfile {
        id: TeacherId(7),
        user_id: prof.id,
        bio: Some("Calculus and linear algebra".to_string()),
        subjects: vec![subject("Calculus", 40.0), subject("Linear Algebra", 45.0)],
        average_rating: Some(4.8),
        review_count: 31,
    });
    backend.add_teacher(TeacherProfile {
        id: TeacherId(8),
        user_id: tutor.id,
        bio: Some("Conversational Korean".to_string()),
        subjects: vec![subject("Korean", 30.0)],
        average_rating: None,
        review_count: 0,
    });

    // 2024-03-05T10:00:00Z
    let start = DateTime::<Utc>::from_timestamp(1_709_632_800, 0).unwrap_or_default();

    let thread = [
        (1, &kim, &prof, "Hi, are you taking new students?", true),
        (2, &prof, &kim, "Yes! What would you like to work on?", true),
        (3, &kim, &prof, "Mostly integrals, exam is in two weeks", true),
        (4, &prof, &kim, "Can we start Tuesday at 5pm?", false),
        (5, &tutor, &kim, "Welcome to the Korean course", false),
        (6, &lee, &prof, "Is the Thursday slot still free?", false),
    ];

    for (id, sender, recipient, content, is_read) in thread {
        backend.insert_message(Message {
            id: MessageId(id),
            sender_id: sender.id,
            recipient_id: recipient.id,
            content: content.to_string(),
            sent_at: start + Duration::minutes(id),
            is_read,
            sender: Some(sender.clone()),
            recipient: Some(recipient.clone()),
        });
    }

    backend
}
