//! Marketplace records as they travel over the wire
//!
//! Accounts are generic identities. Student and teacher profiles are
//! role-specific records owned by an account through `user_id`, each with its
//! own primary id. The messaging endpoints address recipients by profile id,
//! while message payloads reference accounts, so the id newtypes below exist to
//! keep the two spaces from being mixed up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Primary id of a generic account
    AccountId
);
id_type!(
    /// Primary id of a student profile (distinct from the owning account id)
    StudentId
);
id_type!(
    /// Primary id of a teacher profile (distinct from the owning account id)
    TeacherId
);
id_type!(
    /// Primary id of a message
    MessageId
);

/// Marketplace role of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    /// The role on the other side of a student ⇄ teacher conversation
    pub fn opposite(self) -> Role {
        match self {
            Role::Student => Role::Teacher,
            Role::Teacher => Role::Student,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }

    /// Capitalized label used for placeholders
    pub fn label(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Teacher => "Teacher",
        }
    }

    /// Name of the request field that carries a profile id of this role
    pub fn id_field(&self) -> &'static str {
        match self {
            Role::Student => "student_id",
            Role::Teacher => "teacher_id",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role-qualified profile id
///
/// This is how the messaging endpoints address a counterparty. The raw `id`
/// is a student id when `role` is `Student` and a teacher id otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileRef {
    pub role: Role,
    pub id: i64,
}

impl ProfileRef {
    pub fn new(role: Role, id: i64) -> Self {
        Self { role, id }
    }

    pub fn student(id: StudentId) -> Self {
        Self::new(Role::Student, id.0)
    }

    pub fn teacher(id: TeacherId) -> Self {
        Self::new(Role::Teacher, id.0)
    }
}

impl fmt::Display for ProfileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

fn default_active() -> bool {
    true
}

/// Generic account identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(alias = "is_active", default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub id: StudentId,
    pub user_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub hourly_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherProfile {
    pub id: TeacherId,
    pub user_id: AccountId,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub review_count: u32,
}

/// A role-specific profile, tagged when it is fetched
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    Student(StudentProfile),
    Teacher(TeacherProfile),
}

impl Profile {
    /// Id of the owning account
    pub fn account_id(&self) -> AccountId {
        match self {
            Profile::Student(student) => student.user_id,
            Profile::Teacher(teacher) => teacher.user_id,
        }
    }

    pub fn profile_ref(&self) -> ProfileRef {
        match self {
            Profile::Student(student) => ProfileRef::student(student.id),
            Profile::Teacher(teacher) => ProfileRef::teacher(teacher.id),
        }
    }
}

impl From<StudentProfile> for Profile {
    fn from(profile: StudentProfile) -> Self {
        Profile::Student(profile)
    }
}

impl From<TeacherProfile> for Profile {
    fn from(profile: TeacherProfile) -> Self {
        Profile::Teacher(profile)
    }
}

/// A direct message between two accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: AccountId,
    pub recipient_id: AccountId,
    pub content: String,
    #[serde(with = "timestamp")]
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub sender: Option<Account>,
    #[serde(default)]
    pub recipient: Option<Account>,
}

impl Message {
    /// Whether this message counts toward `account`'s unread badge
    pub fn is_unread_for(&self, account: AccountId) -> bool {
        self.recipient_id == account && !self.is_read
    }

    /// Account id of whichever side is not `me`
    pub fn counterparty_id(&self, me: AccountId) -> AccountId {
        if self.sender_id == me {
            self.recipient_id
        } else {
            self.sender_id
        }
    }

    /// Embedded account of whichever side is not `me`, if the payload carried it
    pub fn counterparty(&self, me: AccountId) -> Option<&Account> {
        if self.sender_id == me {
            self.recipient.as_ref()
        } else {
            self.sender.as_ref()
        }
    }
}

/// Body of the unread-count endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub total: u64,
}

/// Message timestamps arrive either as RFC 3339 or as naive ISO-8601 in UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Ok(ts.with_timezone(&Utc)),
            Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive)),
        }
    }
}
