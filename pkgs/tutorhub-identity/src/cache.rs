//! Identity cache
//!
//! This module holds the in-memory identity state:
//! - Bidirectional mapping between account ids and student profile ids
//! - Bidirectional mapping between account ids and teacher profile ids
//! - Snapshots of accounts, student profiles and teacher profiles
//!
//! # Data Structures
//!
//! - **student_by_account** / **account_by_student**: AccountId ↔ StudentId
//! - **teacher_by_account** / **account_by_teacher**: AccountId ↔ TeacherId
//! - **accounts**, **students**, **teachers**: full records keyed by their own id
//!
//! Every forward entry has a matching reverse entry. A bulk rebuild is done
//! off to the side in an [`IdentityMaps`] value and swapped in with a single
//! assignment, so readers never see a half-populated cache.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use tutorhub_api::{
    Account, AccountId, Profile, ProfileRef, Role, StudentId, StudentProfile, TeacherId,
    TeacherProfile,
};

/// Point the account and the profile at each other, dropping entries that
/// would otherwise leave a stale half of a previous pairing behind.
fn link<P: Copy + Eq + Hash>(
    forward: &mut HashMap<AccountId, P>,
    reverse: &mut HashMap<P, AccountId>,
    account: AccountId,
    profile: P,
) {
    if let Some(previous_account) = reverse.insert(profile, account) {
        if previous_account != account && forward.get(&previous_account) == Some(&profile) {
            forward.remove(&previous_account);
        }
    }
    if let Some(previous_profile) = forward.insert(account, profile) {
        if previous_profile != profile && reverse.get(&previous_profile) == Some(&account) {
            reverse.remove(&previous_profile);
        }
    }
}

/// One complete generation of identity state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityMaps {
    student_by_account: HashMap<AccountId, StudentId>,
    teacher_by_account: HashMap<AccountId, TeacherId>,
    account_by_student: HashMap<StudentId, AccountId>,
    account_by_teacher: HashMap<TeacherId, AccountId>,
    accounts: HashMap<AccountId, Account>,
    students: HashMap<StudentId, StudentProfile>,
    teachers: HashMap<TeacherId, TeacherProfile>,
}

impl IdentityMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a generation from bulk-fetched collections in one pass
    pub fn from_collections(
        accounts: Vec<Account>,
        students: Vec<StudentProfile>,
        teachers: Vec<TeacherProfile>,
    ) -> Self {
        let mut maps = Self::new();
        for account in accounts {
            maps.insert_account(account);
        }
        for student in students {
            maps.insert_profile(Profile::Student(student));
        }
        for teacher in teachers {
            maps.insert_profile(Profile::Teacher(teacher));
        }
        maps
    }

    pub fn insert_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    /// Record a profile snapshot and both directions of its mapping
    pub fn insert_profile(&mut self, profile: Profile) {
        match profile {
            Profile::Student(student) => {
                link(
                    &mut self.student_by_account,
                    &mut self.account_by_student,
                    student.user_id,
                    student.id,
                );
                self.students.insert(student.id, student);
            }
            Profile::Teacher(teacher) => {
                link(
                    &mut self.teacher_by_account,
                    &mut self.account_by_teacher,
                    teacher.user_id,
                    teacher.id,
                );
                self.teachers.insert(teacher.id, teacher);
            }
        }
    }

    pub fn student_id(&self, account: AccountId) -> Option<StudentId> {
        self.student_by_account.get(&account).copied()
    }

    pub fn teacher_id(&self, account: AccountId) -> Option<TeacherId> {
        self.teacher_by_account.get(&account).copied()
    }

    pub fn account_for_student(&self, student: StudentId) -> Option<AccountId> {
        self.account_by_student.get(&student).copied()
    }

    pub fn account_for_teacher(&self, teacher: TeacherId) -> Option<AccountId> {
        self.account_by_teacher.get(&teacher).copied()
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn student(&self, id: StudentId) -> Option<&StudentProfile> {
        self.students.get(&id)
    }

    pub fn teacher(&self, id: TeacherId) -> Option<&TeacherProfile> {
        self.teachers.get(&id)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn student_count(&self) -> usize {
        self.student_by_account.len()
    }

    pub fn teacher_count(&self) -> usize {
        self.teacher_by_account.len()
    }

    /// Account ⇄ student profile links, ordered by account id
    pub fn student_links(&self) -> Vec<(AccountId, StudentId)> {
        let mut links: Vec<_> = self.student_by_account.iter().map(|(a, s)| (*a, *s)).collect();
        links.sort();
        links
    }

    /// Account ⇄ teacher profile links, ordered by account id
    pub fn teacher_links(&self) -> Vec<(AccountId, TeacherId)> {
        let mut links: Vec<_> = self.teacher_by_account.iter().map(|(a, t)| (*a, *t)).collect();
        links.sort();
        links
    }

    /// Checks that forward and reverse maps mirror each other exactly
    pub fn is_consistent(&self) -> bool {
        self.student_by_account.len() == self.account_by_student.len()
            && self.teacher_by_account.len() == self.account_by_teacher.len()
            && self
                .student_by_account
                .iter()
                .all(|(account, student)| self.account_by_student.get(student) == Some(account))
            && self
                .teacher_by_account
                .iter()
                .all(|(account, teacher)| self.account_by_teacher.get(teacher) == Some(account))
    }
}

/// Shared identity cache
///
/// Constructed explicitly and handed to the resolver and the conversation
/// aggregator by reference, so each session (or test) owns its own instance.
#[derive(Debug, Default)]
pub struct IdentityCache {
    maps: RwLock<IdentityMaps>,
    initialized: AtomicBool,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a complete generation, replacing everything cached so far
    pub fn replace(&self, maps: IdentityMaps) {
        *self.maps.write() = maps;
        self.initialized.store(true, Ordering::SeqCst);
    }

    /// Whether a bulk generation has been installed at least once
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> IdentityMaps {
        self.maps.read().clone()
    }

    pub fn student_id(&self, account: AccountId) -> Option<StudentId> {
        self.maps.read().student_id(account)
    }

    pub fn teacher_id(&self, account: AccountId) -> Option<TeacherId> {
        self.maps.read().teacher_id(account)
    }

    pub fn account_for_student(&self, student: StudentId) -> Option<AccountId> {
        self.maps.read().account_for_student(student)
    }

    pub fn account_for_teacher(&self, teacher: TeacherId) -> Option<AccountId> {
        self.maps.read().account_for_teacher(teacher)
    }

    /// Cached profile of `account` in `role`
    pub fn profile_ref(&self, account: AccountId, role: Role) -> Option<ProfileRef> {
        let maps = self.maps.read();
        match role {
            Role::Student => maps.student_id(account).map(ProfileRef::student),
            Role::Teacher => maps.teacher_id(account).map(ProfileRef::teacher),
        }
    }

    /// Cached owner of a role-qualified profile id
    pub fn account_for(&self, profile: ProfileRef) -> Option<AccountId> {
        match profile.role {
            Role::Student => self.account_for_student(StudentId(profile.id)),
            Role::Teacher => self.account_for_teacher(TeacherId(profile.id)),
        }
    }

    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.maps.read().account(id).cloned()
    }

    pub fn student(&self, id: StudentId) -> Option<StudentProfile> {
        self.maps.read().student(id).cloned()
    }

    pub fn teacher(&self, id: TeacherId) -> Option<TeacherProfile> {
        self.maps.read().teacher(id).cloned()
    }

    pub fn insert_account(&self, account: Account) {
        self.maps.write().insert_account(account);
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.maps.write().insert_profile(profile);
    }

    /// Merge a batch of profiles under one write lock
    pub fn insert_profiles(&self, profiles: impl IntoIterator<Item = Profile>) {
        let mut maps = self.maps.write();
        for profile in profiles {
            maps.insert_profile(profile);
        }
    }
}
