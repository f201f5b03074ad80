//! Identity resolver
//!
//! Populates the [`IdentityCache`] in bulk and answers point lookups with a
//! fetch-and-cache fallback on miss. Lookups never fail: a record that does not
//! exist and a transport failure both come back as `None`, with the failure
//! logged.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tutorhub_api::{
    Account, AccountId, ApiError, Directory, Profile, ProfileRef, Role, StudentId,
    StudentProfile, TeacherId, TeacherProfile,
};

use crate::cache::{IdentityCache, IdentityMaps};

pub struct IdentityResolver {
    directory: Arc<dyn Directory>,
    cache: Arc<IdentityCache>,
    bulk_limit: u32,
}

impl IdentityResolver {
    /// Create a resolver over `directory`, filling `cache`
    ///
    /// `bulk_limit` is the page size used for every collection fetch.
    pub fn new(directory: Arc<dyn Directory>, cache: Arc<IdentityCache>, bulk_limit: u32) -> Self {
        Self {
            directory,
            cache,
            bulk_limit,
        }
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    /// Rebuild every mapping and snapshot from the backend
    ///
    /// Students, teachers and accounts are fetched concurrently. The new
    /// generation is only installed once all three succeed; on failure the
    /// previous cache contents stay in place and `false` is returned.
    #[instrument(skip(self))]
    pub async fn initialize_user_mappings(&self) -> bool {
        match self.fetch_generation().await {
            Ok(maps) => {
                info!(
                    accounts = maps.account_count(),
                    students = maps.student_count(),
                    teachers = maps.teacher_count(),
                    "User mappings initialized"
                );
                self.cache.replace(maps);
                true
            }
            Err(e) => {
                error!("Failed to initialize user mappings: {}", e);
                false
            }
        }
    }

    /// Initialize once; later calls are no-ops after a successful run
    pub async fn ensure_initialized(&self) -> bool {
        if self.cache.is_initialized() {
            return true;
        }
        self.initialize_user_mappings().await
    }

    async fn fetch_generation(&self) -> Result<IdentityMaps, ApiError> {
        let (students, teachers, accounts) = tokio::try_join!(
            self.directory.list_students(0, self.bulk_limit),
            self.directory.list_teachers(0, self.bulk_limit),
            self.directory.list_accounts(0, self.bulk_limit),
        )?;

        Ok(IdentityMaps::from_collections(accounts, students, teachers))
    }

    /// Student profile id owned by `account`
    ///
    /// On a cache miss the whole student collection is fetched again and merged,
    /// then the cache is consulted a second time.
    #[instrument(skip(self))]
    pub async fn get_student_id_from_user_id(&self, account: AccountId) -> Option<StudentId> {
        self.profile_for_account(account, Role::Student)
            .await
            .map(|profile| StudentId(profile.id))
    }

    /// Teacher profile id owned by `account`, with the same miss policy as
    /// [`Self::get_student_id_from_user_id`]
    #[instrument(skip(self))]
    pub async fn get_teacher_id_from_user_id(&self, account: AccountId) -> Option<TeacherId> {
        self.profile_for_account(account, Role::Teacher)
            .await
            .map(|profile| TeacherId(profile.id))
    }

    /// Account owning student profile `student`; a miss fetches only that profile
    #[instrument(skip(self))]
    pub async fn get_user_id_from_student_id(&self, student: StudentId) -> Option<AccountId> {
        self.account_for_profile(ProfileRef::student(student)).await
    }

    /// Account owning teacher profile `teacher`; a miss fetches only that profile
    #[instrument(skip(self))]
    pub async fn get_user_id_from_teacher_id(&self, teacher: TeacherId) -> Option<AccountId> {
        self.account_for_profile(ProfileRef::teacher(teacher)).await
    }

    /// Profile of `account` in `role`
    pub async fn profile_for_account(&self, account: AccountId, role: Role) -> Option<ProfileRef> {
        if let Some(profile) = self.cache.profile_ref(account, role) {
            return Some(profile);
        }

        debug!(%role, "Mapping miss, refreshing profile collection");
        if !self.refresh_collection(role).await {
            return None;
        }

        self.cache.profile_ref(account, role)
    }

    /// Owner of a role-qualified profile id
    pub async fn account_for_profile(&self, profile: ProfileRef) -> Option<AccountId> {
        if let Some(account) = self.cache.account_for(profile) {
            return Some(account);
        }

        self.fetch_profile(profile)
            .await
            .map(|fetched| fetched.account_id())
    }

    /// Re-fetch every profile of `role` and merge it into the cache
    async fn refresh_collection(&self, role: Role) -> bool {
        let fetched = match role {
            Role::Student => self
                .directory
                .list_students(0, self.bulk_limit)
                .await
                .map(|students| students.into_iter().map(Profile::from).collect::<Vec<_>>()),
            Role::Teacher => self
                .directory
                .list_teachers(0, self.bulk_limit)
                .await
                .map(|teachers| teachers.into_iter().map(Profile::from).collect::<Vec<_>>()),
        };

        match fetched {
            Ok(profiles) => {
                self.cache.insert_profiles(profiles);
                true
            }
            Err(e) => {
                warn!(%role, "Failed to fetch profiles: {}", e);
                false
            }
        }
    }

    pub fn store_user_info(&self, account: Account) {
        self.cache.insert_account(account);
    }

    pub async fn get_user_info(&self, id: AccountId) -> Option<Account> {
        if let Some(account) = self.cache.account(id) {
            return Some(account);
        }

        match self.directory.account(id).await {
            Ok(Some(account)) => {
                self.cache.insert_account(account.clone());
                Some(account)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(account = %id, "Failed to fetch account: {}", e);
                None
            }
        }
    }

    pub async fn get_teacher_info(&self, id: TeacherId) -> Option<TeacherProfile> {
        if let Some(profile) = self.cache.teacher(id) {
            return Some(profile);
        }

        match self.fetch_profile(ProfileRef::teacher(id)).await {
            Some(Profile::Teacher(profile)) => Some(profile),
            _ => None,
        }
    }

    pub async fn get_student_info(&self, id: StudentId) -> Option<StudentProfile> {
        if let Some(profile) = self.cache.student(id) {
            return Some(profile);
        }

        match self.fetch_profile(ProfileRef::student(id)).await {
            Some(Profile::Student(profile)) => Some(profile),
            _ => None,
        }
    }

    /// Fetch a single profile and cache it along with both mapping directions
    async fn fetch_profile(&self, profile: ProfileRef) -> Option<Profile> {
        let fetched = match profile.role {
            Role::Student => self
                .directory
                .student(StudentId(profile.id))
                .await
                .map(|found| found.map(Profile::from)),
            Role::Teacher => self
                .directory
                .teacher(TeacherId(profile.id))
                .await
                .map(|found| found.map(Profile::from)),
        };

        match fetched {
            Ok(Some(found)) => {
                debug!(
                    profile = %found.profile_ref(),
                    owner = %found.account_id(),
                    "Fetched profile"
                );
                self.cache.insert_profile(found.clone());
                Some(found)
            }
            Ok(None) => {
                debug!(%profile, "Profile not found");
                None
            }
            Err(e) => {
                warn!(%profile, "Failed to fetch profile: {}", e);
                None
            }
        }
    }
}
