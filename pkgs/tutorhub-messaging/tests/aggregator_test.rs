// Copyright 2024 Tutorhub Team.
//
// Tests for ConversationAggregator against the in-memory backend

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tutorhub_api::{
    Account, AccountId, InMemoryBackend, Message, MessageId, ProfileRef, Request, Role,
    StudentId, StudentProfile, TeacherId, TeacherProfile,
};
use tutorhub_identity::{IdentityCache, IdentityResolver};
use tutorhub_messaging::{ConversationAggregator, ConversationId, MessagingError};

fn account(id: i64, username: &str, role: Role) -> Account {
    Account {
        id: AccountId(id),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        role,
        active: true,
    }
}

fn teacher(id: i64, user_id: i64) -> TeacherProfile {
    TeacherProfile {
        id: TeacherId(id),
        user_id: AccountId(user_id),
        bio: None,
        subjects: vec![],
        average_rating: None,
        review_count: 0,
    }
}

fn message(id: i64, sender: &Account, recipient: &Account, minute: u32, is_read: bool) -> Message {
    Message {
        id: MessageId(id),
        sender_id: sender.id,
        recipient_id: recipient.id,
        content: format!("message {id}"),
        sent_at: Utc.with_ymd_and_hms(2024, 3, 5, 10, minute, 0).unwrap(),
        is_read,
        sender: Some(sender.clone()),
        recipient: Some(recipient.clone()),
    }
}

/// Student account 42 (student profile 3), teacher account 99 (teacher profile 7),
/// teacher account 98 (teacher profile 8)
fn seeded_backend() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    backend.add_account(account(42, "kim", Role::Student));
    backend.add_account(account(99, "prof", Role::Teacher));
    backend.add_account(account(98, "tutor", Role::Teacher));
    backend.add_student(StudentProfile {
        id: StudentId(3),
        user_id: AccountId(42),
    });
    backend.add_teacher(teacher(7, 99));
    backend.add_teacher(teacher(8, 98));
    backend.set_viewer(AccountId(42));
    backend
}

fn aggregator_for(backend: &Arc<InMemoryBackend>) -> ConversationAggregator {
    let resolver = Arc::new(IdentityResolver::new(
        backend.clone(),
        Arc::new(IdentityCache::new()),
        1000,
    ));
    ConversationAggregator::new(backend.clone(), resolver)
}

fn signed_in(backend: &Arc<InMemoryBackend>) -> ConversationAggregator {
    let aggregator = aggregator_for(backend);
    aggregator.set_current_account(account(42, "kim", Role::Student));
    aggregator
}

fn teacher_7() -> ConversationId {
    ConversationId::Profile(ProfileRef::teacher(TeacherId(7)))
}

fn assert_unread_invariant(aggregator: &ConversationAggregator) {
    for (id, conversation) in aggregator.conversations() {
        assert_eq!(
            conversation.unread_count,
            conversation.counted_unread(AccountId(42)),
            "unread count out of sync for {id}"
        );
    }
}

#[tokio::test]
async fn test_load_groups_inbox_and_sent_by_profile() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 30, false));
    backend.insert_message(message(2, &kim, &prof, 10, true));

    let aggregator = signed_in(&backend);
    let count = aggregator.load_conversations().await.unwrap();
    assert_eq!(count, 1);

    let conversation = aggregator.conversation(teacher_7()).expect("conversation with teacher 7");
    assert_eq!(conversation.messages.len(), 2);
    assert_eq!(conversation.unread_count, 1);
    assert_eq!(conversation.last_message.as_ref().unwrap().id, MessageId(1));
    assert_eq!(conversation.messages[0].id, MessageId(2));
    assert_unread_invariant(&aggregator);
}

#[tokio::test]
async fn test_load_replaces_previous_state() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();

    // An empty thread opened locally has no messages on the server
    aggregator.get_conversation(8).await.unwrap();
    assert_eq!(aggregator.conversations().len(), 2);

    aggregator.load_conversations().await.unwrap();

    let conversations = aggregator.conversations();
    assert_eq!(conversations.len(), 1);
    assert!(conversations.contains_key(&teacher_7()));
}

#[tokio::test]
async fn test_load_failure_leaves_state_untouched() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();
    let before = aggregator.conversations();

    backend.set_offline(true);
    let result = aggregator.load_conversations().await;

    assert!(matches!(result, Err(MessagingError::Api(_))));
    assert_eq!(aggregator.conversations(), before);
}

#[tokio::test]
async fn test_send_message_scenario() {
    let backend = seeded_backend();
    let aggregator = signed_in(&backend);

    let sent = aggregator
        .send_message(7, "Can we meet Tuesday?")
        .await
        .unwrap();

    assert_eq!(
        backend.request_count(|r| matches!(
            r,
            Request::Send { content, recipient }
                if content == "Can we meet Tuesday?"
                    && *recipient == ProfileRef::teacher(TeacherId(7))
        )),
        1
    );

    let conversation = aggregator.conversation(teacher_7()).unwrap();
    assert_eq!(conversation.messages.len(), 1);
    assert_eq!(conversation.messages[0].sender_id, AccountId(42));
    assert_eq!(conversation.messages[0].recipient_id, AccountId(99));
    assert_eq!(conversation.last_message, Some(sent));
}

#[tokio::test]
async fn test_send_does_not_change_unread() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();
    let before = aggregator.conversation(teacher_7()).unwrap().unread_count;

    aggregator.send_message(7, "hello").await.unwrap();

    let conversation = aggregator.conversation(teacher_7()).unwrap();
    assert_eq!(conversation.last_message.unwrap().content, "hello");
    assert_eq!(conversation.unread_count, before);
    assert_unread_invariant(&aggregator);
}

#[tokio::test]
async fn test_send_failure_does_not_mutate() {
    let backend = seeded_backend();
    let aggregator = signed_in(&backend);

    // Unknown teacher profile
    assert!(aggregator.send_message(70, "hi").await.is_err());

    backend.set_offline(true);
    assert!(aggregator.send_message(7, "hi").await.is_err());

    assert!(aggregator.conversations().is_empty());
}

#[tokio::test]
async fn test_operations_require_account() {
    let backend = seeded_backend();
    let aggregator = aggregator_for(&backend);

    assert!(matches!(
        aggregator.load_conversations().await,
        Err(MessagingError::Unauthenticated)
    ));
    assert!(matches!(
        aggregator.send_message(7, "hi").await,
        Err(MessagingError::Unauthenticated)
    ));
    assert!(matches!(
        aggregator.get_conversation(7).await,
        Err(MessagingError::Unauthenticated)
    ));
    assert!(matches!(
        aggregator.mark_message_as_read(MessageId(1)).await,
        Err(MessagingError::Unauthenticated)
    ));

    // Nothing reached the backend
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_get_conversation_replaces_thread() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();

    backend.insert_message(message(2, &prof, &kim, 5, false));
    backend.insert_message(message(3, &kim, &prof, 3, false));

    let conversation = aggregator.get_conversation(7).await.unwrap();
    let ids: Vec<i64> = conversation.messages.iter().map(|m| m.id.0).collect();
    assert_eq!(ids, vec![1, 3, 2]);
    assert_eq!(conversation.unread_count, 2);
    assert_eq!(aggregator.conversation(teacher_7()), Some(conversation));
    assert!(backend
        .requests()
        .contains(&Request::Conversation(ProfileRef::teacher(TeacherId(7)))));
}

#[tokio::test]
async fn test_mark_read_decrements_once() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));
    backend.insert_message(message(2, &prof, &kim, 2, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();
    assert_eq!(aggregator.conversation(teacher_7()).unwrap().unread_count, 2);

    aggregator.mark_message_as_read(MessageId(1)).await.unwrap();
    assert_eq!(aggregator.conversation(teacher_7()).unwrap().unread_count, 1);

    aggregator.mark_message_as_read(MessageId(1)).await.unwrap();
    assert_eq!(aggregator.conversation(teacher_7()).unwrap().unread_count, 1);
    assert_unread_invariant(&aggregator);
}

#[tokio::test]
async fn test_mark_read_unknown_message_leaves_counts() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();
    let before = aggregator.conversations();

    // Server knows the message, no loaded conversation does
    backend.insert_message(message(5, &prof, &kim, 9, false));
    aggregator.mark_message_as_read(MessageId(5)).await.unwrap();
    assert_eq!(aggregator.conversations(), before);

    // Server rejects the receipt
    assert!(aggregator.mark_message_as_read(MessageId(500)).await.is_err());
    assert_eq!(aggregator.conversations(), before);
}

#[tokio::test]
async fn test_mark_read_failure_does_not_mutate() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();

    backend.set_offline(true);
    assert!(aggregator.mark_message_as_read(MessageId(1)).await.is_err());

    let conversation = aggregator.conversation(teacher_7()).unwrap();
    assert_eq!(conversation.unread_count, 1);
    assert!(!conversation.messages[0].is_read);
}

#[tokio::test]
async fn test_unread_count_degrades_to_zero() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));
    backend.insert_message(message(2, &prof, &kim, 2, false));

    let aggregator = signed_in(&backend);
    assert_eq!(aggregator.get_unread_message_count().await, 2);

    backend.set_offline(true);
    assert_eq!(aggregator.get_unread_message_count().await, 0);
}

#[tokio::test]
async fn test_same_role_counterparty_keyed_by_account() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let lee = account(43, "lee", Role::Student);
    backend.add_account(lee.clone());
    backend.insert_message(message(1, &lee, &kim, 1, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();

    let conversation = aggregator
        .conversation(ConversationId::Account(AccountId(43)))
        .expect("same-role thread keyed by account id");
    assert_eq!(conversation.unread_count, 1);
}

#[tokio::test]
async fn test_unresolvable_counterparty_keyed_by_account() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    // Teacher account without a teacher profile
    let ghost = account(97, "ghost", Role::Teacher);
    backend.add_account(ghost.clone());
    backend.insert_message(message(1, &ghost, &kim, 1, true));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();

    assert!(aggregator
        .conversation(ConversationId::Account(AccountId(97)))
        .is_some());
}

#[tokio::test]
async fn test_load_resolves_each_counterparty_once() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    // Teacher registered after the mappings were loaded
    let late = account(96, "late", Role::Teacher);

    let aggregator = signed_in(&backend);
    aggregator.resolver().initialize_user_mappings().await;

    backend.add_account(late.clone());
    backend.add_teacher(teacher(9, 96));
    for i in 1..=3 {
        backend.insert_message(message(i, &late, &kim, i as u32, false));
    }
    backend.clear_requests();

    aggregator.load_conversations().await.unwrap();

    assert_eq!(
        backend.request_count(|r| matches!(r, Request::ListTeachers)),
        1
    );
    assert_eq!(
        aggregator
            .conversation(ConversationId::Profile(ProfileRef::teacher(TeacherId(9))))
            .unwrap()
            .messages
            .len(),
        3
    );
}

#[tokio::test]
async fn test_conversation_list_newest_first() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    let tutor = account(98, "tutor", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, true));
    backend.insert_message(message(2, &tutor, &kim, 2, true));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();

    let ids: Vec<ConversationId> = aggregator
        .conversation_list()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(
        ids,
        vec![
            ConversationId::Profile(ProfileRef::teacher(TeacherId(8))),
            teacher_7()
        ]
    );
}

#[tokio::test]
async fn test_sign_out_clears_conversations() {
    let backend = seeded_backend();
    let aggregator = signed_in(&backend);
    aggregator.send_message(7, "hello").await.unwrap();
    assert!(!aggregator.conversations().is_empty());

    aggregator.sign_out();

    assert!(aggregator.current_account().is_none());
    assert!(aggregator.conversations().is_empty());
}

#[tokio::test]
async fn test_invariant_holds_across_operation_sequence() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    let prof = account(99, "prof", Role::Teacher);
    let tutor = account(98, "tutor", Role::Teacher);
    backend.insert_message(message(1, &prof, &kim, 1, false));
    backend.insert_message(message(2, &tutor, &kim, 2, false));
    backend.insert_message(message(3, &kim, &prof, 3, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();
    assert_unread_invariant(&aggregator);

    aggregator.send_message(8, "thanks").await.unwrap();
    assert_unread_invariant(&aggregator);

    aggregator.mark_message_as_read(MessageId(3)).await.unwrap();
    assert_unread_invariant(&aggregator);

    aggregator.mark_message_as_read(MessageId(2)).await.unwrap();
    assert_unread_invariant(&aggregator);

    aggregator.get_conversation(7).await.unwrap();
    assert_unread_invariant(&aggregator);

    aggregator.load_conversations().await.unwrap();
    assert_unread_invariant(&aggregator);
    assert_eq!(
        aggregator
            .conversations()
            .values()
            .map(|c| c.unread_count)
            .sum::<u32>(),
        1
    );
}

#[tokio::test]
async fn test_mark_read_updates_every_thread_holding_the_message() {
    let backend = seeded_backend();
    let kim = account(42, "kim", Role::Student);
    // Teacher account whose profile is created after the first load
    let newcomer = account(97, "newcomer", Role::Teacher);
    backend.add_account(newcomer.clone());
    backend.insert_message(message(1, &newcomer, &kim, 1, false));

    let aggregator = signed_in(&backend);
    aggregator.load_conversations().await.unwrap();
    let by_account = ConversationId::Account(AccountId(97));
    assert_eq!(aggregator.conversation(by_account).unwrap().unread_count, 1);

    backend.add_teacher(teacher(9, 97));
    aggregator.get_conversation(9).await.unwrap();
    let by_profile = ConversationId::Profile(ProfileRef::teacher(TeacherId(9)));
    assert_eq!(aggregator.conversation(by_profile).unwrap().unread_count, 1);

    aggregator.mark_message_as_read(MessageId(1)).await.unwrap();

    for id in [by_account, by_profile] {
        let conversation = aggregator.conversation(id).unwrap();
        assert_eq!(conversation.unread_count, 0, "stale unread count in {id}");
        assert!(conversation.messages[0].is_read);
    }
    assert_unread_invariant(&aggregator);
}
