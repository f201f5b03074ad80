//! REST client for the marketplace API

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ApiError, Result};
use crate::gateway::{Directory, MessageGateway};
use crate::model::{
    Account, AccountId, Message, MessageId, ProfileRef, Role, StudentId, StudentProfile,
    TeacherId, TeacherProfile, UnreadCount,
};
use crate::ClientConfig;

/// Relative endpoint paths, joined onto the configured base URL
pub mod paths {
    use crate::model::{MessageId, Role};

    pub const STUDENTS: &str = "students/";
    pub const TEACHERS: &str = "teachers/";
    pub const ACCOUNTS: &str = "users/";
    pub const MESSAGES: &str = "messages/";
    pub const INBOX: &str = "messages/inbox";
    pub const SENT: &str = "messages/sent";
    pub const UNREAD_COUNT: &str = "messages/unread/count";

    pub fn student(id: i64) -> String {
        format!("students/{id}")
    }

    pub fn teacher(id: i64) -> String {
        format!("teachers/{id}")
    }

    pub fn account(id: i64) -> String {
        format!("users/{id}")
    }

    pub fn conversation(role: Role, id: i64) -> String {
        format!("messages/conversation/{role}/{id}")
    }

    pub fn message(id: MessageId) -> String {
        format!("messages/{id}")
    }

    pub fn mark_read(id: MessageId) -> String {
        format!("messages/{id}/read")
    }
}

/// Body of the send endpoint; the recipient key is role-qualified
#[derive(Debug)]
struct SendMessageBody<'a> {
    content: &'a str,
    recipient: ProfileRef,
}

impl<'a> SendMessageBody<'a> {
    fn new(content: &'a str, recipient: ProfileRef) -> Self {
        Self { content, recipient }
    }
}

impl Serialize for SendMessageBody<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("content", self.content)?;
        map.serialize_entry(self.recipient.role.id_field(), &self.recipient.id)?;
        map.end()
    }
}

/// HTTP implementation of [`Directory`] and [`MessageGateway`]
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a relative endpoint path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.endpoint(path)?;
        debug!(%method, %url, "API request");

        let builder = self.client.request(method, url);
        Ok(match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn dispatch(&self, builder: RequestBuilder, path: &str) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            if status.as_u16() != 404 {
                warn!(%status, path, "API request rejected");
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, u32)]) -> Result<T> {
        let builder = self.request(Method::GET, path)?.query(query);
        let response = self.dispatch(builder, path).await?;
        Self::read_json(response).await
    }

    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get_json(path, &[]).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list<T: DeserializeOwned>(&self, path: &str, skip: u32, limit: u32) -> Result<Vec<T>> {
        self.get_json(path, &[("skip", skip), ("limit", limit)]).await
    }
}

#[async_trait]
impl Directory for HttpClient {
    async fn list_students(&self, skip: u32, limit: u32) -> Result<Vec<StudentProfile>> {
        self.list(paths::STUDENTS, skip, limit).await
    }

    async fn list_teachers(&self, skip: u32, limit: u32) -> Result<Vec<TeacherProfile>> {
        self.list(paths::TEACHERS, skip, limit).await
    }

    async fn list_accounts(&self, skip: u32, limit: u32) -> Result<Vec<Account>> {
        self.list(paths::ACCOUNTS, skip, limit).await
    }

    async fn student(&self, id: StudentId) -> Result<Option<StudentProfile>> {
        self.get_optional(&paths::student(id.0)).await
    }

    async fn teacher(&self, id: TeacherId) -> Result<Option<TeacherProfile>> {
        self.get_optional(&paths::teacher(id.0)).await
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        self.get_optional(&paths::account(id.0)).await
    }
}

#[async_trait]
impl MessageGateway for HttpClient {
    async fn send_message(&self, content: &str, recipient: ProfileRef) -> Result<Message> {
        let body = SendMessageBody::new(content, recipient);
        let builder = self.request(Method::POST, paths::MESSAGES)?.json(&body);
        let response = self.dispatch(builder, paths::MESSAGES).await?;
        Self::read_json(response).await
    }

    async fn inbox_messages(&self) -> Result<Vec<Message>> {
        self.get_json(paths::INBOX, &[]).await
    }

    async fn sent_messages(&self) -> Result<Vec<Message>> {
        self.get_json(paths::SENT, &[]).await
    }

    async fn conversation(
        &self,
        counterparty_role: Role,
        counterparty_id: i64,
    ) -> Result<Vec<Message>> {
        self.get_json(&paths::conversation(counterparty_role, counterparty_id), &[])
            .await
    }

    async fn mark_message_as_read(&self, id: MessageId) -> Result<()> {
        let path = paths::mark_read(id);
        let builder = self.request(Method::PATCH, &path)?;
        self.dispatch(builder, &path).await?;
        Ok(())
    }

    async fn unread_message_count(&self) -> Result<u64> {
        let count: UnreadCount = self.get_json(paths::UNREAD_COUNT, &[]).await?;
        Ok(count.total)
    }

    async fn delete_message(&self, id: MessageId) -> Result<()> {
        let path = paths::message(id);
        let builder = self.request(Method::DELETE, &path)?;
        self.dispatch(builder, &path).await?;
        Ok(())
    }
}
