use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::directory::error::DirectoryError;
use crate::directory::*;
use crate::security::scopes;
use crate::security::token_issuer::TokenIssuer;

/// REST client for the directory API.
///
/// Every operation mints a token for its narrowest scope, then issues bearer
/// requests. List operations follow `nextPageToken` until exhausted.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    api_base: String,
    customer: String,
    tokens: TokenIssuer,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl DirectoryClient {
    pub fn new(
        api_base: impl Into<String>,
        customer: impl Into<String>,
        tokens: TokenIssuer,
        http: Client,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            customer: customer.into(),
            tokens,
            http,
        }
    }

    // ========== Users ==========

    pub async fn get_user(&self, user_key: &str) -> Result<User, DirectoryError> {
        let url = self.url(&["users", user_key])?;
        self.fetch(scopes::USER_READONLY, url).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User, DirectoryError> {
        let url = self.url(&["users"])?;
        self.send_json(Method::POST, scopes::USER, url, user).await
    }

    pub async fn update_user(&self, user_key: &str, patch: &UserPatch) -> Result<User, DirectoryError> {
        let url = self.url(&["users", user_key])?;
        self.send_json(Method::PATCH, scopes::USER, url, patch).await
    }

    pub async fn make_user_admin(&self, user_key: &str, is_admin: bool) -> Result<(), DirectoryError> {
        let url = self.url(&["users", user_key, "makeAdmin"])?;
        self.send_ignoring_body(Method::POST, scopes::USER_SECURITY, url, &json!({ "status": is_admin }))
            .await
    }

    pub async fn list_users(&self, filter: &ListFilter) -> Result<Vec<User>, DirectoryError> {
        let url = self.filtered_url(&["users"], filter)?;
        self.paginate(scopes::USER_READONLY, url, "users").await
    }

    pub async fn delete_user(&self, user_key: &str) -> Result<(), DirectoryError> {
        let url = self.url(&["users", user_key])?;
        self.delete(scopes::USER, url).await
    }

    pub async fn undelete_user(&self, user_key: &str) -> Result<(), DirectoryError> {
        let url = self.url(&["users", user_key, "undelete"])?;
        self.send_ignoring_body(Method::POST, scopes::USER, url, &json!({})).await
    }

    pub async fn create_user_alias(&self, user_key: &str, alias: &str) -> Result<Alias, DirectoryError> {
        let url = self.url(&["users", user_key, "aliases"])?;
        self.send_json(Method::POST, scopes::USER_ALIAS, url, &json!({ "alias": alias }))
            .await
    }

    pub async fn list_user_aliases(&self, user_key: &str) -> Result<Vec<Alias>, DirectoryError> {
        let url = self.url(&["users", user_key, "aliases"])?;
        self.fetch_list(scopes::USER_READONLY, url, "aliases").await
    }

    pub async fn delete_user_alias(&self, user_key: &str, alias: &str) -> Result<(), DirectoryError> {
        let url = self.url(&["users", user_key, "aliases", alias])?;
        self.delete(scopes::USER_ALIAS, url).await
    }

    // ========== Groups ==========

    pub async fn create_group(&self, group: &NewGroup) -> Result<Group, DirectoryError> {
        let url = self.url(&["groups"])?;
        self.send_json(Method::POST, scopes::GROUP, url, group).await
    }

    pub async fn update_group(&self, group_key: &str, patch: &GroupPatch) -> Result<Group, DirectoryError> {
        let url = self.url(&["groups", group_key])?;
        self.send_json(Method::PATCH, scopes::GROUP, url, patch).await
    }

    pub async fn get_group(&self, group_key: &str) -> Result<Group, DirectoryError> {
        let url = self.url(&["groups", group_key])?;
        self.fetch(scopes::GROUP_READONLY, url).await
    }

    pub async fn list_groups(&self, filter: &ListFilter) -> Result<Vec<Group>, DirectoryError> {
        let url = self.filtered_url(&["groups"], filter)?;
        self.paginate(scopes::GROUP_READONLY, url, "groups").await
    }

    pub async fn list_groups_for_member(&self, user_key: &str) -> Result<Vec<Group>, DirectoryError> {
        let mut url = self.url(&["groups"])?;
        url.query_pairs_mut().append_pair("userKey", user_key);
        self.paginate(scopes::GROUP_READONLY, url, "groups").await
    }

    pub async fn delete_group(&self, group_key: &str) -> Result<(), DirectoryError> {
        let url = self.url(&["groups", group_key])?;
        self.delete(scopes::GROUP, url).await
    }

    // ========== Group members ==========

    pub async fn add_group_member(
        &self,
        group_key: &str,
        email: &str,
        role: MemberRole,
    ) -> Result<Member, DirectoryError> {
        let url = self.url(&["groups", group_key, "members"])?;
        let body = json!({ "email": email, "role": role });
        self.send_json(Method::POST, scopes::GROUP_MEMBER, url, &body).await
    }

    pub async fn update_group_member(
        &self,
        group_key: &str,
        member_key: &str,
        role: MemberRole,
    ) -> Result<Member, DirectoryError> {
        let url = self.url(&["groups", group_key, "members", member_key])?;
        self.send_json(Method::PATCH, scopes::GROUP_MEMBER, url, &json!({ "role": role }))
            .await
    }

    pub async fn list_group_members(&self, group_key: &str) -> Result<Vec<Member>, DirectoryError> {
        let url = self.url(&["groups", group_key, "members"])?;
        self.paginate(scopes::GROUP_MEMBER_READONLY, url, "members").await
    }

    pub async fn remove_group_member(&self, group_key: &str, member_key: &str) -> Result<(), DirectoryError> {
        let url = self.url(&["groups", group_key, "members", member_key])?;
        self.delete(scopes::GROUP_MEMBER, url).await
    }

    // ========== Group aliases ==========

    pub async fn add_group_alias(&self, group_key: &str, alias: &str) -> Result<Alias, DirectoryError> {
        let url = self.url(&["groups", group_key, "aliases"])?;
        self.send_json(Method::POST, scopes::GROUP, url, &json!({ "alias": alias }))
            .await
    }

    pub async fn list_group_aliases(&self, group_key: &str) -> Result<Vec<Alias>, DirectoryError> {
        let url = self.url(&["groups", group_key, "aliases"])?;
        self.fetch_list(scopes::GROUP_READONLY, url, "aliases").await
    }

    pub async fn delete_group_alias(&self, group_key: &str, alias: &str) -> Result<(), DirectoryError> {
        let url = self.url(&["groups", group_key, "aliases", alias])?;
        self.delete(scopes::GROUP, url).await
    }

    // ========== Org units ==========

    pub async fn create_org_unit(&self, org_unit: &NewOrgUnit) -> Result<OrgUnit, DirectoryError> {
        let url = self.customer_url(&["orgunits"])?;
        self.send_json(Method::POST, scopes::ORGUNIT, url, org_unit).await
    }

    pub async fn update_org_unit(&self, path: &str, patch: &OrgUnitPatch) -> Result<OrgUnit, DirectoryError> {
        let url = self.customer_url(&["orgunits", org_unit_key(path)])?;
        self.send_json(Method::PATCH, scopes::ORGUNIT, url, patch).await
    }

    pub async fn get_org_unit(&self, path: &str) -> Result<OrgUnit, DirectoryError> {
        let url = self.customer_url(&["orgunits", org_unit_key(path)])?;
        self.fetch(scopes::ORGUNIT_READONLY, url).await
    }

    pub async fn list_org_units(&self) -> Result<Vec<OrgUnit>, DirectoryError> {
        let mut url = self.customer_url(&["orgunits"])?;
        url.query_pairs_mut().append_pair("type", "all");
        self.fetch_list(scopes::ORGUNIT_READONLY, url, "organizationUnits").await
    }

    pub async fn delete_org_unit(&self, path: &str) -> Result<(), DirectoryError> {
        let url = self.customer_url(&["orgunits", org_unit_key(path)])?;
        self.delete(scopes::ORGUNIT, url).await
    }

    // ========== Roles ==========

    pub async fn list_roles(&self) -> Result<Vec<Role>, DirectoryError> {
        let url = self.customer_url(&["roles"])?;
        let envelope: ItemsEnvelope<Role> = self.fetch(scopes::ROLE_MANAGEMENT_READONLY, url).await?;
        Ok(envelope.items)
    }

    pub async fn list_role_assignments(&self, user_key: Option<&str>) -> Result<Vec<RoleAssignment>, DirectoryError> {
        let mut url = self.customer_url(&["roleassignments"])?;
        if let Some(user_key) = user_key {
            url.query_pairs_mut().append_pair("userKey", user_key);
        }
        let envelope: ItemsEnvelope<RoleAssignment> =
            self.fetch(scopes::ROLE_MANAGEMENT_READONLY, url).await?;
        Ok(envelope.items)
    }

    pub async fn create_role_assignment(
        &self,
        assignment: &NewRoleAssignment,
    ) -> Result<RoleAssignment, DirectoryError> {
        let url = self.customer_url(&["roleassignments"])?;
        self.send_json(Method::POST, scopes::ROLE_MANAGEMENT, url, assignment).await
    }

    // ========== Plumbing ==========

    fn url(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let mut url =
            Url::parse(&self.api_base).map_err(|_| DirectoryError::InvalidUrl(self.api_base.clone()))?;
        url.path_segments_mut()
            .map_err(|_| DirectoryError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn customer_url(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let mut full = vec!["customer", self.customer.as_str()];
        full.extend_from_slice(segments);
        self.url(&full)
    }

    fn filtered_url(&self, segments: &[&str], filter: &ListFilter) -> Result<Url, DirectoryError> {
        let mut url = self.url(segments)?;
        {
            let mut query = url.query_pairs_mut();
            match (&filter.domain, &filter.customer) {
                (None, None) => {
                    query.append_pair("customer", &self.customer);
                }
                (domain, customer) => {
                    if let Some(domain) = domain {
                        query.append_pair("domain", domain);
                    }
                    if let Some(customer) = customer {
                        query.append_pair("customer", customer);
                    }
                }
            }
        }
        Ok(url)
    }

    async fn bearer(&self, scope: &str) -> Result<String, DirectoryError> {
        Ok(self.tokens.issue_token(&[scope]).await?.value)
    }

    fn authorized(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        trace!(method = %method, url = %url, "directory request");
        self.http.request(method, url).bearer_auth(token)
    }

    async fn fetch<T: DeserializeOwned>(&self, scope: &str, url: Url) -> Result<T, DirectoryError> {
        let token = self.bearer(scope).await?;
        let resp = self.authorized(Method::GET, url, &token).send().await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    /// Single-page list where the items live under `field`.
    async fn fetch_list<T: DeserializeOwned>(
        &self,
        scope: &str,
        url: Url,
        field: &str,
    ) -> Result<Vec<T>, DirectoryError> {
        let mut page: Value = self.fetch(scope, url).await?;
        take_items(&mut page, field)
    }

    async fn paginate<T: DeserializeOwned>(
        &self,
        scope: &str,
        base: Url,
        field: &str,
    ) -> Result<Vec<T>, DirectoryError> {
        let token = self.bearer(scope).await?;
        let mut items = Vec::new();
        let mut url = base.clone();
        loop {
            let resp = self.authorized(Method::GET, url, &token).send().await?;
            let mut page: Value = ensure_success(resp).await?.json().await?;
            items.extend(take_items::<T>(&mut page, field)?);

            let Some(next) = page.get("nextPageToken").and_then(Value::as_str).filter(|t| !t.is_empty())
            else {
                break;
            };
            debug!(field, fetched = items.len(), "following directory page token");
            url = base.clone();
            url.query_pairs_mut().append_pair("pageToken", next);
        }
        Ok(items)
    }

    async fn send_json<B, T>(&self, method: Method, scope: &str, url: Url, body: &B) -> Result<T, DirectoryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.bearer(scope).await?;
        let resp = self.authorized(method, url, &token).json(body).send().await?;
        Ok(ensure_success(resp).await?.json().await?)
    }

    async fn send_ignoring_body<B>(&self, method: Method, scope: &str, url: Url, body: &B) -> Result<(), DirectoryError>
    where
        B: Serialize + ?Sized,
    {
        let token = self.bearer(scope).await?;
        let resp = self.authorized(method, url, &token).json(body).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn delete(&self, scope: &str, url: Url) -> Result<(), DirectoryError> {
        let token = self.bearer(scope).await?;
        let resp = self.authorized(Method::DELETE, url, &token).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }
}

async fn ensure_success(resp: Response) -> Result<Response, DirectoryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DirectoryError::Upstream {
        status: status.as_u16(),
        body,
    })
}

fn take_items<T: DeserializeOwned>(page: &mut Value, field: &str) -> Result<Vec<T>, DirectoryError> {
    match page.get_mut(field).map(Value::take) {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(list) => serde_json::from_value(list).map_err(|e| DirectoryError::Decode(format!("{}: {}", field, e))),
    }
}

/// Org unit paths are addressed without their leading slash.
fn org_unit_key(path: &str) -> &str {
    path.trim_start_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::service_account::ServiceAccountCredential;
    use mockito::{Matcher, Mock, Server, ServerGuard};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/service_account_key.pem");

    /// The returned mock must stay alive for the token endpoint to answer.
    async fn client_for(server: &mut ServerGuard) -> (DirectoryClient, Mock) {
        let token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_body(r#"{"access_token":"ya29.test","expires_in":3600}"#)
            .create_async()
            .await;
        let credential = ServiceAccountCredential {
            client_email: "relay@project.iam.gserviceaccount.com".to_string(),
            private_key: PRIVATE_KEY.to_string(),
            subject: Some("admin@example.com".to_string()),
            scopes: Vec::new(),
        };
        let tokens = TokenIssuer::new(credential, format!("{}/token", server.url()), Client::new()).unwrap();
        (DirectoryClient::new(server.url(), "my_customer", tokens, Client::new()), token)
    }

    #[tokio::test]
    async fn get_user_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let (client, _token) = client_for(&mut server).await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/users/a(@|%40)x\.com$".into()))
            .match_header("authorization", "Bearer ya29.test")
            .with_status(200)
            .with_body(r#"{"primaryEmail":"a@x.com","name":{"fullName":"Ada X"},"suspended":false}"#)
            .create_async()
            .await;

        let user = client.get_user("a@x.com").await.unwrap();
        assert_eq!(user.primary_email.as_deref(), Some("a@x.com"));
        assert_eq!(user.name.and_then(|n| n.full_name).as_deref(), Some("Ada X"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn list_users_follows_page_tokens() {
        let mut server = Server::new_async().await;
        let (client, _token) = client_for(&mut server).await;
        let first = server
            .mock("GET", "/users")
            .match_query(Matcher::Regex("^customer=my_customer$".into()))
            .with_status(200)
            .with_body(r#"{"users":[{"primaryEmail":"a@x.com"}],"nextPageToken":"page-2"}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/users")
            .match_query(Matcher::Regex("pageToken=page-2".into()))
            .with_status(200)
            .with_body(r#"{"users":[{"primaryEmail":"b@x.com"}]}"#)
            .create_async()
            .await;

        let users = client.list_users(&ListFilter::default()).await.unwrap();
        let emails: Vec<_> = users.iter().filter_map(|u| u.primary_email.clone()).collect();
        assert_eq!(emails, vec!["a@x.com".to_string(), "b@x.com".to_string()]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_error_keeps_status_and_body() {
        let mut server = Server::new_async().await;
        let (client, _token) = client_for(&mut server).await;
        let _mock = server
            .mock("GET", "/groups/missing")
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"Resource Not Found: groupKey"}}"#)
            .create_async()
            .await;

        let err = client.get_group("missing").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().starts_with("Google API 404 {"));
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let mut server = Server::new_async().await;
        let (client, _token) = client_for(&mut server).await;
        let mock = server
            .mock(
                "DELETE",
                Matcher::Regex(r"^/customer/my_customer/orgunits/Engineering(%2F|/)Backend$".into()),
            )
            .with_status(204)
            .create_async()
            .await;

        client.delete_org_unit("/Engineering/Backend").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn token_failure_surfaces_before_directory_call() {
        let mut server = Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(401)
            .with_body(r#"{"error":"unauthorized_client"}"#)
            .create_async()
            .await;
        let directory = server.mock("GET", Matcher::Any).expect(0).create_async().await;
        let credential = ServiceAccountCredential {
            client_email: "relay@project.iam.gserviceaccount.com".to_string(),
            private_key: PRIVATE_KEY.to_string(),
            subject: None,
            scopes: Vec::new(),
        };
        let tokens = TokenIssuer::new(credential, format!("{}/token", server.url()), Client::new()).unwrap();
        let client = DirectoryClient::new(server.url(), "my_customer", tokens, Client::new());

        let err = client.list_roles().await.unwrap_err();
        assert!(matches!(err, DirectoryError::Token(_)));
        assert_eq!(err.status(), Some(401));
        directory.assert_async().await;
    }

    #[test]
    fn org_unit_key_strips_leading_slash() {
        assert_eq!(org_unit_key("/Sales/EMEA"), "Sales/EMEA");
        assert_eq!(org_unit_key("Sales"), "Sales");
    }
}
