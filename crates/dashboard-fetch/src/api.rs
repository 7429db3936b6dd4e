//! Typed one-off calls behind the dashboard forms.
//!
//! Each mutation validates its payload, fires once and reports success
//! through the notifier. Callers refetch the affected hook afterwards.

use bytes::Bytes;
use dashboard_core::{Notification, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ApiClient, FetchError, Method,
    transport::{FormPart, RequestBody},
};

/// REST paths, relative to the API base URL.
pub mod endpoints {
    pub const LOGIN: &str = "/api/auth/login";
    pub const TEAM_CHART: &str = "/api/team/teamwisechart";
    pub const TEAM_CREATE: &str = "/api/team/create";
    pub const TEAM_MEMBERS: &str = "/api/teamMember";
    pub const TEAM_MEMBER_CREATE: &str = "/api/teamMember/create";
    pub const DEPARTMENTS: &str = "/api/department/";
    pub const DEPARTMENT_CREATE: &str = "/api/department/create";
    pub const PROFILES: &str = "/api/profile";
    pub const PROFILE_CREATE: &str = "/api/profile/create";
    pub const PROMOTIONS: &str = "/api/profile/promotion/";
    pub const PROMOTION_CREATE: &str = "/api/profile/promotion/create";
    pub const SPECIAL_ORDERS: &str = "/api/profile/projectSpecialOrder/";
    pub const SPECIAL_ORDER_CREATE: &str = "/api/profile/projectSpecialOrder/create";
    pub const RANKINGS: &str = "/api/profile/ranking";
    pub const RANKING_CREATE: &str = "/api/profile/ranking/create";
    pub const QUARTERLY_PERFORMANCE: &str = "/api/profile/quarterly-performance";
    pub const PROJECTS: &str = "/api/project";
    pub const ATTENDANCE_REPORT: &str = "/api/attendance/monthly-attendance-report";
    pub const DISTRIBUTIONS: &str = "/api/today-task/distribution";
    pub const TODAY_TASK_UPDATE: &str = "/api/today-task/update";
}

fn require(condition: bool, message: &str) -> Result<(), FetchError> {
    if condition {
        Ok(())
    } else {
        Err(FetchError::Invalid(message.to_string()))
    }
}

fn valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Daily promotion figures for a marketplace profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPromotion {
    pub profile_name: String,
    pub impressions: u64,
    pub clicks: u64,
    pub promotion_amount: f64,
}

impl NewPromotion {
    /// # Errors
    /// Returns `Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), FetchError> {
        require(!self.profile_name.trim().is_empty(), "Please select a profile")?;
        require(valid_amount(self.promotion_amount), "Please enter a valid promo amount")
    }
}

/// Special order entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialOrder {
    #[serde(rename = "profileName")]
    pub profile_name: String,
    pub special_order_amount: f64,
    /// `YYYY-MM-DD`.
    pub delivery_date: String,
    pub client_name: String,
}

impl SpecialOrder {
    /// # Errors
    /// Returns `Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), FetchError> {
        require(!self.profile_name.trim().is_empty(), "Please select a profile")?;
        require(valid_amount(self.special_order_amount), "Please enter a valid order amount")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDepartment {
    pub department_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub profile_name: String,
    pub department_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTeam {
    pub team_name: String,
    pub team_target: f64,
    pub department_id: Option<i64>,
    pub leader_id: i64,
    /// Member user ids.
    pub members: Vec<i64>,
}

impl NewTeam {
    /// # Errors
    /// Returns `Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), FetchError> {
        require(
            !self.team_name.trim().is_empty() && valid_amount(self.team_target) && self.team_target > 0.0,
            "Please fill all required fields",
        )?;
        require(!self.members.is_empty(), "Please select at least one team member")
    }
}

/// One keyword position of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRanking {
    pub keywords: String,
    pub row: u32,
    #[serde(rename = "rankingPage")]
    pub ranking_page: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingSubmission {
    #[serde(rename = "profileName")]
    pub profile_name: String,
    pub rankings: Vec<KeywordRanking>,
}

/// Status change of a today-task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusUpdate {
    pub ops_status: String,
    pub expected_finish_time: String,
}

/// Picture attached to a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
}

/// Team member sign-up sent as a multipart form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registration {
    pub email: String,
    pub uid: String,
    /// Remaining profile fields (name, gender, department, ...).
    pub fields: Vec<(String, String)>,
    pub picture: Option<Picture>,
}

/// Largest picture the registration form accepts.
pub const MAX_PICTURE_BYTES: usize = 2 * 1024 * 1024;

impl Registration {
    /// # Errors
    /// Returns `Invalid` for a picture that is not an image or is over 2MB.
    pub fn validate(&self) -> Result<(), FetchError> {
        if let Some(picture) = &self.picture {
            require(picture.mime.starts_with("image/"), "Only image files are allowed.")?;
            require(picture.bytes.len() <= MAX_PICTURE_BYTES, "File size should be under 2MB.")?;
        }
        Ok(())
    }

    fn into_parts(self) -> Vec<FormPart> {
        let mut parts = vec![
            FormPart::Text {
                name: "email".to_string(),
                value: self.email,
            },
            FormPart::Text {
                name: "uid".to_string(),
                value: self.uid,
            },
        ];
        parts.extend(self.fields.into_iter().filter(|(name, _)| name != "confirmPassword").map(
            |(name, value)| FormPart::Text { name, value },
        ));
        if let Some(picture) = self.picture {
            parts.push(FormPart::File {
                name: "dp".to_string(),
                file_name: picture.file_name,
                mime: picture.mime,
                bytes: picture.bytes,
            });
        }
        parts
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
}

/// Typed calls over an `ApiClient`.
#[derive(Clone)]
pub struct DashboardApi {
    client: ApiClient,
}

impl DashboardApi {
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    #[must_use]
    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    fn require_login(&self) -> Result<(), FetchError> {
        if self.client.session().token().is_some() {
            return Ok(());
        }
        self.client.notify(Notification::warning("Please login first."));
        Err(FetchError::NotAuthenticated)
    }

    fn reject(&self, error: FetchError) -> FetchError {
        self.client.notify(Notification::error(error.to_string()));
        error
    }

    async fn mutate(
        &self,
        method: Method,
        address: &str,
        body: Option<Value>,
        success: &str,
    ) -> Result<Value, FetchError> {
        self.require_login()?;
        let response = self.client.request(method, address, body).await?;
        self.client.notify(Notification::success(success));
        Ok(response)
    }

    fn to_json<P: Serialize>(&self, payload: &P) -> Result<Value, FetchError> {
        serde_json::to_value(payload).map_err(|e| self.reject(FetchError::Invalid(e.to_string())))
    }

    /// Log in and store the returned token and user.
    ///
    /// # Errors
    /// Returns error if the credentials are rejected or no token comes back.
    pub async fn login(&self, email: &str, password: &str) -> Result<Option<UserProfile>, FetchError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response: TokenResponse = self
            .client
            .request_as(Method::Post, endpoints::LOGIN, Some(body))
            .await?;

        let token = response
            .token
            .ok_or_else(|| self.reject(FetchError::Decode("login response has no token".to_string())))?;
        self.client
            .session()
            .login(&token, response.user.clone())
            .map_err(|e| self.reject(FetchError::Invalid(e.to_string())))?;
        Ok(response.user)
    }

    /// Register a team member. A token in the response starts a session.
    ///
    /// # Errors
    /// Returns `Invalid` for a rejected picture, otherwise the upload failure.
    pub async fn register(&self, registration: Registration) -> Result<Value, FetchError> {
        registration.validate().map_err(|e| self.reject(e))?;
        let response = self
            .client
            .send(
                Method::Post,
                endpoints::TEAM_MEMBER_CREATE,
                RequestBody::Multipart(registration.into_parts()),
            )
            .await?;

        let parsed: Option<TokenResponse> = serde_json::from_value(response.clone()).ok();
        match parsed.and_then(|r| r.token) {
            Some(token) => {
                if let Err(e) = self.client.session().login(&token, None) {
                    tracing::warn!("Failed to persist registration token: {e}");
                }
            }
            None => self.client.session().logout(),
        }
        self.client
            .notify(Notification::success("Registration successful! Please login."));
        Ok(response)
    }

    /// # Errors
    /// Returns `Invalid` for a bad payload, otherwise the request failure.
    pub async fn create_promotion(&self, promotion: &NewPromotion) -> Result<Value, FetchError> {
        promotion.validate().map_err(|e| self.reject(e))?;
        let body = self.to_json(promotion)?;
        self.mutate(
            Method::Post,
            endpoints::PROMOTION_CREATE,
            Some(body),
            "Promotion info submitted successfully",
        )
        .await
    }

    /// # Errors
    /// Returns `Invalid` for a bad payload, otherwise the request failure.
    pub async fn update_promotion(&self, id: i64, promotion: &NewPromotion) -> Result<Value, FetchError> {
        promotion.validate().map_err(|e| self.reject(e))?;
        let body = self.to_json(promotion)?;
        self.mutate(
            Method::Put,
            &format!("{}{id}", endpoints::PROMOTIONS),
            Some(body),
            "Promotion updated successfully",
        )
        .await
    }

    /// # Errors
    /// Returns `Invalid` for a bad payload, otherwise the request failure.
    pub async fn create_special_order(&self, order: &SpecialOrder) -> Result<Value, FetchError> {
        order.validate().map_err(|e| self.reject(e))?;
        let body = self.to_json(order)?;
        self.mutate(
            Method::Post,
            endpoints::SPECIAL_ORDER_CREATE,
            Some(body),
            "Special order added successfully",
        )
        .await
    }

    /// # Errors
    /// Returns `Invalid` for a bad payload, otherwise the request failure.
    pub async fn update_special_order(&self, id: i64, order: &SpecialOrder) -> Result<Value, FetchError> {
        order.validate().map_err(|e| self.reject(e))?;
        let body = self.to_json(order)?;
        self.mutate(
            Method::Put,
            &format!("{}{id}", endpoints::SPECIAL_ORDERS),
            Some(body),
            "Order updated successfully",
        )
        .await
    }

    /// # Errors
    /// Returns the request failure.
    pub async fn delete_special_order(&self, id: i64) -> Result<Value, FetchError> {
        self.mutate(
            Method::Delete,
            &format!("{}{id}", endpoints::SPECIAL_ORDERS),
            None,
            "Order deleted successfully",
        )
        .await
    }

    /// # Errors
    /// Returns `Invalid` for an empty name, otherwise the request failure.
    pub async fn create_department(&self, department: &NewDepartment) -> Result<Value, FetchError> {
        require(!department.department_name.trim().is_empty(), "Department name is required")
            .map_err(|e| self.reject(e))?;
        let body = self.to_json(department)?;
        self.mutate(
            Method::Post,
            endpoints::DEPARTMENT_CREATE,
            Some(body),
            "Department created successfully",
        )
        .await
    }

    /// # Errors
    /// Returns `Invalid` for an empty name, otherwise the request failure.
    pub async fn create_profile(&self, profile: &NewProfile) -> Result<Value, FetchError> {
        let profile = NewProfile {
            profile_name: profile.profile_name.trim().to_string(),
            department_id: profile.department_id,
        };
        require(!profile.profile_name.is_empty(), "Profile name is required")
            .map_err(|e| self.reject(e))?;
        let body = self.to_json(&profile)?;
        self.mutate(
            Method::Post,
            endpoints::PROFILE_CREATE,
            Some(body),
            "Profile created successfully",
        )
        .await
    }

    /// # Errors
    /// Returns `Invalid` for a bad payload, otherwise the request failure.
    pub async fn create_team(&self, team: &NewTeam) -> Result<Value, FetchError> {
        team.validate().map_err(|e| self.reject(e))?;
        let body = self.to_json(team)?;
        self.mutate(Method::Post, endpoints::TEAM_CREATE, Some(body), "Team created successfully")
            .await
    }

    /// # Errors
    /// Returns `Invalid` without a profile, otherwise the request failure.
    pub async fn submit_ranking(&self, ranking: &RankingSubmission) -> Result<Value, FetchError> {
        require(!ranking.profile_name.trim().is_empty(), "Please select a profile")
            .map_err(|e| self.reject(e))?;
        let body = self.to_json(ranking)?;
        self.mutate(
            Method::Post,
            endpoints::RANKING_CREATE,
            Some(body),
            "Ranking info submitted successfully",
        )
        .await
    }

    /// # Errors
    /// Returns the request failure.
    pub async fn update_task_status(&self, task_id: i64, update: &TaskStatusUpdate) -> Result<Value, FetchError> {
        let body = self.to_json(update)?;
        self.mutate(
            Method::Patch,
            &format!("{}/{task_id}", endpoints::TODAY_TASK_UPDATE),
            Some(body),
            "Status updated successfully",
        )
        .await
    }

    /// Edit a distribution row. Only roles allowed to edit distributions may call this.
    ///
    /// # Errors
    /// Returns `Invalid` when the session lacks the permission, otherwise the request failure.
    pub async fn update_distribution(&self, id: i64, changes: Value) -> Result<Value, FetchError> {
        require(
            self.client.session().permissions().can_edit_distribution,
            "Your role cannot edit distributions",
        )
        .map_err(|e| self.reject(e))?;
        self.mutate(
            Method::Put,
            &format!("{}/{id}", endpoints::DISTRIBUTIONS),
            Some(changes),
            "Distribution updated successfully",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dashboard_core::{DashboardConfig, Level, NotificationCenter, Role, SessionStore};
    use serde_json::json;

    use super::*;
    use crate::mock::{MockReply, MockTransport};

    fn setup() -> (DashboardApi, Arc<MockTransport>, Arc<NotificationCenter>) {
        let transport = Arc::new(MockTransport::new());
        let notices = Arc::new(NotificationCenter::default());
        let client = ApiClient::new(
            DashboardConfig {
                api_base_url: "http://api.test".to_string(),
                ..DashboardConfig::default()
            },
            SessionStore::in_memory(),
            transport.clone(),
            notices.clone(),
        );
        (DashboardApi::new(client), transport, notices)
    }

    fn promotion() -> NewPromotion {
        NewPromotion {
            profile_name: "acme".to_string(),
            impressions: 1200,
            clicks: 40,
            promotion_amount: 12.5,
        }
    }

    #[test]
    fn test_promotion_wire_names() {
        let value = serde_json::to_value(promotion()).unwrap();
        assert_eq!(
            value,
            json!({"profileName": "acme", "impressions": 1200, "clicks": 40, "promotionAmount": 12.5})
        );
    }

    #[test]
    fn test_validation_messages() {
        tokio_test::assert_ok!(promotion().validate());
        let mut bad = promotion();
        bad.profile_name = " ".to_string();
        assert_eq!(bad.validate(), Err(FetchError::Invalid("Please select a profile".into())));

        let mut bad = promotion();
        bad.promotion_amount = f64::NAN;
        tokio_test::assert_err!(bad.validate());

        let team = NewTeam {
            team_name: "Alpha".to_string(),
            team_target: 5000.0,
            department_id: Some(2),
            leader_id: 1,
            members: vec![],
        };
        assert_eq!(
            team.validate(),
            Err(FetchError::Invalid("Please select at least one team member".into()))
        );
    }

    #[tokio::test]
    async fn test_mutation_requires_login() {
        let (api, transport, notices) = setup();
        let err = api.create_promotion(&promotion()).await.unwrap_err();

        assert_eq!(err, FetchError::NotAuthenticated);
        assert_eq!(transport.request_count(), 0);
        assert_eq!(notices.get_history()[0].message, "Please login first.");
    }

    #[tokio::test]
    async fn test_invalid_payload_is_not_sent() {
        let (api, transport, _) = setup();
        api.client().session().login("tok", None).unwrap();
        let mut bad = promotion();
        bad.profile_name.clear();

        assert!(api.create_promotion(&bad).await.is_err());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_special_order_crud_paths() {
        let (api, transport, notices) = setup();
        api.client().session().login("tok", None).unwrap();
        let order = SpecialOrder {
            profile_name: "acme".to_string(),
            special_order_amount: 300.0,
            delivery_date: "2025-01-31".to_string(),
            client_name: "Globex".to_string(),
        };

        api.create_special_order(&order).await.unwrap();
        api.update_special_order(4, &order).await.unwrap();
        api.delete_special_order(4).await.unwrap();

        let sent: Vec<_> = transport
            .requests()
            .into_iter()
            .map(|r| (r.method, r.url))
            .collect();
        assert_eq!(
            sent,
            vec![
                (Method::Post, "http://api.test/api/profile/projectSpecialOrder/create".to_string()),
                (Method::Put, "http://api.test/api/profile/projectSpecialOrder/4".to_string()),
                (Method::Delete, "http://api.test/api/profile/projectSpecialOrder/4".to_string()),
            ]
        );
        assert!(notices.get_history().iter().all(|n| n.level == Level::Success));
    }

    #[tokio::test]
    async fn test_distribution_edit_is_gated() {
        let (api, transport, _) = setup();
        api.client().session().login("tok", None).unwrap();

        let err = api.update_distribution(1, json!({"amount": 10})).await.unwrap_err();
        assert!(matches!(err, FetchError::Invalid(_)));
        assert_eq!(transport.request_count(), 0);

        api.client().session().set_user(UserProfile {
            id: 3,
            email: "lead@example.com".to_string(),
            name: None,
            role: Role::OperationLeader,
            account_status: Some("active".to_string()),
        });
        api.update_distribution(1, json!({"amount": 10})).await.unwrap();
        assert_eq!(transport.requests()[0].url, "http://api.test/api/today-task/distribution/1");
    }

    #[tokio::test]
    async fn test_login_stores_session() {
        let (api, transport, _) = setup();
        transport.push(MockReply::json(
            200,
            &json!({"token": "fresh", "user": {"id": 5, "email": "hod@example.com", "role": "hod", "account_status": "active"}}),
        ));

        let user = api.login("hod@example.com", "pw").await.unwrap().unwrap();
        assert_eq!(user.role, Role::Hod);
        assert_eq!(api.client().session().token().as_deref(), Some("fresh"));
        assert!(api.client().session().permissions().hod);
    }

    fn registration_with(mime: &str, size: usize) -> Registration {
        Registration {
            email: "new@example.com".to_string(),
            uid: "u-1".to_string(),
            fields: Vec::new(),
            picture: Some(Picture {
                file_name: "upload".to_string(),
                mime: mime.to_string(),
                bytes: Bytes::from(vec![0u8; size]),
            }),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_non_image() {
        let (api, transport, notices) = setup();
        let err = api
            .register(registration_with("application/pdf", 10))
            .await
            .unwrap_err();

        assert_eq!(err, FetchError::Invalid("Only image files are allowed.".into()));
        assert_eq!(transport.request_count(), 0);
        assert_eq!(notices.get_history()[0].level, Level::Error);
    }

    #[tokio::test]
    async fn test_register_rejects_large_picture() {
        let (api, transport, _) = setup();
        tokio_test::assert_ok!(registration_with("image/jpeg", MAX_PICTURE_BYTES).validate());

        let err = api
            .register(registration_with("image/jpeg", MAX_PICTURE_BYTES + 1))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Invalid("File size should be under 2MB.".into()));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_register_sends_multipart() {
        let (api, transport, _) = setup();
        transport.push(MockReply::json(201, &json!({"token": "new-member"})));

        api.register(Registration {
            email: "new@example.com".to_string(),
            uid: "u-1".to_string(),
            fields: vec![
                ("first_name".to_string(), "Rafi".to_string()),
                ("confirmPassword".to_string(), "x".to_string()),
            ],
            picture: Some(Picture {
                file_name: "me.png".to_string(),
                mime: "image/png".to_string(),
                bytes: Bytes::from_static(b"\x89PNG"),
            }),
        })
        .await
        .unwrap();

        let sent = &transport.requests()[0];
        assert_eq!(sent.header("content-type"), None);
        let RequestBody::Multipart(parts) = &sent.body else {
            panic!("expected multipart body");
        };
        assert_eq!(parts.len(), 4);
        assert!(parts.iter().all(|p| !matches!(p, FormPart::Text { name, .. } if name == "confirmPassword")));
        assert_eq!(api.client().session().token().as_deref(), Some("new-member"));
    }
}
