//! Group Membership Client
//!
//! Thin client for the external user/group service. Group CRUD and member
//! management live entirely in that service; the routing core only ever
//! asks for a group's member list.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::MembershipSettings;
use crate::domain::GroupMembership;
use crate::shared::error::AppError;

/// HTTP implementation of the membership lookup.
#[derive(Clone)]
pub struct HttpGroupMembership {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MembersResponse {
    members: Vec<String>,
}

impl HttpGroupMembership {
    pub fn new(settings: &MembershipSettings) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("membership client init failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GroupMembership for HttpGroupMembership {
    async fn find_group_members(&self, group_id: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/groups/{}/members", self.base_url, group_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("membership service request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "membership service returned {} for group {}",
                response.status(),
                group_id
            )));
        }

        let body: MembersResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("membership response malformed: {}", e)))?;

        Ok(body.members)
    }
}
