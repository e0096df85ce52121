//! HTTP client for the room provisioning service

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::errors::ProvisioningError;
use crate::domain::entities::RoomId;
use crate::domain::traits::Provisioner;

/// Room provisioning over HTTP.
///
/// `POST {base}/room/create` and `POST {base}/room/match`, body
/// `{roomName, password}`; a success answers with the room wrapped under
/// `data`. Non-success statuses, parse failures and a missing id all come
/// out as "no id" errors.
pub struct HttpProvisioner {
    base_url: String,
    client: Client,
}

impl HttpProvisioner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/room/{}", self.base_url.trim_end_matches('/'), operation)
    }

    async fn request_room_id(
        &self,
        operation: &str,
        room_name: &str,
        password: &str,
    ) -> Result<RoomId, ProvisioningError> {
        #[derive(Serialize)]
        struct Request<'a> {
            #[serde(rename = "roomName")]
            room_name: &'a str,
            password: &'a str,
        }

        #[derive(Deserialize)]
        struct Response {
            data: Data,
        }

        #[derive(Deserialize)]
        struct Data {
            room: Room,
        }

        #[derive(Deserialize)]
        struct Room {
            id: Option<String>,
        }

        let url = self.endpoint(operation);
        let request = Request {
            room_name,
            password,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProvisioningError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProvisioningError::Network(format!(
                "provisioning error: {}",
                response.status()
            )));
        }

        let data: Response = response
            .json()
            .await
            .map_err(|e| ProvisioningError::Parse(e.to_string()))?;

        data.data
            .room
            .id
            .map(RoomId::new)
            .ok_or(ProvisioningError::MissingRoomId)
    }
}

#[async_trait]
impl Provisioner for HttpProvisioner {
    async fn create_room(
        &self,
        room_name: &str,
        password: &str,
    ) -> Result<RoomId, ProvisioningError> {
        tracing::debug!("creating room '{}'", room_name);
        self.request_room_id("create", room_name, password).await
    }

    async fn match_room(
        &self,
        room_name: &str,
        password: &str,
    ) -> Result<RoomId, ProvisioningError> {
        tracing::debug!("matching room '{}'", room_name);
        self.request_room_id("match", room_name, password).await
    }
}
